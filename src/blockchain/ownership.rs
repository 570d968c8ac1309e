// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet ownership proofs.
//!
//! A user proves control of a wallet by signing a fixed challenge with the
//! wallet's personal-message signing (EIP-191). The signer's address is
//! recovered from the signature and compared to the claimed address.

use alloy::primitives::{Address, Signature};

/// Challenge the verification page asks the wallet to sign.
pub const DEFAULT_CHALLENGE: &str = "Prove ownership to join Memelord HQ";

/// Errors raised while recovering a signer.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("signature is not valid hex: {0}")]
    MalformedHex(String),

    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("signature could not be recovered: {0}")]
    Recovery(String),
}

/// Recovers and checks wallet signatures over a fixed challenge.
#[derive(Debug, Clone)]
pub struct OwnershipVerifier {
    challenge: String,
}

impl Default for OwnershipVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE)
    }
}

impl OwnershipVerifier {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
        }
    }

    /// Recover the address that produced `signature` over the challenge.
    ///
    /// Accepts 65-byte `r || s || v` hex with or without `0x`; `v` may be
    /// 0/1 or 27/28.
    pub fn recover(&self, signature: &str) -> Result<Address, VerificationError> {
        let bytes = alloy::hex::decode(signature.trim())
            .map_err(|e| VerificationError::MalformedHex(e.to_string()))?;

        if bytes.len() != 65 {
            return Err(VerificationError::InvalidLength(bytes.len()));
        }

        let signature = Signature::from_raw(&bytes)
            .map_err(|e| VerificationError::Recovery(e.to_string()))?;

        signature
            .recover_address_from_msg(self.challenge.as_bytes())
            .map_err(|e| VerificationError::Recovery(e.to_string()))
    }

    /// Whether `signature` was produced by `claimed_address`.
    ///
    /// Comparison is case-insensitive. Unrecoverable signatures are a
    /// failed verification, not an error.
    pub fn verify(&self, claimed_address: &str, signature: &str) -> bool {
        match self.recover(signature) {
            Ok(recovered) => {
                recovered.to_string().to_lowercase() == claimed_address.trim().to_lowercase()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Signature recovery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    fn signer(byte: u8) -> PrivateKeySigner {
        PrivateKeySigner::from_slice(&[byte; 32]).unwrap()
    }

    fn sign(signer: &PrivateKeySigner, message: &str) -> String {
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        alloy::hex::encode_prefixed(signature.as_bytes())
    }

    #[test]
    fn recovers_signer_address() {
        let verifier = OwnershipVerifier::default();
        let wallet = signer(0x11);
        let signature = sign(&wallet, DEFAULT_CHALLENGE);

        assert_eq!(verifier.recover(&signature).unwrap(), wallet.address());
    }

    #[test]
    fn verify_ignores_address_case() {
        let verifier = OwnershipVerifier::default();
        let wallet = signer(0x22);
        let signature = sign(&wallet, DEFAULT_CHALLENGE);
        let checksummed = wallet.address().to_string();

        assert!(verifier.verify(&checksummed, &signature));
        assert!(verifier.verify(&checksummed.to_lowercase(), &signature));
        assert!(verifier.verify(&checksummed.to_uppercase().replace("0X", "0x"), &signature));
    }

    #[test]
    fn verify_accepts_unprefixed_signature() {
        let verifier = OwnershipVerifier::default();
        let wallet = signer(0x23);
        let signature = sign(&wallet, DEFAULT_CHALLENGE);

        assert!(verifier.verify(
            &wallet.address().to_string(),
            signature.trim_start_matches("0x")
        ));
    }

    #[test]
    fn verify_rejects_other_wallet() {
        let verifier = OwnershipVerifier::default();
        let owner = signer(0x33);
        let impostor = signer(0x44);
        let signature = sign(&impostor, DEFAULT_CHALLENGE);

        assert!(!verifier.verify(&owner.address().to_string(), &signature));
    }

    #[test]
    fn verify_rejects_other_challenge() {
        let verifier = OwnershipVerifier::new("Prove ownership to join another group");
        let wallet = signer(0x55);
        let signature = sign(&wallet, DEFAULT_CHALLENGE);

        assert!(!verifier.verify(&wallet.address().to_string(), &signature));
    }

    #[test]
    fn malformed_signatures_fail_without_panicking() {
        let verifier = OwnershipVerifier::default();
        let address = signer(0x66).address().to_string();

        assert!(!verifier.verify(&address, ""));
        assert!(!verifier.verify(&address, "0xnothex"));
        assert!(!verifier.verify(&address, "0xdeadbeef"));
        assert!(matches!(
            verifier.recover("0xdeadbeef"),
            Err(VerificationError::InvalidLength(4))
        ));
        assert!(matches!(
            verifier.recover("zz"),
            Err(VerificationError::MalformedHex(_))
        ));
    }

    #[test]
    fn verification_is_deterministic() {
        let verifier = OwnershipVerifier::default();
        let wallet = signer(0x77);
        let signature = sign(&wallet, DEFAULT_CHALLENGE);
        let address = wallet.address().to_string();

        let first = verifier.verify(&address, &signature);
        for _ in 0..5 {
            assert_eq!(verifier.verify(&address, &signature), first);
        }
        assert!(first);
    }
}
