// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTPS credentials for the public listener.
//!
//! The ring crypto provider must be installed (see `main`) before loading.

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsPaths;

#[derive(Debug, thiserror::Error)]
#[error("failed to load TLS credentials from {cert} / {key}: {source}")]
pub struct TlsError {
    cert: String,
    key: String,
    #[source]
    source: std::io::Error,
}

/// Load a PEM certificate chain and private key.
pub async fn load_tls_config(paths: &TlsPaths) -> Result<RustlsConfig, TlsError> {
    RustlsConfig::from_pem_file(&paths.cert, &paths.key)
        .await
        .map_err(|source| TlsError {
            cert: paths.cert.display().to_string(),
            key: paths.key.display().to_string(),
            source,
        })
}
