// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::lifecycle::AdmissionGate;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<dyn AdmissionGate>,
}

impl AppState {
    pub fn new(gate: Arc<dyn AdmissionGate>) -> Self {
        Self { gate }
    }
}
