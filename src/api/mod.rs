// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{VerifyWalletRequest, VerifyWalletResponse},
    state::AppState,
};

pub mod health;
pub mod verify;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/verify-wallet", post(verify::verify_wallet))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        verify::verify_wallet,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            VerifyWalletRequest,
            VerifyWalletResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Verification", description = "Wallet ownership and balance verification"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
