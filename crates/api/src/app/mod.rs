//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: composition root (provider, stores, services)
//! - `routes/`: HTTP routes + handlers, one file per route class
//! - `dto.rs`: request DTOs and path parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Every routed request passes tenant resolution, then authorization, then
/// the tenant membership check. `/health` sits outside the chain.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let protected = routes::router(&services.settings.route_prefixes)
        .layer(Extension(services.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    services.clone(),
                    middleware::resolve_tenant_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    services.clone(),
                    middleware::auth_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    services,
                    middleware::tenant_middleware,
                )),
        );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
