use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::api::api_router;
use crate::auth::TokenIssuer;
use crate::blob::BlobStore;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::service::{Authorizer, FileCoordinator, GroupHierarchy, IdentityService, SharingLedger};
use crate::store::Store;

/// Everything a handler can reach. Built once at startup.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: ServerConfig,
    pub tokens: Arc<TokenIssuer>,
    pub authz: Authorizer,
    pub identity: IdentityService,
    pub groups: GroupHierarchy,
    pub files: FileCoordinator,
    pub sharing: SharingLedger,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        config: ServerConfig,
        jwt_secret: &str,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenIssuer::new(jwt_secret, config.token_ttl_secs)?);
        let authz = Authorizer::new(store.clone());
        let sharing = SharingLedger::new(store.clone());

        Ok(Self {
            identity: IdentityService::new(store.clone(), authz.clone(), tokens.clone()),
            groups: GroupHierarchy::new(store.clone(), authz.clone()),
            files: FileCoordinator::new(
                store.clone(),
                blobs,
                sharing.clone(),
                config.blob_timeout(),
            ),
            store,
            config,
            tokens,
            authz,
            sharing,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
