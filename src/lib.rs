use std::sync::Arc;

use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub mod config;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod session;

use domain::{
    registry::{CapabilityRegistry, RegistryError},
    resources::ResourceStore,
};
use gateway::StreamGateway;
use mcp::server::{Dispatcher, ServerIdentity};
use session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionManager>,
    pub gateway: Arc<StreamGateway>,
}

impl AppState {
    pub fn new(identity: ServerIdentity, registry: CapabilityRegistry) -> Self {
        let sessions = Arc::new(SessionManager::new());
        let resources = Arc::new(ResourceStore::from_descriptors(registry.resources()));
        let dispatcher = Dispatcher::new(
            identity,
            Arc::new(registry),
            resources,
            Arc::clone(&sessions),
        );

        Self {
            dispatcher: Arc::new(dispatcher),
            gateway: Arc::new(StreamGateway::new(Arc::clone(&sessions))),
            sessions,
        }
    }

    pub fn with_defaults(identity: ServerIdentity) -> Result<Self, RegistryError> {
        Ok(Self::new(identity, CapabilityRegistry::with_defaults()?))
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::handlers::discovery))
        .route("/health", get(http::handlers::health))
        .route("/sse", get(http::handlers::sse_endpoint))
        .route(gateway::MESSAGE_PATH, post(http::handlers::message_endpoint))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
