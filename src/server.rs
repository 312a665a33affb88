// ABOUTME: HTTP server assembly: admin pages, the JSON API, sessions and request tracing
// ABOUTME: Builds the shared state from config and database and serves it with axum

use anyhow::{Context, Result};
use axum::{response::Redirect, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::admin::{admin_router, AdminState};
use crate::api::api_router;
use crate::config::Config;
use crate::db::Database;
use crate::form_state::FieldSchemaMap;
use crate::richtext::LocalFormStateClient;

impl AdminState {
    /// State for a config and database; blocks are resolved in process while rendering
    pub fn new(config: Arc<Config>, db: Arc<dyn Database>) -> Self {
        let schema_map = Arc::new(FieldSchemaMap::from_config(&config));
        tracing::debug!(schema_paths = schema_map.len(), "Field schema map built");
        Self {
            form_state_client: Arc::new(LocalFormStateClient::new(Arc::clone(&schema_map))),
            config,
            db,
            schema_map,
        }
    }
}

/// Assemble the full application router
pub fn build_router(state: AdminState) -> Router {
    let config = Arc::clone(&state.config);
    let admin_route = config.routes.admin.clone();

    let admin_routes = admin_router(&config).with_state(state.clone());
    let api_routes = api_router().with_state(state);

    let app = Router::new().nest(&config.routes.api, api_routes);
    let app = if admin_route == "/" {
        app.merge(admin_routes)
    } else {
        app.route(
            "/",
            get(move || {
                let target = admin_route.clone();
                async move { Redirect::permanent(&target) }
            }),
        )
        .nest(&config.routes.admin, admin_routes)
    };

    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    )
}

/// Bind and serve until the process is stopped
pub async fn serve(config: Arc<Config>, db: Arc<dyn Database>) -> Result<()> {
    let addr = config.bind_address();
    let app = build_router(AdminState::new(config, db));

    tracing::info!(addr = %addr, "Starting admin server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
