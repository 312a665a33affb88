// ABOUTME: Admin panel router and shared state
// ABOUTME: Every GET under the admin route goes to the root page; auth forms post to their own routes

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::admin::auth::{create_first_user_submit, login_submit, logout_submit};
use crate::admin::root::root_page;
use crate::config::Config;
use crate::db::Database;
use crate::form_state::FieldSchemaMap;
use crate::richtext::FormStateClient;

#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<Config>,
    pub db: Arc<dyn Database>,
    pub schema_map: Arc<FieldSchemaMap>,
    /// Used by block components while rendering document views
    pub form_state_client: Arc<dyn FormStateClient>,
}

/// Build the admin router, mounted at the configured admin route
pub fn admin_router(config: &Config) -> Router<AdminState> {
    let routes = &config.admin.routes;
    Router::new()
        .route("/", get(root_page))
        .route("/{*segments}", get(root_page))
        .route(
            &routes.create_first_user,
            get(root_page).post(create_first_user_submit),
        )
        .route(&routes.login, get(root_page).post(login_submit))
        .route(&routes.logout, get(root_page).post(logout_submit))
}

/// Internal failure inside an admin handler, reported as a 500 page
pub struct AdminError(anyhow::Error);

impl<E> From<E> for AdminError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        tracing::error!(error = %format!("{:#}", self.0), "Admin request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>Internal Server Error</h1><p>Check the server logs.</p>"),
        )
            .into_response()
    }
}
