// ABOUTME: JSON API used by the admin UI, mounted at the configured API route
// ABOUTME: POST /form-state recomputes a form state for a schema path

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tower_sessions::Session;

use crate::admin::auth::session_user_id;
use crate::admin::{AdminError, AdminState};
use crate::form_state::FormStateRequest;

pub fn api_router() -> Router<AdminState> {
    Router::new().route("/form-state", post(form_state_handler))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "errors": [{ "message": message }] }))).into_response()
}

async fn form_state_handler(
    State(state): State<AdminState>,
    session: Session,
    Json(request): Json<FormStateRequest>,
) -> Result<Response, AdminError> {
    let signed_in = match session_user_id(&session).await {
        Some(user_id) => state
            .db
            .find_by_id(&state.config.admin.user, &user_id)
            .await?
            .is_some(),
        None => false,
    };
    if !signed_in {
        return Ok(error_response(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    match state.schema_map.form_state_for(&request) {
        Some(form_state) => {
            tracing::debug!(
                schema_path = %request.schema_path,
                fields = form_state.len(),
                "Form state computed"
            );
            Ok(Json(form_state).into_response())
        }
        None => {
            tracing::warn!(schema_path = %request.schema_path, "Form state requested for unknown schema path");
            Ok(error_response(
                StatusCode::BAD_REQUEST,
                &format!("Unknown schema path: {}", request.schema_path),
            ))
        }
    }
}
