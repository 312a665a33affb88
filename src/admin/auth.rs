// ABOUTME: Local email/password strategy for the admin: first-user creation, login and logout
// ABOUTME: Passwords are Argon2id hashes stored on the user document; sessions hold the user id

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tower_sessions::Session;

use super::routes::{AdminError, AdminState};
use super::templates::{page_title, render_minimal_page, CreateFirstUserView, LoginView};
use super::url::{format_admin_url, is_safe_redirect};
use crate::config::Config;
use crate::form_state::is_valid_email;

/// Session key holding the signed-in user's document id
pub const SESSION_USER_KEY: &str = "user_id";

/// User document field holding the Argon2 hash
pub const PASSWORD_HASH_FIELD: &str = "password_hash";

const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Password hashing utilities
// =============================================================================

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Check the create-first-user form, returning the message to show on failure
pub fn validate_new_user(email: &str, password: &str, confirm: &str) -> Result<(), String> {
    if !is_valid_email(email) {
        return Err("Please enter a valid email address.".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

/// The user id stored in the session, if any
pub async fn session_user_id(session: &Session) -> Option<String> {
    match session.get::<String>(SESSION_USER_KEY).await {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session data");
            None
        }
    }
}

fn admin_root(config: &Config) -> String {
    format_admin_url(&config.routes.admin, "")
}

// =============================================================================
// Create first user
// =============================================================================

#[derive(Deserialize)]
pub struct CreateFirstUserForm {
    email: String,
    password: String,
    confirm_password: String,
}

fn create_first_user_page(
    config: &Config,
    error_message: &str,
    prefill_email: &str,
) -> Result<Response, AdminError> {
    let content = CreateFirstUserView {
        action: format_admin_url(&config.routes.admin, &config.admin.routes.create_first_user),
        error_message: Some(error_message.to_string()),
        prefill_email: prefill_email.to_string(),
    }
    .render()?;
    let html = render_minimal_page(
        "create-first-user",
        page_title(config, "Create First User"),
        content,
    )?;
    Ok(Html(html).into_response())
}

pub async fn create_first_user_submit(
    State(state): State<AdminState>,
    session: Session,
    Form(form): Form<CreateFirstUserForm>,
) -> Result<Response, AdminError> {
    let config = state.config.as_ref();
    let user_slug = config.admin.user.as_str();

    if config.disable_local_strategy() || state.db.find_one(user_slug).await?.is_some() {
        return Ok(Redirect::to(&admin_root(config)).into_response());
    }

    let email = form.email.trim();
    if let Err(message) = validate_new_user(email, &form.password, &form.confirm_password) {
        return create_first_user_page(config, &message, email);
    }

    let mut data = Map::new();
    data.insert("email".to_string(), Value::String(email.to_string()));
    data.insert(
        PASSWORD_HASH_FIELD.to_string(),
        Value::String(hash_password(&form.password)?),
    );
    let user = state.db.create(user_slug, data).await?;

    if let Err(e) = session.insert(SESSION_USER_KEY, user.id.clone()).await {
        tracing::error!(error = %e, "Failed to set session data");
        return create_first_user_page(config, "Session error. Try again.", email);
    }

    tracing::info!(user_id = %user.id, email = %email, "First user created");
    Ok(Redirect::to(&admin_root(config)).into_response())
}

// =============================================================================
// Login / logout
// =============================================================================

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    #[serde(default)]
    redirect: String,
}

fn login_page(
    config: &Config,
    error_message: &str,
    form: &LoginForm,
) -> Result<Response, AdminError> {
    let admin_route = config.routes.admin.as_str();
    let content = LoginView {
        action: format_admin_url(admin_route, &config.admin.routes.login),
        redirect: form.redirect.clone(),
        error_message: Some(error_message.to_string()),
        prefill_email: form.email.trim().to_string(),
        forgot_href: format_admin_url(admin_route, &config.admin.routes.forgot),
        local_strategy_enabled: !config.disable_local_strategy(),
    }
    .render()?;
    let html = render_minimal_page("login", page_title(config, "Login"), content)?;
    Ok(Html(html).into_response())
}

pub async fn login_submit(
    State(state): State<AdminState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AdminError> {
    let config = state.config.as_ref();
    if config.disable_local_strategy() {
        return login_page(config, "Email and password login is disabled.", &form);
    }

    let email = form.email.trim();
    let user = state
        .db
        .find_by_field(&config.admin.user, "email", email)
        .await?;

    let Some(user) = user.filter(|u| {
        u.get_str(PASSWORD_HASH_FIELD)
            .is_some_and(|hash| verify_password(&form.password, hash))
    }) else {
        tracing::warn!(email = %email, "Admin login failed");
        return login_page(config, "Invalid email or password", &form);
    };

    if let Err(e) = session.insert(SESSION_USER_KEY, user.id.clone()).await {
        tracing::error!(error = %e, "Failed to set session data");
        return login_page(config, "Session error. Try again.", &form);
    }

    tracing::info!(user_id = %user.id, "User logged in");
    let target = if is_safe_redirect(&form.redirect) {
        form.redirect.clone()
    } else {
        admin_root(config)
    };
    Ok(Redirect::to(&target).into_response())
}

pub async fn logout_submit(
    State(state): State<AdminState>,
    session: Session,
) -> Result<Response, AdminError> {
    if let Some(user_id) = session_user_id(&session).await {
        tracing::info!(user_id = %user_id, "User logged out");
    }
    session.flush().await?;
    let config = state.config.as_ref();
    Ok(Redirect::to(&format_admin_url(
        &config.routes.admin,
        &config.admin.routes.login,
    ))
    .into_response())
}

// =============================================================================
// Tests
// =============================================================================
