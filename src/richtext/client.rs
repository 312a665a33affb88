// ABOUTME: Client for the form-state endpoint used by rich-text block components
// ABOUTME: Posts the block's data or previous form state and returns the server's snapshot

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::form_state::{FieldSchemaMap, FormState, FormStateRequest};

#[async_trait]
pub trait FormStateClient: Send + Sync {
    /// POST `body` to `{server_url}{api_route}/form-state`
    async fn get_form_state(
        &self,
        api_route: &str,
        server_url: &str,
        body: &FormStateRequest,
    ) -> Result<FormState>;
}

#[derive(Clone)]
pub struct HttpFormStateClient {
    client: reqwest::Client,
    cookie: Option<String>,
}

impl HttpFormStateClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cookie: None,
        }
    }

    /// Forward a session cookie so the endpoint sees the signed-in user
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

impl Default for HttpFormStateClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoint URL for the form-state API
pub fn form_state_url(server_url: &str, api_route: &str) -> String {
    format!(
        "{}{}/form-state",
        server_url.trim_end_matches('/'),
        api_route.trim_end_matches('/')
    )
}

#[async_trait]
impl FormStateClient for HttpFormStateClient {
    async fn get_form_state(
        &self,
        api_route: &str,
        server_url: &str,
        body: &FormStateRequest,
    ) -> Result<FormState> {
        let url = form_state_url(server_url, api_route);
        let mut request = self.client.post(&url).json(body);
        if let Some(cookie) = &self.cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch form state: {}", response.status());
        }

        let state: FormState = response
            .json()
            .await
            .context("Failed to decode form state")?;
        Ok(state)
    }
}

/// Answers form-state requests in process, used when the admin renders blocks server-side
#[derive(Clone)]
pub struct LocalFormStateClient {
    schema_map: Arc<FieldSchemaMap>,
}

impl LocalFormStateClient {
    pub fn new(schema_map: Arc<FieldSchemaMap>) -> Self {
        Self { schema_map }
    }
}

#[async_trait]
impl FormStateClient for LocalFormStateClient {
    async fn get_form_state(
        &self,
        _api_route: &str,
        _server_url: &str,
        body: &FormStateRequest,
    ) -> Result<FormState> {
        self.schema_map
            .form_state_for(body)
            .with_context(|| format!("Unknown schema path: {}", body.schema_path))
    }
}
