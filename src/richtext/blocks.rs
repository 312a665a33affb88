// ABOUTME: Block component for one block node embedded in a rich-text field
// ABOUTME: Fetches server form state on mount and on every edit, rendering a form or a loading placeholder

use anyhow::{Context, Result};
use askama::Template;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;

use crate::config::FieldKind;
use crate::form_state::{
    display_value, FieldState, FormState, FormStateRequest, Operation, BLOCKS_SCHEMA_SEGMENT,
};
use crate::richtext::client::FormStateClient;
use crate::richtext::component_map::{ReducedBlock, RichTextComponentMap};

pub const BASE_CLASS: &str = "lexical-block";

/// Key of the synthetic block-name entry laid over every fetched form state
pub const BLOCK_NAME_FIELD: &str = "blockName";

/// Field values of one block node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFields {
    #[serde(default)]
    pub id: String,
    pub block_type: String,
    #[serde(default)]
    pub block_name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BlockFields {
    /// All values as one object, the shape the form-state endpoint expects as `data`
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = self.fields.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        data.insert("blockType".to_string(), Value::String(self.block_type.clone()));
        data.insert(
            BLOCK_NAME_FIELD.to_string(),
            Value::String(self.block_name.clone()),
        );
        data
    }
}

/// Where the block lives: owning document, API location and field paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockContext {
    pub document_id: Option<String>,
    pub api_route: String,
    pub server_url: String,
    /// Data path of the rich-text field
    pub path: String,
    /// Schema path of the rich-text field
    pub schema_path: String,
    pub read_only: bool,
    pub submitted: bool,
}

impl BlockContext {
    /// Changes to any of these re-run the initial fetch
    fn fetch_key(&self) -> (&Option<String>, &str, &str, &str) {
        (
            &self.document_id,
            &self.api_route,
            &self.server_url,
            &self.schema_path,
        )
    }
}

/// The synthetic block-name entry
pub fn block_name_field_state(block_name: &str) -> FieldState {
    FieldState {
        initial_value: Value::String(String::new()),
        passes_condition: true,
        valid: true,
        value: Value::String(block_name.to_string()),
        error_message: None,
    }
}

fn with_block_name(mut state: FormState, block_name: &str) -> FormState {
    state.insert(BLOCK_NAME_FIELD.to_string(), block_name_field_state(block_name));
    state
}

async fn fetch_initial_state(
    client: &dyn FormStateClient,
    api_route: &str,
    server_url: &str,
    request: &FormStateRequest,
    block_name: &str,
    state: &RwLock<Option<FormState>>,
) {
    match client.get_form_state(api_route, server_url, request).await {
        Ok(fetched) => {
            let next = with_block_name(fetched, block_name);
            *state.write().unwrap_or_else(PoisonError::into_inner) = Some(next);
        }
        Err(e) => {
            tracing::warn!(
                schema_path = %request.schema_path,
                error = %e,
                "Failed to fetch block form state"
            );
        }
    }
}

pub struct BlockComponent {
    form_data: BlockFields,
    node_key: Option<String>,
    context: BlockContext,
    component_map: Arc<RichTextComponentMap>,
    client: Arc<dyn FormStateClient>,
    state: Arc<RwLock<Option<FormState>>>,
}

impl BlockComponent {
    pub fn new(
        form_data: BlockFields,
        node_key: Option<String>,
        context: BlockContext,
        component_map: Arc<RichTextComponentMap>,
        client: Arc<dyn FormStateClient>,
    ) -> Self {
        Self {
            form_data,
            node_key,
            context,
            component_map,
            client,
            state: Arc::new(RwLock::new(None)),
        }
    }

    pub fn form_data(&self) -> &BlockFields {
        &self.form_data
    }

    pub fn context(&self) -> &BlockContext {
        &self.context
    }

    /// Schema path of this block type's fields
    pub fn schema_fields_path(&self) -> String {
        format!(
            "{}.{}.{}",
            self.context.schema_path, BLOCKS_SCHEMA_SEGMENT, self.form_data.block_type
        )
    }

    /// Data path of this block's fields
    pub fn field_path(&self) -> String {
        format!(
            "{}.lexical_internal_feature.blocks.{}",
            self.context.path, self.form_data.block_type
        )
    }

    pub fn reduced_block(&self) -> Option<&ReducedBlock> {
        self.component_map.reduced_block(&self.form_data.block_type)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<FormState>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Option<FormState>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest resolved form state, `None` while loading
    pub fn form_state(&self) -> Option<FormState> {
        self.read_state().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read_state().is_none()
    }

    fn initial_request(&self) -> FormStateRequest {
        FormStateRequest {
            id: self.context.document_id.clone(),
            data: Some(self.form_data.to_data()),
            form_state: None,
            operation: Operation::Update,
            schema_path: self.schema_fields_path(),
        }
    }

    /// Fetch the initial form state and wait for it
    pub async fn load_initial_state(&self) {
        let request = self.initial_request();
        fetch_initial_state(
            self.client.as_ref(),
            &self.context.api_route,
            &self.context.server_url,
            &request,
            &self.form_data.block_name,
            &self.state,
        )
        .await;
    }

    /// Start the initial fetch without waiting; a failed fetch leaves the block loading
    pub fn mount(&self) -> JoinHandle<()> {
        let request = self.initial_request();
        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        let api_route = self.context.api_route.clone();
        let server_url = self.context.server_url.clone();
        let block_name = self.form_data.block_name.clone();

        tokio::spawn(async move {
            fetch_initial_state(
                client.as_ref(),
                &api_route,
                &server_url,
                &request,
                &block_name,
                &state,
            )
            .await;
        })
    }

    /// Apply a new context; re-fetches only when the document, API location or schema path changed
    pub fn sync_context(&mut self, context: BlockContext) -> Option<JoinHandle<()>> {
        let changed = self.context.fetch_key() != context.fetch_key();
        self.context = context;
        if changed {
            tracing::debug!(schema_path = %self.schema_fields_path(), "Block context changed, refetching");
            Some(self.mount())
        } else {
            None
        }
    }

    /// Replace the block's field values without refetching
    pub fn set_form_data(&mut self, form_data: BlockFields) {
        self.form_data = form_data;
    }

    /// Re-validate an edited form state on the server.
    ///
    /// The block-name entry comes from this component's current form data
    /// (as last set by `set_form_data`), not from `prev_form_state`, so a
    /// block name typed into the form is overwritten by that value.
    pub async fn on_change(&self, prev_form_state: FormState) -> Result<FormState> {
        let request = FormStateRequest {
            id: self.context.document_id.clone(),
            data: None,
            form_state: Some(prev_form_state),
            operation: Operation::Update,
            schema_path: self.schema_fields_path(),
        };

        let fetched = self
            .client
            .get_form_state(&self.context.api_route, &self.context.server_url, &request)
            .await
            .context("Failed to refresh block form state")?;

        let next = with_block_name(fetched, &self.form_data.block_name);
        *self.write_state() = Some(next.clone());
        Ok(next)
    }

    /// Render the form once state has loaded, else the collapsed placeholder
    pub fn render(&self) -> Result<String> {
        let state = self.form_state();
        match (self.reduced_block(), state) {
            (Some(block), Some(state)) => self.render_form(block, &state),
            (block, _) => self.render_placeholder(block),
        }
    }

    fn pill_label(&self, block: Option<&ReducedBlock>) -> String {
        block
            .map(|b| b.display_label().to_string())
            .unwrap_or_else(|| self.form_data.block_type.clone())
    }

    fn render_placeholder(&self, block: Option<&ReducedBlock>) -> Result<String> {
        let custom_label = block
            .and_then(|b| b.label_component.as_deref())
            .map(|markup| {
                markup
                    .replace("{blockType}", &escape_html(&self.form_data.block_type))
                    .replace("{blockName}", &escape_html(&self.form_data.block_name))
            });

        BlockPlaceholderTemplate {
            base_class: BASE_CLASS,
            block_type: self.form_data.block_type.clone(),
            node_key: self.node_key.clone(),
            row_class: format!("{0}__row {0}__row--no-errors", BASE_CLASS),
            custom_label,
            pill_label: self.pill_label(block),
            block_name: self.form_data.block_name.clone(),
            read_only: self.context.read_only,
        }
        .render()
        .context("Failed to render block placeholder")
    }

    fn render_form(&self, block: &ReducedBlock, state: &FormState) -> Result<String> {
        let field_path = self.field_path();
        let fields = block
            .field_map
            .iter()
            .map(|field| {
                let field_state = state.get(&field.name);
                let value = field_state.map(|s| &s.value).unwrap_or(&Value::Null);
                RenderedField {
                    name: field.name.clone(),
                    path: format!("{}.{}", field_path, field.name),
                    label: field.display_label(),
                    kind: kind_class(field.kind),
                    control: control_for(field.kind),
                    value: display_value(value),
                    checked: value.as_bool().unwrap_or(false),
                    options: field
                        .options
                        .iter()
                        .map(|option| SelectOption {
                            value: option.clone(),
                            selected: value.as_str() == Some(option.as_str()),
                        })
                        .collect(),
                    valid: field_state.map_or(true, |s| s.valid),
                    error_message: field_state.and_then(|s| s.error_message.clone()),
                    hidden: field_state.is_some_and(|s| !s.passes_condition),
                }
            })
            .collect();

        let block_name = state
            .get(BLOCK_NAME_FIELD)
            .map(|s| display_value(&s.value))
            .unwrap_or_default();

        BlockFormTemplate {
            base_class: BASE_CLASS,
            block_type: self.form_data.block_type.clone(),
            node_key: self.node_key.clone(),
            uuid: uuid::Uuid::new_v4().to_string(),
            schema_path: self.schema_fields_path(),
            pill_label: self.pill_label(Some(block)),
            block_name,
            read_only: self.context.read_only,
            submitted: self.context.submitted,
            fields,
        }
        .render()
        .context("Failed to render block form")
    }
}

/// Collect block nodes (`{"type": "block", "fields": {...}}`) from a rich-text value
pub fn collect_block_nodes(value: &Value) -> Vec<BlockFields> {
    let mut found = Vec::new();
    collect_into(value, &mut found);
    found
}

fn collect_into(value: &Value, found: &mut Vec<BlockFields>) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("block") {
                if let Some(fields) = map.get("fields") {
                    match serde_json::from_value::<BlockFields>(fields.clone()) {
                        Ok(block) => found.push(block),
                        Err(e) => tracing::debug!(error = %e, "Skipping malformed block node"),
                    }
                }
            }
            for child in map.values() {
                collect_into(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_into(item, found);
            }
        }
        _ => {}
    }
}

fn kind_class(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Textarea => "textarea",
        FieldKind::Email => "email",
        FieldKind::Number => "number",
        FieldKind::Checkbox => "checkbox",
        FieldKind::Select => "select",
        FieldKind::RichText => "richText",
    }
}

fn control_for(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Textarea | FieldKind::RichText => "textarea",
        FieldKind::Checkbox => "checkbox",
        FieldKind::Select => "select",
        FieldKind::Email => "email",
        FieldKind::Number => "number",
        FieldKind::Text => "text",
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

pub struct RenderedField {
    pub name: String,
    pub path: String,
    pub label: String,
    pub kind: &'static str,
    pub control: &'static str,
    pub value: String,
    pub checked: bool,
    pub options: Vec<SelectOption>,
    pub valid: bool,
    pub error_message: Option<String>,
    pub hidden: bool,
}

#[derive(Template)]
#[template(path = "richtext/block_placeholder.html")]
struct BlockPlaceholderTemplate {
    base_class: &'static str,
    block_type: String,
    node_key: Option<String>,
    row_class: String,
    custom_label: Option<String>,
    pill_label: String,
    block_name: String,
    read_only: bool,
}

#[derive(Template)]
#[template(path = "richtext/block_form.html")]
struct BlockFormTemplate {
    base_class: &'static str,
    block_type: String,
    node_key: Option<String>,
    uuid: String,
    schema_path: String,
    pill_label: String,
    block_name: String,
    read_only: bool,
    submitted: bool,
    fields: Vec<RenderedField>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockConfig, FieldConfig, Labels};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses and records every request
    #[derive(Default)]
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<FormState>>>,
        requests: Mutex<Vec<(String, String, FormStateRequest)>>,
    }

    impl ScriptedClient {
        fn with(responses: Vec<Result<FormState>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(String, String, FormStateRequest)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FormStateClient for ScriptedClient {
        async fn get_form_state(
            &self,
            api_route: &str,
            server_url: &str,
            body: &FormStateRequest,
        ) -> Result<FormState> {
            self.requests.lock().unwrap().push((
                api_route.to_string(),
                server_url.to_string(),
                body.clone(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
        }
    }

    fn text_field(name: &str) -> FieldConfig {
        FieldConfig {
            name: name.to_string(),
            kind: FieldKind::Text,
            label: Some("Quote text".to_string()),
            required: true,
            default_value: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            options: Vec::new(),
            condition: None,
            blocks: Vec::new(),
        }
    }

    fn component_map(label_component: Option<&str>) -> Arc<RichTextComponentMap> {
        let field = FieldConfig {
            name: "content".to_string(),
            kind: FieldKind::RichText,
            blocks: vec![BlockConfig {
                slug: "quote".to_string(),
                labels: Labels {
                    singular: Some("Quote".to_string()),
                    plural: None,
                },
                label_component: label_component.map(str::to_string),
                fields: vec![text_field("text")],
            }],
            ..text_field("content")
        };
        Arc::new(RichTextComponentMap::for_field(&field))
    }

    fn form_data(block_type: &str) -> BlockFields {
        BlockFields {
            id: "blk-1".to_string(),
            block_type: block_type.to_string(),
            block_name: "Intro".to_string(),
            fields: json!({"text": "Hello"}).as_object().cloned().unwrap(),
        }
    }

    fn context() -> BlockContext {
        BlockContext {
            document_id: Some("doc-1".to_string()),
            api_route: "/api".to_string(),
            server_url: "http://localhost:3000".to_string(),
            path: "content".to_string(),
            schema_path: "posts.content".to_string(),
            read_only: false,
            submitted: false,
        }
    }

    fn server_state(value: &str) -> FormState {
        let mut state = FormState::new();
        state.insert(
            "text".to_string(),
            FieldState {
                initial_value: json!(value),
                passes_condition: true,
                valid: true,
                value: json!(value),
                error_message: None,
            },
        );
        state
    }

    fn component(client: Arc<ScriptedClient>, block_type: &str) -> BlockComponent {
        BlockComponent::new(
            form_data(block_type),
            Some("node-7".to_string()),
            context(),
            component_map(None),
            client,
        )
    }

    #[test]
    fn test_schema_fields_path() {
        let c = component(ScriptedClient::with(vec![]), "quote");
        assert_eq!(
            c.schema_fields_path(),
            "posts.content.lexical_internal_feature.blocks.lexical_blocks.lexical_blocks.quote"
        );
        assert_eq!(c.field_path(), "content.lexical_internal_feature.blocks.quote");
    }

    #[tokio::test]
    async fn test_initial_fetch_sends_data_and_overlays_block_name() {
        let client = ScriptedClient::with(vec![Ok(server_state("Hello"))]);
        let c = component(client.clone(), "quote");
        assert!(c.is_loading());

        c.load_initial_state().await;

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let (api_route, server_url, body) = &requests[0];
        assert_eq!(api_route, "/api");
        assert_eq!(server_url, "http://localhost:3000");
        assert_eq!(body.id.as_deref(), Some("doc-1"));
        assert_eq!(body.operation, Operation::Update);
        assert!(body.form_state.is_none());
        let data = body.data.as_ref().unwrap();
        assert_eq!(data["text"], json!("Hello"));
        assert_eq!(data["blockType"], json!("quote"));

        let state = c.form_state().unwrap();
        assert_eq!(state[BLOCK_NAME_FIELD], block_name_field_state("Intro"));
        assert_eq!(state[BLOCK_NAME_FIELD].initial_value, json!(""));
        assert!(state.contains_key("text"));
    }

    #[tokio::test]
    async fn test_mount_runs_in_background() {
        let client = ScriptedClient::with(vec![Ok(server_state("Hello"))]);
        let c = component(client, "quote");
        c.mount().await.unwrap();
        assert!(!c.is_loading());
    }

    #[tokio::test]
    async fn test_failed_fetch_stays_loading() {
        let client = ScriptedClient::with(vec![Err(anyhow::anyhow!("connection refused"))]);
        let c = component(client, "quote");
        c.load_initial_state().await;
        assert!(c.is_loading());
        let html = c.render().unwrap();
        assert!(html.contains("shimmer-effect"));
        assert!(!html.contains("<form"));
    }

    #[tokio::test]
    async fn test_on_change_sends_previous_state_and_keeps_mount_time_block_name() {
        let client = ScriptedClient::with(vec![
            Ok(server_state("Hello")),
            Ok(server_state("Edited")),
        ]);
        let c = component(client.clone(), "quote");
        c.load_initial_state().await;

        let mut edited = c.form_state().unwrap();
        edited.insert(BLOCK_NAME_FIELD.to_string(), block_name_field_state("Renamed"));
        edited.get_mut("text").unwrap().value = json!("Edited");

        let next = c.on_change(edited.clone()).await.unwrap();

        let (_, _, body) = &client.requests()[1];
        assert!(body.data.is_none());
        assert_eq!(body.form_state.as_ref(), Some(&edited));
        assert_eq!(next["text"].value, json!("Edited"));
        // the overlay ignores the name typed into the form
        assert_eq!(next[BLOCK_NAME_FIELD].value, json!("Intro"));
        assert_eq!(c.form_state(), Some(next));
    }

    #[tokio::test]
    async fn test_on_change_uses_latest_form_data_block_name() {
        let client = ScriptedClient::with(vec![Ok(server_state("a")), Ok(server_state("b"))]);
        let mut c = component(client, "quote");
        c.load_initial_state().await;

        let mut updated = form_data("quote");
        updated.block_name = "Outro".to_string();
        c.set_form_data(updated);

        let next = c.on_change(c.form_state().unwrap()).await.unwrap();
        assert_eq!(next[BLOCK_NAME_FIELD].value, json!("Outro"));
    }

    #[tokio::test]
    async fn test_on_change_failure_keeps_previous_state() {
        let client = ScriptedClient::with(vec![
            Ok(server_state("Hello")),
            Err(anyhow::anyhow!("timeout")),
        ]);
        let c = component(client, "quote");
        c.load_initial_state().await;
        let before = c.form_state();
        assert!(c.on_change(before.clone().unwrap()).await.is_err());
        assert_eq!(c.form_state(), before);
    }

    #[tokio::test]
    async fn test_sync_context_refetches_only_on_dependency_change() {
        let client = ScriptedClient::with(vec![
            Ok(server_state("a")),
            Ok(server_state("b")),
        ]);
        let mut c = component(client.clone(), "quote");
        c.load_initial_state().await;

        let mut same_deps = context();
        same_deps.read_only = true;
        same_deps.path = "body".to_string();
        assert!(c.sync_context(same_deps).is_none());
        assert_eq!(client.requests().len(), 1);

        let mut new_doc = context();
        new_doc.document_id = Some("doc-2".to_string());
        c.sync_context(new_doc).unwrap().await.unwrap();
        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].2.id.as_deref(), Some("doc-2"));
    }

    #[tokio::test]
    async fn test_renders_form_after_load() {
        let client = ScriptedClient::with(vec![Ok(server_state("Hello"))]);
        let c = component(client, "quote");
        c.load_initial_state().await;

        let html = c.render().unwrap();
        assert!(html.contains("<form"));
        assert!(html.contains("lexical-block lexical-block-quote"));
        assert!(html.contains("content.lexical_internal_feature.blocks.quote.text"));
        assert!(html.contains("Quote text"));
        assert!(html.contains("value=\"Intro\""));
        assert!(html.contains("data-node-key=\"node-7\""));
        assert!(!html.contains("shimmer-effect"));
    }

    #[test]
    fn test_placeholder_uses_pill_label_while_loading() {
        let c = component(ScriptedClient::with(vec![]), "quote");
        let html = c.render().unwrap();
        assert!(html.contains("lexical-block__block-pill-quote"));
        assert!(html.contains(">Quote<"));
        assert!(html.contains("lexical-block__row lexical-block__row--no-errors"));
        assert!(html.contains("height: 35vh"));
    }

    #[test]
    fn test_placeholder_custom_label_escapes_values() {
        let mut data = form_data("quote");
        data.block_name = "<b>x</b>".to_string();
        let c = BlockComponent::new(
            data,
            None,
            context(),
            component_map(Some("<strong class=\"label\">{blockName}</strong>")),
            ScriptedClient::with(vec![]),
        );
        let html = c.render().unwrap();
        assert!(html.contains("<strong class=\"label\">&lt;b&gt;x&lt;/b&gt;</strong>"));
        assert!(!html.contains("lexical-block__block-pill"));
    }

    #[tokio::test]
    async fn test_unknown_block_type_stays_placeholder() {
        let client = ScriptedClient::with(vec![Ok(server_state("Hello"))]);
        let c = component(client, "gallery");
        c.load_initial_state().await;
        assert!(!c.is_loading());
        let html = c.render().unwrap();
        assert!(html.contains("shimmer-effect"));
        assert!(html.contains(">gallery<"));
    }

    #[test]
    fn test_collect_block_nodes() {
        let rich_text = json!({
            "root": {
                "type": "root",
                "children": [
                    {"type": "paragraph", "children": [{"type": "text", "text": "hi"}]},
                    {"type": "block", "fields": {"id": "b1", "blockType": "quote", "blockName": "", "text": "x"}},
                    {"type": "block", "fields": {"id": "b2"}}
                ]
            }
        });
        let blocks = collect_block_nodes(&rich_text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, "quote");
        assert_eq!(blocks[0].fields["text"], json!("x"));
    }
}
