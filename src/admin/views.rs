// ABOUTME: Renders each resolved admin view to its HTML body and page title
// ABOUTME: Document views render rich-text blocks through the block component

use anyhow::{Context, Result};
use askama::Template;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::admin::init_page::InitPageResult;
use crate::admin::routes::AdminState;
use crate::admin::templates::{
    page_title, render_minimal_page, AccountView, CreateFirstUserView, CustomView, DashboardCard,
    DashboardView, DocumentField, DocumentView, ForgotPasswordView, ListRow, ListView, LoginView,
    LogoutView, NotFoundView, ResetPasswordView, UnauthorizedView, VerifyView,
};
use crate::admin::url::{format_admin_url, is_safe_redirect};
use crate::admin::view::AdminView;
use crate::config::{Config, FieldConfig, FieldKind};
use crate::db::Document;
use crate::form_state::display_value;
use crate::richtext::{collect_block_nodes, BlockComponent, BlockContext, RichTextComponentMap};

/// Rows shown on a collection list page
const LIST_LIMIT: usize = 100;

/// Id segment that opens an empty document
const CREATE_SEGMENT: &str = "create";

/// A rendered view body, before it is wrapped in a page template
pub struct RenderedView {
    pub title: String,
    pub html: String,
}

impl RenderedView {
    fn new(title: impl Into<String>, template: impl Template) -> Result<Self> {
        Ok(Self {
            title: title.into(),
            html: template.render().context("Failed to render view")?,
        })
    }
}

/// Collection that stores the single document of a global
pub fn global_storage_collection(slug: &str) -> String {
    format!("_global_{}", slug)
}

/// Render `view`; `None` when the document it points at does not exist
pub async fn render_view(
    state: &AdminState,
    view: &AdminView,
    init: &InitPageResult,
) -> Result<Option<RenderedView>> {
    let config = state.config.as_ref();
    let admin_route = config.routes.admin.as_str();
    let routes = &config.admin.routes;
    let login_href = format_admin_url(admin_route, &routes.login);

    let rendered = match view {
        AdminView::Dashboard => RenderedView::new("Dashboard", dashboard(config, init))?,
        AdminView::Account => {
            let Some(user) = init.req.user.as_ref() else {
                return Ok(None);
            };
            RenderedView::new(
                "Account",
                AccountView {
                    email: user.get_str("email").unwrap_or_default().to_string(),
                    id: user.id.clone(),
                    created_at: user.created_at.clone(),
                    logout_href: format_admin_url(admin_route, &routes.logout),
                },
            )?
        }
        AdminView::CreateFirstUser => RenderedView::new(
            "Create First User",
            CreateFirstUserView {
                action: format_admin_url(admin_route, &routes.create_first_user),
                error_message: None,
                prefill_email: String::new(),
            },
        )?,
        AdminView::Login => RenderedView::new(
            "Login",
            LoginView {
                action: login_href.clone(),
                redirect: init
                    .req
                    .search_params
                    .get("redirect")
                    .filter(|target| is_safe_redirect(target))
                    .cloned()
                    .unwrap_or_default(),
                error_message: None,
                prefill_email: String::new(),
                forgot_href: format_admin_url(admin_route, &routes.forgot),
                local_strategy_enabled: !config.disable_local_strategy(),
            },
        )?,
        AdminView::Logout | AdminView::LogoutInactivity => RenderedView::new(
            "Logout",
            LogoutView {
                action: format_admin_url(admin_route, &routes.logout),
                inactivity: *view == AdminView::LogoutInactivity,
                login_href,
            },
        )?,
        AdminView::ForgotPassword => {
            RenderedView::new("Forgot Password", ForgotPasswordView { login_href })?
        }
        AdminView::ResetPassword { token } => RenderedView::new(
            "Reset Password",
            ResetPasswordView {
                token: token.clone(),
                login_href,
            },
        )?,
        AdminView::Verify { collection, .. } => RenderedView::new(
            "Verify",
            VerifyView {
                collection: collection.clone(),
                login_href,
            },
        )?,
        AdminView::Unauthorized => RenderedView::new(
            "Unauthorized",
            UnauthorizedView {
                admin_href: format_admin_url(admin_route, ""),
                logout_href: format_admin_url(admin_route, &routes.logout),
            },
        )?,
        AdminView::List { collection } => {
            let Some(collection) = config.collection(collection) else {
                return Ok(None);
            };
            let documents = state.db.find(&collection.slug, LIST_LIMIT).await?;
            let total = state.db.count(&collection.slug).await?;
            let rows = documents
                .iter()
                .map(|doc| ListRow {
                    id: doc.id.clone(),
                    title: document_title(&collection.fields, doc),
                    href: format_admin_url(
                        admin_route,
                        &format!("/collections/{}/{}", collection.slug, doc.id),
                    ),
                    created_at: doc.created_at.clone(),
                })
                .collect();
            RenderedView::new(
                collection.plural_label(),
                ListView {
                    label: collection.plural_label(),
                    create_href: format_admin_url(
                        admin_route,
                        &format!("/collections/{}/{}", collection.slug, CREATE_SEGMENT),
                    ),
                    rows,
                    total,
                },
            )?
        }
        AdminView::CollectionDocument {
            collection,
            id,
            tab,
        } => {
            let Some(collection) = config.collection(collection) else {
                return Ok(None);
            };
            let is_new = id == CREATE_SEGMENT;
            let (document_id, data) = if is_new {
                (None, Map::new())
            } else {
                match state.db.find_by_id(&collection.slug, id).await? {
                    Some(doc) => (Some(doc.id), doc.data),
                    None => return Ok(None),
                }
            };
            let can_update = init
                .permissions
                .collections
                .get(&collection.slug)
                .is_some_and(|p| if is_new { p.create } else { p.update });
            let fields = document_fields(
                state,
                &collection.slug,
                &collection.fields,
                &data,
                document_id,
                !can_update,
            )
            .await?;
            let heading = if is_new {
                format!("Create {}", collection.singular_label())
            } else {
                collection.singular_label()
            };
            RenderedView::new(
                heading.clone(),
                DocumentView {
                    heading,
                    back_href: format_admin_url(
                        admin_route,
                        &format!("/collections/{}", collection.slug),
                    ),
                    is_new,
                    tab: tab.clone(),
                    fields,
                },
            )?
        }
        AdminView::GlobalDocument { global } => {
            let Some(global) = config.global(global) else {
                return Ok(None);
            };
            let stored = state
                .db
                .find_one(&global_storage_collection(&global.slug))
                .await?;
            let (document_id, data) = match stored {
                Some(doc) => (Some(doc.id), doc.data),
                None => (None, Map::new()),
            };
            let can_update = init
                .permissions
                .globals
                .get(&global.slug)
                .is_some_and(|p| p.update);
            let fields =
                document_fields(state, &global.slug, &global.fields, &data, document_id, !can_update)
                    .await?;
            RenderedView::new(
                global.display_label(),
                DocumentView {
                    heading: global.display_label(),
                    back_href: format_admin_url(admin_route, ""),
                    is_new: false,
                    tab: None,
                    fields,
                },
            )?
        }
        AdminView::Custom { key, .. } => {
            let Some(custom) = config.admin.views.get(key) else {
                return Ok(None);
            };
            RenderedView::new(
                custom.title.clone(),
                CustomView {
                    title: custom.title.clone(),
                    body: custom.body.clone(),
                },
            )?
        }
    };

    Ok(Some(rendered))
}

/// The 404 page, always in the minimal template
pub fn render_not_found(config: &Config) -> Result<String> {
    let content = NotFoundView {
        admin_href: format_admin_url(&config.routes.admin, ""),
    }
    .render()
    .context("Failed to render not-found view")?;

    render_minimal_page("not-found", page_title(config, "Not Found"), content)
}

fn dashboard(config: &Config, init: &InitPageResult) -> DashboardView {
    let admin_route = config.routes.admin.as_str();
    let collections = init
        .visible_entities
        .collections
        .iter()
        .filter_map(|slug| config.collection(slug))
        .map(|c| {
            let can_create = init
                .permissions
                .collections
                .get(&c.slug)
                .is_some_and(|p| p.create);
            DashboardCard {
                label: c.plural_label(),
                href: format_admin_url(admin_route, &format!("/collections/{}", c.slug)),
                create_href: can_create.then(|| {
                    format_admin_url(
                        admin_route,
                        &format!("/collections/{}/{}", c.slug, CREATE_SEGMENT),
                    )
                }),
            }
        })
        .collect();
    let globals = init
        .visible_entities
        .globals
        .iter()
        .filter_map(|slug| config.global(slug))
        .map(|g| DashboardCard {
            label: g.display_label(),
            href: format_admin_url(admin_route, &format!("/globals/{}", g.slug)),
            create_href: None,
        })
        .collect();
    DashboardView {
        collections,
        globals,
    }
}

/// First non-empty text-like field value, else the document id
fn document_title(fields: &[FieldConfig], doc: &Document) -> String {
    fields
        .iter()
        .filter(|f| matches!(f.kind, FieldKind::Text | FieldKind::Email))
        .find_map(|f| doc.get_str(&f.name).filter(|v| !v.trim().is_empty()))
        .or_else(|| doc.get_str("email"))
        .map(str::to_string)
        .unwrap_or_else(|| doc.id.clone())
}

async fn document_fields(
    state: &AdminState,
    schema_prefix: &str,
    fields: &[FieldConfig],
    data: &Map<String, Value>,
    document_id: Option<String>,
    read_only: bool,
) -> Result<Vec<DocumentField>> {
    let mut rendered = Vec::with_capacity(fields.len());
    for field in fields {
        let value = data.get(&field.name);
        let mut blocks_html = Vec::new();

        if field.kind == FieldKind::RichText && !field.blocks.is_empty() {
            let component_map = Arc::new(RichTextComponentMap::for_field(field));
            let context = BlockContext {
                document_id: document_id.clone(),
                api_route: state.config.routes.api.clone(),
                server_url: state.config.server_url.clone(),
                path: field.name.clone(),
                schema_path: format!("{}.{}", schema_prefix, field.name),
                read_only,
                submitted: false,
            };
            for block in value.map(collect_block_nodes).unwrap_or_default() {
                let component = BlockComponent::new(
                    block,
                    None,
                    context.clone(),
                    Arc::clone(&component_map),
                    Arc::clone(&state.form_state_client),
                );
                component.load_initial_state().await;
                blocks_html.push(component.render()?);
            }
        }

        rendered.push(DocumentField {
            name: field.name.clone(),
            label: field.display_label(),
            value: if blocks_html.is_empty() {
                value.map(display_value).unwrap_or_default()
            } else {
                String::new()
            },
            blocks_html,
        });
    }
    Ok(rendered)
}
