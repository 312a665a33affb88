// ABOUTME: Askama template structs for admin page templates and views
// ABOUTME: Templates are compiled into binary at build time

use anyhow::{Context, Result};
use askama::Template;

use crate::admin::init_page::InitPageResult;
use crate::admin::url::format_admin_url;
use crate::admin::view::TemplateKind;
use crate::config::Config;

// =============================================================================
// Page templates
// =============================================================================

#[derive(Template)]
#[template(path = "layouts/minimal.html")]
pub struct MinimalTemplate {
    pub title: String,
    pub class_name: String,
    pub content: String,
}

/// Navigation link in the default template's sidebar
#[derive(Clone)]
pub struct NavItem {
    pub label: String,
    pub href: String,
}

#[derive(Template)]
#[template(path = "layouts/default.html")]
pub struct DefaultTemplate {
    pub title: String,
    pub class_name: String,
    pub admin_href: String,
    pub locale: String,
    pub user_email: Option<String>,
    pub account_href: String,
    pub logout_href: String,
    pub nav_collections: Vec<NavItem>,
    pub nav_globals: Vec<NavItem>,
    pub content: String,
}

/// Wrap `content` in the minimal template; `title` is used as-is
pub fn render_minimal_page(class_name: &str, title: String, content: String) -> Result<String> {
    MinimalTemplate {
        title,
        class_name: class_name.to_string(),
        content,
    }
    .render()
    .context("Failed to render minimal template")
}

/// Page title with the configured suffix
pub fn page_title(config: &Config, title: &str) -> String {
    format!("{} {}", title, config.admin.title_suffix)
        .trim()
        .to_string()
}

/// Wrap a rendered view in exactly one page template
pub fn wrap_in_template(
    config: &Config,
    kind: TemplateKind,
    class_name: &str,
    title: &str,
    content: String,
    init: &InitPageResult,
) -> Result<String> {
    let title = page_title(config, title);
    match kind {
        TemplateKind::None => Ok(content),
        TemplateKind::Minimal => render_minimal_page(class_name, title, content),
        TemplateKind::Default => {
            let admin_route = config.routes.admin.as_str();
            let nav_collections = init
                .visible_entities
                .collections
                .iter()
                .filter_map(|slug| config.collection(slug))
                .map(|c| NavItem {
                    label: c.plural_label(),
                    href: format_admin_url(admin_route, &format!("/collections/{}", c.slug)),
                })
                .collect();
            let nav_globals = init
                .visible_entities
                .globals
                .iter()
                .filter_map(|slug| config.global(slug))
                .map(|g| NavItem {
                    label: g.display_label(),
                    href: format_admin_url(admin_route, &format!("/globals/{}", g.slug)),
                })
                .collect();

            DefaultTemplate {
                title,
                class_name: class_name.to_string(),
                admin_href: format_admin_url(admin_route, ""),
                locale: init.locale.clone(),
                user_email: init.req.user_email().map(str::to_string),
                account_href: format_admin_url(admin_route, &config.admin.routes.account),
                logout_href: format_admin_url(admin_route, &config.admin.routes.logout),
                nav_collections,
                nav_globals,
                content,
            }
            .render()
            .context("Failed to render default template")
        }
    }
}

// =============================================================================
// Views
// =============================================================================

#[derive(Clone)]
pub struct DashboardCard {
    pub label: String,
    pub href: String,
    pub create_href: Option<String>,
}

#[derive(Template)]
#[template(path = "views/dashboard.html")]
pub struct DashboardView {
    pub collections: Vec<DashboardCard>,
    pub globals: Vec<DashboardCard>,
}

#[derive(Template)]
#[template(path = "views/account.html")]
pub struct AccountView {
    pub email: String,
    pub id: String,
    pub created_at: String,
    pub logout_href: String,
}

#[derive(Template)]
#[template(path = "views/create_first_user.html")]
pub struct CreateFirstUserView {
    pub action: String,
    pub error_message: Option<String>,
    pub prefill_email: String,
}

#[derive(Template)]
#[template(path = "views/login.html")]
pub struct LoginView {
    pub action: String,
    pub redirect: String,
    pub error_message: Option<String>,
    pub prefill_email: String,
    pub forgot_href: String,
    pub local_strategy_enabled: bool,
}

#[derive(Template)]
#[template(path = "views/logout.html")]
pub struct LogoutView {
    pub action: String,
    pub inactivity: bool,
    pub login_href: String,
}

#[derive(Template)]
#[template(path = "views/forgot_password.html")]
pub struct ForgotPasswordView {
    pub login_href: String,
}

#[derive(Template)]
#[template(path = "views/reset_password.html")]
pub struct ResetPasswordView {
    pub token: String,
    pub login_href: String,
}

#[derive(Template)]
#[template(path = "views/verify.html")]
pub struct VerifyView {
    pub collection: String,
    pub login_href: String,
}

#[derive(Template)]
#[template(path = "views/unauthorized.html")]
pub struct UnauthorizedView {
    pub admin_href: String,
    pub logout_href: String,
}

/// Row data for list view
#[derive(Clone)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub href: String,
    pub created_at: String,
}

#[derive(Template)]
#[template(path = "views/list.html")]
pub struct ListView {
    pub label: String,
    pub create_href: String,
    pub rows: Vec<ListRow>,
    pub total: usize,
}

/// A field row of the document view; `blocks_html` holds pre-rendered block components
#[derive(Clone)]
pub struct DocumentField {
    pub name: String,
    pub label: String,
    pub value: String,
    pub blocks_html: Vec<String>,
}

#[derive(Template)]
#[template(path = "views/document.html")]
pub struct DocumentView {
    pub heading: String,
    pub back_href: String,
    pub is_new: bool,
    pub tab: Option<String>,
    pub fields: Vec<DocumentField>,
}

#[derive(Template)]
#[template(path = "views/custom.html")]
pub struct CustomView {
    pub title: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "views/not_found.html")]
pub struct NotFoundView {
    pub admin_href: String,
}
