// ABOUTME: Per-request page initialization: session user, locale, permissions, visible entities
// ABOUTME: Signals a login redirect for protected views when nobody is signed in

use anyhow::Result;
use std::collections::BTreeMap;

use crate::admin::url::{
    encode_component, encode_path, encode_query, format_admin_url, SearchParams,
};
use crate::admin::view::InitPageOptions;
use crate::config::Config;
use crate::db::{Database, Document};

/// The request as seen by views and templates
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub user: Option<Document>,
    pub locale: String,
    pub route: String,
    pub search_params: SearchParams,
}

impl PageRequest {
    pub fn user_email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.get_str("email"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionPermissions {
    pub read: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalPermissions {
    pub read: bool,
    pub update: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    pub can_access_admin: bool,
    pub collections: BTreeMap<String, CollectionPermissions>,
    pub globals: BTreeMap<String, GlobalPermissions>,
}

impl Permissions {
    /// Signed-in users get full access; anonymous visitors get none
    pub fn for_user(config: &Config, user: Option<&Document>) -> Self {
        let allowed = user.is_some();
        Self {
            can_access_admin: allowed,
            collections: config
                .collections
                .iter()
                .map(|c| {
                    (
                        c.slug.clone(),
                        CollectionPermissions {
                            read: allowed,
                            create: allowed,
                            update: allowed,
                            delete: allowed,
                        },
                    )
                })
                .collect(),
            globals: config
                .globals
                .iter()
                .map(|g| {
                    (
                        g.slug.clone(),
                        GlobalPermissions {
                            read: allowed,
                            update: allowed,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Collection and global slugs shown in the navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleEntities {
    pub collections: Vec<String>,
    pub globals: Vec<String>,
}

impl VisibleEntities {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collections: config
                .collections
                .iter()
                .filter(|c| !c.hidden)
                .map(|c| c.slug.clone())
                .collect(),
            globals: config
                .globals
                .iter()
                .filter(|g| !g.hidden)
                .map(|g| g.slug.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitPageResult {
    pub req: PageRequest,
    pub locale: String,
    pub permissions: Permissions,
    pub visible_entities: VisibleEntities,
    pub redirect_to: Option<String>,
}

/// Pick `?locale=` when it names a configured locale, else the default
pub fn resolve_locale(config: &Config, search_params: &SearchParams) -> String {
    search_params
        .get("locale")
        .filter(|locale| config.localization.locales.contains(locale))
        .cloned()
        .unwrap_or_else(|| config.localization.default_locale.clone())
}

/// Build the page context for one request
pub async fn init_page(
    config: &Config,
    db: &dyn Database,
    options: &InitPageOptions,
    session_user_id: Option<&str>,
) -> Result<InitPageResult> {
    let user = match session_user_id {
        Some(id) => {
            let user = db.find_by_id(&config.admin.user, id).await?;
            if user.is_none() {
                tracing::debug!(user_id = %id, "Session refers to a missing user");
            }
            user
        }
        None => None,
    };

    let locale = resolve_locale(config, &options.search_params);
    let admin_route = config.routes.admin.as_str();

    let redirect_to = if options.redirect_unauthenticated_user && user.is_none() {
        let mut target = encode_path(&options.route);
        if !options.search_params.is_empty() {
            target.push('?');
            target.push_str(&encode_query(&options.search_params));
        }
        Some(format!(
            "{}?redirect={}",
            format_admin_url(admin_route, &config.admin.routes.login),
            encode_component(&target)
        ))
    } else if user.is_some()
        && options.route == format_admin_url(admin_route, &config.admin.routes.login)
    {
        Some(format_admin_url(admin_route, ""))
    } else {
        None
    };

    let permissions = Permissions::for_user(config, user.as_ref());

    Ok(InitPageResult {
        req: PageRequest {
            user,
            locale: locale.clone(),
            route: options.route.clone(),
            search_params: options.search_params.clone(),
        },
        locale,
        permissions,
        visible_entities: VisibleEntities::from_config(config),
        redirect_to,
    })
}
