// ABOUTME: Maps an admin URL to the view to render, its template and page-init options
// ABOUTME: Custom views from the config are matched before the built-in views

use crate::admin::url::{format_admin_url, match_route, SearchParams};
use crate::config::{Config, ViewTemplate};
use std::collections::BTreeMap;

/// Which page template wraps the rendered view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// The view is rendered bare
    None,
    Minimal,
    Default,
}

impl From<ViewTemplate> for TemplateKind {
    fn from(template: ViewTemplate) -> Self {
        match template {
            ViewTemplate::None => Self::None,
            ViewTemplate::Minimal => Self::Minimal,
            ViewTemplate::Default => Self::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminView {
    Dashboard,
    Account,
    CreateFirstUser,
    ForgotPassword,
    Login,
    Logout,
    LogoutInactivity,
    Unauthorized,
    ResetPassword {
        token: String,
    },
    Verify {
        collection: String,
        token: String,
    },
    List {
        collection: String,
    },
    /// `id` is `create` for a new document; `tab` is any trailing segment (`api`, `versions`, ...)
    CollectionDocument {
        collection: String,
        id: String,
        tab: Option<String>,
    },
    GlobalDocument {
        global: String,
    },
    Custom {
        key: String,
        params: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPageOptions {
    pub route: String,
    pub search_params: SearchParams,
    pub redirect_unauthenticated_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub view: Option<AdminView>,
    pub template_type: TemplateKind,
    pub template_class_name: String,
    pub init_page_options: InitPageOptions,
}

impl ViewDescriptor {
    fn set(&mut self, view: AdminView, template: TemplateKind, class_name: impl Into<String>) {
        self.view = Some(view);
        self.template_type = template;
        self.template_class_name = class_name.into();
    }
}

/// Resolve the view for `segments` (the path below the admin route)
pub fn get_view_from_config(
    config: &Config,
    current_route: &str,
    segments: &[String],
    search_params: &SearchParams,
) -> ViewDescriptor {
    let admin_route = config.routes.admin.as_str();
    let mut descriptor = ViewDescriptor {
        view: None,
        template_type: TemplateKind::None,
        template_class_name: String::new(),
        init_page_options: InitPageOptions {
            route: current_route.to_string(),
            search_params: search_params.clone(),
            redirect_unauthenticated_user: false,
        },
    };

    for (key, custom) in &config.admin.views {
        let pattern = format_admin_url(admin_route, &custom.path);
        if let Some(params) = match_route(&pattern, current_route, custom.exact) {
            descriptor.set(
                AdminView::Custom {
                    key: key.clone(),
                    params,
                },
                custom.template.into(),
                key.clone(),
            );
            descriptor.init_page_options.redirect_unauthenticated_user = custom.requires_auth;
            return descriptor;
        }
    }

    let segment = |i: usize| segments.get(i).map(String::as_str);
    let is_collection = segment(0) == Some("collections")
        && segment(1).is_some_and(|slug| config.collection(slug).is_some());
    let is_global = segment(0) == Some("globals")
        && segment(1).is_some_and(|slug| config.global(slug).is_some());

    match segments.len() {
        0 => {
            if current_route == format_admin_url(admin_route, "") {
                descriptor.set(AdminView::Dashboard, TemplateKind::Default, "dashboard");
                descriptor.init_page_options.redirect_unauthenticated_user = true;
            }
        }
        1 => {
            let matched = config
                .admin
                .routes
                .entries()
                .into_iter()
                .find(|(_, route)| format_admin_url(admin_route, route) == current_route)
                .map(|(key, _)| key);

            let resolved = match matched {
                Some("account") => Some((AdminView::Account, "account")),
                Some("createFirstUser") => Some((AdminView::CreateFirstUser, "create-first-user")),
                Some("forgot") => Some((AdminView::ForgotPassword, "forgot-password")),
                Some("inactivity") => Some((AdminView::LogoutInactivity, "logout")),
                Some("login") => Some((AdminView::Login, "login")),
                Some("logout") => Some((AdminView::Logout, "logout")),
                Some("unauthorized") => Some((AdminView::Unauthorized, "unauthorized")),
                _ => None,
            };

            if let Some((view, class_name)) = resolved {
                if view == AdminView::Account {
                    descriptor.set(view, TemplateKind::Default, class_name);
                    descriptor.init_page_options.redirect_unauthenticated_user = true;
                } else {
                    descriptor.set(view, TemplateKind::Minimal, class_name);
                }
            }
        }
        2 => {
            let reset_segment = config.admin.routes.reset.trim_start_matches('/');
            if segment(0) == Some(reset_segment) {
                descriptor.set(
                    AdminView::ResetPassword {
                        token: segments[1].clone(),
                    },
                    TemplateKind::Minimal,
                    "reset-password",
                );
            } else if is_collection {
                let slug = segments[1].clone();
                let class_name = format!("{}-list", slug);
                descriptor.set(
                    AdminView::List { collection: slug },
                    TemplateKind::Default,
                    class_name,
                );
                descriptor.init_page_options.redirect_unauthenticated_user = true;
            } else if is_global {
                descriptor.set(
                    AdminView::GlobalDocument {
                        global: segments[1].clone(),
                    },
                    TemplateKind::Default,
                    "global-edit",
                );
                descriptor.init_page_options.redirect_unauthenticated_user = true;
            }
        }
        _ => {
            if segment(1) == Some("verify") {
                descriptor.set(
                    AdminView::Verify {
                        collection: segments[0].clone(),
                        token: segments[2].clone(),
                    },
                    TemplateKind::Minimal,
                    "verify",
                );
            } else if is_collection {
                descriptor.set(
                    AdminView::CollectionDocument {
                        collection: segments[1].clone(),
                        id: segments[2].clone(),
                        tab: segments.get(3).cloned(),
                    },
                    TemplateKind::Default,
                    "collection-default-edit",
                );
                descriptor.init_page_options.redirect_unauthenticated_user = true;
            } else if is_global {
                descriptor.set(
                    AdminView::GlobalDocument {
                        global: segments[1].clone(),
                    },
                    TemplateKind::Default,
                    "global-edit",
                );
                descriptor.init_page_options.redirect_unauthenticated_user = true;
            }
        }
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::url::current_route;
    use crate::config::CustomViewConfig;

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[[collections]]
slug = "users"
auth = {}

[[collections]]
slug = "posts"

[[globals]]
slug = "settings"
"#,
        )
        .unwrap()
    }

    fn resolve(config: &Config, path: &str) -> ViewDescriptor {
        let segments: Vec<String> = crate::admin::url::split_segments(path);
        let route = current_route(&config.routes.admin, &segments);
        get_view_from_config(config, &route, &segments, &SearchParams::new())
    }

    #[test]
    fn test_dashboard() {
        let d = resolve(&config(), "");
        assert_eq!(d.view, Some(AdminView::Dashboard));
        assert_eq!(d.template_type, TemplateKind::Default);
        assert_eq!(d.template_class_name, "dashboard");
        assert!(d.init_page_options.redirect_unauthenticated_user);
        assert_eq!(d.init_page_options.route, "/admin");
    }

    #[test]
    fn test_single_segment_views_use_minimal_template() {
        let config = config();
        for (path, view) in [
            ("login", AdminView::Login),
            ("logout", AdminView::Logout),
            ("logout-inactivity", AdminView::LogoutInactivity),
            ("create-first-user", AdminView::CreateFirstUser),
            ("forgot", AdminView::ForgotPassword),
            ("unauthorized", AdminView::Unauthorized),
        ] {
            let d = resolve(&config, path);
            assert_eq!(d.view, Some(view), "path {}", path);
            assert_eq!(d.template_type, TemplateKind::Minimal, "path {}", path);
            assert!(!d.init_page_options.redirect_unauthenticated_user);
        }
    }

    #[test]
    fn test_account_uses_default_template_and_requires_auth() {
        let d = resolve(&config(), "account");
        assert_eq!(d.view, Some(AdminView::Account));
        assert_eq!(d.template_type, TemplateKind::Default);
        assert!(d.init_page_options.redirect_unauthenticated_user);
    }

    #[test]
    fn test_configured_route_overrides_default_path() {
        let mut config = config();
        config.admin.routes.login = "/sign-in".to_string();
        assert_eq!(resolve(&config, "sign-in").view, Some(AdminView::Login));
        assert_eq!(resolve(&config, "login").view, None);
    }

    #[test]
    fn test_reset_password() {
        let d = resolve(&config(), "reset/abc123");
        assert_eq!(
            d.view,
            Some(AdminView::ResetPassword {
                token: "abc123".to_string()
            })
        );
        assert_eq!(d.template_type, TemplateKind::Minimal);
    }

    #[test]
    fn test_collection_list_and_document() {
        let config = config();
        let list = resolve(&config, "collections/posts");
        assert_eq!(
            list.view,
            Some(AdminView::List {
                collection: "posts".to_string()
            })
        );
        assert_eq!(list.template_class_name, "posts-list");

        let doc = resolve(&config, "collections/posts/42/versions");
        assert_eq!(
            doc.view,
            Some(AdminView::CollectionDocument {
                collection: "posts".to_string(),
                id: "42".to_string(),
                tab: Some("versions".to_string()),
            })
        );
        assert_eq!(doc.template_type, TemplateKind::Default);
        assert_eq!(doc.template_class_name, "collection-default-edit");
    }

    #[test]
    fn test_unknown_collection_resolves_nothing() {
        let d = resolve(&config(), "collections/unknown");
        assert_eq!(d.view, None);
        assert_eq!(d.template_type, TemplateKind::None);
    }

    #[test]
    fn test_global_edit() {
        let config = config();
        for path in ["globals/settings", "globals/settings/api"] {
            let d = resolve(&config, path);
            assert_eq!(
                d.view,
                Some(AdminView::GlobalDocument {
                    global: "settings".to_string()
                })
            );
            assert_eq!(d.template_class_name, "global-edit");
        }
    }

    #[test]
    fn test_verify() {
        let d = resolve(&config(), "users/verify/tok");
        assert_eq!(
            d.view,
            Some(AdminView::Verify {
                collection: "users".to_string(),
                token: "tok".to_string()
            })
        );
        assert_eq!(d.template_type, TemplateKind::Minimal);
    }

    #[test]
    fn test_custom_view_takes_precedence() {
        let mut config = config();
        config.admin.views.insert(
            "reports".to_string(),
            CustomViewConfig {
                path: "/reports/:year".to_string(),
                exact: true,
                template: ViewTemplate::Minimal,
                title: "Reports".to_string(),
                body: "<p>Reports</p>".to_string(),
                requires_auth: true,
            },
        );
        let d = resolve(&config, "reports/2024");
        match d.view {
            Some(AdminView::Custom { key, params }) => {
                assert_eq!(key, "reports");
                assert_eq!(params.get("year").map(String::as_str), Some("2024"));
            }
            other => panic!("Expected custom view, got {:?}", other),
        }
        assert_eq!(d.template_type, TemplateKind::Minimal);
        assert!(d.init_page_options.redirect_unauthenticated_user);
    }

    #[test]
    fn test_root_admin_route() {
        let mut config = config();
        config.routes.admin = "/".to_string();
        let d = resolve(&config, "");
        assert_eq!(d.view, Some(AdminView::Dashboard));
        assert_eq!(d.init_page_options.route, "/");
        assert_eq!(resolve(&config, "login").view, Some(AdminView::Login));
    }
}
