// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Describes admin routes, the auth-enabled user collection, collections, globals and fields
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Public origin used by clients that call back into the API
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
    #[serde(default)]
    pub globals: Vec<GlobalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Top-level mount points for the admin panel and the REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_admin_route")]
    pub admin: String,
    #[serde(default = "default_api_route")]
    pub api: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            admin: default_admin_route(),
            api: default_api_route(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Slug of the auth-enabled collection whose documents are admin users
    #[serde(default = "default_user_slug")]
    pub user: String,
    #[serde(default)]
    pub routes: AdminRoutes,
    /// Appended to every page title
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,
    /// Custom views keyed by name, matched before the built-in views
    #[serde(default)]
    pub views: BTreeMap<String, CustomViewConfig>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user: default_user_slug(),
            routes: AdminRoutes::default(),
            title_suffix: default_title_suffix(),
            views: BTreeMap::new(),
        }
    }
}

/// Paths of the single-segment admin views, relative to the admin route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRoutes {
    #[serde(default = "default_account_route")]
    pub account: String,
    #[serde(default = "default_create_first_user_route")]
    pub create_first_user: String,
    #[serde(default = "default_forgot_route")]
    pub forgot: String,
    #[serde(default = "default_inactivity_route")]
    pub inactivity: String,
    #[serde(default = "default_login_route")]
    pub login: String,
    #[serde(default = "default_logout_route")]
    pub logout: String,
    #[serde(default = "default_reset_route")]
    pub reset: String,
    #[serde(default = "default_unauthorized_route")]
    pub unauthorized: String,
}

impl Default for AdminRoutes {
    fn default() -> Self {
        Self {
            account: default_account_route(),
            create_first_user: default_create_first_user_route(),
            forgot: default_forgot_route(),
            inactivity: default_inactivity_route(),
            login: default_login_route(),
            logout: default_logout_route(),
            reset: default_reset_route(),
            unauthorized: default_unauthorized_route(),
        }
    }
}

impl AdminRoutes {
    /// All configurable routes paired with their key, in declaration order
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("account", self.account.as_str()),
            ("createFirstUser", self.create_first_user.as_str()),
            ("forgot", self.forgot.as_str()),
            ("inactivity", self.inactivity.as_str()),
            ("login", self.login.as_str()),
            ("logout", self.logout.as_str()),
            ("reset", self.reset.as_str()),
            ("unauthorized", self.unauthorized.as_str()),
        ]
    }
}

/// Template a custom view renders in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewTemplate {
    None,
    Minimal,
    #[default]
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomViewConfig {
    /// Route pattern relative to the admin route; `:name` segments capture params
    pub path: String,
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub template: ViewTemplate,
    #[serde(default)]
    pub title: String,
    /// Trusted HTML body rendered as-is
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_true")]
    pub requires_auth: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the XDG data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::database_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            locales: default_locales(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAuth {
    /// Turns off email/password login and the first-user flow
    #[serde(default)]
    pub disable_local_strategy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub slug: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<CollectionAuth>,
    /// Hidden collections are left out of the navigation
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl CollectionConfig {
    pub fn plural_label(&self) -> String {
        self.labels.plural.clone().unwrap_or_else(|| self.slug.clone())
    }

    pub fn singular_label(&self) -> String {
        self.labels
            .singular
            .clone()
            .unwrap_or_else(|| self.slug.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl GlobalConfig {
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.slug.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Select,
    RichText,
}

/// Shows a field only while a sibling field holds the given value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub equals: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<FieldCondition>,
    /// Blocks that can be embedded in a rich-text field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockConfig>,
}

impl FieldConfig {
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    pub slug: String,
    #[serde(default)]
    pub labels: Labels,
    /// HTML snippet replacing the default collapsed header;
    /// `{blockType}` and `{blockName}` are substituted (escaped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_component: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_admin_route() -> String {
    "/admin".to_string()
}

fn default_api_route() -> String {
    "/api".to_string()
}

fn default_user_slug() -> String {
    "users".to_string()
}

fn default_title_suffix() -> String {
    "- Admin".to_string()
}

fn default_account_route() -> String {
    "/account".to_string()
}

fn default_create_first_user_route() -> String {
    "/create-first-user".to_string()
}

fn default_forgot_route() -> String {
    "/forgot".to_string()
}

fn default_inactivity_route() -> String {
    "/logout-inactivity".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_logout_route() -> String {
    "/logout".to_string()
}

fn default_reset_route() -> String {
    "/reset".to_string()
}

fn default_unauthorized_route() -> String {
    "/unauthorized".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_locales() -> Vec<String> {
    vec![default_locale()]
}

fn default_true() -> bool {
    true
}

/// The users collection used when no config file exists
fn default_users_collection() -> CollectionConfig {
    CollectionConfig {
        slug: default_user_slug(),
        labels: Labels {
            singular: Some("User".to_string()),
            plural: Some("Users".to_string()),
        },
        auth: Some(CollectionAuth::default()),
        hidden: false,
        fields: Vec::new(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            server: ServerConfig::default(),
            routes: RoutesConfig::default(),
            admin: AdminConfig::default(),
            database: DatabaseConfig::default(),
            localization: LocalizationConfig::default(),
            collections: vec![default_users_collection()],
            globals: Vec::new(),
        }
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. HEADLESS_ADMIN_CONFIG env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/headless-admin/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("HEADLESS_ADMIN_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from the standard locations with environment overrides
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                let mut config = Config::default();
                config.apply_env_overrides()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from an explicit file with environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config without touching the environment or validating it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("HEADLESS_ADMIN_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid HEADLESS_ADMIN_PORT: {}", port))?;
        }
        if let Ok(host) = std::env::var("HEADLESS_ADMIN_BIND_ADDRESS") {
            self.server.host = host;
        }
        if let Ok(url) = std::env::var("HEADLESS_ADMIN_SERVER_URL") {
            self.server_url = url;
        }
        if let Ok(db_path) = std::env::var("HEADLESS_ADMIN_DATABASE") {
            self.database.path = Some(db_path);
        }
        Ok(())
    }

    /// Check cross-references the deserializer cannot
    pub fn validate(&self) -> Result<()> {
        for (name, route) in [("routes.admin", &self.routes.admin), ("routes.api", &self.routes.api)] {
            if !route.starts_with('/') {
                anyhow::bail!("{} must start with '/': {}", name, route);
            }
        }
        if self.routes.api == "/" {
            anyhow::bail!("routes.api cannot be the site root");
        }
        let mut seen_routes = std::collections::HashSet::new();
        for (key, route) in self.admin.routes.entries() {
            if !route.starts_with('/') || route.len() < 2 {
                anyhow::bail!("admin.routes.{} must be a non-empty path starting with '/': {}", key, route);
            }
            if !seen_routes.insert(route) {
                anyhow::bail!("admin.routes.{} duplicates another admin route: {}", key, route);
            }
        }
        for (key, view) in &self.admin.views {
            if !view.path.starts_with('/') {
                anyhow::bail!("admin.views.{}.path must start with '/': {}", key, view.path);
            }
        }

        let user_collection = self.user_collection().with_context(|| {
            format!(
                "admin.user references unknown collection '{}'",
                self.admin.user
            )
        })?;
        if user_collection.auth.is_none() {
            anyhow::bail!(
                "admin.user collection '{}' must have auth enabled",
                user_collection.slug
            );
        }

        if !self
            .localization
            .locales
            .contains(&self.localization.default_locale)
        {
            anyhow::bail!(
                "localization.default_locale '{}' is not one of the configured locales",
                self.localization.default_locale
            );
        }

        let mut seen = std::collections::HashSet::new();
        for slug in self
            .collections
            .iter()
            .map(|c| &c.slug)
            .chain(self.globals.iter().map(|g| &g.slug))
        {
            if !seen.insert(slug) {
                anyhow::bail!("Duplicate collection or global slug: {}", slug);
            }
        }

        Ok(())
    }

    pub fn collection(&self, slug: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.slug == slug)
    }

    pub fn global(&self, slug: &str) -> Option<&GlobalConfig> {
        self.globals.iter().find(|g| g.slug == slug)
    }

    /// The auth-enabled collection that holds admin users
    pub fn user_collection(&self) -> Option<&CollectionConfig> {
        self.collection(&self.admin.user)
    }

    /// Whether email/password login is disabled for the user collection
    pub fn disable_local_strategy(&self) -> bool {
        self.user_collection()
            .and_then(|c| c.auth.as_ref())
            .is_some_and(|auth| auth.disable_local_strategy)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.routes.admin, "/admin");
        assert_eq!(config.routes.api, "/api");
        assert_eq!(config.admin.routes.create_first_user, "/create-first-user");
        assert!(!config.disable_local_strategy());
    }

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
[[collections]]
slug = "users"
auth = {}
"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.admin.user, "users");
        assert_eq!(config.admin.routes.login, "/login");
        assert_eq!(config.localization.default_locale, "en");
    }

    #[test]
    fn test_disable_local_strategy_read_from_user_collection() {
        let config = Config::from_toml_str(
            r#"
[admin]
user = "admins"

[[collections]]
slug = "admins"
auth = { disable_local_strategy = true }
"#,
        )
        .unwrap();
        assert!(config.disable_local_strategy());
    }

    #[test]
    fn test_validate_rejects_unknown_user_collection() {
        let config = Config::from_toml_str(
            r#"
[admin]
user = "members"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("members"));
    }

    #[test]
    fn test_validate_rejects_user_collection_without_auth() {
        let config = Config::from_toml_str(
            r#"
[[collections]]
slug = "users"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_admin_route() {
        let mut config = Config::default();
        config.routes.admin = "admin".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_slugs() {
        let config = Config::from_toml_str(
            r#"
[[collections]]
slug = "users"
auth = {}

[[globals]]
slug = "users"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rich_text_field_with_blocks_parses() {
        let config = Config::from_toml_str(
            r#"
[[collections]]
slug = "users"
auth = {}

[[collections]]
slug = "posts"

[[collections.fields]]
name = "content"
type = "richText"

[[collections.fields.blocks]]
slug = "quote"
labels = { singular = "Quote" }

[[collections.fields.blocks.fields]]
name = "text"
type = "text"
required = true
"#,
        )
        .unwrap();
        let posts = config.collection("posts").unwrap();
        let content = &posts.fields[0];
        assert_eq!(content.kind, FieldKind::RichText);
        assert_eq!(content.blocks[0].slug, "quote");
        assert!(content.blocks[0].fields[0].required);
    }

    #[test]
    fn test_database_path_defaults_to_data_dir() {
        let config = Config::default();
        assert_eq!(config.database.resolved_path(), paths::database_file());
    }
}
