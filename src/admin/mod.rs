// ABOUTME: Admin panel: URL-to-view resolution, page init, templates and local auth
// ABOUTME: Every admin page is served by the root page handler under the configured admin route

pub mod auth;
pub mod init_page;
pub mod root;
pub mod routes;
pub mod templates;
pub mod url;
pub mod view;
pub mod views;

pub use root::{resolve_root_page, RootOutcome};
pub use routes::{admin_router, AdminError, AdminState};
