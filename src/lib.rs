// ABOUTME: Root library module exposing all public modules
// ABOUTME: Headless CMS admin: route resolution, page templates, rich-text blocks and form state

pub mod admin;
pub mod api;
pub mod config;
pub mod db;
pub mod form_state;
pub mod paths;
pub mod richtext;
pub mod server;
