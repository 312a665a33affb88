// ABOUTME: Rich-text field support: embedded block components and their server-side form state
// ABOUTME: Blocks fetch form state through a pluggable client and render as forms or placeholders

pub mod blocks;
pub mod client;
pub mod component_map;

pub use blocks::{collect_block_nodes, BlockComponent, BlockContext, BlockFields};
pub use client::{FormStateClient, HttpFormStateClient, LocalFormStateClient};
pub use component_map::{ReducedBlock, RichTextComponentMap};
