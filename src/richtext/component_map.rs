// ABOUTME: Component map for rich-text fields: which blocks a field can embed and how to label them
// ABOUTME: Built from a rich-text field's block configs, keyed by the rendered-blocks path

use std::collections::HashMap;

use crate::config::{FieldConfig, Labels};

/// Path under which a rich-text field's blocks component is registered
pub const RENDERED_BLOCKS_PATH: &str = "lexical_internal_feature.blocks.fields.lexical_blocks";

/// Client-side view of one block type
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedBlock {
    pub slug: String,
    pub labels: Labels,
    pub field_map: Vec<FieldConfig>,
    /// Custom collapsed-header markup, see `BlockConfig::label_component`
    pub label_component: Option<String>,
}

impl ReducedBlock {
    /// Singular label, or the slug when none is configured
    pub fn display_label(&self) -> &str {
        self.labels.singular.as_deref().unwrap_or(&self.slug)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlocksFieldProps {
    pub blocks: Vec<ReducedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedComponent {
    pub field_component_props: BlocksFieldProps,
}

#[derive(Debug, Clone, Default)]
pub struct RichTextComponentMap {
    entries: HashMap<String, Vec<MappedComponent>>,
}

impl RichTextComponentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the blocks of a rich-text field
    pub fn for_field(field: &FieldConfig) -> Self {
        let blocks = field
            .blocks
            .iter()
            .map(|block| ReducedBlock {
                slug: block.slug.clone(),
                labels: block.labels.clone(),
                field_map: block.fields.clone(),
                label_component: block.label_component.clone(),
            })
            .collect();
        let mut map = Self::new();
        map.insert(
            RENDERED_BLOCKS_PATH,
            MappedComponent {
                field_component_props: BlocksFieldProps { blocks },
            },
        );
        map
    }

    pub fn insert(&mut self, path: impl Into<String>, component: MappedComponent) {
        self.entries.entry(path.into()).or_default().push(component);
    }

    /// Components registered at `path`; empty when nothing is
    pub fn get(&self, path: &str) -> &[MappedComponent] {
        self.entries.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a block type in the first blocks component
    pub fn reduced_block(&self, block_type: &str) -> Option<&ReducedBlock> {
        self.get(RENDERED_BLOCKS_PATH)
            .first()?
            .field_component_props
            .blocks
            .iter()
            .find(|block| block.slug == block_type)
    }
}
