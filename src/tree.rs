//! Outline tree stored as a single headerless CSV chunk, and its expansion
//! into display rows.
//!
//! Chunk columns, in order: `level, itemId, parentId, type, typeId, sortOrder, value`.
//! Rows of type `OBJECT` reference a template through `typeId` and carry a JSON
//! object of field key to value in `value`. Expansion replaces each such row with
//! an object heading followed by a heading row and a value row per template field:
//!
//! ```text
//! L    FIXED_HEADING__OBJECT  <template name>
//! L+1  FIXED_HEADING__FIELD   <field name>
//! L+2  FIXED_VALUE__<TYPE>    <field value>
//! ...
//! ```
//!
//! Expansion is one level deep: a field value that is itself an object is
//! rendered as its JSON text, not expanded further.

use crate::errors::{StoreError, StoreResult};
use crate::models::{ExpandedNode, Template, TreeNode};
use crate::paths::{EntityKind, PathResolver};
use crate::records::RecordStore;
use crate::table::{csv_writer, open_csv};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const OBJECT_TYPE: &str = "OBJECT";
pub const OBJECT_HEADING_TYPE: &str = "FIXED_HEADING__OBJECT";
pub const FIELD_HEADING_TYPE: &str = "FIXED_HEADING__FIELD";
pub const FIXED_VALUE_PREFIX: &str = "FIXED_VALUE__";
const FIXED_HEADING_PREFIX: &str = "FIXED_HEADING__";
const FIXED_PREFIX: &str = "FIXED_";
const CHUNK_COLUMNS: usize = 7;

/// Synthetic heading rows: not editable and not values.
pub fn is_fixed_heading(node_type: &str) -> bool {
    node_type.starts_with(FIXED_HEADING_PREFIX)
}

/// Any row produced by expansion rather than read from the chunk.
pub fn is_fixed(node_type: &str) -> bool {
    node_type.starts_with(FIXED_PREFIX)
}

pub fn friendly_type_name(node_type: &str) -> &str {
    match node_type {
        OBJECT_HEADING_TYPE => "Object name",
        FIELD_HEADING_TYPE => "Field name",
        "FIXED_VALUE__TEXT" => "Text",
        other => other,
    }
}

impl ExpandedNode {
    pub fn is_fixed(&self) -> bool {
        is_fixed(&self.r#type)
    }

    pub fn is_fixed_heading(&self) -> bool {
        is_fixed_heading(&self.r#type)
    }
}

/// Where expansion looks templates up.
pub trait TemplateSource {
    fn template(&self, type_id: &Uuid) -> StoreResult<Template>;
}

impl TemplateSource for RecordStore {
    fn template(&self, type_id: &Uuid) -> StoreResult<Template> {
        self.read::<Template>(type_id)
    }
}

#[derive(Debug, Clone)]
pub struct TreeLog {
    path: PathBuf,
}

impl TreeLog {
    pub fn new(paths: &PathResolver, chunk_id: &Uuid) -> Self {
        Self {
            path: paths.entity_file(chunk_id, EntityKind::Chunk),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chunk rows in file order, or `None` when no tree has been written yet.
    pub fn read(&self) -> StoreResult<Option<Vec<TreeNode>>> {
        let Some(mut reader) = open_csv(&self.path, false)? else {
            return Ok(None);
        };

        let mut nodes = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != CHUNK_COLUMNS {
                return Err(StoreError::Decode(format!(
                    "chunk row {} has {} columns, expected {}",
                    index + 1,
                    record.len(),
                    CHUNK_COLUMNS
                )));
            }
            let level = record[0].parse::<u32>().map_err(|_| {
                StoreError::Decode(format!("chunk row {} has invalid level '{}'", index + 1, &record[0]))
            })?;
            nodes.push(TreeNode {
                level,
                item_id: record[1].to_string(),
                parent_id: record[2].to_string(),
                r#type: record[3].to_string(),
                type_id: record[4].to_string(),
                sort_order: record[5].to_string(),
                value: record[6].to_string(),
            });
        }
        tracing::debug!(path = %self.path.to_string_lossy(), rows = nodes.len(), "chunk read");
        Ok(Some(nodes))
    }

    pub fn append(&self, node: &TreeNode) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| StoreError::Io(error.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| StoreError::Io(error.to_string()))?;

        let level = node.level.to_string();
        let mut writer = csv_writer(file);
        writer.write_record([
            level.as_str(),
            node.item_id.as_str(),
            node.parent_id.as_str(),
            node.r#type.as_str(),
            node.type_id.as_str(),
            node.sort_order.as_str(),
            node.value.as_str(),
        ])?;
        writer.flush().map_err(|error| StoreError::Io(error.to_string()))?;
        tracing::info!(item_id = %node.item_id, node_type = %node.r#type, "tree node appended");
        Ok(())
    }
}

pub struct TreeExpander<'a, S: TemplateSource> {
    templates: &'a S,
}

impl<'a, S: TemplateSource> TreeExpander<'a, S> {
    pub fn new(templates: &'a S) -> Self {
        Self { templates }
    }

    /// Flattens the outline, replacing every `OBJECT` row by its expansion.
    /// A missing template aborts the whole expansion.
    pub fn expand(&self, nodes: Vec<TreeNode>) -> StoreResult<Vec<ExpandedNode>> {
        let mut expanded = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node.r#type == OBJECT_TYPE {
                expanded.extend(self.expand_object(&node)?);
            } else {
                expanded.push(ExpandedNode::from(node));
            }
        }
        Ok(expanded)
    }

    pub fn expand_object(&self, node: &TreeNode) -> StoreResult<Vec<ExpandedNode>> {
        let template = self.resolve(&node.type_id)?;
        let values = if template.fields.is_empty() {
            Map::new()
        } else {
            serde_json::from_str::<Map<String, Value>>(&node.value).map_err(|error| {
                StoreError::Decode(format!("object value of node '{}': {}", node.item_id, error))
            })?
        };

        let base_level = node.level;
        let (Some(field_level), Some(value_level)) = (base_level.checked_add(1), base_level.checked_add(2))
        else {
            return Err(StoreError::Decode(format!(
                "object node '{}' has level {} with no room for its field rows",
                node.item_id, base_level
            )));
        };
        let mut rows = Vec::with_capacity(1 + 2 * template.fields.len());
        rows.push(ExpandedNode {
            level: base_level,
            item_id: node.item_id.clone(),
            parent_id: node.parent_id.clone(),
            r#type: OBJECT_HEADING_TYPE.to_string(),
            type_id: node.type_id.clone(),
            sort_order: node.sort_order.clone(),
            value: template.name.clone(),
        });

        for (index, field) in template.fields.iter().enumerate() {
            let field_row_id = format!("{}{}", node.item_id, field.field_id.hyphenated());
            let sort_order = (index + 1).to_string();
            rows.push(ExpandedNode {
                level: field_level,
                item_id: field_row_id.clone(),
                parent_id: node.item_id.clone(),
                r#type: FIELD_HEADING_TYPE.to_string(),
                type_id: String::new(),
                sort_order: sort_order.clone(),
                value: field.name.clone(),
            });
            rows.push(ExpandedNode {
                level: value_level,
                item_id: field_row_id,
                parent_id: node.item_id.clone(),
                r#type: format!("{}{}", FIXED_VALUE_PREFIX, field.r#type.as_str()),
                type_id: String::new(),
                sort_order,
                value: display_value(values.get(&field.key)),
            });
        }
        Ok(rows)
    }

    fn resolve(&self, type_id: &str) -> StoreResult<Template> {
        let id = Uuid::parse_str(type_id)
            .map_err(|_| StoreError::TemplateNotFound(type_id.to_string()))?;
        match self.templates.template(&id) {
            Ok(template) => Ok(template),
            Err(StoreError::NotFound(_)) => Err(StoreError::TemplateNotFound(type_id.to_string())),
            Err(error) => Err(error),
        }
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, FieldType, FORMAT_VERSION};
    use std::collections::HashMap;

    struct MemoryTemplates(HashMap<Uuid, Template>);

    impl TemplateSource for MemoryTemplates {
        fn template(&self, type_id: &Uuid) -> StoreResult<Template> {
            self.0
                .get(type_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(type_id.to_string()))
        }
    }

    fn book() -> Template {
        let field = |key: &str, name: &str, kind: FieldType| Field {
            field_id: Uuid::new_v4(),
            r#type: kind,
            key: key.to_string(),
            name: name.to_string(),
        };
        Template {
            version: FORMAT_VERSION.to_string(),
            type_id: Uuid::new_v4(),
            key: "book".to_string(),
            name: "Book".to_string(),
            icon: String::new(),
            description: String::new(),
            fields: vec![
                field("title", "Title", FieldType::Text),
                field("pages", "Pages", FieldType::Number),
            ],
            deleted: false,
        }
    }

    fn node(level: u32, id: &str, node_type: &str, type_id: &str, value: &str) -> TreeNode {
        TreeNode {
            level,
            item_id: id.to_string(),
            parent_id: String::new(),
            r#type: node_type.to_string(),
            type_id: type_id.to_string(),
            sort_order: "1".to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn classification_follows_type_prefixes() {
        assert!(is_fixed_heading(OBJECT_HEADING_TYPE));
        assert!(is_fixed_heading(FIELD_HEADING_TYPE));
        assert!(!is_fixed_heading("FIXED_VALUE__TEXT"));
        assert!(is_fixed("FIXED_VALUE__TEXT"));
        assert!(!is_fixed("TEXT"));
        assert!(!is_fixed(OBJECT_TYPE));
        assert_eq!(friendly_type_name(OBJECT_HEADING_TYPE), "Object name");
        assert_eq!(friendly_type_name("FIXED_VALUE__NUMBER"), "FIXED_VALUE__NUMBER");
    }

    #[test]
    fn object_row_expands_to_heading_and_field_pairs() {
        let template = book();
        let type_id = template.type_id;
        let source = MemoryTemplates(HashMap::from([(type_id, template.clone())]));
        let expander = TreeExpander::new(&source);

        let rows = expander
            .expand(vec![node(
                0,
                "id1",
                OBJECT_TYPE,
                &type_id.to_string(),
                r#"{"title":"Dune","pages":"412"}"#,
            )])
            .expect("expand");

        assert_eq!(rows.len(), 1 + 2 * template.fields.len());
        let levels: Vec<u32> = rows.iter().map(|row| row.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 1, 2]);
        let values: Vec<&str> = rows.iter().map(|row| row.value.as_str()).collect();
        assert_eq!(values, vec!["Book", "Title", "Dune", "Pages", "412"]);
        let types: Vec<&str> = rows.iter().map(|row| row.r#type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                OBJECT_HEADING_TYPE,
                FIELD_HEADING_TYPE,
                "FIXED_VALUE__TEXT",
                FIELD_HEADING_TYPE,
                "FIXED_VALUE__NUMBER"
            ]
        );

        let title_id = format!("id1{}", template.fields[0].field_id);
        assert_eq!(rows[1].item_id, title_id);
        assert_eq!(rows[2].item_id, title_id);
        assert_eq!(rows[2].parent_id, "id1");
        assert_eq!(rows[3].sort_order, "2");
        assert!(rows.iter().all(ExpandedNode::is_fixed));
    }

    #[test]
    fn primitives_pass_through_and_missing_values_are_empty() {
        let template = book();
        let type_id = template.type_id;
        let source = MemoryTemplates(HashMap::from([(type_id, template)]));
        let expander = TreeExpander::new(&source);

        let rows = expander
            .expand(vec![
                node(0, "root", "TEXT", "", "Reading list"),
                node(1, "id1", OBJECT_TYPE, &type_id.to_string(), r#"{"pages":412,"extra":{"a":1}}"#),
            ])
            .expect("expand");

        assert_eq!(rows[0].r#type, "TEXT");
        assert_eq!(rows[0].value, "Reading list");
        assert!(!rows[0].is_fixed());
        assert_eq!(rows[3].value, "");
        assert_eq!(rows[5].value, "412");
        assert_eq!(rows[5].level, 3);
    }

    #[test]
    fn nested_object_values_stay_opaque() {
        let mut template = book();
        template.fields[0].r#type = FieldType::Object;
        let type_id = template.type_id;
        let source = MemoryTemplates(HashMap::from([(type_id, template)]));

        let rows = TreeExpander::new(&source)
            .expand(vec![node(0, "id1", OBJECT_TYPE, &type_id.to_string(), r#"{"title":{"x":"y"}}"#)])
            .expect("expand");
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2].r#type, "FIXED_VALUE__OBJECT");
        assert_eq!(rows[2].value, r#"{"x":"y"}"#);
    }

    #[test]
    fn missing_template_aborts_expansion() {
        let source = MemoryTemplates(HashMap::new());
        let expander = TreeExpander::new(&source);

        let error = expander
            .expand(vec![node(0, "id1", OBJECT_TYPE, &Uuid::new_v4().to_string(), "{}")])
            .expect_err("missing template");
        assert!(matches!(error, StoreError::TemplateNotFound(_)));

        let error = expander
            .expand(vec![node(0, "id1", OBJECT_TYPE, "not-a-uuid", "{}")])
            .expect_err("bad type id");
        assert!(matches!(error, StoreError::TemplateNotFound(_)));
    }

    #[test]
    fn object_at_deepest_level_is_a_decode_error() {
        let template = book();
        let type_id = template.type_id;
        let source = MemoryTemplates(HashMap::from([(type_id, template)]));
        let expander = TreeExpander::new(&source);

        let error = expander
            .expand(vec![node(u32::MAX, "id1", OBJECT_TYPE, &type_id.to_string(), "{}")])
            .expect_err("level overflow");
        assert!(matches!(error, StoreError::Decode(_)));

        let error = expander
            .expand(vec![node(u32::MAX - 1, "id1", OBJECT_TYPE, &type_id.to_string(), "{}")])
            .expect_err("value row overflow");
        assert!(matches!(error, StoreError::Decode(_)));

        let rows = expander
            .expand(vec![node(u32::MAX - 2, "id1", OBJECT_TYPE, &type_id.to_string(), "{}")])
            .expect("deepest level that fits");
        assert_eq!(rows[2].level, u32::MAX);
    }

    #[test]
    fn malformed_object_value_is_a_decode_error() {
        let template = book();
        let type_id = template.type_id;
        let source = MemoryTemplates(HashMap::from([(type_id, template)]));
        let error = TreeExpander::new(&source)
            .expand(vec![node(0, "id1", OBJECT_TYPE, &type_id.to_string(), "{oops")])
            .expect_err("malformed");
        assert!(matches!(error, StoreError::Decode(_)));
    }

    #[test]
    fn chunk_append_then_read_preserves_rows() {
        let root = tempfile::tempdir().expect("temp root");
        let paths = PathResolver::new(root.path().join("data"));
        let log = TreeLog::new(&paths, &Uuid::new_v4());
        assert_eq!(log.read().expect("read"), None);

        let first = node(0, "id1", OBJECT_TYPE, &Uuid::new_v4().to_string(), r#"{"title":"Dune, Part \"1\""}"#);
        let mut second = node(1, "id2", "TEXT", "", "line one\nline two");
        second.parent_id = "id1".to_string();
        log.append(&first).expect("append first");
        log.append(&second).expect("append second");

        let nodes = log.read().expect("read").expect("chunk exists");
        assert_eq!(nodes, vec![first, second]);
    }

    #[test]
    fn chunk_values_keep_surrounding_whitespace() {
        let root = tempfile::tempdir().expect("temp root");
        let paths = PathResolver::new(root.path().join("data"));
        let log = TreeLog::new(&paths, &Uuid::new_v4());

        let padded = node(0, "id1", "TEXT", "", "  indented\nline two\n");
        log.append(&padded).expect("append");

        let nodes = log.read().expect("read").expect("chunk exists");
        assert_eq!(nodes[0].value, "  indented\nline two\n");
    }

    #[test]
    fn chunk_rows_must_have_seven_columns_and_numeric_level() {
        let root = tempfile::tempdir().expect("temp root");
        let paths = PathResolver::new(root.path().join("data"));
        let log = TreeLog::new(&paths, &Uuid::new_v4());
        fs::create_dir_all(log.path().parent().expect("parent")).expect("dirs");

        fs::write(log.path(), "\"0\",\"id1\",\"\"\n").expect("short row");
        assert!(matches!(log.read(), Err(StoreError::Decode(_))));

        fs::write(log.path(), "\"x\",\"id1\",\"\",\"TEXT\",\"\",\"1\",\"v\"\n").expect("bad level");
        assert!(matches!(log.read(), Err(StoreError::Decode(_))));
    }
}
