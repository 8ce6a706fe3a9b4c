use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// On-disk format tag written into every template and item document.
pub const FORMAT_VERSION: &str = "1";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Turns a display name into a key: whitespace runs become `-`, then lowercase.
pub fn create_key(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, "-").to_lowercase()
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    File,
    Object,
    Sql,
    Function,
    Widget,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Number => "NUMBER",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::File => "FILE",
            Self::Object => "OBJECT",
            Self::Sql => "SQL",
            Self::Function => "FUNCTION",
            Self::Widget => "WIDGET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub field_id: Uuid,
    pub r#type: FieldType,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default = "default_version")]
    pub version: String,
    pub type_id: Uuid,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl Template {
    pub fn field_keys(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.key.clone()).collect()
    }

    pub fn field_by_key(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemField {
    pub field_id: Uuid,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default = "default_version")]
    pub version: String,
    pub item_id: Uuid,
    pub type_id: Uuid,
    #[serde(default)]
    pub fields: Vec<ItemField>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl Item {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| field.value.as_str())
    }
}

/// One field of a template as submitted by a caller, before ids and keys are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDraft {
    #[serde(default)]
    pub name: String,
    pub r#type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldDraft>,
}

/// Submitted item values keyed by template field key.
pub type FieldValues = BTreeMap<String, String>;

/// A raw CSV row of a table: `[itemId, deleted, ...fieldValues]`.
pub type TableRow = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableViewRow {
    pub item_id: String,
    pub cells: Vec<String>,
}

/// Non-deleted table rows laid out in the template's current field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub type_id: Uuid,
    pub name: String,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableViewRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrashKind {
    Templates,
    Items,
}

impl TrashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Templates => "templates",
            Self::Items => "items",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "templates" => Some(Self::Templates),
            "items" => Some(Self::Items),
            _ => None,
        }
    }
}

/// Persisted outline row of the tree chunk. Column order on disk matches field order here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub level: u32,
    pub item_id: String,
    #[serde(default)]
    pub parent_id: String,
    pub r#type: String,
    #[serde(default)]
    pub type_id: String,
    #[serde(default)]
    pub sort_order: String,
    #[serde(default)]
    pub value: String,
}

/// Display row produced by tree expansion; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedNode {
    pub level: u32,
    pub item_id: String,
    pub parent_id: String,
    pub r#type: String,
    pub type_id: String,
    pub sort_order: String,
    pub value: String,
}

impl From<TreeNode> for ExpandedNode {
    fn from(node: TreeNode) -> Self {
        Self {
            level: node.level,
            item_id: node.item_id,
            parent_id: node.parent_id,
            r#type: node.r#type,
            type_id: node.type_id,
            sort_order: node.sort_order,
            value: node.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub version: String,
    pub data_root: PathBuf,
    pub records_dir: PathBuf,
    pub files_dir: PathBuf,
    pub trash_dir: PathBuf,
    pub initial_chunk_id: Uuid,
}
