use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::models::{
    create_key, CreateTemplateRequest, ExpandedNode, Field, FieldValues, Item, ItemField, StoreInfo,
    TableRow, TableView, Template, TrashKind, TreeNode, FORMAT_VERSION,
};
use crate::paths::PathResolver;
use crate::records::RecordStore;
use crate::table::{is_live_row, TableLog, DELETED_COLUMN, ITEM_ID_COLUMN};
use crate::trash::TrashLedger;
use crate::tree::{TreeExpander, TreeLog};
use std::collections::HashSet;
use uuid::Uuid;

/// Entry point for callers: templates, items, tables, the outline tree and the trash.
///
/// Single writer. Item deletes touch the table, the item document and the trash
/// ledger in that order and nothing makes the three writes atomic together.
#[derive(Debug, Clone)]
pub struct KanectaStore {
    config: StoreConfig,
    records: RecordStore,
    tables: TableLog,
    trash: TrashLedger,
    tree: TreeLog,
}

impl KanectaStore {
    pub fn new(config: StoreConfig) -> Self {
        let paths = PathResolver::new(config.records_dir());
        let trash = TrashLedger::new(config.trash_dir());
        Self {
            records: RecordStore::new(paths.clone(), trash.clone()),
            tables: TableLog::new(paths.clone()),
            tree: TreeLog::new(&paths, &config.initial_chunk_id),
            trash,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn tables(&self) -> &TableLog {
        &self.tables
    }

    pub fn create_template(&self, request: CreateTemplateRequest) -> StoreResult<Template> {
        if request.name.trim().is_empty() {
            return Err(StoreError::Invalid("template name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for draft in request.fields {
            if draft.name.is_empty() {
                continue;
            }
            let key = create_key(&draft.name);
            if !seen.insert(key.clone()) {
                return Err(StoreError::Invalid(format!("duplicate field key '{}'", key)));
            }
            fields.push(Field {
                field_id: Uuid::new_v4(),
                r#type: draft.r#type,
                key,
                name: draft.name,
            });
        }

        let template = Template {
            version: FORMAT_VERSION.to_string(),
            type_id: Uuid::new_v4(),
            key: create_key(&request.name),
            name: request.name,
            icon: request.icon,
            description: request.description,
            fields,
            deleted: false,
        };
        self.records.create(&template)?;
        tracing::info!(type_id = %template.type_id, name = %template.name, fields = template.fields.len(), "template created");
        Ok(template)
    }

    pub fn get_template(&self, type_id: &Uuid) -> StoreResult<Template> {
        self.records.read(type_id)
    }

    /// Every template on disk, deleted ones included.
    pub fn list_templates(&self) -> StoreResult<Vec<Template>> {
        self.records.list()
    }

    pub fn active_templates(&self) -> StoreResult<Vec<Template>> {
        Ok(self
            .list_templates()?
            .into_iter()
            .filter(|template| !template.deleted)
            .collect())
    }

    pub fn delete_template(&self, type_id: &Uuid) -> StoreResult<Template> {
        self.records.soft_delete(type_id)
    }

    /// Writes the item document, then appends its row to the template's table,
    /// creating the table on first use. Values for keys the template does not
    /// define are dropped.
    pub fn create_item(&self, type_id: &Uuid, values: &FieldValues) -> StoreResult<Item> {
        let template = self.get_template(type_id)?;

        let fields = template
            .fields
            .iter()
            .filter_map(|field| {
                values.get(&field.key).map(|value| ItemField {
                    field_id: field.field_id,
                    key: field.key.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        let item = Item {
            version: FORMAT_VERSION.to_string(),
            item_id: Uuid::new_v4(),
            type_id: *type_id,
            fields,
            deleted: false,
        };
        self.records.create(&item)?;

        let header = self.tables.ensure_header(type_id, &template.field_keys())?;
        let mut row: FieldValues = item
            .fields
            .iter()
            .map(|field| (field.key.clone(), field.value.clone()))
            .collect();
        row.insert(ITEM_ID_COLUMN.to_string(), item.item_id.hyphenated().to_string());
        row.insert(DELETED_COLUMN.to_string(), "false".to_string());
        self.tables.append(type_id, &header, &row)?;

        tracing::info!(item_id = %item.item_id, type_id = %type_id, "item created");
        Ok(item)
    }

    pub fn get_item(&self, item_id: &Uuid) -> StoreResult<Item> {
        self.records.read(item_id)
    }

    /// Rows still shown in the table; a template without a table yet has none.
    pub fn list_items(&self, type_id: &Uuid) -> StoreResult<Vec<TableRow>> {
        Ok(self
            .scan_items(type_id)?
            .into_iter()
            .filter(|row| is_live_row(row))
            .collect())
    }

    /// Every data row, soft-deleted ones included.
    pub fn scan_items(&self, type_id: &Uuid) -> StoreResult<Vec<TableRow>> {
        self.tables.scan(type_id)
    }

    pub fn table_view(&self, type_id: &Uuid) -> StoreResult<TableView> {
        let template = self.get_template(type_id)?;
        self.tables.view(&template)
    }

    pub fn delete_item(&self, item_id: &Uuid) -> StoreResult<Item> {
        let item = self.get_item(item_id)?;
        self.tables
            .mark_deleted_by_id(&item.type_id, &item.item_id.hyphenated().to_string())?;
        self.records.soft_delete(item_id)
    }

    /// The expanded outline, or `None` when no tree chunk exists.
    pub fn tree_view(&self) -> StoreResult<Option<Vec<ExpandedNode>>> {
        let Some(nodes) = self.tree.read()? else {
            return Ok(None);
        };
        TreeExpander::new(&self.records).expand(nodes).map(Some)
    }

    pub fn add_tree_node(&self, node: &TreeNode) -> StoreResult<()> {
        self.tree.append(node)
    }

    pub fn get_trash(&self, kind: TrashKind) -> StoreResult<Option<String>> {
        self.trash.read(kind)
    }

    pub fn about(&self) -> StoreInfo {
        StoreInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_root: self.config.data_dir.clone(),
            records_dir: self.config.records_dir(),
            files_dir: self.config.files_dir(),
            trash_dir: self.config.trash_dir(),
            initial_chunk_id: self.config.initial_chunk_id,
        }
    }
}
