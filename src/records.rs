use crate::errors::{StoreError, StoreResult};
use crate::models::{Item, Template, TrashKind};
use crate::paths::{EntityKind, PathResolver};
use crate::trash::TrashLedger;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A JSON document stored at a sharded path derived from its id.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: EntityKind;
    const TRASH: TrashKind;

    fn id(&self) -> Uuid;
    fn is_deleted(&self) -> bool;
    fn mark_deleted(&mut self);
}

impl Record for Template {
    const KIND: EntityKind = EntityKind::Template;
    const TRASH: TrashKind = TrashKind::Templates;

    fn id(&self) -> Uuid {
        self.type_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

impl Record for Item {
    const KIND: EntityKind = EntityKind::Item;
    const TRASH: TrashKind = TrashKind::Items;

    fn id(&self) -> Uuid {
        self.item_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    paths: PathResolver,
    trash: TrashLedger,
}

impl RecordStore {
    pub fn new(paths: PathResolver, trash: TrashLedger) -> Self {
        Self { paths, trash }
    }

    pub fn path_of<R: Record>(&self, id: &Uuid) -> PathBuf {
        self.paths.entity_file(id, R::KIND)
    }

    /// Writes (or overwrites) the record's document. Last writer wins.
    pub fn create<R: Record>(&self, record: &R) -> StoreResult<PathBuf> {
        let path = self.path_of::<R>(&record.id());
        write_json_file(&path, record)?;
        tracing::debug!(kind = R::KIND.prefix(), path = %path.to_string_lossy(), "record written");
        Ok(path)
    }

    pub fn read<R: Record>(&self, id: &Uuid) -> StoreResult<R> {
        tracing::debug!(kind = R::KIND.prefix(), id = %id, "reading record");
        read_json_file(&self.path_of::<R>(id))
    }

    /// Flags the record as deleted, rewrites it, then adds its id to the trash ledger.
    /// Deleting an already deleted record rewrites it unchanged and logs the id again.
    pub fn soft_delete<R: Record>(&self, id: &Uuid) -> StoreResult<R> {
        let mut record: R = self.read(id)?;
        if record.is_deleted() {
            tracing::warn!(kind = R::KIND.prefix(), id = %id, "record already deleted");
        }
        record.mark_deleted();
        self.create(&record)?;
        self.trash.record(R::TRASH, &id.hyphenated().to_string())?;
        tracing::info!(kind = R::KIND.prefix(), id = %id, "record soft-deleted");
        Ok(record)
    }

    /// Every record of this kind under the root, deleted ones included, ordered by path.
    pub fn list<R: Record>(&self) -> StoreResult<Vec<R>> {
        let root = self.paths.root();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        let prefix = R::KIND.prefix();
        let suffix = format!(".{}", R::KIND.extension());
        let mut records = Vec::new();
        for path in files {
            let Some(name) = path.file_name().and_then(|value| value.to_str()) else {
                continue;
            };
            if name.starts_with(prefix) && name.ends_with(&suffix) {
                records.push(read_json_file(&path)?);
            }
        }
        Ok(records)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> StoreResult<()> {
    for entry in fs::read_dir(dir).map_err(|error| StoreError::Io(error.to_string()))? {
        let entry = entry.map_err(|error| StoreError::Io(error.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Replaces `path` through a sibling temp file so readers never see a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| StoreError::Io(error.to_string()))?;
    }
    let mut tmp_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, bytes).map_err(|error| StoreError::Io(error.to_string()))?;
    fs::rename(&tmp_path, path).map_err(|error| StoreError::Io(error.to_string()))
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|error| StoreError::Io(error.to_string()))?;
    write_atomic(path, &bytes)
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = fs::read(path).map_err(|error| StoreError::from_read(error, path))?;
    serde_json::from_slice(&bytes)
        .map_err(|error| StoreError::Decode(format!("{}: {}", path.to_string_lossy(), error)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, FieldType, ItemField, FORMAT_VERSION};

    fn store(root: &Path) -> RecordStore {
        RecordStore::new(
            PathResolver::new(root.join("data")),
            TrashLedger::new(root.join("trash")),
        )
    }

    fn sample_template(name: &str) -> Template {
        Template {
            version: FORMAT_VERSION.to_string(),
            type_id: Uuid::new_v4(),
            key: name.to_lowercase(),
            name: name.to_string(),
            icon: "book".to_string(),
            description: "Things to read".to_string(),
            fields: vec![Field {
                field_id: Uuid::new_v4(),
                r#type: FieldType::Text,
                key: "title".to_string(),
                name: "Title".to_string(),
            }],
            deleted: false,
        }
    }

    #[test]
    fn template_roundtrip_writes_indented_json() {
        let root = tempfile::tempdir().expect("temp root");
        let store = store(root.path());
        let template = sample_template("Book");

        let path = store.create(&template).expect("create");
        assert!(path.starts_with(root.path().join("data")));
        let raw = fs::read_to_string(&path).expect("raw json");
        assert!(raw.contains("\n  \"typeId\""));
        assert!(!raw.contains("deleted"));

        let loaded: Template = store.read(&template.type_id).expect("read");
        assert_eq!(loaded, template);
    }

    #[test]
    fn read_reports_missing_and_malformed_files() {
        let root = tempfile::tempdir().expect("temp root");
        let store = store(root.path());
        let id = Uuid::new_v4();

        let missing = store.read::<Item>(&id).expect_err("missing");
        assert!(matches!(missing, StoreError::NotFound(_)));

        let path = store.path_of::<Item>(&id);
        fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
        fs::write(&path, "{ broken").expect("write garbage");
        let malformed = store.read::<Item>(&id).expect_err("malformed");
        assert!(matches!(malformed, StoreError::Decode(_)));
    }

    #[test]
    fn soft_delete_flags_record_and_logs_trash() {
        let root = tempfile::tempdir().expect("temp root");
        let store = store(root.path());
        let item = Item {
            version: FORMAT_VERSION.to_string(),
            item_id: Uuid::new_v4(),
            type_id: Uuid::new_v4(),
            fields: vec![ItemField {
                field_id: Uuid::new_v4(),
                key: "title".to_string(),
                value: "Dune".to_string(),
            }],
            deleted: false,
        };
        store.create(&item).expect("create");

        let deleted: Item = store.soft_delete(&item.item_id).expect("soft delete");
        assert!(deleted.deleted);
        let reloaded: Item = store.read(&item.item_id).expect("read");
        assert!(reloaded.deleted);
        assert_eq!(reloaded.fields, item.fields);

        let ledger = fs::read_to_string(root.path().join("trash/items.txt")).expect("ledger");
        assert_eq!(ledger, format!("{}\n", item.item_id));
    }

    #[test]
    fn list_walks_shards_and_filters_by_kind() {
        let root = tempfile::tempdir().expect("temp root");
        let store = store(root.path());
        assert!(store.list::<Template>().expect("empty list").is_empty());

        let book = sample_template("Book");
        let film = sample_template("Film");
        store.create(&book).expect("book");
        store.create(&film).expect("film");
        store
            .create(&Item {
                version: FORMAT_VERSION.to_string(),
                item_id: Uuid::new_v4(),
                type_id: book.type_id,
                fields: Vec::new(),
                deleted: false,
            })
            .expect("item");

        let mut names: Vec<String> = store
            .list::<Template>()
            .expect("list")
            .into_iter()
            .map(|template| template.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Book", "Film"]);
        assert_eq!(store.list::<Item>().expect("items").len(), 1);
    }
}
