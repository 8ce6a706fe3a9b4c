//! Append-only CSV table per template.
//!
//! Row 0 is the header `"itemId","deleted",<field keys...>`, written once when
//! the file is created. Every field of every row is quoted and rows end in
//! `\n`. Rows are only ever appended, except for soft deletes which rewrite
//! the whole file with the `deleted` column of one row set to `true`.

use crate::errors::{StoreError, StoreResult};
use crate::models::{FieldValues, TableColumn, TableRow, TableView, TableViewRow, Template};
use crate::paths::{EntityKind, PathResolver};
use crate::records::write_atomic;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const ITEM_ID_COLUMN: &str = "itemId";
pub const DELETED_COLUMN: &str = "deleted";

/// Only rows whose `deleted` column is literally `false` are shown.
pub fn is_live_row(row: &[String]) -> bool {
    row.get(1).map(|value| value == "false").unwrap_or(false)
}

/// Values are taken exactly as stored between the quotes; nothing is trimmed.
fn csv_reader<R: Read>(source: R, has_headers: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .delimiter(b',')
        .quote(b'"')
        .double_quote(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .trim(csv::Trim::None)
        .from_reader(source)
}

pub(crate) fn csv_writer<W: std::io::Write>(sink: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink)
}

/// Opens a CSV file for reading; `None` when it does not exist.
pub(crate) fn open_csv(path: &Path, has_headers: bool) -> StoreResult<Option<csv::Reader<File>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(csv_reader(file, has_headers))),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(StoreError::from_read(error, path)),
    }
}

#[derive(Debug, Clone)]
pub struct TableLog {
    paths: PathResolver,
}

impl TableLog {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    pub fn table_path(&self, type_id: &Uuid) -> PathBuf {
        self.paths.entity_file(type_id, EntityKind::Table)
    }

    pub fn exists(&self, type_id: &Uuid) -> bool {
        self.table_path(type_id).exists()
    }

    /// Creates the table with its header if absent and returns the header stored in the file.
    /// An existing header is never rewritten, even if the template's fields changed since.
    pub fn ensure_header(&self, type_id: &Uuid, field_keys: &[String]) -> StoreResult<Vec<String>> {
        let path = self.table_path(type_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| StoreError::Io(error.to_string()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                let mut header = vec![ITEM_ID_COLUMN.to_string(), DELETED_COLUMN.to_string()];
                header.extend(field_keys.iter().cloned());
                let mut writer = csv_writer(file);
                writer.write_record(&header)?;
                writer.flush().map_err(|error| StoreError::Io(error.to_string()))?;
                tracing::info!(type_id = %type_id, columns = header.len(), "table created");
                Ok(header)
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => self.header(type_id),
            Err(error) => Err(StoreError::Io(error.to_string())),
        }
    }

    pub fn header(&self, type_id: &Uuid) -> StoreResult<Vec<String>> {
        let path = self.table_path(type_id);
        let mut reader = open_csv(&path, false)?
            .ok_or_else(|| StoreError::NotFound(path.to_string_lossy().to_string()))?;
        match reader.records().next() {
            Some(record) => Ok(record?.iter().map(str::to_string).collect()),
            None => Err(StoreError::Decode(format!(
                "{}: table has no header row",
                path.to_string_lossy()
            ))),
        }
    }

    /// Appends one row laid out by `header`; columns missing from `row` are written empty.
    pub fn append(&self, type_id: &Uuid, header: &[String], row: &FieldValues) -> StoreResult<()> {
        let path = self.table_path(type_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| StoreError::Io(error.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| StoreError::Io(error.to_string()))?;

        let record: Vec<&str> = header
            .iter()
            .map(|column| row.get(column).map(String::as_str).unwrap_or(""))
            .collect();
        let mut writer = csv_writer(file);
        writer.write_record(&record)?;
        writer.flush().map_err(|error| StoreError::Io(error.to_string()))?;
        tracing::debug!(type_id = %type_id, "table row appended");
        Ok(())
    }

    /// All data rows in file order, header excluded. A missing table is empty.
    pub fn scan(&self, type_id: &Uuid) -> StoreResult<Vec<TableRow>> {
        tracing::debug!(type_id = %type_id, "scanning table");
        let Some(mut reader) = open_csv(&self.table_path(type_id), true)? else {
            return Ok(Vec::new());
        };
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    /// Sets `deleted` to `true` on the row for `item_id` and rewrites the file.
    /// Returns whether a row matched; no match leaves the content as it was.
    pub fn mark_deleted_by_id(&self, type_id: &Uuid, item_id: &str) -> StoreResult<bool> {
        let path = self.table_path(type_id);
        let file = File::open(&path).map_err(|error| StoreError::from_read(error, &path))?;
        let mut reader = csv_reader(file, false);

        let mut matched = false;
        let mut output = csv_writer(Vec::new());
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if index > 0 && row.first().map(String::as_str) == Some(item_id) {
                match row.get_mut(1) {
                    Some(deleted) => *deleted = "true".to_string(),
                    None => row.push("true".to_string()),
                }
                matched = true;
            }
            output.write_record(&row)?;
        }

        let bytes = output
            .into_inner()
            .map_err(|error| StoreError::Io(error.to_string()))?;
        write_atomic(&path, &bytes)?;

        if matched {
            tracing::info!(type_id = %type_id, item_id, "table row marked deleted");
        } else {
            tracing::warn!(type_id = %type_id, item_id, "no table row to mark deleted");
        }
        Ok(matched)
    }

    /// Live rows mapped onto the template's current fields through the stored header,
    /// so a header written by an older field order still lands in the right cells.
    pub fn view(&self, template: &Template) -> StoreResult<TableView> {
        let columns: Vec<TableColumn> = template
            .fields
            .iter()
            .map(|field| TableColumn {
                key: field.key.clone(),
                name: field.name.clone(),
            })
            .collect();

        let mut view = TableView {
            type_id: template.type_id,
            name: template.name.clone(),
            columns,
            rows: Vec::new(),
        };
        if !self.exists(&template.type_id) {
            return Ok(view);
        }

        let header = self.header(&template.type_id)?;
        let positions: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(index, column)| (column.as_str(), index))
            .collect();
        let item_position = positions.get(ITEM_ID_COLUMN).copied().unwrap_or(0);

        for row in self.scan(&template.type_id)? {
            if !is_live_row(&row) {
                continue;
            }
            let cells = template
                .fields
                .iter()
                .map(|field| {
                    positions
                        .get(field.key.as_str())
                        .and_then(|index| row.get(*index))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect();
            view.rows.push(TableViewRow {
                item_id: row.get(item_position).cloned().unwrap_or_default(),
                cells,
            });
        }
        Ok(view)
    }
}
