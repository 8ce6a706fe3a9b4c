pub mod config;
pub mod errors;
pub mod models;
pub mod paths;
pub mod records;
pub mod store;
pub mod table;
pub mod trash;
pub mod tree;

pub use crate::config::StoreConfig;
pub use crate::errors::{StoreError, StoreResult};
pub use crate::models::{
    CreateTemplateRequest, ExpandedNode, Field, FieldDraft, FieldType, FieldValues, Item, ItemField,
    StoreInfo, TableRow, TableView, Template, TrashKind, TreeNode,
};
pub use crate::store::KanectaStore;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// JSON logs to `<log_dir>/kanecta.log`, rotated daily. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "kanecta.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
