use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Kinds of files addressed by UUID under the records directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Template,
    Item,
    Table,
    Chunk,
}

impl EntityKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Item => "item",
            Self::Table => "table",
            Self::Chunk => "chunk",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Template | Self::Item => "json",
            Self::Table | Self::Chunk => "csv",
        }
    }
}

/// Maps ids to a three level, sixteen way shard tree so no directory grows unbounded.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/<hex0>/<hex1>/<hex2>` of the hyphen-free id.
    pub fn path_for(&self, id: &Uuid) -> PathBuf {
        let simple = id.simple().to_string();
        let mut path = self.root.clone();
        for shard in simple.chars().take(3) {
            path.push(shard.to_string());
        }
        path
    }

    pub fn file_for(&self, id: &Uuid, prefix: &str, extension: &str) -> PathBuf {
        self.path_for(id)
            .join(format!("{}-{}.{}", prefix, id.hyphenated(), extension))
    }

    pub fn entity_file(&self, id: &Uuid, kind: EntityKind) -> PathBuf {
        self.file_for(id, kind.prefix(), kind.extension())
    }
}
