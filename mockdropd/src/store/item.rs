use std::sync::Arc;

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::error::{ConflictKind, StoreError};

const RANDOM_TOKEN_LEN: usize = 22;
const HASH_BLOCK_SIZE: usize = 4 * 1024 * 1024;

pub type ItemId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    pub content: Arc<[u8]>,
    pub content_hash: String,
    pub size: u64,
    pub rev: String,
    pub client_modified: OffsetDateTime,
    pub server_modified: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File(FileData),
}

/// A live node of the hierarchy. Parent and children are ids into the
/// store's flat index; `parent_id` is a lookup relation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub parent_id: Option<ItemId>,
    pub name: String,
    pub path_display: String,
    pub path_lower: String,
    pub kind: ItemKind,
    pub children: Vec<ItemId>,
    pub change_id: u64,
}

impl Item {
    pub(crate) fn root() -> Self {
        Self {
            id: String::new(),
            parent_id: None,
            name: String::new(),
            path_display: String::new(),
            path_lower: String::new(),
            kind: ItemKind::Folder,
            children: Vec::new(),
            change_id: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder)
    }

    pub fn file(&self) -> Option<&FileData> {
        match &self.kind {
            ItemKind::File(file) => Some(file),
            ItemKind::Folder => None,
        }
    }

    pub(crate) fn conflict_kind(&self) -> ConflictKind {
        if self.is_folder() {
            ConflictKind::Folder
        } else {
            ConflictKind::File
        }
    }

    pub(crate) fn file_mut(&mut self) -> Option<&mut FileData> {
        match &mut self.kind {
            ItemKind::File(file) => Some(file),
            ItemKind::Folder => None,
        }
    }

    /// Moves the item to `path_display` without touching its change id.
    pub(crate) fn set_path(&mut self, path_display: &str) {
        self.name = base_name(path_display).to_string();
        self.path_display = path_display.to_string();
        self.path_lower = to_lower(path_display);
    }
}

/// Permanent record of a deletion. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub name: String,
    pub path_display: String,
    pub path_lower: String,
    pub change_id: u64,
}

pub fn generate_id() -> ItemId {
    format!("id:{}", random_token())
}

/// 22 random ASCII letters, used for revisions and upload session ids.
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(u8::is_ascii_alphabetic)
        .take(RANDOM_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Dropbox-style content hash: SHA-256 over the concatenated SHA-256 digests
/// of every 4 MiB block, hex encoded.
pub fn content_hash(data: &[u8]) -> String {
    let mut overall = Sha256::new();
    for block in data.chunks(HASH_BLOCK_SIZE) {
        overall.update(Sha256::digest(block));
    }
    format!("{:x}", overall.finalize())
}

/// Drops a single trailing separator: `/a/` and `/a` name the same item.
pub fn normalize_path(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

pub fn to_lower(path: &str) -> String {
    path.to_lowercase()
}

pub fn validate_path(path: &str) -> Result<&str, StoreError> {
    let normalized = normalize_path(path);
    if normalized.is_empty() {
        return Ok(normalized);
    }
    let Some(rest) = normalized.strip_prefix('/') else {
        return Err(StoreError::MalformedPath(path.to_string()));
    };
    let valid = rest
        .split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(normalized)
    } else {
        Err(StoreError::MalformedPath(path.to_string()))
    }
}

/// Parent of a normalized path; the root's children have parent `""`.
pub fn parent_path(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    }
}

pub fn base_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) => name,
        None => path,
    }
}

pub fn join_path(parent: &str, name: &str) -> String {
    format!("{parent}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_paths() {
        assert_eq!(validate_path("").unwrap(), "");
        assert_eq!(validate_path("/").unwrap(), "");
        assert_eq!(validate_path("/Docs/").unwrap(), "/Docs");
        assert!(matches!(
            validate_path("Docs"),
            Err(StoreError::MalformedPath(_))
        ));
        assert!(validate_path("/a//b").is_err());
        assert!(validate_path("/a/../b").is_err());
    }

    #[test]
    fn splits_paths() {
        assert_eq!(parent_path("/Docs/A.txt"), "/Docs");
        assert_eq!(parent_path("/Docs"), "");
        assert_eq!(base_name("/Docs/A.txt"), "A.txt");
        assert_eq!(join_path("", "Docs"), "/Docs");
    }

    #[test]
    fn generates_prefixed_ids() {
        let id = generate_id();
        assert!(id.starts_with("id:"));
        assert_eq!(id.len(), 3 + RANDOM_TOKEN_LEN);
        assert!(id[3..].chars().all(|c| c.is_ascii_alphabetic()));
        assert_ne!(generate_id(), id);
    }

    #[test]
    fn content_hash_of_empty_input_is_hash_of_nothing() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash(b"123"), content_hash(b"124"));
        assert_eq!(content_hash(b"123"), content_hash(b"123"));
    }
}
