//! In-memory file tree for one tenant.
//!
//! Items live in a flat id-keyed map; parent and children are stored as id
//! references, with a second index from lower-cased path to id. Every
//! mutation draws its change id from one counter, so change ids are unique
//! and strictly increasing across items and tombstones alike.
//!
//! All state sits behind a single `RwLock`. Lookups and listings take the
//! read side, every mutation the write side, so path resolution and the
//! change it guards are applied atomically. There is no per-subtree
//! locking: writers on unrelated paths still serialize.

mod change_log;
mod commit;
mod error;
mod item;
mod relocation;
mod session;

use std::collections::HashMap;

use mockdrop_core::ByteSpan;
use parking_lot::RwLock;
use tracing::debug;

pub use change_log::{ChangeEntry, Cursor, ListFolderPage};
pub use commit::{CommitOutcome, CommitRequest, WriteMode};
pub use error::{ConflictKind, StoreError};
pub use item::{FileData, Item, ItemId, ItemKind, Tombstone, content_hash, to_lower};
pub use session::UploadSession;

use item::{base_name, generate_id, join_path, normalize_path, parent_path, validate_path};

pub const DEFAULT_SPACE_ALLOCATED: u64 = 2 * 1024 * 1024 * 1024;
pub const DEFAULT_AUTORENAME_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub space_allocated: u64,
    pub autorename_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            space_allocated: DEFAULT_SPACE_ALLOCATED,
            autorename_limit: DEFAULT_AUTORENAME_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceUsage {
    pub used: u64,
    pub allocated: u64,
}

pub struct Store {
    state: RwLock<StoreState>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            state: RwLock::new(StoreState::new(config)),
        }
    }

    pub fn current_change_id(&self) -> u64 {
        self.state.read().current_change_id
    }

    pub fn space_usage(&self) -> SpaceUsage {
        let state = self.state.read();
        SpaceUsage {
            used: state.space_used,
            allocated: state.config.space_allocated,
        }
    }

    /// Looks up any live item, the root included.
    pub fn resolve(&self, path: &str) -> Result<Item, StoreError> {
        self.state.read().resolve(path).cloned()
    }

    pub fn get_metadata(&self, path: &str) -> Result<Item, StoreError> {
        let state = self.state.read();
        let item = state.resolve(path)?;
        if item.is_root() {
            return Err(StoreError::RootUnsupported);
        }
        Ok(item.clone())
    }

    pub fn create_folder(&self, path: &str) -> Result<Item, StoreError> {
        let path = validate_path(path)?;
        if path.is_empty() {
            return Err(StoreError::Conflict {
                path: "/".to_string(),
                kind: ConflictKind::Folder,
            });
        }
        let mut state = self.state.write();
        let parent_id = state.parent_folder(path)?.id.clone();
        let item = state.create_folder(&parent_id, path)?;
        debug!(path = %item.path_display, change_id = item.change_id, "folder created");
        Ok(item)
    }

    /// Deletes the item at `path` and everything below it. Returns the
    /// item as it was just before deletion.
    pub fn delete(&self, path: &str) -> Result<Item, StoreError> {
        let mut state = self.state.write();
        let id = state.resolve(path)?.id.clone();
        let item = state.delete(&id)?;
        debug!(
            path = %item.path_display,
            change_id = state.current_change_id,
            "item deleted"
        );
        Ok(item)
    }

    /// Reads a file, optionally restricted to an inclusive byte span.
    pub fn download(
        &self,
        path: &str,
        span: Option<ByteSpan>,
    ) -> Result<(Item, Vec<u8>), StoreError> {
        let state = self.state.read();
        let item = state.resolve(path)?;
        let Some(file) = item.file() else {
            return Err(StoreError::NotFile(item.path_display.clone()));
        };
        let data = match span {
            None => file.content.to_vec(),
            Some(span) => {
                if span.start > span.end || span.end >= file.size {
                    return Err(StoreError::InvalidRange {
                        start: span.start,
                        end: span.end,
                        size: file.size,
                    });
                }
                file.content[span.start as usize..=span.end as usize].to_vec()
            }
        };
        Ok((item.clone(), data))
    }

    /// Every deletion recorded so far, oldest first.
    pub fn tombstones(&self) -> Vec<Tombstone> {
        self.state.read().tombstones.clone()
    }
}

pub(crate) struct StoreState {
    config: StoreConfig,
    items: HashMap<ItemId, Item>,
    paths: HashMap<String, ItemId>,
    tombstones: Vec<Tombstone>,
    sessions: HashMap<String, UploadSession>,
    current_change_id: u64,
    space_used: u64,
}

impl StoreState {
    fn new(config: StoreConfig) -> Self {
        let root = Item::root();
        let mut items = HashMap::new();
        let mut paths = HashMap::new();
        paths.insert(root.path_lower.clone(), root.id.clone());
        items.insert(root.id.clone(), root);
        Self {
            config,
            items,
            paths,
            tombstones: Vec::new(),
            sessions: HashMap::new(),
            current_change_id: 0,
            space_used: 0,
        }
    }

    fn next_change_id(&mut self) -> u64 {
        self.current_change_id += 1;
        self.current_change_id
    }

    fn item(&self, id: &str) -> &Item {
        self.items
            .get(id)
            .unwrap_or_else(|| panic!("store index out of sync: unknown item id {id:?}"))
    }

    fn item_mut(&mut self, id: &str) -> &mut Item {
        self.items
            .get_mut(id)
            .unwrap_or_else(|| panic!("store index out of sync: unknown item id {id:?}"))
    }

    fn resolve(&self, path: &str) -> Result<&Item, StoreError> {
        let path = validate_path(path)?;
        let id = self
            .paths
            .get(&to_lower(path))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(self.item(id))
    }

    /// The folder that would own `path`.
    fn parent_folder(&self, path: &str) -> Result<&Item, StoreError> {
        let parent = self.resolve(parent_path(normalize_path(path)))?;
        if !parent.is_folder() {
            return Err(StoreError::NotFolder(parent.path_display.clone()));
        }
        Ok(parent)
    }

    /// Child of `parent_id` whose name matches `name` case-insensitively.
    fn find_child(&self, parent_id: &str, name: &str) -> Option<&Item> {
        let name_lower = to_lower(name);
        self.item(parent_id)
            .children
            .iter()
            .map(|id| self.item(id))
            .find(|child| to_lower(&child.name) == name_lower)
    }

    /// Registers a new item in both indices and under its parent.
    fn link(&mut self, item: Item) {
        let parent_id = item
            .parent_id
            .clone()
            .unwrap_or_else(|| panic!("cannot link parent-less item {:?}", item.id));
        self.item_mut(&parent_id).children.push(item.id.clone());
        self.paths.insert(item.path_lower.clone(), item.id.clone());
        self.items.insert(item.id.clone(), item);
    }

    fn unlink_from_parent(&mut self, id: &str) {
        let Some(parent_id) = self.item(id).parent_id.clone() else {
            return;
        };
        let siblings = &mut self.item_mut(&parent_id).children;
        let position = siblings
            .iter()
            .position(|child| child == id)
            .unwrap_or_else(|| panic!("store index out of sync: {id:?} missing from its parent"));
        siblings.remove(position);
    }

    fn push_tombstone(&mut self, item: &Item) {
        let change_id = self.next_change_id();
        self.tombstones.push(Tombstone {
            name: item.name.clone(),
            path_display: item.path_display.clone(),
            path_lower: item.path_lower.clone(),
            change_id,
        });
    }

    /// `id` followed by all its descendants, depth-first pre-order.
    fn subtree_ids(&self, id: &str) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(next) = stack.pop() {
            stack.extend(self.item(&next).children.iter().rev().cloned());
            out.push(next);
        }
        out
    }

    fn create_folder(&mut self, parent_id: &str, path: &str) -> Result<Item, StoreError> {
        let name = base_name(path);
        if let Some(existing) = self.find_child(parent_id, name) {
            return Err(StoreError::Conflict {
                path: existing.path_display.clone(),
                kind: existing.conflict_kind(),
            });
        }
        let path_display = join_path(&self.item(parent_id).path_display, name);
        let item = Item {
            id: generate_id(),
            parent_id: Some(parent_id.to_string()),
            name: name.to_string(),
            path_lower: to_lower(&path_display),
            path_display,
            kind: ItemKind::Folder,
            children: Vec::new(),
            change_id: self.next_change_id(),
        };
        self.link(item.clone());
        Ok(item)
    }

    fn delete(&mut self, id: &str) -> Result<Item, StoreError> {
        let item = self.item(id).clone();
        if item.is_root() {
            return Err(StoreError::RootUnsupported);
        }
        let doomed = self.subtree_ids(id);
        self.unlink_from_parent(id);
        for node_id in doomed {
            let node = self
                .items
                .remove(&node_id)
                .unwrap_or_else(|| panic!("store index out of sync: {node_id:?} vanished"));
            self.paths.remove(&node.path_lower);
            if let Some(file) = node.file() {
                self.space_used = self.space_used.saturating_sub(file.size);
            }
            self.push_tombstone(&node);
        }
        Ok(item)
    }

    #[cfg(test)]
    fn check_consistency(&self) -> Result<(), String> {
        for (id, item) in &self.items {
            if self.paths.get(&item.path_lower) != Some(id) {
                return Err(format!("{} is not indexed by path", item.path_display));
            }
            if item.path_lower != to_lower(&item.path_display) {
                return Err(format!("{} has a stale lower path", item.path_display));
            }
            if let Some(parent_id) = &item.parent_id {
                let parent = self
                    .items
                    .get(parent_id)
                    .ok_or_else(|| format!("{} has no parent", item.path_display))?;
                let count = parent.children.iter().filter(|c| *c == id).count();
                if count != 1 {
                    return Err(format!(
                        "{} appears {count} times under its parent",
                        item.path_display
                    ));
                }
                if item.path_display != join_path(&parent.path_display, &item.name) {
                    return Err(format!("{} is not under its parent", item.path_display));
                }
            }
        }
        if self.paths.len() != self.items.len() {
            return Err("path index holds retired entries".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
