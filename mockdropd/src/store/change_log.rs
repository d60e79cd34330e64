use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

use super::error::StoreError;
use super::item::{Item, Tombstone};
use super::{Store, StoreState};

/// Position in a folder's change feed. Serialized as base64 JSON so clients
/// treat it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cursor {
    pub path: String,
    pub recursive: bool,
    pub last_change_id: u64,
}

impl Cursor {
    pub fn new(path: impl Into<String>, recursive: bool, last_change_id: u64) -> Self {
        Self {
            path: path.into(),
            recursive,
            last_change_id,
        }
    }

    pub fn encode(&self) -> String {
        let payload = json!({
            "path": self.path,
            "recursive": self.recursive,
            "last_change_id": self.last_change_id,
        });
        BASE64.encode(payload.to_string())
    }

    pub fn decode(token: &str) -> Result<Self, StoreError> {
        let data = BASE64
            .decode(token)
            .map_err(|err| StoreError::InvalidCursor(err.to_string()))?;
        serde_json::from_slice(&data).map_err(|err| StoreError::InvalidCursor(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEntry {
    Item(Item),
    Deleted(Tombstone),
}

impl ChangeEntry {
    pub fn change_id(&self) -> u64 {
        match self {
            ChangeEntry::Item(item) => item.change_id,
            ChangeEntry::Deleted(tombstone) => tombstone.change_id,
        }
    }

    pub fn path_lower(&self) -> &str {
        match self {
            ChangeEntry::Item(item) => &item.path_lower,
            ChangeEntry::Deleted(tombstone) => &tombstone.path_lower,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFolderPage {
    pub entries: Vec<ChangeEntry>,
    pub cursor: String,
    pub has_more: bool,
}

impl Store {
    pub fn list_folder(&self, path: &str, recursive: bool) -> Result<ListFolderPage, StoreError> {
        self.state
            .read()
            .list_folder(&Cursor::new(path, recursive, 0))
    }

    /// Changes since `cursor` was issued. A token that does not decode is
    /// `InvalidCursor`; one whose folder has since disappeared is `NotFound`.
    pub fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage, StoreError> {
        let cursor = Cursor::decode(cursor)?;
        self.state.read().list_folder(&cursor)
    }
}

impl StoreState {
    /// One page holding everything under the cursor's folder changed after
    /// `last_change_id`, ordered by change id. Continuations also receive
    /// every tombstone newer than the cursor, wherever it was deleted.
    fn list_folder(&self, cursor: &Cursor) -> Result<ListFolderPage, StoreError> {
        let folder = self.resolve(&cursor.path)?;
        if !folder.is_folder() {
            return Err(StoreError::NotFolder(folder.path_display.clone()));
        }
        let since = cursor.last_change_id;

        let candidates = if cursor.recursive {
            self.subtree_ids(&folder.id)
        } else {
            folder.children.clone()
        };
        let mut entries: Vec<ChangeEntry> = candidates
            .iter()
            .map(|id| self.item(id))
            .filter(|item| !item.is_root() && item.change_id > since)
            .cloned()
            .map(ChangeEntry::Item)
            .collect();

        if since != 0 {
            entries.extend(
                self.tombstones
                    .iter()
                    .filter(|tombstone| tombstone.change_id > since)
                    .cloned()
                    .map(ChangeEntry::Deleted),
            );
        }
        entries.sort_by_key(ChangeEntry::change_id);

        let next = Cursor::new(cursor.path.clone(), cursor.recursive, self.current_change_id);
        Ok(ListFolderPage {
            entries,
            cursor: next.encode(),
            has_more: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = Cursor::new("/Docs/Ünïcode", true, 42);
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn corrupted_cursor_is_invalid() {
        assert!(matches!(
            Cursor::decode("invalid"),
            Err(StoreError::InvalidCursor(_))
        ));
        let not_json = BASE64.encode("not json");
        assert!(matches!(
            Cursor::decode(&not_json),
            Err(StoreError::InvalidCursor(_))
        ));
        let wrong_shape = BASE64.encode(r#"{"path": "/a"}"#);
        assert!(matches!(
            Cursor::decode(&wrong_shape),
            Err(StoreError::InvalidCursor(_))
        ));
    }
}
