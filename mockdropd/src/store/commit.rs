use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use super::error::StoreError;
use super::item::{
    FileData, Item, ItemKind, base_name, content_hash, generate_id, join_path, now_utc,
    random_token, to_lower, validate_path,
};
use super::{Store, StoreState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Add,
    Overwrite,
    /// Overwrite only if the stored revision still matches.
    Update(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub path: String,
    pub mode: WriteMode,
    pub autorename: bool,
    pub client_modified: Option<OffsetDateTime>,
}

impl CommitRequest {
    pub fn new(path: impl Into<String>, mode: WriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
            autorename: false,
            client_modified: None,
        }
    }

    pub fn autorename(mut self, autorename: bool) -> Self {
        self.autorename = autorename;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub item: Item,
    /// `true` when an existing file was replaced in place.
    pub updated: bool,
}

impl Store {
    /// Writes `content` to `request.path` following the write mode rules.
    pub fn commit_file(
        &self,
        request: &CommitRequest,
        content: &[u8],
    ) -> Result<CommitOutcome, StoreError> {
        let path = validate_path(&request.path)?;
        if path.is_empty() {
            return Err(StoreError::RootUnsupported);
        }
        let mut state = self.state.write();
        let parent_id = state.parent_folder(path)?.id.clone();
        let outcome = state.commit_file(&parent_id, path, request, content)?;
        debug!(
            path = %outcome.item.path_display,
            change_id = outcome.item.change_id,
            updated = outcome.updated,
            "file committed"
        );
        Ok(outcome)
    }
}

impl StoreState {
    pub(super) fn commit_file(
        &mut self,
        parent_id: &str,
        path: &str,
        request: &CommitRequest,
        content: &[u8],
    ) -> Result<CommitOutcome, StoreError> {
        let name = base_name(path);
        let hash = content_hash(content);

        let mut target_name = name.to_string();
        if let Some(existing) = self.find_child(parent_id, name) {
            let Some(file) = existing.file() else {
                return Err(StoreError::Conflict {
                    path: existing.path_display.clone(),
                    kind: existing.conflict_kind(),
                });
            };
            let replace = match &request.mode {
                WriteMode::Overwrite => true,
                WriteMode::Update(rev) => *rev == file.rev || file.content_hash == hash,
                WriteMode::Add => file.content_hash == hash,
            };
            if replace {
                let id = existing.id.clone();
                let item = self.update_file(&id, content, hash, request.client_modified);
                return Ok(CommitOutcome {
                    item,
                    updated: true,
                });
            }
            if !request.autorename {
                return Err(StoreError::Conflict {
                    path: existing.path_display.clone(),
                    kind: existing.conflict_kind(),
                });
            }
            target_name = self.unused_name(parent_id, name)?;
        }

        let now = now_utc();
        let path_display = join_path(&self.item(parent_id).path_display, &target_name);
        let size = content.len() as u64;
        let item = Item {
            id: generate_id(),
            parent_id: Some(parent_id.to_string()),
            name: target_name,
            path_lower: to_lower(&path_display),
            path_display,
            kind: ItemKind::File(FileData {
                content: Arc::from(content),
                content_hash: hash,
                size,
                rev: random_token(),
                client_modified: request.client_modified.unwrap_or(now),
                server_modified: now,
            }),
            children: Vec::new(),
            change_id: self.next_change_id(),
        };
        self.space_used += size;
        self.link(item.clone());
        Ok(CommitOutcome {
            item,
            updated: false,
        })
    }

    fn update_file(
        &mut self,
        id: &str,
        content: &[u8],
        hash: String,
        client_modified: Option<OffsetDateTime>,
    ) -> Item {
        let change_id = self.next_change_id();
        let now = now_utc();
        let size = content.len() as u64;
        let item = self.item_mut(id);
        item.change_id = change_id;
        let mut previous_size = 0;
        if let Some(file) = item.file_mut() {
            previous_size = file.size;
            file.content = Arc::from(content);
            file.content_hash = hash;
            file.size = size;
            file.rev = random_token();
            file.client_modified = client_modified.unwrap_or(now);
            file.server_modified = now;
        }
        let item = item.clone();
        self.space_used = self.space_used.saturating_sub(previous_size) + size;
        item
    }

    /// First of `name (1)`, `name (2)`, ... not taken under `parent_id`. The
    /// suffix goes before the extension.
    fn unused_name(&self, parent_id: &str, name: &str) -> Result<String, StoreError> {
        for n in 1..=self.config.autorename_limit {
            let candidate = numbered_name(name, n);
            if self.find_child(parent_id, &candidate).is_none() {
                return Ok(candidate);
            }
        }
        Err(StoreError::RenameExhausted(join_path(
            &self.item(parent_id).path_display,
            name,
        )))
    }
}

fn numbered_name(name: &str, n: u32) -> String {
    if let Some((stem, ext)) = name.rsplit_once('.')
        && !stem.is_empty()
    {
        return format!("{stem} ({n}).{ext}");
    }
    format!("{name} ({n})")
}
