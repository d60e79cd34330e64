use tracing::debug;

use super::error::{ConflictKind, StoreError};
use super::item::{
    ItemId, base_name, generate_id, join_path, now_utc, random_token, to_lower, validate_path,
};
use super::{Item, ItemKind, Store, StoreState};

enum Relocation {
    Copy,
    Move,
}

/// Validated source and destination of a copy or move.
struct Plan {
    source_id: ItemId,
    parent_id: ItemId,
    path_display: String,
}

impl Store {
    /// Deep-copies the item at `from` to `to`. The source is left untouched.
    pub fn copy(&self, from: &str, to: &str) -> Result<Item, StoreError> {
        let mut state = self.state.write();
        let plan = state.plan(from, to, Relocation::Copy)?;
        let item = state.copy_subtree(&plan);
        debug!(from, to = %item.path_display, "item copied");
        Ok(item)
    }

    pub fn move_item(&self, from: &str, to: &str) -> Result<Item, StoreError> {
        let mut state = self.state.write();
        let plan = state.plan(from, to, Relocation::Move)?;
        let item = state.move_subtree(&plan);
        debug!(from, to = %item.path_display, "item moved");
        Ok(item)
    }
}

impl StoreState {
    fn plan(&self, from: &str, to: &str, relocation: Relocation) -> Result<Plan, StoreError> {
        let to = validate_path(to)?;
        let source = self.resolve(from)?;
        if source.is_root() {
            return Err(StoreError::RootUnsupported);
        }
        if to.is_empty() {
            return Err(StoreError::Conflict {
                path: "/".to_string(),
                kind: ConflictKind::Folder,
            });
        }
        let target_lower = to_lower(to);
        if target_lower.starts_with(&format!("{}/", source.path_lower)) {
            return Err(StoreError::RelocationIntoSelf(to.to_string()));
        }

        let parent = self.parent_folder(to)?;
        let name = base_name(to);
        if let Some(existing) = self.find_child(&parent.id, name) {
            let renaming_itself = matches!(relocation, Relocation::Move) && existing.id == source.id;
            if !renaming_itself {
                return Err(StoreError::Conflict {
                    path: existing.path_display.clone(),
                    kind: existing.conflict_kind(),
                });
            }
        }

        Ok(Plan {
            source_id: source.id.clone(),
            parent_id: parent.id.clone(),
            path_display: join_path(&parent.path_display, name),
        })
    }

    /// Clones the source subtree in pre-order, so every clone's change id is
    /// greater than its parent's.
    fn copy_subtree(&mut self, plan: &Plan) -> Item {
        let now = now_utc();
        let mut stack = vec![(
            plan.source_id.clone(),
            plan.parent_id.clone(),
            plan.path_display.clone(),
        )];
        let mut copied_root = None;

        while let Some((source_id, parent_id, path_display)) = stack.pop() {
            let source = self.item(&source_id);
            let id = generate_id();
            for child_id in source.children.iter().rev() {
                let child_path = join_path(&path_display, &self.item(child_id).name);
                stack.push((child_id.clone(), id.clone(), child_path));
            }

            let mut clone = source.clone();
            clone.id = id;
            clone.parent_id = Some(parent_id);
            clone.children = Vec::new();
            clone.set_path(&path_display);
            if let ItemKind::File(file) = &mut clone.kind {
                file.rev = random_token();
                file.server_modified = now;
                self.space_used += file.size;
            }
            clone.change_id = self.next_change_id();
            if copied_root.is_none() {
                copied_root = Some(clone.clone());
            }
            self.link(clone);
        }

        copied_root.unwrap_or_else(|| panic!("copy of {:?} produced nothing", plan.source_id))
    }

    /// Tombstones the old path of the moved item only. Descendants keep their
    /// ids and change ids; only their paths are re-derived.
    fn move_subtree(&mut self, plan: &Plan) -> Item {
        let old = self.item(&plan.source_id).clone();
        self.push_tombstone(&old);
        self.unlink_from_parent(&old.id);
        self.paths.remove(&old.path_lower);

        let change_id = self.next_change_id();
        let item = self.item_mut(&old.id);
        item.parent_id = Some(plan.parent_id.clone());
        item.set_path(&plan.path_display);
        item.change_id = change_id;
        if let Some(file) = item.file_mut() {
            file.server_modified = now_utc();
        }
        let moved = item.clone();
        self.item_mut(&plan.parent_id).children.push(moved.id.clone());
        self.paths.insert(moved.path_lower.clone(), moved.id.clone());

        let mut stack: Vec<(ItemId, String)> = moved
            .children
            .iter()
            .map(|id| (id.clone(), moved.path_display.clone()))
            .collect();
        while let Some((id, parent_path)) = stack.pop() {
            let child = self.item_mut(&id);
            let old_lower = child.path_lower.clone();
            let path_display = join_path(&parent_path, &child.name);
            child.set_path(&path_display);
            let new_lower = child.path_lower.clone();
            stack.extend(
                child
                    .children
                    .iter()
                    .map(|grandchild| (grandchild.clone(), path_display.clone())),
            );
            self.paths.remove(&old_lower);
            self.paths.insert(new_lower, id);
        }

        moved
    }
}
