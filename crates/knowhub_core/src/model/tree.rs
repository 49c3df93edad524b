//! Arena-shaped folder tree assembled in memory.
//!
//! # Responsibility
//! - Link a flat folder list into a forest in a single pass keyed by id.
//! - Attach each note to the folder that directly contains it.
//!
//! # Invariants
//! - A folder whose parent is `None` or outside the loaded set is a root.
//! - Child and note order follows input order.

use super::folder::{Folder, FolderId};
use super::note::Note;
use std::collections::HashMap;

/// One folder plus its materialized children and notes.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderNode {
    pub folder: Folder,
    pub child_ids: Vec<FolderId>,
    pub notes: Vec<Note>,
}

/// Folder forest with ids as keys into a flat node map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderTree {
    nodes: HashMap<FolderId, FolderNode>,
    root_ids: Vec<FolderId>,
}

impl FolderTree {
    /// Builds the forest from every loaded folder and note.
    ///
    /// Notes whose folder is not in `folders` are ignored; root-level notes
    /// are listed separately by the repository.
    pub fn assemble(folders: Vec<Folder>, notes: Vec<Note>) -> Self {
        let order = folders.iter().map(|folder| folder.id).collect::<Vec<_>>();
        let mut nodes = folders
            .into_iter()
            .map(|folder| {
                (
                    folder.id,
                    FolderNode {
                        folder,
                        child_ids: Vec::new(),
                        notes: Vec::new(),
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        let mut root_ids = Vec::new();
        for id in order {
            let parent_id = nodes[&id].folder.parent_folder_id;
            match parent_id.filter(|parent| nodes.contains_key(parent)) {
                Some(parent) => {
                    if let Some(parent_node) = nodes.get_mut(&parent) {
                        parent_node.child_ids.push(id);
                    }
                }
                None => root_ids.push(id),
            }
        }

        for note in notes {
            if let Some(node) = note.folder_id.and_then(|id| nodes.get_mut(&id)) {
                node.notes.push(note);
            }
        }

        Self { nodes, root_ids }
    }

    pub fn root_ids(&self) -> &[FolderId] {
        &self.root_ids
    }

    pub fn roots(&self) -> impl Iterator<Item = &FolderNode> + '_ {
        self.root_ids.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn get(&self, id: FolderId) -> Option<&FolderNode> {
        self.nodes.get(&id)
    }

    pub fn children(&self, id: FolderId) -> impl Iterator<Item = &FolderNode> + '_ {
        self.nodes
            .get(&id)
            .map(|node| node.child_ids.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.nodes.get(child))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order walk from every root, yielding `(depth, node)`.
    pub fn walk(&self) -> Vec<(usize, &FolderNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = self
            .root_ids
            .iter()
            .rev()
            .map(|id| (0_usize, *id))
            .collect::<Vec<_>>();
        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push((depth, node));
            stack.extend(node.child_ids.iter().rev().map(|child| (depth + 1, *child)));
        }
        out
    }
}
