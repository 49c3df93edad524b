//! Capability shared by folders and notes in tree and search listings.

use super::folder::{Folder, FolderId};
use super::note::Note;

/// Identity, label and parent shared by every tree entry.
pub trait TreeItem {
    fn item_id(&self) -> i64;
    fn display_name(&self) -> &str;
    fn parent_id(&self) -> Option<FolderId>;
}

impl TreeItem for Folder {
    fn item_id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<FolderId> {
        self.parent_folder_id
    }
}

impl TreeItem for Note {
    fn item_id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.title
    }

    fn parent_id(&self) -> Option<FolderId> {
        self.folder_id
    }
}

/// Heterogeneous search hit.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Folder(Folder),
    Note(Note),
}

impl ContentItem {
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

impl TreeItem for ContentItem {
    fn item_id(&self) -> i64 {
        match self {
            Self::Folder(folder) => folder.item_id(),
            Self::Note(note) => note.item_id(),
        }
    }

    fn display_name(&self) -> &str {
        match self {
            Self::Folder(folder) => folder.display_name(),
            Self::Note(note) => note.display_name(),
        }
    }

    fn parent_id(&self) -> Option<FolderId> {
        match self {
            Self::Folder(folder) => folder.parent_id(),
            Self::Note(note) => note.parent_id(),
        }
    }
}
