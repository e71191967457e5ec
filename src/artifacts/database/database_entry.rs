use crate::artifacts::index::entry_mode::{EntryKind, EntryMode};
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;

/// An object reference together with the mode it is recorded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct DatabaseEntry {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl DatabaseEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    pub fn kind(&self) -> EntryKind {
        self.mode.kind()
    }
}
