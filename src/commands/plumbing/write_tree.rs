use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeBuilder};
use crate::errors::{Error, Result};

impl Repository {
    /// Store the trees described by the resolved index entries and return the root id
    ///
    /// Fails with `Conflict` while any path has conflict stages.
    pub fn write_tree(&self) -> Result<ObjectId> {
        let mut index = self.lock_index();
        index.rehydrate()?;

        self.write_index_tree(&index)
    }

    pub(crate) fn write_index_tree(&self, index: &Index) -> Result<ObjectId> {
        if index.has_conflicts() {
            let paths = index.conflicted_paths().into_iter().collect();
            return Err(Error::conflict("cannot write a tree with unresolved conflicts", paths));
        }

        let builder = TreeBuilder::build(
            index
                .merged_entries()
                .map(|entry| (entry.name.as_path(), entry.as_database_entry())),
        )?;
        let tree_id = builder.write(&mut |tree: &Tree| self.database().store(tree))?;

        tracing::debug!(%tree_id, entries = index.len(), "wrote index tree");
        Ok(tree_id)
    }
}
