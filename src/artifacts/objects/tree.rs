//! Git tree object
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs),
//! subdirectories (other trees), symlinks and submodule commits, along with their names
//! and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are kept in canonical git order: names compare byte-wise, with
//! directory names compared as if they ended in `/`. Two trees holding the same
//! entry set always encode to the same bytes, whatever order they were built in.
//!
//! ## Tree Building
//!
//! [`TreeBuilder`] turns a flat list of index paths into nested trees, and
//! stores them children first, since a parent needs its children's ids.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::{EntryKind, EntryMode};
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Component, Path};

/// A named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    pub name: String,
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, oid: ObjectId, mode: EntryMode) -> Self {
        TreeEntry {
            name: name.into(),
            oid,
            mode,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.mode.kind()
    }

    pub fn as_database_entry(&self) -> DatabaseEntry {
        DatabaseEntry::new(self.oid, self.mode)
    }

    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// Git tree object representing a directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries given in any order
    ///
    /// Fails on duplicate or malformed names.
    pub fn from_entries(entries: impl IntoIterator<Item = TreeEntry>) -> Result<Self> {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        entries.sort_by_key(|entry| entry.sort_key());

        let mut names = entries.iter().map(|entry| &entry.name).collect::<Vec<_>>();
        names.sort();
        if let Some(duplicate) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::invalid(format!(
                "duplicate tree entry name: {}",
                duplicate[0]
            )));
        }

        Ok(Tree { entries })
    }

    pub fn entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = TreeEntry> {
        self.entries.into_iter()
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::invalid(format!("invalid tree entry name: {name:?}")));
    }
    Ok(())
}

impl Packable for Tree {
    fn serialize_payload(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for entry in &self.entries {
            let header = format!("{} {}", entry.mode.as_str(), entry.name);
            content_bytes.write_all(header.as_bytes())?;
            content_bytes.push(0);
            entry.oid.write_raw_to(&mut content_bytes)?;
        }

        Ok(Bytes::from(content_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                anyhow::bail!("unexpected EOF in mode");
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                anyhow::bail!("unexpected EOF in name");
            }
            let name = std::str::from_utf8(&name_bytes)?.to_owned();

            let oid = ObjectId::read_raw_from(&mut reader).context("unexpected EOF in object id")?;

            entries.push(TreeEntry::new(name, oid, mode));
        }

        Ok(Tree::from_entries(entries)?)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let object_type = match entry.kind() {
                    EntryKind::Blob => ObjectType::Blob,
                    EntryKind::Tree => ObjectType::Tree,
                    EntryKind::Commit => ObjectType::Commit,
                };
                format!(
                    "{:0>6} {} {}\t{}",
                    entry.mode.as_str(),
                    object_type,
                    entry.oid,
                    entry.name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Nested tree under construction from flat paths
#[derive(Debug, Default)]
pub struct TreeBuilder {
    files: BTreeMap<String, DatabaseEntry>,
    directories: BTreeMap<String, TreeBuilder>,
}

impl TreeBuilder {
    /// Build the nested structure from `(path, entry)` pairs
    ///
    /// A path that is both a file and a directory prefix is rejected.
    pub fn build<'p>(entries: impl IntoIterator<Item = (&'p Path, DatabaseEntry)>) -> Result<Self> {
        let mut root = Self::default();

        for (path, entry) in entries {
            let components = path
                .components()
                .map(|component| match component {
                    Component::Normal(name) => name
                        .to_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::invalid(format!("non UTF-8 path: {path:?}"))),
                    _ => Err(Error::invalid(format!("path is not relative: {path:?}"))),
                })
                .collect::<Result<Vec<_>>>()?;

            root.add_entry(&components, entry)
                .map_err(|_| Error::invalid(format!("path collides with a directory: {path:?}")))?;
        }

        Ok(root)
    }

    fn add_entry(&mut self, components: &[String], entry: DatabaseEntry) -> Result<()> {
        match components {
            [] => Err(Error::invalid("empty path")),
            [name] => {
                if self.directories.contains_key(name) {
                    return Err(Error::invalid(name));
                }
                self.files.insert(name.clone(), entry);
                Ok(())
            }
            [parent, rest @ ..] => {
                if self.files.contains_key(parent) {
                    return Err(Error::invalid(parent));
                }
                self.directories
                    .entry(parent.clone())
                    .or_default()
                    .add_entry(rest, entry)
            }
        }
    }

    /// Store every nested tree children first, returning the root tree id
    pub fn write<F>(&self, store: &mut F) -> Result<ObjectId>
    where
        F: FnMut(&Tree) -> Result<ObjectId>,
    {
        let mut entries = self
            .files
            .iter()
            .map(|(name, entry)| TreeEntry::new(name.clone(), entry.oid, entry.mode))
            .collect::<Vec<_>>();

        for (name, directory) in &self.directories {
            let oid = directory.write(store)?;
            entries.push(TreeEntry::new(name.clone(), oid, EntryMode::Directory));
        }

        store(&Tree::from_entries(entries)?)
    }
}
