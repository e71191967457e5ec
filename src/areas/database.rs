//! Loose object database
//!
//! Objects are content addressed: the id is the SHA-1 of the canonical
//! encoding `"<type> <len>\0<payload>"`. Each object lives zlib-compressed at
//! `objects/<2 hex>/<38 hex>`; the database is append-only.
//!
//! Writers of the same id are serialized through a fixed set of lock stripes
//! keyed by the id, so unrelated objects are written concurrently. A write
//! lands in a temp file next to its final name and is renamed into place, so
//! readers never observe a partial object.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{
    Object, ObjectBox, RawObject, Unpackable, encode_with_header,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use fake::rand;
use parking_lot::Mutex;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

const LOCK_STRIPES: usize = 64;

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
    stripes: Box<[Mutex<()>]>,
}

// TODO: read objects from packfiles once fetch support lands
impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Database {
            path: path.into().into_boxed_path(),
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Compute the id `put` would assign, without storing anything
    pub fn hash_object(kind: ObjectType, data: &[u8]) -> ObjectId {
        ObjectId::hash(&encode_with_header(kind, data))
    }

    /// Store a payload of the given kind and return its id
    ///
    /// Idempotent: storing existing content is a no-op that returns the same id.
    pub fn put(&self, kind: ObjectType, data: &[u8]) -> Result<ObjectId> {
        if !kind.is_loose() {
            return Err(Error::invalid(format!("{kind} objects cannot be stored loose")));
        }

        let object_content = encode_with_header(kind, data);
        let object_id = ObjectId::hash(&object_content);
        let object_path = self.path.join(object_id.to_path());

        let _guard = self.stripe(&object_id).lock();
        if object_path.exists() {
            tracing::trace!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        self.write_object(&object_path, object_content)?;
        tracing::debug!(oid = %object_id, kind = %kind, size = data.len(), "stored object");

        Ok(object_id)
    }

    /// Encode and store a typed object
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        let payload = object.serialize_payload()?;
        self.put(object.object_type(), &payload)
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Load and verify an object
    ///
    /// Fails with `NotFound` when absent and `Corrupt` when the stored bytes
    /// do not inflate, carry a malformed header or hash to a different id.
    pub fn get(&self, object_id: &ObjectId) -> Result<RawObject> {
        let object_path = self.path.join(object_id.to_path());
        let compressed = match std::fs::read(&object_path) {
            Ok(compressed) => compressed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!("object {object_id}")));
            }
            Err(e) => {
                return Err(e).with_io_context(|| {
                    format!("Unable to read object file {}", object_path.display())
                });
            }
        };

        let object_content =
            Self::decompress(&compressed).map_err(|e| self.corrupt(object_id, e))?;

        if ObjectId::hash(&object_content) != *object_id {
            return Err(self.corrupt(object_id, "content digest does not match id"));
        }

        let mut reader = Cursor::new(&object_content[..]);
        let (kind, size) =
            ObjectType::parse_header(&mut reader).map_err(|e| self.corrupt(object_id, e))?;
        let payload = object_content.slice(reader.position() as usize..);

        if payload.len() != size {
            return Err(self.corrupt(
                object_id,
                format!("declared size {size} but payload has {} bytes", payload.len()),
            ));
        }
        if !kind.is_loose() {
            return Err(self.corrupt(object_id, format!("{kind} stored as a loose object")));
        }

        tracing::trace!(oid = %object_id, kind = %kind, "loaded object");
        Ok(RawObject::new(kind, payload))
    }

    pub fn get_object_type(&self, object_id: &ObjectId) -> Result<ObjectType> {
        Ok(self.get(object_id)?.kind)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> Result<ObjectBox> {
        self.get(object_id)?
            .decode()
            .map_err(|e| self.corrupt(object_id, e))
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> Result<Option<Blob>> {
        self.parse_as(object_id, ObjectType::Blob)
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> Result<Option<Tree>> {
        self.parse_as(object_id, ObjectType::Tree)
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> Result<Option<Commit>> {
        self.parse_as(object_id, ObjectType::Commit)
    }

    pub fn parse_object_as_tag(&self, object_id: &ObjectId) -> Result<Option<Tag>> {
        self.parse_as(object_id, ObjectType::Tag)
    }

    /// Load a tree, failing when the id names another kind of object
    pub fn load_tree(&self, object_id: &ObjectId) -> Result<Tree> {
        self.parse_object_as_tree(object_id)?
            .ok_or_else(|| Error::invalid(format!("{object_id} is not a tree")))
    }

    /// Peel a commit or tag down to the tree it records
    pub fn peel_to_tree(&self, object_id: &ObjectId) -> Result<ObjectId> {
        let mut current = *object_id;
        loop {
            match self.parse_object(&current)? {
                ObjectBox::Tree(_) => return Ok(current),
                ObjectBox::Commit(commit) => return Ok(*commit.tree_oid()),
                ObjectBox::Tag(tag) => current = *tag.target(),
                ObjectBox::Blob(_) => {
                    return Err(Error::invalid(format!("{object_id} does not name a tree")));
                }
            }
        }
    }

    fn parse_as<T: Unpackable>(&self, object_id: &ObjectId, kind: ObjectType) -> Result<Option<T>> {
        let raw = self.get(object_id)?;
        if raw.kind != kind {
            return Ok(None);
        }

        T::deserialize(Cursor::new(raw.data))
            .map(Some)
            .map_err(|e| self.corrupt(object_id, e))
    }

    fn corrupt(&self, object_id: &ObjectId, reason: impl std::fmt::Display) -> Error {
        tracing::warn!(oid = %object_id, %reason, "corrupt object");
        Error::corrupt(object_id, reason)
    }

    fn stripe(&self, object_id: &ObjectId) -> &Mutex<()> {
        let bytes = object_id.as_bytes();
        let slot = u16::from_be_bytes([bytes[0], bytes[1]]) as usize % self.stripes.len();
        &self.stripes[slot]
    }

    fn write_object(&self, object_path: &Path, object_content: Bytes) -> Result<()> {
        let object_dir = object_path
            .parent()
            .ok_or_else(|| Error::invalid(format!("Invalid object path {}", object_path.display())))?;
        std::fs::create_dir_all(object_dir).with_io_context(|| {
            format!("Unable to create object directory {}", object_dir.display())
        })?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let object_content = Self::compress(&object_content)
            .with_io_context(|| "Unable to compress object content")?;

        let result = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .and_then(|mut file| {
                file.write_all(&object_content)?;
                file.sync_all()
            })
            .and_then(|_| std::fs::rename(&temp_object_path, object_path));

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_object_path);
        }

        result.with_io_context(|| format!("Unable to write object file {}", object_path.display()))
    }

    fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(data: &[u8]) -> std::io::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed_content = Vec::new();
        decoder.read_to_end(&mut decompressed_content)?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}-{}", std::process::id(), rand::random::<u64>())
    }

    /// Find all objects whose id starts with the given hex prefix
    ///
    /// Used to resolve abbreviated ids. More than one match means the prefix is
    /// ambiguous.
    ///
    /// # Performance
    ///
    /// - For prefixes of 2+ characters, only searches the specific directory
    /// - For prefixes of 0-1 characters, must search all directories (slower)
    pub fn find_objects_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid(format!("invalid object id prefix: {prefix}")));
        }

        let directories = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{i:02x}")).collect()
        };

        let mut matches = Vec::new();
        for dir_name in directories {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            let entries = std::fs::read_dir(&dir_path)
                .with_io_context(|| format!("Unable to list {}", dir_path.display()))?;
            for entry in entries {
                let entry = entry?;
                let full_oid = format!("{}{}", dir_name, entry.file_name().to_string_lossy());
                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(&full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects"));
        (dir, database)
    }

    #[rstest]
    fn put_is_idempotent(database: (TempDir, Database)) {
        let (_dir, database) = database;

        let first = database.put(ObjectType::Blob, b"hello\n").unwrap();
        let second = database.put(ObjectType::Blob, b"hello\n").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let raw = database.get(&first).unwrap();
        assert_eq!(raw.kind, ObjectType::Blob);
        assert_eq!(&raw.data[..], b"hello\n");
    }

    #[rstest]
    fn delta_kinds_are_rejected(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let result = database.put(ObjectType::RefDelta, b"delta");
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[rstest]
    fn prefix_lookup_finds_stored_objects(database: (TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database.put(ObjectType::Blob, b"prefix").unwrap();

        let matches = database.find_objects_by_prefix(&oid.to_hex()[..6]).unwrap();
        assert_eq!(matches, vec![oid]);
    }
}
