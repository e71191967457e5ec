use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use bytes::Bytes;
use std::io::{BufRead, Write};

/// Encode an object body into its payload (no header)
pub trait Packable {
    fn serialize_payload(&self) -> anyhow::Result<Bytes>;
}

/// Decode an object body from its payload (header already consumed)
pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self>
    where
        Self: Sized;
}

/// Prefix a payload with the canonical `<type> <size>\0` header
pub fn encode_with_header(object_type: ObjectType, payload: &[u8]) -> Bytes {
    let mut object_bytes = Vec::with_capacity(payload.len() + 32);
    let header = format!("{} {}\0", object_type.as_str(), payload.len());
    object_bytes.extend_from_slice(header.as_bytes());
    object_bytes.extend_from_slice(payload);
    Bytes::from(object_bytes)
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    /// Canonical encoding: header followed by payload
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let payload = self.serialize_payload()?;
        Ok(encode_with_header(self.object_type(), &payload))
    }

    fn object_id(&self) -> anyhow::Result<ObjectId> {
        let content = self.serialize()?;
        Ok(ObjectId::hash(&content))
    }
}

/// Any decoded object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    Tag(Box<Tag>),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }
}

/// Undecoded object as returned by the store: its kind and verified payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectType,
    pub data: Bytes,
}

impl RawObject {
    pub fn new(kind: ObjectType, data: impl Into<Bytes>) -> Self {
        RawObject {
            kind,
            data: data.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        encode_with_header(self.kind, &self.data)
    }

    pub fn object_id(&self) -> ObjectId {
        ObjectId::hash(&self.encode())
    }

    pub fn decode(&self) -> anyhow::Result<ObjectBox> {
        let reader = std::io::Cursor::new(self.data.clone());
        match self.kind {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(reader)?))),
            ObjectType::Tag => Ok(ObjectBox::Tag(Box::new(Tag::deserialize(reader)?))),
            ObjectType::OffsetDelta | ObjectType::RefDelta => {
                anyhow::bail!("delta objects cannot be decoded standalone")
            }
        }
    }
}

pub(crate) fn write_lines(lines: &[String]) -> anyhow::Result<Bytes> {
    let mut content_bytes = Vec::new();
    content_bytes.write_all(lines.join("\n").as_bytes())?;
    Ok(Bytes::from(content_bytes))
}
