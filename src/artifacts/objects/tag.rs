//! Annotated tag object
//!
//! ## Format
//!
//! ```text
//! tag <size>\0
//! object <target-sha>
//! type <target-type>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::artifacts::objects::commit::Author;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, write_lines};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, Eq, PartialEq, new)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    #[new(into)]
    name: String,
    tagger: Option<Author>,
    #[new(into)]
    message: String,
}

impl Tag {
    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Author> {
        self.tagger.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("object {}", self.target),
            format!("type {}", self.target_type),
            format!("tag {}", self.name),
        ];
        if let Some(tagger) = &self.tagger {
            lines.push(format!("tagger {}", tagger.display()));
        }
        lines.push(String::new());
        lines.push(self.message.clone());
        lines
    }
}

impl Packable for Tag {
    fn serialize_payload(&self) -> anyhow::Result<Bytes> {
        write_lines(&self.lines())
    }
}

impl Unpackable for Tag {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let (headers, message) = content.split_once("\n\n").unwrap_or((&content, ""));

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;

        for line in headers.lines() {
            let (key, value) = line
                .split_once(' ')
                .with_context(|| format!("invalid tag header line: {line}"))?;
            match key {
                "object" => target = Some(ObjectId::try_parse(value)?),
                "type" => target_type = Some(ObjectType::try_from(value)?),
                "tag" => name = Some(value.to_string()),
                "tagger" => tagger = Some(Author::try_from(value)?),
                _ => {}
            }
        }

        Ok(Tag::new(
            target.context("invalid tag object: missing object line")?,
            target_type.context("invalid tag object: missing type line")?,
            name.context("invalid tag object: missing tag line")?,
            tagger,
            message,
        ))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        self.lines().join("\n")
    }
}
