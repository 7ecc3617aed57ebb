use serde::{Deserialize, Serialize};
use std::fmt;

use crate::request::RequestError;

/// DocumentId is the `_id` of a stored document. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, RequestError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RequestError::EmptyArgument("documentId"));
        }
        if id == "_design/" {
            return Err(RequestError::EmptyArgument("design"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `_design/...` documents, which hold view definitions
    pub fn is_design(&self) -> bool {
        self.0.starts_with("_design/")
    }
}

impl TryFrom<String> for DocumentId {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DocumentRevision is the opaque `_rev` token used for optimistic concurrency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentRevision(String);

impl TryFrom<String> for DocumentRevision {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentRevision> for String {
    fn from(rev: DocumentRevision) -> Self {
        rev.0
    }
}

impl DocumentRevision {
    pub fn new(rev: impl Into<String>) -> Result<Self, RequestError> {
        let rev = rev.into();
        if rev.is_empty() {
            return Err(RequestError::EmptyArgument("documentRevision"));
        }
        Ok(Self(rev))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generation number, the part before the dash in `3-abc...`
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(gen, _)| gen.parse().ok())
    }
}

impl fmt::Display for DocumentRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// TextDocument carries a document as the exact JSON text the server returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub document_id: DocumentId,
    pub document_revision: DocumentRevision,
    pub content: String, // untouched source JSON
}

/// EntityDocument carries a document deserialized into a caller type
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDocument<T> {
    pub document_id: DocumentId,
    pub document_revision: DocumentRevision,
    pub entity: T,
}

impl<T> EntityDocument<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> EntityDocument<U> {
        EntityDocument {
            document_id: self.document_id,
            document_revision: self.document_revision,
            entity: f(self.entity),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<EntityDocument<U>, E> {
        Ok(EntityDocument {
            document_id: self.document_id,
            document_revision: self.document_revision,
            entity: f(self.entity)?,
        })
    }
}

/// DocumentUpdate is the server acknowledgement of a write or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default)]
    pub ok: bool,
    pub id: DocumentId,
    pub rev: DocumentRevision,
}

/// ServerInfo is the welcome document served at the server root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub couchdb: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}
