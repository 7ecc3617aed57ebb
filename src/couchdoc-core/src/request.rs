//! Request descriptors for the four document operations
//!
//! Every request is validated when it is built and lowered to an [`HttpRequest`]
//! exactly once. Builders never touch the network.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::mapping::{EntityMapping, EntityMeta};
use crate::models::{DocumentId, DocumentRevision};
use crate::strategy::{JsonError, JsonStrategy};

/// RequestError reports invalid arguments handed to a request builder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{0} is null")]
    NullArgument(&'static str),

    #[error("{0} is empty")]
    EmptyArgument(&'static str),

    #[error("invalid database name {0:?}")]
    InvalidDatabaseName(String),

    #[error("{}", join_messages(.0))]
    Multiple(Vec<RequestError>),

    #[error("failed to serialize entity: {0}")]
    Entity(String),
}

impl RequestError {
    /// Individual problems, flattening [`RequestError::Multiple`]
    pub fn problems(&self) -> Vec<&RequestError> {
        match self {
            RequestError::Multiple(errors) => errors.iter().flat_map(|e| e.problems()).collect(),
            other => vec![other],
        }
    }
}

fn join_messages(errors: &[RequestError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects argument problems so every missing value is reported, not just the first
#[derive(Default)]
struct Validator {
    problems: Vec<RequestError>,
}

impl Validator {
    fn database(&mut self, name: &str) -> Option<String> {
        match validate_database_name(name) {
            Ok(()) => Some(name.to_string()),
            Err(e) => {
                self.problems.push(e);
                None
            }
        }
    }

    fn require<T>(
        &mut self,
        name: &'static str,
        value: Option<&str>,
        ctor: fn(String) -> Result<T, RequestError>,
    ) -> Option<T> {
        match value {
            None => {
                self.problems.push(RequestError::NullArgument(name));
                None
            }
            Some(value) => match ctor(value.to_string()) {
                Ok(v) => Some(v),
                Err(e) => {
                    self.problems.push(e);
                    None
                }
            },
        }
    }

    fn optional<T>(
        &mut self,
        value: Option<&str>,
        ctor: fn(String) -> Result<T, RequestError>,
    ) -> Option<T> {
        value.and_then(|v| match ctor(v.to_string()) {
            Ok(v) => Some(v),
            Err(e) => {
                self.problems.push(e);
                None
            }
        })
    }

    fn finish(mut self) -> Result<(), RequestError> {
        match self.problems.len() {
            0 => Ok(()),
            1 => Err(self.problems.remove(0)),
            _ => Err(RequestError::Multiple(self.problems)),
        }
    }
}

const SYSTEM_DATABASES: [&str; 3] = ["_users", "_replicator", "_global_changes"];

/// Database names must start with a lowercase letter and use only `a-z0-9_$()+-/`.
/// The system databases (`_users`, `_replicator`, `_global_changes`) are also accepted.
pub fn validate_database_name(name: &str) -> Result<(), RequestError> {
    if SYSTEM_DATABASES.contains(&name) {
        return Ok(());
    }
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(RequestError::EmptyArgument("database")),
        Some(c) if !c.is_ascii_lowercase() => {
            return Err(RequestError::InvalidDatabaseName(name.to_string()))
        }
        _ => {}
    }
    let valid = chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '$' | '(' | ')' | '+' | '-' | '/')
    });
    if !valid {
        return Err(RequestError::InvalidDatabaseName(name.to_string()));
    }
    Ok(())
}

/// HTTP method of a lowered request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HttpRequest is what the transport sends: unescaped path segments, query pairs, body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, segments: Vec<String>) -> Self {
        Self {
            method,
            segments,
            query: Vec::new(),
            body: None,
        }
    }

    /// Readable path for logs, e.g. `/orders/_design/app/_view/by_date`
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

fn document_segments(database: &str, id: &DocumentId) -> Vec<String> {
    let mut segments = vec![database.to_string()];
    match id.as_str().strip_prefix("_design/") {
        Some(name) => {
            segments.push("_design".to_string());
            segments.push(name.to_string());
        }
        None => segments.push(id.as_str().to_string()),
    }
    segments
}

/// Body of a put or post
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    /// Raw JSON object text supplied by the caller
    Text(String),
    /// Serialized entity plus the mapping to apply on the way out
    Entity { value: Value, mapping: EntityMapping },
}

impl DocumentBody {
    fn entity<T: Serialize>(entity: &T, meta: &EntityMeta<T>) -> Result<Self, RequestError> {
        let value = serde_json::to_value(entity).map_err(|e| RequestError::Entity(e.to_string()))?;
        Ok(DocumentBody::Entity {
            value,
            mapping: meta.mapping().clone(),
        })
    }
}

/// ViewQuery holds the query options of a view or `_all_docs` read
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    pub include_docs: bool,
    pub key: Option<Value>,
    pub start_key: Option<Value>,
    pub end_key: Option<Value>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub descending: bool,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            include_docs: true,
            key: None,
            start_key: None,
            end_key: None,
            limit: None,
            skip: None,
            descending: false,
        }
    }
}

impl ViewQuery {
    pub fn include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn range(mut self, start_key: impl Into<Value>, end_key: impl Into<Value>) -> Self {
        self.start_key = Some(start_key.into());
        self.end_key = Some(end_key.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    // Keys are JSON-encoded, as CouchDB expects
    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("include_docs".to_string(), self.include_docs.to_string())];
        if let Some(key) = &self.key {
            pairs.push(("key".to_string(), key.to_string()));
        }
        if let Some(start_key) = &self.start_key {
            pairs.push(("startkey".to_string(), start_key.to_string()));
        }
        if let Some(end_key) = &self.end_key {
            pairs.push(("endkey".to_string(), end_key.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("skip".to_string(), skip.to_string()));
        }
        if self.descending {
            pairs.push(("descending".to_string(), "true".to_string()));
        }
        pairs
    }
}

/// ViewQualifier selects which index a bulk read goes through
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQualifier {
    design: Option<String>,
    view: String,
    query: ViewQuery,
}

impl ViewQualifier {
    /// The built-in `_all_docs` index
    pub fn all_docs() -> Self {
        Self {
            design: None,
            view: "_all_docs".to_string(),
            query: ViewQuery::default(),
        }
    }

    /// A view defined in `_design/{design}`
    pub fn view(design: &str, view: &str) -> Result<Self, RequestError> {
        let design = design.trim_start_matches("_design/");
        let mut validator = Validator::default();
        if design.is_empty() {
            validator.problems.push(RequestError::EmptyArgument("design"));
        }
        if view.is_empty() {
            validator.problems.push(RequestError::EmptyArgument("view"));
        }
        validator.finish()?;

        Ok(Self {
            design: Some(design.to_string()),
            view: view.to_string(),
            query: ViewQuery::default(),
        })
    }

    pub fn with_query(mut self, query: ViewQuery) -> Self {
        self.query = query;
        self
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    fn segments(&self, database: &str) -> Vec<String> {
        match &self.design {
            Some(design) => vec![
                database.to_string(),
                "_design".to_string(),
                design.clone(),
                "_view".to_string(),
                self.view.clone(),
            ],
            None => vec![database.to_string(), self.view.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetTarget {
    Document {
        id: DocumentId,
        revision: Option<DocumentRevision>,
    },
    View(ViewQualifier),
    DatabaseInfo,
}

/// GetRequest reads a document, a view, or the database info
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    database: String,
    target: GetTarget,
}

impl GetRequest {
    pub fn document(database: &str, document_id: Option<&str>) -> Result<Self, RequestError> {
        let mut validator = Validator::default();
        let database = validator.database(database);
        let id = validator.require("documentId", document_id, |id| DocumentId::new(id));
        validator.finish()?;

        match (database, id) {
            (Some(database), Some(id)) => Ok(Self {
                database,
                target: GetTarget::Document { id, revision: None },
            }),
            _ => Err(RequestError::NullArgument("documentId")),
        }
    }

    /// Read a specific revision of a document
    pub fn document_at(
        database: &str,
        document_id: Option<&str>,
        document_revision: Option<&str>,
    ) -> Result<Self, RequestError> {
        let mut validator = Validator::default();
        let database = validator.database(database);
        let id = validator.require("documentId", document_id, |id| DocumentId::new(id));
        let revision = validator.require("documentRevision", document_revision, |rev| DocumentRevision::new(rev));
        validator.finish()?;

        match (database, id) {
            (Some(database), Some(id)) => Ok(Self {
                database,
                target: GetTarget::Document { id, revision },
            }),
            _ => Err(RequestError::NullArgument("documentId")),
        }
    }

    pub fn view(database: &str, qualifier: ViewQualifier) -> Result<Self, RequestError> {
        validate_database_name(database)?;
        Ok(Self {
            database: database.to_string(),
            target: GetTarget::View(qualifier),
        })
    }

    pub fn database_info(database: &str) -> Result<Self, RequestError> {
        validate_database_name(database)?;
        Ok(Self {
            database: database.to_string(),
            target: GetTarget::DatabaseInfo,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn target(&self) -> &GetTarget {
        &self.target
    }

    pub fn into_http(self) -> HttpRequest {
        match self.target {
            GetTarget::Document { id, revision } => {
                let mut request = HttpRequest::new(Method::Get, document_segments(&self.database, &id));
                if let Some(revision) = revision {
                    request.query.push(("rev".to_string(), revision.to_string()));
                }
                request
            }
            GetTarget::View(qualifier) => {
                let mut request = HttpRequest::new(Method::Get, qualifier.segments(&self.database));
                request.query = qualifier.query.to_pairs();
                request
            }
            GetTarget::DatabaseInfo => HttpRequest::new(Method::Get, vec![self.database]),
        }
    }
}

/// PutRequest creates or updates a document under a caller-chosen id
#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    database: String,
    document_id: DocumentId,
    document_revision: Option<DocumentRevision>,
    body: DocumentBody,
}

impl PutRequest {
    /// Put a raw JSON object. A missing revision means first write.
    pub fn text(
        database: &str,
        document_id: Option<&str>,
        document_revision: Option<&str>,
        json: impl Into<String>,
    ) -> Result<Self, RequestError> {
        Self::build(database, document_id, document_revision, DocumentBody::Text(json.into()))
    }

    pub fn entity<T: Serialize>(
        database: &str,
        document_id: Option<&str>,
        document_revision: Option<&str>,
        entity: &T,
        meta: &EntityMeta<T>,
    ) -> Result<Self, RequestError> {
        let body = DocumentBody::entity(entity, meta)?;
        Self::build(database, document_id, document_revision, body)
    }

    fn build(
        database: &str,
        document_id: Option<&str>,
        document_revision: Option<&str>,
        body: DocumentBody,
    ) -> Result<Self, RequestError> {
        let mut validator = Validator::default();
        let database = validator.database(database);
        let id = validator.require("documentId", document_id, |id| DocumentId::new(id));
        let revision = validator.optional(document_revision, |rev| DocumentRevision::new(rev));
        validator.finish()?;

        match (database, id) {
            (Some(database), Some(document_id)) => Ok(Self {
                database,
                document_id,
                document_revision: revision,
                body,
            }),
            _ => Err(RequestError::NullArgument("documentId")),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn document_revision(&self) -> Option<&DocumentRevision> {
        self.document_revision.as_ref()
    }

    pub fn body(&self) -> &DocumentBody {
        &self.body
    }

    pub fn into_http(self, strategy: &dyn JsonStrategy) -> Result<HttpRequest, JsonError> {
        let body = strategy.create_json_for_put(&self)?;
        let mut request = HttpRequest::new(Method::Put, document_segments(&self.database, &self.document_id));
        request.body = Some(body);
        Ok(request)
    }
}

/// PostRequest creates a document with a server-assigned id
#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    database: String,
    body: DocumentBody,
}

impl PostRequest {
    pub fn text(database: &str, json: impl Into<String>) -> Result<Self, RequestError> {
        validate_database_name(database)?;
        Ok(Self {
            database: database.to_string(),
            body: DocumentBody::Text(json.into()),
        })
    }

    pub fn entity<T: Serialize>(
        database: &str,
        entity: &T,
        meta: &EntityMeta<T>,
    ) -> Result<Self, RequestError> {
        validate_database_name(database)?;
        Ok(Self {
            database: database.to_string(),
            body: DocumentBody::entity(entity, meta)?,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn body(&self) -> &DocumentBody {
        &self.body
    }

    pub fn into_http(self, strategy: &dyn JsonStrategy) -> Result<HttpRequest, JsonError> {
        let body = strategy.create_json_for_post(&self)?;
        let mut request = HttpRequest::new(Method::Post, vec![self.database]);
        request.body = Some(body);
        Ok(request)
    }
}

/// DeleteRequest removes the given revision of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    database: String,
    document_id: DocumentId,
    document_revision: DocumentRevision,
}

impl DeleteRequest {
    pub fn new(
        database: &str,
        document_id: Option<&str>,
        document_revision: Option<&str>,
    ) -> Result<Self, RequestError> {
        let mut validator = Validator::default();
        let database = validator.database(database);
        let id = validator.require("documentId", document_id, |id| DocumentId::new(id));
        let revision = validator.require("documentRevision", document_revision, |rev| DocumentRevision::new(rev));
        validator.finish()?;

        match (database, id, revision) {
            (Some(database), Some(document_id), Some(document_revision)) => Ok(Self {
                database,
                document_id,
                document_revision,
            }),
            _ => Err(RequestError::NullArgument("documentId")),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn document_revision(&self) -> &DocumentRevision {
        &self.document_revision
    }

    pub fn into_http(self) -> HttpRequest {
        let mut request = HttpRequest::new(Method::Delete, document_segments(&self.database, &self.document_id));
        request.query.push(("rev".to_string(), self.document_revision.to_string()));
        request
    }
}
