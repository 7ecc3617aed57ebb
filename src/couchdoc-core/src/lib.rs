//! couchdoc Core Library
//!
//! This crate provides the transport-independent half of couchdoc:
//! - Document identity and envelope types
//! - Request descriptors with eager argument validation
//! - The pluggable JSON strategy and its serde_json implementation
//! - CouchDB error body parsing
//! - Client configuration

pub mod config;
pub mod error_content;
pub mod info;
pub mod mapping;
pub mod models;
pub mod request;
pub mod strategy;
pub mod values;

// Re-export commonly used types
pub use config::Config;
pub use error_content::CouchErrorContent;
pub use info::{CouchDatabaseInfo, Sequence};
pub use mapping::{EntityMapping, EntityMeta, FieldMapping};
pub use models::*;
pub use request::{
    DeleteRequest, DocumentBody, GetRequest, GetTarget, HttpRequest, Method, PostRequest,
    PutRequest, RequestError, ViewQualifier, ViewQuery, validate_database_name,
};
pub use strategy::{
    read_entity_document, read_entity_documents, JsonError, JsonOptions, JsonStrategy,
    SerdeJsonStrategy, StrategySetup,
};
pub use values::{ValueBag, ValueKey};
