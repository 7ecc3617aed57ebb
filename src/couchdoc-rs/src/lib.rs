//! couchdoc Client Library
//!
//! HTTP client for CouchDB-style document databases. Requests are built and
//! validated by `couchdoc-core`, sent through a [`Transport`], and every
//! outcome comes back as a [`Result`].

mod client;
mod database;
mod executor;
mod transport;

#[cfg(test)]
mod mock;

pub use client::Client;
pub use couchdoc_core::*;
pub use database::Database;
pub use executor::RequestExecutor;
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportError};

/// Coarse classification of a [`ClientError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Encode,
    Transport,
    Server,
    Decode,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] JsonError),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Server error: {status} - {content}")]
    Server {
        status: u16,
        content: CouchErrorContent,
    },

    #[error("Invalid response from server (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: JsonError,
    },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ClientError::Encode(_) => ErrorKind::Encode,
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Server { .. } => ErrorKind::Server,
            ClientError::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } | ClientError::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_content(&self) -> Option<&CouchErrorContent> {
        match self {
            ClientError::Server { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Server { status: 409, .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
