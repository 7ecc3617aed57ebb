use couchdoc_core::{
    validate_database_name, CouchDatabaseInfo, DeleteRequest, DocumentUpdate, EntityDocument,
    EntityMeta, GetRequest, JsonStrategy, PostRequest, PutRequest, TextDocument, ViewQualifier,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::executor::RequestExecutor;
use crate::transport::Transport;
use crate::Result;

/// Database is a read-only handle on one database. Cloning is cheap and
/// clones share the transport and strategy.
#[derive(Clone)]
pub struct Database {
    name: String,
    transport: Arc<dyn Transport>,
    strategy: Arc<dyn JsonStrategy>,
}

impl Database {
    pub(crate) fn new(
        name: &str,
        transport: Arc<dyn Transport>,
        strategy: Arc<dyn JsonStrategy>,
    ) -> Result<Self> {
        validate_database_name(name)?;
        Ok(Self {
            name: name.to_string(),
            transport,
            strategy,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executor for running hand-built requests against this handle
    pub fn executor(&self) -> RequestExecutor<'_> {
        RequestExecutor::new(self.transport.as_ref(), self.strategy.as_ref())
    }

    pub async fn info(&self) -> Result<CouchDatabaseInfo> {
        let request = GetRequest::database_info(&self.name)?;
        self.executor().get_database_info(request).await
    }

    pub async fn get_text(&self, document_id: &str) -> Result<TextDocument> {
        let request = GetRequest::document(&self.name, Some(document_id))?;
        self.executor().get_text(request).await
    }

    pub async fn get_entity<T: DeserializeOwned>(
        &self,
        document_id: &str,
        meta: &EntityMeta<T>,
    ) -> Result<EntityDocument<T>> {
        let request = GetRequest::document(&self.name, Some(document_id))?;
        self.executor().get_entity(request, meta).await
    }

    pub async fn view_text(&self, qualifier: ViewQualifier) -> Result<Vec<TextDocument>> {
        let request = GetRequest::view(&self.name, qualifier)?;
        self.executor().get_texts(request).await
    }

    pub async fn view_entities<T: DeserializeOwned>(
        &self,
        qualifier: ViewQualifier,
        meta: &EntityMeta<T>,
    ) -> Result<Vec<EntityDocument<T>>> {
        let request = GetRequest::view(&self.name, qualifier)?;
        self.executor().get_entities(request, meta).await
    }

    /// Create or update a document from raw JSON. Pass the current revision to update.
    pub async fn put_text(
        &self,
        document_id: &str,
        document_revision: Option<&str>,
        json: impl Into<String>,
    ) -> Result<DocumentUpdate> {
        let request = PutRequest::text(&self.name, Some(document_id), document_revision, json)?;
        self.executor().put(request).await
    }

    pub async fn put_entity<T: Serialize>(
        &self,
        document_id: &str,
        document_revision: Option<&str>,
        entity: &T,
        meta: &EntityMeta<T>,
    ) -> Result<DocumentUpdate> {
        let request = PutRequest::entity(&self.name, Some(document_id), document_revision, entity, meta)?;
        self.executor().put(request).await
    }

    /// Create a document with a server-assigned id
    pub async fn post_text(&self, json: impl Into<String>) -> Result<DocumentUpdate> {
        let request = PostRequest::text(&self.name, json)?;
        self.executor().post(request).await
    }

    pub async fn post_entity<T: Serialize>(
        &self,
        entity: &T,
        meta: &EntityMeta<T>,
    ) -> Result<DocumentUpdate> {
        let request = PostRequest::entity(&self.name, entity, meta)?;
        self.executor().post(request).await
    }

    pub async fn delete(&self, document_id: &str, document_revision: &str) -> Result<DocumentUpdate> {
        let request = DeleteRequest::new(&self.name, Some(document_id), Some(document_revision))?;
        self.executor().delete(request).await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}
