use couchdoc_core::{
    read_entity_document, read_entity_documents, CouchDatabaseInfo, CouchErrorContent,
    DeleteRequest, DocumentUpdate, EntityDocument, EntityMeta, GetRequest, HttpRequest,
    JsonError, JsonStrategy, PostRequest, PutRequest, TextDocument,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::transport::Transport;
use crate::{ClientError, Result};

/// RequestExecutor runs one request at a time: lower, send once, classify, decode.
///
/// It only borrows the transport and strategy and keeps no state between
/// calls, so any number of executors can run against the same handle.
pub struct RequestExecutor<'a> {
    transport: &'a dyn Transport,
    strategy: &'a dyn JsonStrategy,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(transport: &'a dyn Transport, strategy: &'a dyn JsonStrategy) -> Self {
        Self {
            transport,
            strategy,
        }
    }

    /// Send `request` and decode a 2xx body with `decode`.
    ///
    /// Non-2xx answers become [`ClientError::Server`] with the parsed error
    /// body; decode failures become [`ClientError::Decode`].
    pub async fn execute<T>(
        &self,
        request: HttpRequest,
        decode: impl FnOnce(&dyn JsonStrategy, &str) -> std::result::Result<T, JsonError>,
    ) -> Result<T> {
        let request_id = Uuid::new_v4();
        let method = request.method;
        let path = request.path();
        tracing::debug!(%request_id, %method, %path, "Sending request");

        let response = self.transport.send(&request).await.map_err(|e| {
            tracing::warn!(%request_id, %method, %path, error = %e, "Transport failed");
            ClientError::Transport(e)
        })?;
        let status = response.status;

        if !response.is_success() {
            let content = CouchErrorContent::parse(Some(&response.body));
            tracing::warn!(%request_id, %method, %path, status, error = %content, "Server returned an error");
            return Err(ClientError::Server { status, content });
        }

        tracing::debug!(%request_id, status, bytes = response.body.len(), "Received response");

        decode(self.strategy, &response.body).map_err(|source| {
            tracing::warn!(%request_id, %method, %path, status, error = %source, "Failed to decode response");
            ClientError::Decode { status, source }
        })
    }

    pub async fn get_text(&self, request: GetRequest) -> Result<TextDocument> {
        self.execute(request.into_http(), |strategy, json| {
            strategy.read_text_document(json)
        })
        .await
    }

    pub async fn get_texts(&self, request: GetRequest) -> Result<Vec<TextDocument>> {
        self.execute(request.into_http(), |strategy, json| {
            strategy.read_text_documents(json)
        })
        .await
    }

    pub async fn get_entity<T: DeserializeOwned>(
        &self,
        request: GetRequest,
        meta: &EntityMeta<T>,
    ) -> Result<EntityDocument<T>> {
        self.execute(request.into_http(), |strategy, json| {
            read_entity_document(strategy, meta, json)
        })
        .await
    }

    pub async fn get_entities<T: DeserializeOwned>(
        &self,
        request: GetRequest,
        meta: &EntityMeta<T>,
    ) -> Result<Vec<EntityDocument<T>>> {
        self.execute(request.into_http(), |strategy, json| {
            read_entity_documents(strategy, meta, json)
        })
        .await
    }

    pub async fn get_database_info(&self, request: GetRequest) -> Result<CouchDatabaseInfo> {
        self.execute(request.into_http(), |strategy, json| {
            strategy.read_database_info(json)
        })
        .await
    }

    pub async fn put(&self, request: PutRequest) -> Result<DocumentUpdate> {
        let request = request.into_http(self.strategy).map_err(ClientError::Encode)?;
        self.execute(request, |strategy, json| strategy.read_document_update(json))
            .await
    }

    pub async fn post(&self, request: PostRequest) -> Result<DocumentUpdate> {
        let request = request.into_http(self.strategy).map_err(ClientError::Encode)?;
        self.execute(request, |strategy, json| strategy.read_document_update(json))
            .await
    }

    pub async fn delete(&self, request: DeleteRequest) -> Result<DocumentUpdate> {
        self.execute(request.into_http(), |strategy, json| {
            strategy.read_document_update(json)
        })
        .await
    }
}
