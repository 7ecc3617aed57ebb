//! JSON strategy: the pluggable encode/decode backend
//!
//! The executor never touches JSON directly. It hands raw response text to a
//! [`JsonStrategy`] and asks for the shape the caller wanted. The default
//! implementation, [`SerdeJsonStrategy`], keeps text documents byte-for-byte
//! by borrowing their source slices as `RawValue`s.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::info::CouchDatabaseInfo;
use crate::mapping::{EntityMapping, EntityMeta, FieldMapping};
use crate::models::{DocumentId, DocumentRevision, DocumentUpdate, EntityDocument, TextDocument};
use crate::request::{DocumentBody, PostRequest, PutRequest};
use crate::values::ValueBag;

/// JsonError is raised when JSON cannot be read into, or produced from, the expected shape
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Expected {0}")]
    UnexpectedShape(&'static str),

    #[error("Cannot deserialize {type_name}: {source}")]
    Entity {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// JsonOptions controls how request bodies are written
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOptions {
    /// Pretty-print request bodies
    #[serde(default)]
    pub pretty: bool,
    /// Drop top-level `null` members from request bodies
    #[serde(default)]
    pub omit_nulls: bool,
}

/// StrategySetup is handed to [`JsonStrategy::init`] once, before the strategy is shared
#[derive(Debug, Clone, Default)]
pub struct StrategySetup {
    pub options: JsonOptions,
    pub values: ValueBag,
}

impl StrategySetup {
    pub fn new(options: JsonOptions, values: ValueBag) -> Self {
        Self { options, values }
    }
}

/// JsonStrategy converts between raw JSON text and documents
pub trait JsonStrategy: Send + Sync {
    fn init(&mut self, setup: &StrategySetup);

    fn read_database_info(&self, json: &str) -> Result<CouchDatabaseInfo, JsonError>;

    /// Body of a put. Must carry `_id`, and `_rev` when the request has one.
    fn create_json_for_put(&self, request: &PutRequest) -> Result<String, JsonError>;

    fn create_json_for_post(&self, request: &PostRequest) -> Result<String, JsonError>;

    /// Read one document, keeping `json` untouched as its content
    fn read_text_document(&self, json: &str) -> Result<TextDocument, JsonError>;

    /// Read the documents of a view result, in source order
    fn read_text_documents(&self, json: &str) -> Result<Vec<TextDocument>, JsonError>;

    /// Read one document as a mapped JSON value ready for typed deserialization
    fn read_entity_value(
        &self,
        mapping: &EntityMapping,
        json: &str,
    ) -> Result<EntityDocument<Value>, JsonError>;

    fn read_entity_values(
        &self,
        mapping: &EntityMapping,
        json: &str,
    ) -> Result<Vec<EntityDocument<Value>>, JsonError>;

    fn read_document_update(&self, json: &str) -> Result<DocumentUpdate, JsonError>;
}

/// Read one document into `T`.
///
/// `T` sees the whole stored object, `_id` and `_rev` included, so a type
/// with `#[serde(deny_unknown_fields)]` must declare both (renamed from
/// `_id`/`_rev`). The envelope carries the identity either way.
pub fn read_entity_document<T: DeserializeOwned>(
    strategy: &dyn JsonStrategy,
    meta: &EntityMeta<T>,
    json: &str,
) -> Result<EntityDocument<T>, JsonError> {
    strategy
        .read_entity_value(meta.mapping(), json)?
        .try_map(|value| deserialize_entity(meta, value))
}

/// Read the documents of a view result into `T`, in source order
pub fn read_entity_documents<T: DeserializeOwned>(
    strategy: &dyn JsonStrategy,
    meta: &EntityMeta<T>,
    json: &str,
) -> Result<Vec<EntityDocument<T>>, JsonError> {
    strategy
        .read_entity_values(meta.mapping(), json)?
        .into_iter()
        .map(|doc| doc.try_map(|value| deserialize_entity(meta, value)))
        .collect()
}

fn deserialize_entity<T: DeserializeOwned>(meta: &EntityMeta<T>, value: Value) -> Result<T, JsonError> {
    serde_json::from_value(value).map_err(|source| JsonError::Entity {
        type_name: meta.type_name(),
        source,
    })
}

// Only the identity members are decoded; everything else is skipped
#[derive(Deserialize)]
struct Identity {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_rev")]
    rev: Option<String>,
}

impl Identity {
    fn into_parts(self) -> Result<(DocumentId, DocumentRevision), JsonError> {
        let id = self.id.ok_or(JsonError::MissingField("_id"))?;
        let rev = self.rev.ok_or(JsonError::MissingField("_rev"))?;
        let id = DocumentId::new(id).map_err(|e| JsonError::InvalidField {
            field: "_id",
            reason: e.to_string(),
        })?;
        let rev = DocumentRevision::new(rev).map_err(|e| JsonError::InvalidField {
            field: "_rev",
            reason: e.to_string(),
        })?;
        Ok((id, rev))
    }
}

#[derive(Deserialize)]
struct ViewResult<'a> {
    #[serde(borrow)]
    rows: Vec<ViewRow<'a>>,
}

#[derive(Deserialize)]
struct ViewRow<'a> {
    #[serde(default, borrow)]
    doc: Option<&'a RawValue>,
    #[serde(default, borrow)]
    value: Option<&'a RawValue>,
}

impl<'a> ViewRow<'a> {
    /// The row's document: `doc` under include_docs, else a `value` that is itself a document
    fn document(self) -> Option<&'a RawValue> {
        if self.doc.is_some() {
            return self.doc;
        }
        // A linked `{"_id": ...}` without `_rev` points at a missing document
        self.value.filter(|value| {
            value.get().starts_with('{')
                && serde_json::from_str::<Identity>(value.get())
                    .map(|identity| identity.into_parts().is_ok())
                    .unwrap_or(false)
        })
    }
}

/// Slice a view result (or a bare array) into the raw text of each document
fn document_slices(json: &str) -> Result<Vec<&RawValue>, JsonError> {
    if json.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(json)?);
    }

    let result: ViewResult<'_> = serde_json::from_str(json)?;
    let total = result.rows.len();
    let documents: Vec<&RawValue> = result.rows.into_iter().filter_map(ViewRow::document).collect();
    if documents.len() < total {
        tracing::debug!(
            "Skipped {} view rows without a document",
            total - documents.len()
        );
    }
    Ok(documents)
}

fn into_object(value: Value) -> Result<Map<String, Value>, JsonError> {
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(JsonError::UnexpectedShape("a JSON object")),
    }
}

/// SerdeJsonStrategy is the default strategy, built on serde_json
#[derive(Debug, Clone, Default)]
pub struct SerdeJsonStrategy {
    options: JsonOptions,
    values: ValueBag,
}

impl SerdeJsonStrategy {
    pub fn new(setup: &StrategySetup) -> Self {
        let mut strategy = Self::default();
        strategy.init(setup);
        strategy
    }

    /// Explicit mapping from the meta, else one registered under the type name
    fn field_mapping<'a>(&'a self, mapping: &'a EntityMapping) -> Option<&'a FieldMapping> {
        mapping
            .fields
            .as_ref()
            .or_else(|| self.values.get_named::<FieldMapping>(mapping.type_name))
    }

    fn body_object(&self, body: &DocumentBody) -> Result<Map<String, Value>, JsonError> {
        match body {
            DocumentBody::Text(json) => into_object(serde_json::from_str(json)?),
            DocumentBody::Entity { value, mapping } => {
                let object = into_object(value.clone())?;
                Ok(match self.field_mapping(mapping) {
                    Some(fields) => fields.to_json(object),
                    None => object,
                })
            }
        }
    }

    fn write(&self, mut object: Map<String, Value>) -> Result<String, JsonError> {
        if self.options.omit_nulls {
            object.retain(|_, value| !value.is_null());
        }
        let value = Value::Object(object);
        let json = if self.options.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(json)
    }
}

impl JsonStrategy for SerdeJsonStrategy {
    fn init(&mut self, setup: &StrategySetup) {
        self.options = setup.options.clone();
        self.values = setup.values.clone();
    }

    fn read_database_info(&self, json: &str) -> Result<CouchDatabaseInfo, JsonError> {
        Ok(serde_json::from_str(json)?)
    }

    fn create_json_for_put(&self, request: &PutRequest) -> Result<String, JsonError> {
        let mut object = self.body_object(request.body())?;
        object.insert(
            "_id".to_string(),
            Value::String(request.document_id().to_string()),
        );
        // The request is authoritative: no revision means first write
        match request.document_revision() {
            Some(rev) => {
                object.insert("_rev".to_string(), Value::String(rev.to_string()));
            }
            None => {
                object.remove("_rev");
            }
        }
        self.write(object)
    }

    fn create_json_for_post(&self, request: &PostRequest) -> Result<String, JsonError> {
        let object = self.body_object(request.body())?;
        self.write(object)
    }

    fn read_text_document(&self, json: &str) -> Result<TextDocument, JsonError> {
        // Identity would also accept a positional array, documents are objects
        if !json.trim_start().starts_with('{') {
            serde_json::from_str::<Value>(json)?;
            return Err(JsonError::UnexpectedShape("a JSON object"));
        }
        let identity: Identity = serde_json::from_str(json)?;
        let (document_id, document_revision) = identity.into_parts()?;
        Ok(TextDocument {
            document_id,
            document_revision,
            content: json.to_string(),
        })
    }

    fn read_text_documents(&self, json: &str) -> Result<Vec<TextDocument>, JsonError> {
        document_slices(json)?
            .into_iter()
            .map(|raw| self.read_text_document(raw.get()))
            .collect()
    }

    fn read_entity_value(
        &self,
        mapping: &EntityMapping,
        json: &str,
    ) -> Result<EntityDocument<Value>, JsonError> {
        let object = into_object(serde_json::from_str(json)?)?;
        let identity = Identity {
            id: object.get("_id").and_then(Value::as_str).map(str::to_string),
            rev: object.get("_rev").and_then(Value::as_str).map(str::to_string),
        };
        let (document_id, document_revision) = identity.into_parts()?;
        let object = match self.field_mapping(mapping) {
            Some(fields) => fields.to_entity(object),
            None => object,
        };

        Ok(EntityDocument {
            document_id,
            document_revision,
            entity: Value::Object(object),
        })
    }

    fn read_entity_values(
        &self,
        mapping: &EntityMapping,
        json: &str,
    ) -> Result<Vec<EntityDocument<Value>>, JsonError> {
        document_slices(json)?
            .into_iter()
            .map(|raw| self.read_entity_value(mapping, raw.get()))
            .collect()
    }

    fn read_document_update(&self, json: &str) -> Result<DocumentUpdate, JsonError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::Sequence;
    use serde_json::json;

    const DOCUMENT: &str = include_str!("../fixtures/document.json");
    const VIEW_RESULT: &str = include_str!("../fixtures/view_result.json");
    const DATABASE_INFO: &str = include_str!("../fixtures/database_info.json");

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Order {
        customer: String,
        total: f64,
    }

    #[test]
    fn test_read_text_document_keeps_content() {
        let strategy = SerdeJsonStrategy::default();
        let doc = strategy.read_text_document(DOCUMENT).unwrap();

        assert_eq!(doc.document_id.as_str(), "7889");
        assert_eq!(doc.document_revision.as_str(), "2-7051cbe5c8faecd085a3fa619e6e6337");
        assert_eq!(doc.content, DOCUMENT);

        // Reading the content again yields the same bytes
        let again = strategy.read_text_document(&doc.content).unwrap();
        assert_eq!(again.content, DOCUMENT);
        assert_eq!(again, doc);
    }

    #[test]
    fn test_read_text_document_malformed() {
        let strategy = SerdeJsonStrategy::default();
        assert!(matches!(
            strategy.read_text_document("{not json"),
            Err(JsonError::Malformed(_))
        ));
        assert!(matches!(
            strategy.read_text_document(r#"["a","1-a"]"#),
            Err(JsonError::UnexpectedShape(_))
        ));
        assert!(matches!(
            strategy.read_text_document(r#"{"_rev":"1-a"}"#),
            Err(JsonError::MissingField("_id"))
        ));
        assert!(matches!(
            strategy.read_text_document(r#"{"_id":"a"}"#),
            Err(JsonError::MissingField("_rev"))
        ));
        assert!(matches!(
            strategy.read_text_document(r#"{"_id":"","_rev":"1-a"}"#),
            Err(JsonError::InvalidField { field: "_id", .. })
        ));
    }

    #[test]
    fn test_read_text_documents_preserves_order() {
        let strategy = SerdeJsonStrategy::default();
        let docs = strategy.read_text_documents(VIEW_RESULT).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document_id.as_str(), "7889");
        assert_eq!(docs[0].document_revision.as_str(), "2-7051cbe5c8faecd085a3fa619e6e6337");
        assert_eq!(docs[1].document_id.as_str(), "9999");
        assert_eq!(docs[1].document_revision.as_str(), "1-967a00dff5e02add41819138abb3284d");

        // Each content is the exact slice of the source
        for doc in &docs {
            assert!(VIEW_RESULT.contains(&doc.content));
        }
        assert_eq!(
            docs[1].content,
            r#"{"_id":"9999","_rev":"1-967a00dff5e02add41819138abb3284d","customer":"Grace Hopper","total":42}"#
        );
    }

    #[test]
    fn test_read_text_documents_from_values_and_arrays() {
        let strategy = SerdeJsonStrategy::default();

        let emitted = r#"{"rows":[{"id":"a","key":1,"value":{"_id":"a","_rev":"1-a"}},
            {"id":"b","key":2,"value":{"rev":"1-b"}},
            {"id":"c","key":3,"value":null,"doc":null}]}"#;
        let docs = strategy.read_text_documents(emitted).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, r#"{"_id":"a","_rev":"1-a"}"#);

        let linked = r#"{"rows":[{"id":"a","key":1,"value":{"_id":"gone"},"doc":null},
            {"id":"b","key":2,"value":null,"doc":{"_id":"b","_rev":"1-b"}}]}"#;
        let docs = strategy.read_text_documents(linked).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id.as_str(), "b");

        let positional = r#"{"rows":[{"id":"a","key":1,"value":["Ada","London"]}]}"#;
        assert!(strategy.read_text_documents(positional).unwrap().is_empty());

        let array = r#"[{"_id":"x","_rev":"1-x"}, {"_id":"y","_rev":"1-y"}]"#;
        let docs = strategy.read_text_documents(array).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_read_text_documents_empty_view() {
        let strategy = SerdeJsonStrategy::default();
        let docs = strategy
            .read_text_documents(r#"{"total_rows":0,"offset":0,"rows":[]}"#)
            .unwrap();
        assert!(docs.is_empty());
        assert!(strategy.read_text_documents(r#"{"total_rows":0}"#).is_err());
    }

    #[test]
    fn test_read_entity_document() {
        let strategy = SerdeJsonStrategy::default();
        let meta = EntityMeta::<Order>::new();
        let doc = read_entity_document(&strategy, &meta, DOCUMENT).unwrap();

        assert_eq!(doc.document_id.as_str(), "7889");
        assert_eq!(doc.document_revision.as_str(), "2-7051cbe5c8faecd085a3fa619e6e6337");
        assert_eq!(
            doc.entity,
            Order {
                customer: "Ada Lovelace".to_string(),
                total: 129.5
            }
        );
    }

    #[test]
    fn test_read_entity_document_type_mismatch() {
        let strategy = SerdeJsonStrategy::default();
        let meta = EntityMeta::<Order>::new();
        let err = read_entity_document(&strategy, &meta, r#"{"_id":"a","_rev":"1-a","total":1}"#)
            .unwrap_err();
        match err {
            JsonError::Entity { type_name, .. } => assert!(type_name.ends_with("Order")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_entity_documents_with_field_mapping() {
        #[derive(Debug, Deserialize)]
        struct Summary {
            buyer: String,
        }

        let strategy = SerdeJsonStrategy::default();
        let meta = EntityMeta::<Summary>::new().with_field("customer", "buyer");
        let docs = read_entity_documents(&strategy, &meta, VIEW_RESULT).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].entity.buyer, "Ada Lovelace");
        assert_eq!(docs[1].entity.buyer, "Grace Hopper");
        assert_eq!(docs[1].document_id.as_str(), "9999");
    }

    #[test]
    fn test_read_entity_document_strict_type_sees_identity() {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Strict {
            customer: String,
            total: f64,
        }

        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct StrictWithIdentity {
            #[serde(rename = "_id")]
            id: String,
            #[serde(rename = "_rev")]
            rev: String,
            customer: String,
            total: f64,
        }

        let strategy = SerdeJsonStrategy::default();
        let json = r#"{"_id":"a","_rev":"1-a","customer":"Ada","total":1}"#;

        let err = read_entity_document(&strategy, &EntityMeta::<Strict>::new(), json).unwrap_err();
        assert!(matches!(err, JsonError::Entity { .. }));

        let doc = read_entity_document(&strategy, &EntityMeta::<StrictWithIdentity>::new(), json).unwrap();
        assert_eq!(doc.entity.id, "a");
        assert_eq!(doc.entity.rev, "1-a");
        assert_eq!(doc.entity.customer, "Ada");
        assert_eq!(doc.entity.total, 1.0);
        assert_eq!(doc.document_id.as_str(), "a");
    }

    #[test]
    fn test_field_mapping_from_value_bag() {
        #[derive(Debug, Deserialize)]
        struct Summary {
            buyer: String,
        }

        let meta = EntityMeta::<Summary>::new();
        let values = ValueBag::new().with_named(
            meta.type_name(),
            FieldMapping::new().rename("customer", "buyer"),
        );
        let strategy = SerdeJsonStrategy::new(&StrategySetup::new(JsonOptions::default(), values));

        let doc = read_entity_document(&strategy, &meta, DOCUMENT).unwrap();
        assert_eq!(doc.entity.buyer, "Ada Lovelace");
    }

    #[test]
    fn test_read_database_info() {
        let strategy = SerdeJsonStrategy::default();
        let info = strategy.read_database_info(DATABASE_INFO).unwrap();
        assert_eq!(info.db_name, "orders");
        assert_eq!(info.update_seq, Sequence::Number(4721));
        assert!(strategy.read_database_info("{}").is_err());
    }

    #[test]
    fn test_create_json_for_put_entity() {
        let strategy = SerdeJsonStrategy::default();
        let order = Order {
            customer: "Ada".to_string(),
            total: 1.5,
        };
        let meta = EntityMeta::<Order>::new().with_field("cust", "customer");
        let request = PutRequest::entity("orders", Some("o-1"), None, &order, &meta).unwrap();

        let body: Value = serde_json::from_str(&strategy.create_json_for_put(&request).unwrap()).unwrap();
        assert_eq!(body, json!({"_id": "o-1", "cust": "Ada", "total": 1.5}));
    }

    #[test]
    fn test_create_json_for_put_drops_stale_revision() {
        let strategy = SerdeJsonStrategy::default();
        let request =
            PutRequest::text("orders", Some("o-1"), None, r#"{"_id":"other","_rev":"9-z","n":1}"#).unwrap();

        let body: Value = serde_json::from_str(&strategy.create_json_for_put(&request).unwrap()).unwrap();
        assert_eq!(body, json!({"_id": "o-1", "n": 1}));
    }

    #[test]
    fn test_create_json_rejects_non_objects() {
        let strategy = SerdeJsonStrategy::default();
        let request = PutRequest::text("orders", Some("o-1"), None, "[1,2]").unwrap();
        assert!(matches!(
            strategy.create_json_for_put(&request),
            Err(JsonError::UnexpectedShape(_))
        ));

        let request = PostRequest::text("orders", "nope").unwrap();
        assert!(matches!(
            strategy.create_json_for_post(&request),
            Err(JsonError::Malformed(_))
        ));
    }

    #[test]
    fn test_write_options() {
        let options = JsonOptions {
            pretty: true,
            omit_nulls: true,
        };
        let strategy = SerdeJsonStrategy::new(&StrategySetup::new(options, ValueBag::new()));
        let request = PostRequest::text("orders", r#"{"a":1,"b":null}"#).unwrap();

        let body = strategy.create_json_for_post(&request).unwrap();
        assert!(body.contains('\n'));
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"a": 1}));
    }

    #[test]
    fn test_read_document_update() {
        let strategy = SerdeJsonStrategy::default();
        let update = strategy
            .read_document_update(r#"{"ok":true,"id":"o-1","rev":"1-abc"}"#)
            .unwrap();
        assert_eq!(update.id.as_str(), "o-1");
        assert!(strategy.read_document_update(r#"{"ok":true}"#).is_err());
    }
}
