use couchdoc_core::{Config, HttpRequest, Method};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Url};

/// Status and raw body of a response. The body is kept as text on every
/// status, since CouchDB answers errors with JSON too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid server URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Http(e) if e.is_timeout())
    }
}

/// Transport sends one request and returns the server's answer.
///
/// Timeouts and cancellation are the transport's business; callers make
/// exactly one `send` per request and never retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared reqwest connection pool
pub struct ReqwestTransport {
    base_url: Url,
    client: HttpClient,
    credentials: Option<(String, Option<String>)>,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            client: HttpClient::new(),
            credentials: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let client = HttpClient::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            base_url: parse_base_url(&config.url)?,
            client,
            credentials: config
                .credentials()
                .map(|(user, password)| (user.to_string(), password.map(str::to_string))),
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    /// Full URL for a request; path segments and query values are percent-encoded
    pub fn url_for(&self, request: &HttpRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(&request.segments);

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

fn parse_base_url(url: &str) -> Result<Url, TransportError> {
    Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(request)?;

        let mut builder = self
            .client
            .request(http_method(request.method), url)
            .header(ACCEPT, "application/json");

        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, password.as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchdoc_core::{DeleteRequest, GetRequest, ViewQualifier, ViewQuery};

    #[test]
    fn test_url_for_document() {
        let transport = ReqwestTransport::new("http://localhost:5984").unwrap();
        let request = GetRequest::document("orders", Some("a/b c")).unwrap().into_http();

        let url = transport.url_for(&request).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5984/orders/a%2Fb%20c");
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let transport = ReqwestTransport::new("https://example.com/couch/").unwrap();
        let request = DeleteRequest::new("orders", Some("7889"), Some("2-abc"))
            .unwrap()
            .into_http();

        let url = transport.url_for(&request).unwrap();
        assert_eq!(url.as_str(), "https://example.com/couch/orders/7889?rev=2-abc");
    }

    #[test]
    fn test_url_for_view_encodes_json_keys() {
        let transport = ReqwestTransport::new("http://localhost:5984").unwrap();
        let qualifier = ViewQualifier::view("app", "by_customer")
            .unwrap()
            .with_query(ViewQuery::default().key("Ada"));
        let request = GetRequest::view("orders", qualifier).unwrap().into_http();

        let url = transport.url_for(&request).unwrap();
        assert_eq!(url.path(), "/orders/_design/app/_view/by_customer");
        assert_eq!(url.query(), Some("include_docs=true&key=%22Ada%22"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ReqwestTransport::new("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ReqwestTransport::new("mailto:admin@example.com")
                .unwrap()
                .url_for(&GetRequest::database_info("orders").unwrap().into_http()),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Config::default()
        };
        let transport = ReqwestTransport::from_config(&config).unwrap();
        assert_eq!(
            transport.credentials,
            Some(("admin".to_string(), Some("secret".to_string())))
        );
        assert_eq!(transport.base_url.as_str(), "http://localhost:5984/");
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(201, "").is_success());
        assert!(!HttpResponse::new(304, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }
}
