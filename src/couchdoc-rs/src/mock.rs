//! In-memory transport for tests: canned answers per method and path, and a
//! log of every request sent.

use std::collections::HashMap;
use std::sync::Mutex;

use couchdoc_core::{HttpRequest, Method};

use crate::transport::{HttpResponse, Transport, TransportError};

enum Canned {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<(&'static str, String), Canned>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn respond(mut self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            (method.as_str(), path.to_string()),
            Canned::Respond(HttpResponse::new(status, body)),
        );
        self
    }

    pub fn fail(mut self, method: Method, path: &str, message: &str) -> Self {
        self.routes
            .insert((method.as_str(), path.to_string()), Canned::Fail(message.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());

        match self.routes.get(&(request.method.as_str(), request.path())) {
            Some(Canned::Respond(response)) => Ok(response.clone()),
            Some(Canned::Fail(message)) => Err(TransportError::Other(message.clone())),
            None => Ok(HttpResponse::new(
                404,
                r#"{"error":"not_found","reason":"missing"}"#,
            )),
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("couchdoc_rs=debug,couchdoc_core=debug")
        .try_init();
}
