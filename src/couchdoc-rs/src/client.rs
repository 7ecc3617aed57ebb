use couchdoc_core::{
    Config, HttpRequest, JsonError, JsonOptions, JsonStrategy, Method, SerdeJsonStrategy,
    ServerInfo, StrategySetup, ValueBag,
};
use std::sync::Arc;

use crate::database::Database;
use crate::executor::RequestExecutor;
use crate::transport::{ReqwestTransport, Transport};
use crate::Result;

/// couchdoc server client. Hands out [`Database`] handles that share its
/// transport and JSON strategy.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    strategy: Arc<dyn JsonStrategy>,
}

impl Client {
    /// Create a new client connected to the given base URL
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let transport = ReqwestTransport::new(base_url.as_ref())?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Create a client from configuration: URL, credentials, timeout, body format
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::from_config(config)?;
        tracing::info!(url = %config.url, timeout_secs = config.timeout_secs, "couchdoc client configured");
        Ok(Self::with_transport(Arc::new(transport))
            .with_setup(StrategySetup::new(config.json.clone(), ValueBag::new())))
    }

    pub fn from_config_file(path: &str) -> anyhow::Result<Self> {
        let config = Config::load(path)?;
        Ok(Self::from_config(&config)?)
    }

    /// Client over any transport, using the default serde_json strategy
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            strategy: Arc::new(SerdeJsonStrategy::default()),
        }
    }

    /// Swap in another JSON strategy. `init` runs once here, before sharing.
    pub fn with_strategy<S: JsonStrategy + 'static>(mut self, mut strategy: S, setup: &StrategySetup) -> Self {
        strategy.init(setup);
        let strategy: Arc<dyn JsonStrategy> = Arc::new(strategy);
        self.strategy = strategy;
        self
    }

    /// Re-initialize the default strategy with new options and values
    pub fn with_setup(self, setup: StrategySetup) -> Self {
        self.with_strategy(SerdeJsonStrategy::default(), &setup)
    }

    /// Default strategy with the given ambient values, e.g. per-type field mappings
    pub fn with_values(self, values: ValueBag) -> Self {
        self.with_setup(StrategySetup::new(JsonOptions::default(), values))
    }

    pub fn database(&self, name: &str) -> Result<Database> {
        Database::new(name, self.transport.clone(), self.strategy.clone())
    }

    /// Health check: the welcome document at the server root
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let executor = RequestExecutor::new(self.transport.as_ref(), self.strategy.as_ref());
        executor
            .execute(HttpRequest::new(Method::Get, Vec::new()), |_, json| {
                serde_json::from_str(json).map_err(JsonError::from)
            })
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}
