//! Runtime assembly from configuration.
//!
//! Builds every collaborator once (model provider, search clients, stores,
//! tool registry) and hands out shared handles. Used by both the HTTP server
//! and the CLI chat command.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_agent::{AgentLoop, ModelGateway, TurnTransport};
use concierge_config::{AppConfig, ConversationBackend};
use concierge_core::error::{ProviderError, Result};
use concierge_core::event::EventBus;
use concierge_core::provider::Provider;
use concierge_core::records::RestaurantStore;
use concierge_core::search::{PlaceSearch, WebSearch};
use concierge_core::store::ConversationStore;
use concierge_memory::{FileConversationStore, InMemoryConversationStore, InMemoryRestaurantStore};
use concierge_providers::{AnthropicProvider, ValueSerpClient, YouComClient};
use concierge_tools::{ToolDeps, concierge_registry};
use tracing::{info, warn};

/// Everything a front end needs to run turns.
#[derive(Clone)]
pub struct Runtime {
    pub transport: TurnTransport,
    pub conversations: Arc<dyn ConversationStore>,
    pub records: Arc<dyn RestaurantStore>,
    pub events: Arc<EventBus>,
    /// Direct handles on the upstream services, for the passthrough routes.
    pub places: Arc<dyn PlaceSearch>,
    pub web: Arc<dyn WebSearch>,
    pub model: Arc<ModelGateway>,
}

/// Build the runtime described by `config`.
///
/// The model provider is required. A search backend without an API key is
/// replaced by a stand-in whose calls fail, so the model can tell the user
/// instead of the whole service refusing to start.
pub async fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    let provider: Arc<dyn Provider> = Arc::new(AnthropicProvider::from_config(config)?);

    let places: Arc<dyn PlaceSearch> = match ValueSerpClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Place search disabled");
            Arc::new(Unconfigured(e))
        }
    };
    let web: Arc<dyn WebSearch> = match YouComClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Web search disabled");
            Arc::new(Unconfigured(e))
        }
    };

    let records = open_records(config).await?;
    let conversations = open_conversations(config);

    let deps = ToolDeps { places, web, records };
    Ok(assemble(config, provider, deps, conversations))
}

/// Wire a runtime from already-built collaborators.
pub fn assemble(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    deps: ToolDeps,
    conversations: Arc<dyn ConversationStore>,
) -> Runtime {
    let events = Arc::new(EventBus::default());
    let records = deps.records.clone();
    let places = deps.places.clone();
    let web = deps.web.clone();
    let model = Arc::new(ModelGateway::from_config(provider.clone(), config));
    let tools = concierge_registry(deps);
    info!(
        provider = provider.name(),
        model = %config.model,
        tools = ?tools.names(),
        conversations = conversations.name(),
        "Runtime assembled"
    );

    let agent = AgentLoop::from_config(config, provider, tools, conversations.clone(), events.clone());
    Runtime {
        transport: TurnTransport::new(Arc::new(agent)),
        conversations,
        records,
        events,
        places,
        web,
        model,
    }
}

fn open_conversations(config: &AppConfig) -> Arc<dyn ConversationStore> {
    match config.store.conversations {
        ConversationBackend::Memory => Arc::new(InMemoryConversationStore::new()),
        ConversationBackend::File => Arc::new(FileConversationStore::new(config.store.conversation_dir())),
    }
}

#[cfg(feature = "sqlite")]
async fn open_records(config: &AppConfig) -> Result<Arc<dyn RestaurantStore>> {
    match &config.store.database_url {
        Some(url) => Ok(Arc::new(concierge_memory::SqliteRestaurantStore::new(url).await?)),
        None => Ok(Arc::new(InMemoryRestaurantStore::new())),
    }
}

#[cfg(not(feature = "sqlite"))]
async fn open_records(config: &AppConfig) -> Result<Arc<dyn RestaurantStore>> {
    if config.store.database_url.is_some() {
        warn!("database_url is set but SQLite support is not compiled in; using in-memory records");
    }
    Ok(Arc::new(InMemoryRestaurantStore::new()))
}

/// Stand-in for a search backend with no credentials.
struct Unconfigured(ProviderError);

#[async_trait]
impl PlaceSearch for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn search_places(
        &self,
        _query: &str,
        _location: Option<&str>,
    ) -> std::result::Result<Vec<serde_json::Value>, ProviderError> {
        Err(self.0.clone())
    }

    async fn place_details(&self, _id: &str) -> std::result::Result<serde_json::Value, ProviderError> {
        Err(self.0.clone())
    }
}

#[async_trait]
impl WebSearch for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn search(&self, _query: &str) -> std::result::Result<serde_json::Value, ProviderError> {
        Err(self.0.clone())
    }

    async fn query_web_llm(&self, _query: &str) -> std::result::Result<serde_json::Value, ProviderError> {
        Err(self.0.clone())
    }
}
