//! Shared fixtures for agent integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concierge_agent::{AgentLoop, ModelGateway, ToolDispatcher, TurnTransport};
use concierge_core::error::{ProviderError, ToolError};
use concierge_core::event::EventBus;
use concierge_core::message::{Message, MessageToolCall};
use concierge_core::provider::{GenerationConfig, Provider, ProviderRequest, ProviderResponse, Usage};
use concierge_core::retry::RetryPolicy;
use concierge_core::search::{PlaceSearch, WebSearch};
use concierge_core::store::ConversationStore;
use concierge_core::tool::{SideEffect, Tool, ToolRegistry};
use concierge_memory::{InMemoryConversationStore, InMemoryRestaurantStore};
use concierge_tools::{ToolDeps, concierge_registry};

type Responder = Box<dyn Fn(&ProviderRequest) -> Result<ProviderResponse, ProviderError> + Send + Sync>;

/// A model that replays a script, or answers through a closure once the
/// script runs out.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ProviderRequest) -> Result<ProviderResponse, ProviderError> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.responder {
            Some(responder) => responder(&request),
            None => Err(ProviderError::MalformedResponse("script exhausted".into())),
        }
    }
}

pub fn reply(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
        stop_reason: None,
    }
}

pub fn text(content: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(reply(Message::assistant(content)))
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

pub fn tool_calls(calls: Vec<MessageToolCall>) -> Result<ProviderResponse, ProviderError> {
    Ok(reply(Message::assistant_tool_calls("", calls)))
}

pub struct StubPlaces;

#[async_trait]
impl PlaceSearch for StubPlaces {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search_places(
        &self,
        query: &str,
        location: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        Ok(vec![
            serde_json::json!({"title": "Juliet Italian Kitchen", "query": query, "location": location, "data_cid": "101"}),
            serde_json::json!({"title": "L'Oca d'Oro", "data_cid": "102"}),
            serde_json::json!({"title": "Red Ash Italia", "data_cid": "103"}),
        ])
    }

    async fn place_details(&self, id: &str) -> Result<serde_json::Value, ProviderError> {
        Ok(serde_json::json!({"data_cid": id, "title": "Juliet Italian Kitchen"}))
    }
}

pub struct StubWeb;

#[async_trait]
impl WebSearch for StubWeb {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, query: &str) -> Result<serde_json::Value, ProviderError> {
        Ok(serde_json::json!({"hits": [{"title": query}]}))
    }
}

/// A read-only tool that waits on a shared barrier, for concurrency tests.
pub struct BarrierTool {
    pub barrier: Arc<tokio::sync::Barrier>,
}

#[async_trait]
impl Tool for BarrierTool {
    fn name(&self) -> &str {
        "rendezvous"
    }
    fn description(&self) -> &str {
        "Waits until every participant arrives"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    fn side_effect(&self) -> SideEffect {
        SideEffect::IdempotentRead
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.barrier.wait().await;
        Ok(serde_json::json!("met"))
    }
}

/// A tool that never finishes on its own.
pub struct HangingTool;

#[async_trait]
impl Tool for HangingTool {
    fn name(&self) -> &str {
        "hang"
    }
    fn description(&self) -> &str {
        "Never returns"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    fn side_effect(&self) -> SideEffect {
        SideEffect::NetworkSearch
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        std::future::pending::<()>().await;
        Ok(serde_json::Value::Null)
    }
}

pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    fn side_effect(&self) -> SideEffect {
        SideEffect::IdempotentRead
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        panic!("tool blew up");
    }
}

pub fn concierge_tools() -> ToolRegistry {
    concierge_registry(ToolDeps {
        places: Arc::new(StubPlaces),
        web: Arc::new(StubWeb),
        records: Arc::new(InMemoryRestaurantStore::new()),
    })
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<InMemoryConversationStore>,
    pub events: Arc<EventBus>,
    pub transport: TurnTransport,
}

pub fn harness(provider: ScriptedProvider, tools: ToolRegistry, max_iterations: u32) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(InMemoryConversationStore::new());
    let events = Arc::new(EventBus::default());

    let gateway = ModelGateway::new(provider.clone(), GenerationConfig::default())
        .with_retry_policy(RetryPolicy::none());
    let dispatcher = ToolDispatcher::new(tools);
    let store_handle: Arc<dyn ConversationStore> = store.clone();
    let agent = AgentLoop::new(gateway, dispatcher, store_handle, events.clone())
        .with_max_iterations(max_iterations);

    Harness {
        provider,
        store,
        events,
        transport: TurnTransport::new(Arc::new(agent)),
    }
}
