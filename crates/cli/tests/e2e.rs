//! End-to-end tests for the concierge runtime.
//!
//! These run the same assembly the CLI and gateway use, with a scripted model
//! and stub search backends, from user input through tool execution to the
//! terminal chunk.

use std::sync::{Arc, Mutex};

use concierge_agent::TurnChunk;
use concierge_config::AppConfig;
use concierge_core::error::{ErrorKind, ProviderError};
use concierge_core::message::{Message, MessageToolCall, Role, ThreadId};
use concierge_core::provider::{Provider, ProviderRequest, ProviderResponse};
use concierge_core::records::RestaurantStore;
use concierge_core::search::{PlaceSearch, WebSearch};
use concierge_core::store::ConversationStore;
use concierge_memory::{FileConversationStore, InMemoryConversationStore, InMemoryRestaurantStore};
use concierge_tools::ToolDeps;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replays responses in order; fails once the script runs out.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(mut responses: Vec<ProviderResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> ProviderRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::MalformedResponse("script exhausted".into()))
    }
}

fn text_response(content: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(content),
        usage: None,
        model: "e2e-model".into(),
        stop_reason: None,
    }
}

fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls("", calls),
        usage: None,
        model: "e2e-model".into(),
        stop_reason: Some("tool_use".into()),
    }
}

fn call(id: &str, name: &str, arguments: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

// ── Stub search backends ─────────────────────────────────────────────────

struct AustinPlaces;

#[async_trait::async_trait]
impl PlaceSearch for AustinPlaces {
    fn name(&self) -> &str {
        "austin"
    }

    async fn search_places(
        &self,
        _query: &str,
        _location: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        Ok(vec![serde_json::json!({
            "title": "Juliet Italian Kitchen",
            "data_cid": "101",
            "rating": 4.5,
            "reviews": 1200
        })])
    }

    async fn place_details(&self, id: &str) -> Result<serde_json::Value, ProviderError> {
        Ok(serde_json::json!({"data_cid": id, "address": "1500 Barton Springs Rd, Austin, TX"}))
    }
}

struct NoWeb;

#[async_trait::async_trait]
impl WebSearch for NoWeb {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(&self, _query: &str) -> Result<serde_json::Value, ProviderError> {
        Err(ProviderError::NotConfigured("YOUCOM_API_KEY is not set".into()))
    }
}

fn runtime_with(
    provider: Arc<ScriptedProvider>,
    conversations: Arc<dyn ConversationStore>,
    records: Arc<dyn RestaurantStore>,
) -> concierge_gateway::Runtime {
    let mut config = AppConfig::default();
    config.retry.max_attempts = 1;
    let deps = ToolDeps {
        places: Arc::new(AustinPlaces),
        web: Arc::new(NoWeb),
        records,
    };
    concierge_gateway::assemble(&config, provider, deps, conversations)
}

fn final_content(chunks: &[TurnChunk]) -> &str {
    match chunks.last() {
        Some(TurnChunk::Final { content, .. }) => content,
        other => panic!("expected a final chunk, got {other:?}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plain_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response(
        "Hello! Where are you dining tonight?",
    )]));
    let runtime = runtime_with(
        provider.clone(),
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(InMemoryRestaurantStore::new()),
    );

    let chunks = runtime
        .transport
        .submit_turn(ThreadId::from("hello"), "Hi")
        .collect_all()
        .await;

    assert_eq!(chunks.len(), 1);
    assert_eq!(final_content(&chunks), "Hello! Where are you dining tonight?");
    assert_eq!(provider.calls(), 1);

    let request = provider.last_request();
    assert!(request.system.is_some());
    assert_eq!(request.tools.len(), 5);
}

#[tokio::test]
async fn e2e_search_then_save_then_lookup() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![call(
            "s1",
            "search_restaurants",
            serde_json::json!({"query": "italian", "location": "Austin, TX"}),
        )]),
        tool_response(vec![call(
            "w1",
            "save_restaurant",
            serde_json::json!({
                "title": "Juliet Italian Kitchen",
                "type": "restaurant",
                "category": "Italian",
                "rating": 4.5,
                "reviews": 1200,
                "address": "1500 Barton Springs Rd, Austin, TX"
            }),
        )]),
        text_response("Saved Juliet Italian Kitchen for you."),
        tool_response(vec![call(
            "l1",
            "lookup_restaurants",
            serde_json::json!({"category": "Italian", "min_rating": 4.0}),
        )]),
        text_response("You have one saved Italian spot: Juliet Italian Kitchen."),
    ]));
    let records = Arc::new(InMemoryRestaurantStore::new());
    let runtime = runtime_with(
        provider.clone(),
        Arc::new(InMemoryConversationStore::new()),
        records.clone(),
    );
    let thread = ThreadId::from("austin");

    let first = runtime
        .transport
        .submit_turn(thread.clone(), "Find and save a good Italian place in Austin")
        .collect_all()
        .await;
    assert_eq!(final_content(&first), "Saved Juliet Italian Kitchen for you.");
    assert_eq!(first.iter().filter(|c| c.is_terminal()).count(), 1);
    assert_eq!(records.len().await, 1);

    let second = runtime
        .transport
        .submit_turn(thread.clone(), "What have I saved?")
        .collect_all()
        .await;
    assert_eq!(
        final_content(&second),
        "You have one saved Italian spot: Juliet Italian Kitchen."
    );

    // The lookup result went back to the model as the last tool message.
    let request = provider.last_request();
    let tool_msg = request.messages.last().unwrap();
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("l1"));
    assert!(tool_msg.content.contains("Juliet Italian Kitchen"));

    let state = runtime.conversations.get(&thread).await.unwrap();
    assert!(state.tool_outputs.contains_key("search_restaurants"));
    assert!(state.tool_outputs.contains_key("lookup_restaurants"));
    assert!(state.unresolved_tool_calls().is_empty());
}

#[tokio::test]
async fn e2e_tool_failure_is_reported_to_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(vec![call(
            "w1",
            "web_search",
            serde_json::json!({"query": "best tiramisu austin"}),
        )]),
        text_response("Web search is unavailable right now."),
    ]));
    let runtime = runtime_with(
        provider.clone(),
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(InMemoryRestaurantStore::new()),
    );

    let chunks = runtime
        .transport
        .submit_turn(ThreadId::from("web"), "Best tiramisu?")
        .collect_all()
        .await;

    assert_eq!(final_content(&chunks), "Web search is unavailable right now.");
    let result = chunks
        .iter()
        .find_map(|c| match c {
            TurnChunk::Message { message, .. } if message.role == Role::Tool => Some(message),
            _ => None,
        })
        .unwrap();
    assert!(result.is_error);
    assert!(result.content.contains("tool_execution"));
}

#[tokio::test]
async fn e2e_provider_outage_ends_with_error_chunk() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let runtime = runtime_with(
        provider,
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(InMemoryRestaurantStore::new()),
    );
    let thread = ThreadId::from("outage");

    let chunks = runtime
        .transport
        .submit_turn(thread.clone(), "Anything open late?")
        .collect_all()
        .await;

    assert_eq!(chunks.len(), 1);
    match &chunks[0] {
        TurnChunk::Error { kind, .. } => assert_eq!(*kind, ErrorKind::FatalProvider),
        other => panic!("expected error chunk, got {other:?}"),
    }

    // The user message is still on record.
    let state = runtime.conversations.get(&thread).await.unwrap();
    assert_eq!(state.len(), 1);
    assert_eq!(state.messages[0].role, Role::User);
}

#[tokio::test]
async fn e2e_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let thread = ThreadId::from("persisted");

    {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![call(
                "d1",
                "get_restaurant_details",
                serde_json::json!({"data_cid": "101"}),
            )]),
            text_response("It's on Barton Springs Rd."),
        ]));
        let runtime = runtime_with(
            provider,
            Arc::new(FileConversationStore::new(dir.path())),
            Arc::new(InMemoryRestaurantStore::new()),
        );
        let chunks = runtime
            .transport
            .submit_turn(thread.clone(), "Where is Juliet?")
            .collect_all()
            .await;
        assert_eq!(final_content(&chunks), "It's on Barton Springs Rd.");
    }

    let reopened = FileConversationStore::new(dir.path());
    let state = reopened.get(&thread).await.unwrap();
    let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert!(state.tool_outputs.contains_key("get_restaurant_details"));
    assert_eq!(reopened.threads().await.unwrap(), vec![thread]);
}
