//! `concierge agent` — Interactive or single-message chat mode.

use concierge_agent::{TurnChunk, TurnTransport};
use concierge_config::AppConfig;
use concierge_core::message::{Message, Role, ThreadId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const PREVIEW_CHARS: usize = 160;

pub async fn run(message: Option<String>, thread: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set the environment variable:");
        eprintln!("    export ANTHROPIC_API_KEY='sk-ant-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = concierge_gateway::build_runtime(&config).await?;
    let thread_id = thread.map(ThreadId::from).unwrap_or_default();
    info!(thread_id = %thread_id, model = %config.model, "Agent session started");

    if let Some(msg) = message {
        run_turn(&runtime.transport, &thread_id, msg).await;
        return Ok(());
    }

    println!();
    println!("  Concierge — Interactive Mode");
    println!();
    println!("  Model:   {}", config.model);
    println!("  Thread:  {thread_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        run_turn(&runtime.transport, &thread_id, line.to_string()).await;
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn run_turn(transport: &TurnTransport, thread_id: &ThreadId, message: String) {
    let mut stream = transport.submit_turn(thread_id.clone(), message);
    while let Some(chunk) = stream.next_chunk().await {
        debug!(thread_id = %thread_id, chunk = chunk.event_type(), "Chunk received");
        for line in render_chunk(&chunk) {
            println!("{line}");
        }
    }
}

/// Terminal lines for one chunk.
pub fn render_chunk(chunk: &TurnChunk) -> Vec<String> {
    match chunk {
        TurnChunk::Message { message, .. } => render_message(message),
        TurnChunk::Final { content, .. } => content.lines().map(|l| format!("  Assistant > {l}")).collect(),
        TurnChunk::Error { kind, message, .. } => vec![format!("  [Error: {kind}] {message}")],
    }
}

fn render_message(message: &Message) -> Vec<String> {
    match message.role {
        Role::Assistant => {
            let mut out: Vec<String> = message
                .content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| format!("  Assistant > {l}"))
                .collect();
            out.extend(
                message
                    .tool_calls
                    .iter()
                    .map(|tc| format!("  [calling {}] {}", tc.name, tc.arguments)),
            );
            out
        }
        Role::Tool => {
            let label = if message.is_error { "tool error" } else { "tool result" };
            vec![format!("  [{label}] {}", preview(&message.content))]
        }
        Role::User => Vec::new(),
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
