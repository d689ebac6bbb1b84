//! File-based conversation store — one JSON-lines file per thread.
//!
//! Every append writes exactly one line, so the file is itself the
//! append-only transcript. Threads are loaded lazily on first access and
//! cached; the cache is authoritative afterwards.
//!
//! Storage location: `~/.concierge/threads/<thread>.jsonl`

use async_trait::async_trait;
use concierge_core::error::StoreError;
use concierge_core::message::{ConversationState, Message, ThreadId};
use concierge_core::store::{ConversationStore, TurnLease, TurnLocks};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// One line of a thread file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    Message { message: Message },
    ToolOutput { tool: String, output: serde_json::Value },
}

/// How the file ends, as found when the thread was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Clean,
    /// A torn record follows this many good bytes.
    Torn(u64),
    /// The last record is whole but has no line terminator.
    Unterminated,
}

struct ThreadSlot {
    state: ConversationState,
    tail: Tail,
}

type Slot = Arc<Mutex<ThreadSlot>>;

pub struct FileConversationStore {
    dir: PathBuf,
    threads: RwLock<HashMap<ThreadId, Slot>>,
    turns: TurnLocks,
}

impl FileConversationStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File conversation store");
        Self {
            dir,
            threads: RwLock::new(HashMap::new()),
            turns: TurnLocks::new(),
        }
    }

    fn path_for(&self, thread_id: &ThreadId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", encode_file_stem(thread_id.as_str())))
    }

    /// The cached slot for a thread, loading it from disk on first use.
    ///
    /// The file is read without holding the map lock. If two callers race,
    /// the first insert wins and the other copy is discarded.
    async fn slot(&self, thread_id: &ThreadId) -> Result<Slot, StoreError> {
        if let Some(slot) = self.threads.read().await.get(thread_id) {
            return Ok(slot.clone());
        }
        let loaded = load_thread(&self.path_for(thread_id), thread_id).await?;
        let mut threads = self.threads.write().await;
        let slot = threads
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(loaded)));
        Ok(slot.clone())
    }

    /// Append one record as a single line.
    ///
    /// Called with the thread's slot locked. On a failed write the file is
    /// cut back to its previous length so no partial line is left behind.
    async fn write_record(
        &self,
        slot: &mut ThreadSlot,
        thread_id: &ThreadId,
        record: &Record,
    ) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to create thread directory: {e}")))?;

        let mut line = serde_json::to_string(record)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize record: {e}")))?;
        line.push('\n');

        let path = self.path_for(thread_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open {}: {e}", path.display())))?;

        match slot.tail {
            Tail::Clean => {}
            Tail::Torn(good_len) => {
                file.set_len(good_len)
                    .await
                    .map_err(|e| StoreError::Storage(format!("Failed to repair {}: {e}", path.display())))?;
                warn!(%thread_id, good_len, "Truncated torn record before appending");
            }
            Tail::Unterminated => line.insert(0, '\n'),
        }
        let restored = match slot.tail {
            Tail::Unterminated => Tail::Unterminated,
            _ => Tail::Clean,
        };

        let before = file
            .metadata()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to stat {}: {e}", path.display())))?
            .len();
        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            if let Err(trunc) = file.set_len(before).await {
                warn!(%thread_id, error = %trunc, "Failed to roll back partial record");
                slot.tail = Tail::Torn(before);
            } else {
                slot.tail = restored;
            }
            return Err(StoreError::Storage(format!("Failed to write {}: {e}", path.display())));
        }
        slot.tail = Tail::Clean;
        Ok(())
    }
}

/// Replay a thread file into state.
///
/// A bad final line is treated as a torn write and dropped; a bad line
/// anywhere else means the transcript can't be trusted. The file itself is
/// left alone here; the torn bytes are cut on the next write.
async fn load_thread(path: &Path, thread_id: &ThreadId) -> Result<ThreadSlot, StoreError> {
    let mut state = ConversationState::new(thread_id.clone());
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ThreadSlot { state, tail: Tail::Clean });
        }
        Err(e) => {
            return Err(StoreError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    let lines: Vec<(usize, &str)> = content
        .split_inclusive('\n')
        .scan(0usize, |offset, raw| {
            let start = *offset;
            *offset += raw.len();
            Some((start, raw))
        })
        .filter(|(_, raw)| !raw.trim().is_empty())
        .collect();

    let mut tail = Tail::Clean;
    let last = lines.len().saturating_sub(1);
    for (i, (start, raw)) in lines.iter().enumerate() {
        match serde_json::from_str::<Record>(raw.trim_end()) {
            Ok(record) => {
                match record {
                    Record::Message { message } => state.push(message),
                    Record::ToolOutput { tool, output } => state.set_tool_output(tool, output),
                }
                if i == last && !raw.ends_with('\n') {
                    tail = Tail::Unterminated;
                }
            }
            Err(e) if i == last => {
                warn!(%thread_id, error = %e, "Dropping torn trailing record");
                tail = Tail::Torn(*start as u64);
            }
            Err(e) => {
                return Err(StoreError::Corrupted {
                    thread_id: thread_id.to_string(),
                    reason: format!("line {}: {e}", i + 1),
                });
            }
        }
    }
    debug!(%thread_id, messages = state.len(), "Thread loaded from disk");
    Ok(ThreadSlot { state, tail })
}

/// Thread ids are caller-supplied; anything outside `[A-Za-z0-9_-]` is
/// percent-encoded so the id maps to exactly one safe file name.
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<ConversationState, StoreError> {
        let slot = self.slot(thread_id).await?;
        let slot = slot.lock().await;
        Ok(slot.state.clone())
    }

    async fn append(&self, thread_id: &ThreadId, message: Message) -> Result<(), StoreError> {
        let slot = self.slot(thread_id).await?;
        let mut slot = slot.lock().await;
        let record = Record::Message { message };
        self.write_record(&mut slot, thread_id, &record).await?;
        if let Record::Message { message } = record {
            slot.state.push(message);
        }
        Ok(())
    }

    async fn record_tool_output(
        &self,
        thread_id: &ThreadId,
        tool_name: &str,
        output: serde_json::Value,
    ) -> Result<(), StoreError> {
        let slot = self.slot(thread_id).await?;
        let mut slot = slot.lock().await;
        let record = Record::ToolOutput {
            tool: tool_name.to_string(),
            output,
        };
        self.write_record(&mut slot, thread_id, &record).await?;
        if let Record::ToolOutput { tool, output } = record {
            slot.state.set_tool_output(tool, output);
        }
        Ok(())
    }

    async fn lease(&self, thread_id: &ThreadId) -> Result<TurnLease, StoreError> {
        self.turns.acquire(thread_id).await
    }

    async fn threads(&self) -> Result<Vec<ThreadId>, StoreError> {
        let mut ids: BTreeSet<ThreadId> = self.threads.read().await.keys().cloned().collect();

        match tokio::fs::read_dir(&self.dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| StoreError::Storage(e.to_string()))?
                {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                        continue;
                    }
                    if let Some(id) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(decode_file_stem)
                    {
                        ids.insert(ThreadId::from(id));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Storage(e.to_string())),
        }

        Ok(ids.into_iter().collect())
    }

    async fn contains(&self, thread_id: &ThreadId) -> Result<bool, StoreError> {
        if self.threads.read().await.contains_key(thread_id) {
            return Ok(true);
        }
        let path = self.path_for(thread_id);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to stat {}: {e}", path.display())))
    }
}
