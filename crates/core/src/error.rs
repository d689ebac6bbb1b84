//! Error types for the Concierge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Concierge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Turn budget ---
    #[error("Iteration budget exceeded after {iterations} model calls")]
    BudgetExceeded { iterations: u32 },

    #[error("Turn cancelled: {0}")]
    Cancelled(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The caller-visible classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(ProviderError::RetriesExhausted { .. }) => ErrorKind::TransientProvider,
            Self::Provider(e) if e.is_transient() => ErrorKind::TransientProvider,
            Self::Provider(_) => ErrorKind::FatalProvider,
            Self::Store(_) => ErrorKind::Storage,
            Self::Tool(ToolError::InvalidArguments(_)) | Self::Tool(ToolError::NotFound(_)) => {
                ErrorKind::Validation
            }
            Self::Tool(ToolError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Tool(_) => ErrorKind::ToolExecution,
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Config { .. } => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::MalformedUpstream,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Serializable error tag carried by terminal error chunks and failed tool results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Timeout,
    ToolExecution,
    TransientProvider,
    FatalProvider,
    BudgetExceeded,
    Storage,
    MalformedUpstream,
    Cancelled,
    Config,
    Internal,
}

/// Prints the serialized tag, so logs and wire payloads always agree.
impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{self:?}"),
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Rate limits, timeouts, dropped connections and server-side failures
    /// (5xx, 529 overload) are transient. Everything else fails fast.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_)
            | Self::MalformedResponse(_)
            | Self::NotConfigured(_)
            | Self::RetriesExhausted { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupted state for thread {thread_id}: {reason}")]
    Corrupted { thread_id: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(ProviderError::Timeout("slow".into()).is_transient());
        assert!(
            ProviderError::ApiError {
                status_code: 529,
                message: "overloaded".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::ApiError {
                status_code: 400,
                message: "bad request".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(!ProviderError::MalformedResponse("junk".into()).is_transient());
    }

    #[test]
    fn error_kind_display_matches_wire_name() {
        use ErrorKind::*;
        let all = [
            Validation,
            Timeout,
            ToolExecution,
            TransientProvider,
            FatalProvider,
            BudgetExceeded,
            Storage,
            MalformedUpstream,
            Cancelled,
            Config,
            Internal,
        ];
        for kind in all {
            // Fails to compile when a variant is added without extending `all`.
            match kind {
                Validation | Timeout | ToolExecution | TransientProvider | FatalProvider
                | BudgetExceeded | Storage | MalformedUpstream | Cancelled | Config | Internal => {}
            }
            let wire = serde_json::to_value(kind).unwrap();
            assert_eq!(wire, serde_json::Value::String(kind.to_string()));
            let back: ErrorKind = serde_json::from_value(wire).unwrap();
            assert_eq!(back, kind);
        }
        assert_eq!(TransientProvider.to_string(), "transient_provider");
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            Error::BudgetExceeded { iterations: 5 }.kind(),
            ErrorKind::BudgetExceeded
        );
        assert_eq!(
            Error::Provider(ProviderError::AuthenticationFailed("x".into())).kind(),
            ErrorKind::FatalProvider
        );
        assert_eq!(
            Error::Provider(ProviderError::RetriesExhausted {
                attempts: 3,
                last_error: "rate limited".into()
            })
            .kind(),
            ErrorKind::TransientProvider
        );
        assert_eq!(ErrorKind::BudgetExceeded.to_string(), "budget_exceeded");
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FatalProvider).unwrap();
        assert_eq!(json, r#""fatal_provider""#);
    }
}
