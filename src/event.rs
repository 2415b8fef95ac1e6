//! Domain events recorded in a branch's append-only log.
//!
//! [`PipelineEvent`] is a closed sum type with an explicit discriminant: the
//! serde `kind` tag is the stable string used by the wire/storage encoding,
//! so adding a variant never perturbs existing tags. Every variant carries a
//! unique id and a UTC timestamp and is immutable once created.
//!
//! ```rust
//! use branchstore::PipelineEvent;
//!
//! let event = PipelineEvent::reasoning_step("compare retrieved passages");
//! assert_eq!(event.kind(), "reasoning_step");
//!
//! let json = serde_json::to_string(&event).unwrap();
//! assert!(json.contains("\"kind\":\"reasoning_step\""));
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single state change in the ingestion/reasoning pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A batch of documents passed the dedup gate and entered the branch's
    /// vector store.
    IngestBatch {
        id: String,
        timestamp: DateTime<Utc>,
        /// Where the batch came from (feed name, file path, caller label).
        source: String,
        /// Number of vectors accepted into the store.
        document_count: usize,
    },
    /// One step of model reasoning recorded against the branch.
    ReasoningStep {
        id: String,
        timestamp: DateTime<Utc>,
        content: String,
    },
    /// An external tool was invoked on behalf of the branch.
    ToolInvocation {
        id: String,
        timestamp: DateTime<Utc>,
        tool: String,
        arguments: serde_json::Value,
    },
    /// This branch was created by restoring a snapshot of `parent`.
    BranchForked {
        id: String,
        timestamp: DateTime<Utc>,
        parent: String,
    },
}

impl PipelineEvent {
    /// Build an [`IngestBatch`](Self::IngestBatch) event with a fresh id and
    /// the current time.
    pub fn ingest_batch(source: impl Into<String>, document_count: usize) -> Self {
        Self::IngestBatch {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source: source.into(),
            document_count,
        }
    }

    /// Build a [`ReasoningStep`](Self::ReasoningStep) event.
    pub fn reasoning_step(content: impl Into<String>) -> Self {
        Self::ReasoningStep {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            content: content.into(),
        }
    }

    /// Build a [`ToolInvocation`](Self::ToolInvocation) event.
    pub fn tool_invocation(tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::ToolInvocation {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tool: tool.into(),
            arguments,
        }
    }

    /// Build a [`BranchForked`](Self::BranchForked) event pointing back at
    /// the branch the snapshot was captured from.
    pub fn branch_forked(parent: impl Into<String>) -> Self {
        Self::BranchForked {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            parent: parent.into(),
        }
    }

    /// Unique identifier of this event.
    pub fn id(&self) -> &str {
        match self {
            Self::IngestBatch { id, .. }
            | Self::ReasoningStep { id, .. }
            | Self::ToolInvocation { id, .. }
            | Self::BranchForked { id, .. } => id,
        }
    }

    /// Stable discriminant string, identical to the serde `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IngestBatch { .. } => "ingest_batch",
            Self::ReasoningStep { .. } => "reasoning_step",
            Self::ToolInvocation { .. } => "tool_invocation",
            Self::BranchForked { .. } => "branch_forked",
        }
    }

    /// Creation time of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::IngestBatch { timestamp, .. }
            | Self::ReasoningStep { timestamp, .. }
            | Self::ToolInvocation { timestamp, .. }
            | Self::BranchForked { timestamp, .. } => *timestamp,
        }
    }
}

/// An event paired with the version it was assigned at append time.
///
/// Produced only by [`BranchStore::append`](crate::BranchStore::append) and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedEvent {
    /// Position in the branch's log; the first appended event gets 0.
    pub version: i64,
    pub event: PipelineEvent,
}
