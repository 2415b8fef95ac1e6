//! Append-only, per-branch event logs with optimistic concurrency control.
//!
//! [`BranchStore`] is an explicitly constructed instance — there is no
//! process-wide singleton. Hand an `Arc<BranchStore>` to every collaborator
//! that needs it and drop the handle to tear the store down.
//!
//! # Concurrency
//!
//! The branch map sits behind an `RwLock`; each branch owns a `Mutex` that is
//! the single serialization point for that branch. Appends to the same
//! branch are totally ordered by that mutex, appends to different branches
//! proceed concurrently, and nothing blocks on external I/O inside either
//! lock.
//!
//! ```rust
//! use branchstore::{BranchStore, ExpectedVersion, PipelineEvent, NO_EVENTS_VERSION};
//!
//! let store = BranchStore::new();
//! assert_eq!(store.current_version("b1"), NO_EVENTS_VERSION);
//!
//! let v = store
//!     .append("b1", vec![PipelineEvent::reasoning_step("first")], ExpectedVersion::Any)
//!     .unwrap();
//! assert_eq!(v, 0);
//!
//! // Optimistic append: expected version must match.
//! let v = store
//!     .append("b1", vec![PipelineEvent::reasoning_step("second")], ExpectedVersion::Exact(0))
//!     .unwrap();
//! assert_eq!(v, 1);
//! ```
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::event::{PipelineEvent, VersionedEvent};

/// Version reported for a branch with no events (unknown or never appended).
///
/// The first appended event always receives version `0`.
pub const NO_EVENTS_VERSION: i64 = -1;

/// Concurrency expectation supplied with an append.
///
/// `Any` is a marker deliberately separate from the version domain, so
/// "skip the check" can never be confused with "I expect an empty branch" —
/// the latter is spelled `Exact(NO_EVENTS_VERSION)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Append unconditionally, whatever the current version is.
    Any,
    /// Append only if the branch's current version equals this value.
    /// `Exact(NO_EVENTS_VERSION)` asserts the branch has no events yet.
    Exact(i64),
}

#[derive(Debug)]
struct EventLog {
    version: i64,
    events: Vec<VersionedEvent>,
    /// Set by `delete` while holding the log mutex. An appender that raced
    /// the delete re-resolves the branch instead of writing into the
    /// unlinked log.
    unlinked: bool,
}

impl EventLog {
    fn empty() -> Self {
        Self {
            version: NO_EVENTS_VERSION,
            events: Vec::new(),
            unlinked: false,
        }
    }
}

type SharedLog = Arc<Mutex<EventLog>>;

/// Process-wide mapping from branch name to its append-only event log.
#[derive(Debug, Default)]
pub struct BranchStore {
    branches: RwLock<HashMap<String, SharedLog>>,
}

impl BranchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `events` to `branch` atomically as one unit.
    ///
    /// An empty `events` slice is a no-op that returns the branch's current
    /// version (the branch is not created). Otherwise the expected-version
    /// check runs inside the branch's critical section; on success each
    /// event receives a strictly increasing version and the new current
    /// version (that of the last event) is returned.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidBranchName`] for an empty name,
    /// [`StoreError::ConcurrencyConflict`] when `Exact(v)` does not match
    /// the branch's actual version.
    pub fn append(
        &self,
        branch: &str,
        events: Vec<PipelineEvent>,
        expected: ExpectedVersion,
    ) -> Result<i64, StoreError> {
        validate_branch_name(branch)?;
        if events.is_empty() {
            return Ok(self.current_version(branch));
        }

        loop {
            let existing = {
                let branches = self.branches.read().expect("branch map lock poisoned");
                branches.get(branch).cloned()
            };

            match existing {
                Some(log) => {
                    let mut log = log.lock().expect("branch log lock poisoned");
                    if log.unlinked {
                        // Lost a race with delete; this append is ordered
                        // after it and starts a new branch life.
                        continue;
                    }
                    check_expected(branch, expected, log.version)?;
                    return Ok(push_events(&mut log, branch, events));
                }
                None => {
                    // Branch does not exist yet. The check runs against the
                    // sentinel and, only if it passes, the branch is created
                    // under the map write lock so a failed check never
                    // leaves an empty log behind.
                    check_expected(branch, expected, NO_EVENTS_VERSION)?;
                    let mut branches =
                        self.branches.write().expect("branch map lock poisoned");
                    if branches.contains_key(branch) {
                        // Someone created it between our read and write.
                        continue;
                    }
                    let log = Arc::new(Mutex::new(EventLog::empty()));
                    let version = {
                        let mut guard = log.lock().expect("branch log lock poisoned");
                        push_events(&mut guard, branch, events)
                    };
                    branches.insert(branch.to_string(), log);
                    return Ok(version);
                }
            }
        }
    }

    /// All events with assigned version ≥ `from_version`, in append order.
    /// An unknown branch reads as an empty sequence.
    pub fn read(&self, branch: &str, from_version: i64) -> Vec<VersionedEvent> {
        let Some(log) = self.shared_log(branch) else {
            return Vec::new();
        };
        let log = log.lock().expect("branch log lock poisoned");
        log.events
            .iter()
            .filter(|e| e.version >= from_version)
            .cloned()
            .collect()
    }

    /// Current version of `branch`, or [`NO_EVENTS_VERSION`] when the branch
    /// is unknown.
    pub fn current_version(&self, branch: &str) -> i64 {
        match self.shared_log(branch) {
            Some(log) => log.lock().expect("branch log lock poisoned").version,
            None => NO_EVENTS_VERSION,
        }
    }

    /// Whether `branch` has a live log.
    pub fn exists(&self, branch: &str) -> bool {
        self.branches
            .read()
            .expect("branch map lock poisoned")
            .contains_key(branch)
    }

    /// Remove `branch` and its entire log. Idempotent: deleting an unknown
    /// branch is a no-op. The name may be reused afterwards for a fresh,
    /// independent branch life.
    pub fn delete(&self, branch: &str) {
        let Some(log) = self.shared_log(branch) else {
            debug!(branch, existed = false, "branch_delete");
            return;
        };

        // Take the branch mutex first so a concurrent append is ordered
        // strictly before or after this delete, never torn across it.
        let mut guard = log.lock().expect("branch log lock poisoned");
        guard.unlinked = true;
        guard.events.clear();
        guard.version = NO_EVENTS_VERSION;

        let mut branches = self.branches.write().expect("branch map lock poisoned");
        if let Some(current) = branches.get(branch) {
            if Arc::ptr_eq(current, &log) {
                branches.remove(branch);
            }
        }
        debug!(branch, existed = true, "branch_delete");
    }

    /// Names of all live branches, in no particular order.
    pub fn branch_names(&self) -> Vec<String> {
        self.branches
            .read()
            .expect("branch map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn shared_log(&self, branch: &str) -> Option<SharedLog> {
        self.branches
            .read()
            .expect("branch map lock poisoned")
            .get(branch)
            .cloned()
    }
}

fn validate_branch_name(branch: &str) -> Result<(), StoreError> {
    if branch.trim().is_empty() {
        return Err(StoreError::InvalidBranchName);
    }
    Ok(())
}

fn check_expected(
    branch: &str,
    expected: ExpectedVersion,
    actual: i64,
) -> Result<(), StoreError> {
    match expected {
        ExpectedVersion::Any => Ok(()),
        ExpectedVersion::Exact(v) if v == actual => Ok(()),
        ExpectedVersion::Exact(v) => {
            warn!(
                branch,
                expected = v,
                actual,
                "branch_append_conflict"
            );
            Err(StoreError::ConcurrencyConflict {
                branch: branch.to_string(),
                expected: v,
                actual,
            })
        }
    }
}

/// Assign sequential versions and extend the log. Caller holds the log lock.
fn push_events(log: &mut EventLog, branch: &str, events: Vec<PipelineEvent>) -> i64 {
    let appended = events.len();
    for event in events {
        log.version += 1;
        log.events.push(VersionedEvent {
            version: log.version,
            event,
        });
    }
    debug!(branch, appended, version = log.version, "branch_append");
    log.version
}
