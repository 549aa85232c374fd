//! Concurrent operation registry with revocable registrations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use devtools_core::{LogicError, LogicResult, OperationResolver};
use serde_json::Value;
use tracing::debug;

use super::operation::{OperationDescriptor, OperationError};

struct Registered {
    seq: u64,
    descriptor: Arc<OperationDescriptor>,
}

type OperationTable = DashMap<String, Registered>;

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Name-keyed table of every dispatchable operation.
///
/// Lookups never block behind registration of other names. Each entry carries
/// a registration sequence number, so a [`RevocationHandle`] only ever removes
/// the registration it was issued for.
pub struct OperationRegistry {
    table: Arc<OperationTable>,
    next_seq: AtomicU64,
}

impl OperationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Registers `descriptor` and returns a handle that removes it again.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateOperation` if the name is already taken; the
    /// existing registration is left untouched.
    pub fn register(&self, descriptor: OperationDescriptor) -> Result<RevocationHandle, OperationError> {
        let name = descriptor.name().to_string();
        let seq = self.insert(descriptor)?;
        Ok(RevocationHandle {
            table: Arc::downgrade(&self.table),
            name,
            seq,
            revoked: AtomicBool::new(false),
        })
    }

    /// Registers a native operation for the lifetime of the registry.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateOperation` if the name is already taken.
    pub fn register_native(&self, descriptor: OperationDescriptor) -> Result<(), OperationError> {
        self.insert(descriptor).map(|_| ())
    }

    fn insert(&self, descriptor: OperationDescriptor) -> Result<u64, OperationError> {
        match self.table.entry(descriptor.name().to_string()) {
            Entry::Occupied(occupied) => Err(OperationError::DuplicateOperation {
                name: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                debug!(operation = %vacant.key(), kind = ?descriptor.kind(), "operation registered");
                vacant.insert(Registered {
                    seq,
                    descriptor: Arc::new(descriptor),
                });
                Ok(seq)
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<OperationDescriptor>> {
        self.table.get(name).map(|entry| entry.descriptor.clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Snapshot of all registered operations in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<OperationDescriptor>> {
        let mut entries: Vec<(u64, Arc<OperationDescriptor>)> = self
            .table
            .iter()
            .map(|entry| (entry.seq, entry.descriptor.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, descriptor)| descriptor).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Looks up `name` and invokes it with `params`.
    ///
    /// The descriptor is cloned out of the table before the handler runs, so
    /// an operation revoked mid-call still completes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` or whatever the operation itself fails with.
    pub async fn dispatch(&self, name: &str, params: Value) -> Result<Value, OperationError> {
        let descriptor = self
            .lookup(name)
            .ok_or_else(|| OperationError::UnknownOperation {
                name: name.to_string(),
            })?;
        descriptor.invoke(params).await
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.table.len())
            .finish()
    }
}

#[async_trait]
impl OperationResolver for OperationRegistry {
    fn contains(&self, method: &str) -> bool {
        OperationRegistry::contains(self, method)
    }

    async fn invoke(&self, method: &str, params: Value) -> LogicResult {
        self.dispatch(method, params)
            .await
            .map_err(|err| into_logic_error(method, err))
    }
}

/// Nested logic failures surface unchanged; anything else is wrapped with
/// the name of the operation that failed.
fn into_logic_error(method: &str, err: OperationError) -> LogicError {
    match err {
        OperationError::Logic(inner) => inner,
        OperationError::UnknownOperation { name } => LogicError::UnknownOperation { name },
        other => LogicError::Invocation {
            method: method.to_string(),
            source: Box::new(other),
        },
    }
}

// ---------------------------------------------------------------------------
// RevocationHandle
// ---------------------------------------------------------------------------

/// Removes one registration from its registry. Revoking is idempotent and
/// a no-op once the registry is gone.
pub struct RevocationHandle {
    table: Weak<OperationTable>,
    name: String,
    seq: u64,
    revoked: AtomicBool,
}

impl RevocationHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Removes the registration. Returns `true` only for the call that
    /// actually removed it.
    pub fn revoke(&self) -> bool {
        if self.revoked.swap(true, Ordering::AcqRel) {
            return false;
        }
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let removed = table
            .remove_if(&self.name, |_, registered| registered.seq == self.seq)
            .is_some();
        if removed {
            debug!(operation = %self.name, "operation revoked");
        }
        removed
    }
}

impl std::fmt::Debug for RevocationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationHandle")
            .field("name", &self.name)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
