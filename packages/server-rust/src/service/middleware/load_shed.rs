//! Admission control for operation calls.
//!
//! A call either takes one of `max_concurrent_operations` permits up front or
//! fails immediately with `OperationError::Overloaded`; nothing queues. The
//! permit travels with the call future, so a nested `jsonrpc` invocation
//! inside a custom operation does not take a second one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::service::operation::{BoxedFuture, OperationError, RpcCall};

/// Shared between every service the layer produces.
#[derive(Debug)]
struct Admission {
    permits: Semaphore,
    rejected: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    admission: Arc<Admission>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            admission: Arc::new(Admission {
                permits: Semaphore::new(max_concurrent as usize),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Calls that could start right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.admission.permits.available_permits()
    }

    /// Calls turned away since startup.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.admission.rejected.load(Ordering::Relaxed)
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            admission: Arc::clone(&self.admission),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    admission: Arc<Admission>,
}

impl<S> Service<RpcCall> for LoadShedService<S>
where
    S: Service<RpcCall, Response = Value, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = OperationError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: RpcCall) -> Self::Future {
        let admission = Arc::clone(&self.admission);
        let permit = match admission.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                PermitGuard(Arc::clone(&admission))
            }
            Err(_) => {
                let rejected = admission.rejected.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    method = %call.method,
                    call_id = call.ctx.call_id,
                    rejected,
                    "operation rejected, all permits taken"
                );
                return Box::pin(async { Err(OperationError::Overloaded) });
            }
        };

        let pending = self.inner.call(call);
        Box::pin(async move {
            let _permit = permit;
            pending.await
        })
    }
}

/// Returns its permit when the call future completes or is dropped.
struct PermitGuard(Arc<Admission>);

impl Drop for PermitGuard {
    fn drop(&mut self) {
        self.0.permits.add_permits(1);
    }
}
