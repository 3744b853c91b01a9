//! Per-task database state.
//!
//! Every tokio task that touches the database gets its own [`ExecutionContext`],
//! stored in task-local storage by the outermost scope. Tasks spawned from inside
//! a scope start without one, so a connection is never shared between tasks.

use crate::connection::{Cursor, LazyConnection};
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) type SharedContext = Arc<Mutex<ExecutionContext>>;

tokio::task_local! {
    static CONTEXT: SharedContext;
}

/// Connection slot and transaction depth of one task.
///
/// Invariant: `transactions > 0` implies a lazy connection is attached.
#[derive(Default)]
pub struct ExecutionContext {
    connection: Option<LazyConnection>,
    transactions: usize,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Attaches a fresh lazy connection and resets the transaction depth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContextAlreadyInitialized`] if a connection is attached.
    pub fn init(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::ContextAlreadyInitialized);
        }
        log::info!("open lazy connection...");
        self.connection = Some(LazyConnection::new());
        self.transactions = 0;
        Ok(())
    }

    /// Closes and detaches the lazy connection. Only valid at depth 0.
    pub async fn cleanup(&mut self) {
        debug_assert_eq!(self.transactions, 0, "cleanup inside a transaction");
        if let Some(mut connection) = self.connection.take() {
            connection.cleanup().await;
        }
    }

    pub async fn cursor(&mut self) -> Result<Cursor<'_>> {
        self.connection_mut()?.cursor().await
    }

    pub fn connection_mut(&mut self) -> Result<&mut LazyConnection> {
        self.connection.as_mut().ok_or(Error::NoContext)
    }

    pub fn transactions(&self) -> usize {
        self.transactions
    }

    pub(crate) fn begin(&mut self) -> usize {
        debug_assert!(self.is_initialized());
        self.transactions += 1;
        self.transactions
    }

    pub(crate) fn end(&mut self) -> usize {
        debug_assert!(self.transactions > 0, "unbalanced transaction exit");
        self.transactions = self.transactions.saturating_sub(1);
        self.transactions
    }

    /// Swaps in a fresh lazy connection, dropping the physical one unclosed.
    pub(crate) fn discard_connection(&mut self) {
        if self.is_initialized() {
            self.connection = Some(LazyConnection::new());
        }
    }

    /// Drops the connection without awaiting its close.
    pub(crate) fn abandon(&mut self) {
        self.transactions = 0;
        self.connection = None;
    }
}

/// Runs `fut` with the current task's context slot, creating an empty one when
/// the task has none yet.
pub(crate) async fn enter<F: Future>(fut: F) -> F::Output {
    if CONTEXT.try_with(|_| ()).is_ok() {
        fut.await
    } else {
        CONTEXT.scope(Arc::new(Mutex::new(ExecutionContext::new())), fut).await
    }
}

/// The current task's context slot.
pub(crate) fn current() -> Result<SharedContext> {
    CONTEXT.try_with(Arc::clone).map_err(|_| Error::NoContext)
}

/// Whether the current task holds an initialized context.
pub async fn is_active() -> bool {
    match current() {
        Ok(context) => context.lock().await.is_initialized(),
        Err(_) => false,
    }
}

/// Transaction depth of the current task, `None` outside any scope.
pub async fn transaction_depth() -> Option<usize> {
    let context = current().ok()?;
    let context = context.lock().await;
    context
        .is_initialized()
        .then_some(context.transactions())
}
