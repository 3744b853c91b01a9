use crate::context::{self, SharedContext};
use crate::executor::profiling;
use crate::Error;
use std::future::Future;
use std::time::Instant;

/// Makes sure the current task has an initialized context while it is alive.
///
/// The scope that finds the context uninitialized owns it and tears it down on
/// exit; nested scopes reuse it.
pub(crate) struct ConnectionScope {
    context: SharedContext,
    should_cleanup: bool,
}

impl ConnectionScope {
    pub(crate) async fn enter() -> crate::Result<Self> {
        let context = context::current()?;
        let should_cleanup = {
            let mut ctx = context.lock().await;
            if ctx.is_initialized() {
                false
            } else {
                ctx.init()?;
                true
            }
        };
        Ok(Self {
            context,
            should_cleanup,
        })
    }

    pub(crate) async fn exit(&mut self) {
        if std::mem::take(&mut self.should_cleanup) {
            self.context.lock().await.cleanup().await;
        }
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        if !self.should_cleanup {
            return;
        }
        // exit() was never reached: the body panicked or the future was dropped
        match self.context.try_lock() {
            Ok(mut ctx) => ctx.abandon(),
            Err(_) => log::warn!("database context is busy, connection left to the task's end"),
        }
    }
}

/// A [`ConnectionScope`] plus one level of transaction nesting.
pub(crate) struct TransactionScope {
    connection: ConnectionScope,
    active: bool,
}

impl TransactionScope {
    pub(crate) async fn enter() -> crate::Result<Self> {
        let connection = ConnectionScope::enter().await?;
        let depth = connection.context.lock().await.begin();
        if depth == 1 {
            log::info!("begin transaction...");
        } else {
            log::info!("join current transaction...");
        }
        Ok(Self {
            connection,
            active: true,
        })
    }

    /// Leaves one nesting level. The scope that brings the depth back to zero
    /// commits when `success` and rolls back otherwise; the connection is torn
    /// down afterwards if this scope created it, whatever the outcome.
    pub(crate) async fn exit(mut self, success: bool) -> crate::Result<()> {
        self.active = false;
        let outcome = {
            let mut ctx = self.connection.context.lock().await;
            if ctx.end() > 0 {
                Ok(())
            } else {
                match ctx.connection_mut() {
                    Ok(connection) if !connection.is_open() => {
                        log::info!("no statement was executed, nothing to finish");
                        Ok(())
                    }
                    Ok(connection) if success => commit(connection).await,
                    Ok(connection) => rollback(connection).await,
                    Err(e) => Err(e),
                }
            }
        };
        self.connection.exit().await;
        outcome
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        // The connection may still carry uncommitted work of this transaction.
        // Replacing it makes the server discard that work; an owning
        // ConnectionScope then abandons the whole context right after.
        match self.connection.context.try_lock() {
            Ok(mut ctx) => {
                if ctx.end() == 0 {
                    log::warn!("transaction abandoned, discarding its connection");
                    ctx.discard_connection();
                }
            }
            Err(_) => log::warn!("database context is busy, transaction depth left unchanged"),
        }
    }
}

async fn commit(connection: &mut crate::LazyConnection) -> crate::Result<()> {
    log::info!("commit transaction...");
    match connection.commit().await {
        Ok(()) => {
            log::info!("commit ok.");
            Ok(())
        }
        Err(e) => {
            log::warn!("commit failed, try rollback...");
            match connection.rollback().await {
                Ok(()) => log::warn!("rollback ok."),
                Err(rollback) => log::warn!("rollback after failed commit also failed: {rollback}"),
            }
            Err(e)
        }
    }
}

async fn rollback(connection: &mut crate::LazyConnection) -> crate::Result<()> {
    log::warn!("rollback transaction...");
    connection.rollback().await?;
    log::info!("rollback ok.");
    Ok(())
}

/// Runs `f` with a database context for the current task.
///
/// The first call in a task opens the context (the physical connection itself is
/// only opened by the first statement) and closes it when `f` finishes; calls
/// nested inside it share the same connection.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_context_db::{params, select_int, update, with_connection};
///
/// # async fn example() -> sqlx_context_db::Result<()> {
/// let count = with_connection(|| async {
///     update("update user set active = ? where id = ?", &params![true, 1]).await?;
///     // same connection as the update above
///     select_int("select count(*) from user where active = ?", &params![true]).await
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_connection<F, Fut, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Error>,
{
    context::enter(connection_scoped(f)).await
}

async fn connection_scoped<F, Fut, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Error>,
{
    let mut scope = ConnectionScope::enter().await?;
    let result = f().await;
    scope.exit().await;
    result
}

/// Runs `f` inside a transaction.
///
/// Nested calls join the outermost transaction. Only the outermost call commits
/// (when every nested body succeeded) or rolls back (when any of them returned an
/// error that reached it). Writes issued inside are not auto-committed.
///
/// If the body fails, its error is returned even when the rollback fails too. If
/// the commit fails, a rollback is attempted and the commit error is returned.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_context_db::{insert, with_transaction, Error};
///
/// # async fn example() -> sqlx_context_db::Result<()> {
/// with_transaction(|| async {
///     insert("user", [("id", 1.into()), ("name", "Alice".into())]).await?;
///
///     with_transaction(|| async {
///         insert("audit_log", [("action", "user created".into())]).await?;
///         Ok::<_, Error>(())
///     })
///     .await?;
///
///     Ok::<_, Error>(())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction<F, Fut, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Error>,
{
    context::enter(transaction_scoped(f)).await
}

async fn transaction_scoped<F, Fut, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<Error>,
{
    let start = Instant::now();
    let scope = TransactionScope::enter().await?;
    let result = f().await;
    let exit = scope.exit(result.is_ok()).await;
    profiling(start, "transaction");
    match (result, exit) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(exit)) => {
            log::warn!("error while leaving the failed transaction: {exit}");
            Err(e)
        }
    }
}
