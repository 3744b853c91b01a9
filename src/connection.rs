use crate::driver::Connection;
use crate::{engine, Error, Record, Result, Value};
use std::collections::VecDeque;

/// Holds at most one physical connection and opens it on the first cursor request.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_context_db::LazyConnection;
///
/// # async fn example() -> sqlx_context_db::Result<()> {
/// let mut lazy = LazyConnection::new();
/// assert!(!lazy.is_open());
///
/// let mut cursor = lazy.cursor().await?; // connects here
/// cursor.execute("update user set name = ? where id = ?", &["a".into(), 1.into()]).await?;
/// drop(cursor);
///
/// lazy.commit().await?;
/// lazy.cleanup().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct LazyConnection {
    connection: Option<Box<dyn Connection>>,
}

impl LazyConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the physical connection has been opened.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns a fresh cursor, connecting through the engine first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineNotInitialized`] when no engine is installed, or the
    /// driver's error when connecting fails.
    pub async fn cursor(&mut self) -> Result<Cursor<'_>> {
        if self.connection.is_none() {
            let connection = engine()?.connect().await?;
            log::info!("open connection <{:p}>...", addr(&*connection));
            self.connection = Some(connection);
        }
        let connection = self.connection.as_mut().ok_or(Error::NoConnection)?;
        Ok(Cursor::new(&mut **connection))
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.connection
            .as_mut()
            .ok_or(Error::NoConnection)?
            .commit()
            .await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.connection
            .as_mut()
            .ok_or(Error::NoConnection)?
            .rollback()
            .await
    }

    /// Detaches and closes the physical connection, if any.
    ///
    /// Calling it again is a no-op. A failing close is logged, never returned.
    pub async fn cleanup(&mut self) {
        if let Some(connection) = self.connection.take() {
            log::info!("close connection <{:p}>...", addr(&*connection));
            if let Err(e) = connection.close().await {
                log::warn!("error while closing connection: {e}");
            }
        }
    }
}

impl Drop for LazyConnection {
    fn drop(&mut self) {
        // Only reached with an open connection when `cleanup` was skipped, i.e.
        // the owning scope panicked or was cancelled. Dropping the handle closes
        // the socket and the server discards uncommitted work.
        if let Some(connection) = self.connection.take() {
            log::warn!("dropping connection <{:p}> without cleanup", addr(&*connection));
        }
    }
}

/// Thin address of a connection, for log lines.
fn addr(connection: &dyn Connection) -> *const () {
    std::ptr::from_ref(connection).cast::<()>()
}

/// A single statement's view of the physical connection.
///
/// Results are buffered by the driver, so fetching never goes back to the server.
/// Dropping the cursor closes it.
pub struct Cursor<'c> {
    connection: &'c mut dyn Connection,
    description: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    row_count: Option<u64>,
}

impl<'c> Cursor<'c> {
    fn new(connection: &'c mut dyn Connection) -> Self {
        Self {
            connection,
            description: Vec::new(),
            rows: VecDeque::new(),
            row_count: None,
        }
    }

    /// Runs `sql` with driver-native placeholders and returns the row count.
    pub async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        let result = self.connection.execute(sql, args).await?;
        self.description = result.columns;
        self.rows = result.rows.into();
        self.row_count = Some(result.rows_affected);
        Ok(result.rows_affected)
    }

    /// Column names of the last result, empty for writes.
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Rows affected by the last statement, `None` before any was executed.
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    pub fn fetch_one(&mut self) -> Option<Vec<Value>> {
        self.rows.pop_front()
    }

    pub fn fetch_all(&mut self) -> Vec<Vec<Value>> {
        self.rows.drain(..).collect()
    }

    /// Pairs a fetched row with the current description.
    pub fn record(&self, row: Vec<Value>) -> Record {
        Record::new(self.description.clone(), row)
    }

    pub fn close(self) {
        log::trace!("close cursor");
    }
}
