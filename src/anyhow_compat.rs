use std::future::Future;

/// Runs `f` inside a transaction, using anyhow::Error for error handling.
///
/// This is a convenience wrapper around [`with_transaction`](crate::with_transaction)
/// that pins the error type to `anyhow::Error`, so closures can mix database
/// errors with any other error through `?`.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_context_db::{insert, with_transaction_anyhow};
///
/// # async fn example() -> anyhow::Result<()> {
/// with_transaction_anyhow(|| async {
///     let name = std::fs::read_to_string("name.txt")?;
///     insert("user", [("name", name.into())]).await?;
///     Ok::<_, anyhow::Error>(())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction_anyhow<F, Fut, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    crate::with_transaction(f).await
}

/// Runs `f` with a database context, using anyhow::Error for error handling.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx_context_db::{params, select_all, with_connection_anyhow};
///
/// # async fn example() -> anyhow::Result<()> {
/// let first_name = with_connection_anyhow(|| async {
///     let rows = select_all("select name from user where active = ?", &params![true]).await?;
///     let first = rows.first().ok_or_else(|| anyhow::anyhow!("no active user"))?;
///     Ok::<_, anyhow::Error>(first.get_as::<String>("name")?)
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_connection_anyhow<F, Fut, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    crate::with_connection(f).await
}
