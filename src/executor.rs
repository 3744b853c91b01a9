//! Statement helpers running against the current task's connection.
//!
//! Statements use `?` for parameters whatever the driver; each helper opens a
//! connection scope, so they can be called on their own or nested inside
//! [`with_connection`] / [`with_transaction`](crate::with_transaction) to share
//! one connection.

use crate::context;
use crate::scope::with_connection;
use crate::{engine, Error, Record, Result, Value};
use std::time::{Duration, Instant};

const SLOW_STATEMENT: Duration = Duration::from_millis(100);

pub(crate) fn profiling(start: Instant, sql: &str) {
    let elapsed = start.elapsed();
    if elapsed > SLOW_STATEMENT {
        log::warn!("[PROFILING][DB] {:.3}s: {}", elapsed.as_secs_f64(), sql);
    } else {
        log::debug!("[PROFILING][DB] {:.3}s: {}", elapsed.as_secs_f64(), sql);
    }
}

/// Runs a select inside the current context.
///
/// With `first` at most one row is fetched. The caller must already be inside a
/// connection scope, otherwise [`Error::NoContext`] is returned.
pub async fn select_rows(sql: &str, first: bool, args: &[Value]) -> Result<Vec<Record>> {
    let sql = engine()?.placeholder().rewrite(sql);
    log::debug!("SQL: {}, ARGS: {:?}", sql, args);
    let start = Instant::now();
    let context = context::current()?;
    let mut ctx = context.lock().await;
    let mut cursor = ctx.cursor().await?;
    cursor.execute(&sql, args).await?;
    let records: Vec<Record> = if first {
        cursor.fetch_one().map(|row| cursor.record(row)).into_iter().collect()
    } else {
        let rows = cursor.fetch_all();
        rows.into_iter().map(|row| cursor.record(row)).collect()
    };
    cursor.close();
    profiling(start, &sql);
    Ok(records)
}

/// Returns the first matching row, or `None` when nothing matches.
///
/// ```rust,no_run
/// use sqlx_context_db::{params, select_one};
///
/// # async fn example() -> sqlx_context_db::Result<()> {
/// match select_one("select * from user where email = ?", &params!["a@example.com"]).await? {
///     Some(user) => println!("found {}", user.get_as::<String>("name")?),
///     None => println!("no such user"),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn select_one(sql: &str, args: &[Value]) -> Result<Option<Record>> {
    with_connection(|| async { Ok::<_, Error>(select_rows(sql, true, args).await?.pop()) }).await
}

/// Returns the single column of the first matching row, or `None` when nothing
/// matches. A matching row holding NULL yields `Some(Value::Null)`.
///
/// # Errors
///
/// [`Error::MultipleColumns`] when that row has more or fewer than one column.
pub async fn select_scalar(sql: &str, args: &[Value]) -> Result<Option<Value>> {
    select_one(sql, args)
        .await?
        .map(Record::into_scalar)
        .transpose()
}

/// [`select_scalar`] converted to an integer, for `count(*)` and the like.
///
/// # Errors
///
/// [`Error::TypeMismatch`] when the column is NULL or not an integer.
pub async fn select_int(sql: &str, args: &[Value]) -> Result<Option<i64>> {
    select_scalar(sql, args)
        .await?
        .map(i64::try_from)
        .transpose()
}

/// Returns every matching row; an empty `Vec` when nothing matches.
pub async fn select_all(sql: &str, args: &[Value]) -> Result<Vec<Record>> {
    with_connection(|| select_rows(sql, false, args)).await
}

/// Runs an INSERT, UPDATE or DELETE and returns the number of affected rows.
///
/// Outside a transaction the write is committed right away. Inside
/// [`with_transaction`](crate::with_transaction) it is committed or rolled back with the outermost
/// transaction.
pub async fn execute_write(sql: &str, args: &[Value]) -> Result<u64> {
    with_connection(|| async {
        let sql = engine()?.placeholder().rewrite(sql);
        log::debug!("SQL: {}, ARGS: {:?}", sql, args);
        let start = Instant::now();
        let context = context::current()?;
        let mut ctx = context.lock().await;
        let mut cursor = ctx.cursor().await?;
        let affected = cursor.execute(&sql, args).await?;
        cursor.close();
        if ctx.transactions() == 0 {
            log::info!("auto commit");
            ctx.connection_mut()?.commit().await?;
        }
        profiling(start, &sql);
        Ok::<_, Error>(affected)
    })
    .await
}

/// Same as [`execute_write`].
pub async fn update(sql: &str, args: &[Value]) -> Result<u64> {
    execute_write(sql, args).await
}

/// Inserts one row built from `(column, value)` pairs, in the given order.
///
/// ```rust,no_run
/// use sqlx_context_db::{insert, next_id, Value};
///
/// # async fn example() -> sqlx_context_db::Result<()> {
/// let affected = insert(
///     "user",
///     [("id", Value::from(next_id())), ("name", "Alice".into())],
/// )
/// .await?;
/// assert_eq!(affected, 1);
/// # Ok(())
/// # }
/// ```
pub async fn insert<I, K>(table: &str, values: I) -> Result<u64>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let (columns, args): (Vec<String>, Vec<Value>) = values
        .into_iter()
        .map(|(column, value)| (column.into(), value))
        .unzip();
    execute_write(&insert_sql(table, &columns), &args).await
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    format!(
        "insert into {} ({}) values ({})",
        table,
        columns.join(","),
        vec!["?"; columns.len()].join(",")
    )
}
