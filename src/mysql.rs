use crate::driver::{Connection, Connector, ResultSet};
use crate::{EngineConfig, Result, Value};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{
    Column, ConnectOptions, Either, Executor, MySql, MySqlConnection, Row, Statement, TypeInfo,
    ValueRef,
};
use time::{Date, PrimitiveDateTime, Time};

/// Opens MySQL connections through SQLx.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    use_unicode: bool,
    autocommit: bool,
}

impl MySqlConnector {
    pub fn new(config: &EngineConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .charset(&config.charset)
            .collation(&config.collation);
        Self {
            options,
            use_unicode: config.use_unicode,
            autocommit: config.autocommit,
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut conn = self.options.connect().await?;
        let autocommit = if self.autocommit {
            "SET autocommit = 1"
        } else {
            "SET autocommit = 0"
        };
        conn.execute(autocommit).await?;
        Ok(Box::new(MySqlHandle {
            conn,
            use_unicode: self.use_unicode,
        }))
    }
}

struct MySqlHandle {
    conn: MySqlConnection,
    use_unicode: bool,
}

impl MySqlHandle {
    /// Runs an argument-free statement over the text protocol, which also
    /// accepts statements the server refuses to prepare (`LOCK TABLES`, ...).
    async fn execute_text(&mut self, sql: &str) -> Result<ResultSet> {
        let mut columns = Vec::new();
        let mut rows = Vec::new();
        let mut affected = 0;
        let mut results = (&mut self.conn).fetch_many(sql);
        while let Some(item) = results.try_next().await? {
            match item {
                Either::Left(done) => affected += done.rows_affected(),
                Either::Right(row) => {
                    if columns.is_empty() {
                        columns = column_names(row.columns());
                    }
                    rows.push(decode_row(&row, self.use_unicode)?);
                }
            }
        }
        if columns.is_empty() {
            return Ok(ResultSet::affected(affected));
        }
        Ok(ResultSet::rows(columns, rows))
    }
}

#[async_trait]
impl Connection for MySqlHandle {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ResultSet> {
        if args.is_empty() {
            return self.execute_text(sql).await;
        }
        let statement = (&mut self.conn).prepare(sql).await?;
        let columns = column_names(statement.columns());
        let query = args.iter().fold(statement.query(), bind);
        if columns.is_empty() {
            let done = query.execute(&mut self.conn).await?;
            return Ok(ResultSet::affected(done.rows_affected()));
        }
        let rows = query
            .fetch_all(&mut self.conn)
            .await?
            .iter()
            .map(|row| decode_row(row, self.use_unicode))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultSet::rows(columns, rows))
    }

    async fn commit(&mut self) -> Result<()> {
        // a bare &str has no arguments and goes over the text protocol
        self.conn.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK").await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        sqlx::Connection::close(self.conn).await?;
        Ok(())
    }
}

fn bind<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::UInt(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::DateTime(v) => query.bind(*v),
    }
}

fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn decode_row(row: &MySqlRow, use_unicode: bool) -> Result<Vec<Value>> {
    (0..row.len())
        .map(|i| decode_column(row, i, use_unicode))
        .collect()
}

fn decode_column(row: &MySqlRow, i: usize, use_unicode: bool) -> Result<Value> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(i)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Int(row.try_get_unchecked::<i64, _>(i)?)
        }
        name if name.ends_with("UNSIGNED") => Value::UInt(row.try_get_unchecked::<u64, _>(i)?),
        "FLOAT" => Value::Float(row.try_get_unchecked::<f32, _>(i)?.into()),
        "DOUBLE" => Value::Float(row.try_get_unchecked::<f64, _>(i)?),
        "DATE" => Value::Date(row.try_get_unchecked::<Date, _>(i)?),
        "TIME" => Value::Time(row.try_get_unchecked::<Time, _>(i)?),
        "DATETIME" | "TIMESTAMP" => {
            Value::DateTime(row.try_get_unchecked::<PrimitiveDateTime, _>(i)?)
        }
        // DECIMAL is sent as its decimal string in both protocols
        "DECIMAL" => Value::Text(row.try_get_unchecked::<String, _>(i)?),
        name if use_unicode && is_textual(name) => {
            Value::Text(row.try_get_unchecked::<String, _>(i)?)
        }
        _ => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
    };
    Ok(value)
}

fn is_textual(type_name: &str) -> bool {
    type_name.ends_with("CHAR")
        || type_name.ends_with("TEXT")
        || matches!(type_name, "ENUM" | "SET" | "JSON")
}
