//! The seam between the context machinery and a concrete SQL driver.
//!
//! [`MySqlConnector`](crate::mysql::MySqlConnector) is the implementation shipped
//! with this crate; anything else that can open connections (a test stub, another
//! backend) can be installed through [`init_engine`](crate::init_engine).

use crate::{Result, Value};
use async_trait::async_trait;
use std::borrow::Cow;

/// Opens physical connections. Held by the process-wide [`Engine`](crate::Engine).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new physical connection. Driver errors are returned unchanged.
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// The driver's native parameter placeholder.
    fn placeholder(&self) -> Placeholder {
        Placeholder::default()
    }
}

/// One physical connection, used by a single task at a time.
#[async_trait]
pub trait Connection: Send {
    /// Runs one statement and buffers its whole result.
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ResultSet>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Buffered outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names, empty for statements that return no rows.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a write, or rows returned by a select.
    pub rows_affected: u64,
}

impl ResultSet {
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            columns,
            rows,
            rows_affected,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Default::default()
        }
    }
}

/// How a driver spells positional parameters.
///
/// Statements are written with `?`; [`Placeholder::rewrite`] turns every `?`
/// into the native form, keeping the n-th `?` bound to the n-th argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Every `?` becomes the same token, e.g. `%s`.
    Token(&'static str),
    /// Every `?` becomes the prefix followed by its 1-based ordinal, e.g. `$1`.
    Numbered(&'static str),
}

impl Default for Placeholder {
    fn default() -> Self {
        Placeholder::Token("?")
    }
}

impl Placeholder {
    pub fn rewrite<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match *self {
            Placeholder::Token("?") => Cow::Borrowed(sql),
            _ if !sql.contains('?') => Cow::Borrowed(sql),
            Placeholder::Token(token) => Cow::Owned(sql.replace('?', token)),
            Placeholder::Numbered(prefix) => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut ordinal = 0;
                for c in sql.chars() {
                    if c == '?' {
                        ordinal += 1;
                        out.push_str(prefix);
                        out.push_str(&ordinal.to_string());
                    } else {
                        out.push(c);
                    }
                }
                Cow::Owned(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_question_mark_is_untouched() {
        let sql = "select * from user where id = ? and name = ?";
        assert!(matches!(Placeholder::default().rewrite(sql), Cow::Borrowed(s) if s == sql));
    }

    #[test]
    fn test_token_rewrite() {
        assert_eq!(
            Placeholder::Token("%s").rewrite("insert into t (a,b) values (?,?)"),
            "insert into t (a,b) values (%s,%s)"
        );
    }

    #[test]
    fn test_numbered_rewrite_keeps_ordinals() {
        assert_eq!(
            Placeholder::Numbered("$").rewrite("update t set a = ? where b = ? and c = ?"),
            "update t set a = $1 where b = $2 and c = $3"
        );
    }

    #[test]
    fn test_result_set_counts_rows() {
        let set = ResultSet::rows(vec!["id".into()], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        assert_eq!(set.rows_affected, 2);
        assert_eq!(ResultSet::affected(3).columns.len(), 0);
    }
}
