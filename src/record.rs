use crate::{Error, Result, Value};
use std::ops::Index;

/// One result row: column names in select order, each with its value.
///
/// Fields are reachable by name (`record["id"]`, [`Record::get`]) or converted
/// to a Rust type with [`Record::get_as`].
///
/// ```
/// use sqlx_context_db::{Record, Value};
///
/// let record = Record::new(vec!["id".into(), "name".into()], vec![1.into(), "a".into()]);
/// assert_eq!(record["name"], Value::Text("a".into()));
/// assert_eq!(record.get_as::<i64>("id").unwrap(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    /// Pairs column names with row values.
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(names.len(), values.len(), "column count mismatch");
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.values[i])
    }

    /// Converts the named column to `T`.
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let value = self
            .get(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        T::try_from(value.clone())
    }

    /// Sets a column, replacing the value in place when the name already exists.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.values[i] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }

    /// Returns the only value of a one-column record.
    pub fn into_scalar(mut self) -> Result<Value> {
        if self.values.len() != 1 {
            return Err(Error::MultipleColumns(self.values.len()));
        }
        Ok(self.values.remove(0))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        self.get(name)
            .unwrap_or_else(|| panic!("Record has no column `{name}`"))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter().zip(self.values)
    }
}
