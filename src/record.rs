//! Records, tables and the record normaliser.
//!
//! A [`Record`] is one logical row: column name → string value. Different
//! AI units can report different columns, so records are heterogeneous until
//! [`normalize`] folds them into a rectangular [`Table`] whose header is the
//! union of every key, in the order keys were first seen.

use crate::error::Table2XlsxError;
use serde::{Deserialize, Serialize};

/// One extracted row. Keeps insertion order; lookup is by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, overwriting an existing value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut String> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == column)
    }

    /// Column names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// A finalised, rectangular table.
///
/// Every record holds a value (possibly `""`) for every header. The only
/// constructors are [`Table::from_declared`] and [`normalize`], both of which
/// enforce that and both of which refuse to build an empty table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    /// Build a table with a declared header list.
    ///
    /// Records are reshaped to exactly `headers`: missing columns are filled
    /// with `""` and columns outside the header list are dropped.
    pub fn from_declared<S: AsRef<str>>(
        headers: &[S],
        records: Vec<Record>,
        context: &str,
    ) -> Result<Self, Table2XlsxError> {
        if records.is_empty() {
            return Err(Table2XlsxError::no_data(context));
        }
        let headers: Vec<String> = headers.iter().map(|h| h.as_ref().to_string()).collect();
        let records = records
            .into_iter()
            .map(|r| reshape(&r, &headers))
            .collect();
        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Apply `f` to the value of `column` in every record.
    ///
    /// No-op when the table has no such column.
    pub fn map_column(&mut self, column: &str, f: impl Fn(&str) -> String) {
        if !self.has_column(column) {
            return;
        }
        for record in &mut self.records {
            if let Some(value) = record.get_mut(column) {
                let cleaned = f(value.as_str());
                *value = cleaned;
            }
        }
    }

    /// Rows in header order, ready for serialisation.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.records.iter().map(move |r| {
            self.headers
                .iter()
                .map(|h| r.get(h).unwrap_or(""))
                .collect()
        })
    }
}

/// Fold heterogeneous records into a rectangular [`Table`].
///
/// The header is the union of all keys in first-seen order. Absent values
/// become `""`.
///
/// # Errors
/// [`Table2XlsxError::NoData`] when `records` is empty.
pub fn normalize(records: Vec<Record>, context: &str) -> Result<Table, Table2XlsxError> {
    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.to_string());
            }
        }
    }
    Table::from_declared(&headers, records, context)
}

fn reshape(record: &Record, headers: &[String]) -> Record {
    headers
        .iter()
        .map(|h| (h.clone(), record.get(h).unwrap_or("").to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut r = rec(&[("A", "1"), ("B", "2")]);
        r.set("A", "9");
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(r.get("A"), Some("9"));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn normalize_unions_keys_in_first_seen_order() {
        let records = vec![
            rec(&[("Customer", "Ada"), ("Product", "Tea")]),
            rec(&[("AIHN", "77"), ("Customer", "Bob")]),
            rec(&[("Qty", "3")]),
        ];
        let table = normalize(records, "test").unwrap();
        assert_eq!(table.headers(), &["Customer", "Product", "AIHN", "Qty"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn normalize_fills_every_header() {
        let records = vec![
            rec(&[("A", "1")]),
            rec(&[("B", "2")]),
            rec(&[("C", "3"), ("A", "4")]),
        ];
        let table = normalize(records, "test").unwrap();
        for record in table.records() {
            for h in table.headers() {
                assert!(record.contains(h), "missing {h} in {record:?}");
            }
        }
        let rows: Vec<Vec<&str>> = table.rows().collect();
        assert_eq!(rows[0], vec!["1", "", ""]);
        assert_eq!(rows[1], vec!["", "2", ""]);
        assert_eq!(rows[2], vec!["4", "", "3"]);
    }

    #[test]
    fn normalize_empty_is_no_data() {
        let err = normalize(Vec::new(), "nothing here").unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn declared_headers_pad_and_drop() {
        let table = Table::from_declared(
            &["Name", "Email"],
            vec![rec(&[("Name", "Ada"), ("Extra", "x")])],
            "test",
        )
        .unwrap();
        let rows: Vec<Vec<&str>> = table.rows().collect();
        assert_eq!(rows, vec![vec!["Ada", ""]]);
        assert!(!table.records()[0].contains("Extra"));
    }

    #[test]
    fn map_column_ignores_missing_column() {
        let mut table = normalize(vec![rec(&[("A", "x1")])], "test").unwrap();
        table.map_column("Z", |_| "boom".into());
        table.map_column("A", |v| v.to_uppercase());
        assert_eq!(table.records()[0].get("A"), Some("X1"));
    }
}
