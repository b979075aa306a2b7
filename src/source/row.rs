//! Row and cell value model for fetched records.
//!
//! Rows arrive from the remote source schema-less: an ordered mapping from
//! column name to a loosely-typed scalar. All rows of one fetch share the
//! column set of the first row observed; the writer projects every row onto
//! that schema, so `Row` only has to preserve per-row ordering and lookup.

use chrono::NaiveDateTime;

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Whether this cell is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// An ordered mapping from column name to [`CellValue`].
///
/// Column counts are small and fixed per run, so lookup is a linear scan
/// over the entry vec rather than a hash map; iteration order is insertion
/// order, which is what drives schema inference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, CellValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column value. Ordering is preserved.
    pub fn push(&mut self, name: impl Into<String>, value: CellValue) {
        self.entries.push((name.into(), value));
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of columns in this row.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_insertion_order() {
        let mut row = Row::new();
        row.push("zeta", CellValue::Integer(1));
        row.push("alpha", CellValue::Text("x".into()));
        row.push("mid", CellValue::Null);

        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_row_lookup() {
        let mut row = Row::new();
        row.push("active", CellValue::Bool(true));

        assert_eq!(row.get("active"), Some(&CellValue::Bool(true)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_null_check() {
        assert!(CellValue::Null.is_null());
        assert!(!CellValue::Integer(0).is_null());
    }
}
