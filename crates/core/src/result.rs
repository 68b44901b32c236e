use crate::{Row, Value};

/// The raw shape of a statement outcome: the fetched rows, or the inserted
/// row identifier when the `INSERT INTO` override applies.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Rows(Vec<Row>),
    InsertId(i64),
}

impl RawValue {
    /// The empty raw shape returned when a statement yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        RawValue::Rows(Vec::new())
    }

    #[must_use]
    pub fn as_insert_id(&self) -> Option<i64> {
        match self {
            RawValue::InsertId(id) => Some(*id),
            RawValue::Rows(_) => None,
        }
    }

    #[must_use]
    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            RawValue::Rows(rows) => Some(rows),
            RawValue::InsertId(_) => None,
        }
    }
}

/// Uniform result of one executed statement. Produced fresh per query and
/// never mutated after being returned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    affected: Option<u64>,
    raw: Option<RawValue>,
    records: Option<Vec<Row>>,
}

impl QueryResult {
    #[must_use]
    pub fn new(affected: Option<u64>, raw: Option<RawValue>, records: Option<Vec<Row>>) -> Self {
        Self {
            affected,
            raw,
            records,
        }
    }

    /// Affected-row count, when the statement handle reported one.
    #[must_use]
    pub fn affected(&self) -> Option<u64> {
        self.affected
    }

    #[must_use]
    pub fn raw(&self) -> Option<&RawValue> {
        self.raw.as_ref()
    }

    #[must_use]
    pub fn records(&self) -> Option<&[Row]> {
        self.records.as_deref()
    }

    /// Collapses into the raw shape; absent raw becomes the empty row set.
    #[must_use]
    pub fn into_raw(self) -> RawValue {
        self.raw.unwrap_or_else(RawValue::empty)
    }

    /// Scalar convenience for single-cell results.
    #[must_use]
    pub fn first_value(&self) -> Option<&Value> {
        self.records
            .as_deref()
            .and_then(|rows| rows.first())
            .and_then(|row| row.values().first())
    }
}
