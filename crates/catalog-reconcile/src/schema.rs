//! Column spec types.
//!
//! A [`ColumnSpec`] names one column the declarative model layer expects to
//! exist. Specs are hand-authored (see [`crate::catalog`]) or loaded from a
//! JSON file; they are never persisted themselves.

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// SQL data types a reconciled column can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Boolean flag.
    Boolean,
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(usize),
    /// Raw backend type expression, passed through untouched.
    Custom(String),
}

/// Default value for a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// String default.
    String(String),
    /// SQL expression (e.g., "CURRENT_TIMESTAMP").
    Expression(String),
}

impl DefaultValue {
    /// Returns the portable SQL representation of this default value.
    ///
    /// Booleans render as `1`/`0`; dialects that have real boolean literals
    /// override this in [`crate::dialect::SchemaIntrospector::default_literal`].
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }

    /// Returns whether the default yields an actual value (not absent, not NULL).
    #[must_use]
    pub fn is_value(&self) -> bool {
        !matches!(self, Self::None | Self::Null)
    }
}

fn default_nullable() -> bool {
    true
}

/// A column that must exist on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default value.
    #[serde(default)]
    pub default: DefaultValue,
}

impl ColumnSpec {
    /// Creates a new nullable column spec without a default.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            sql_type,
            nullable: true,
            default: DefaultValue::None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Returns `table.column`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    /// Whether existing rows must be backfilled after the column is added.
    ///
    /// True for NOT NULL columns carrying a real default.
    #[must_use]
    pub fn needs_backfill(&self) -> bool {
        !self.nullable && self.default.is_value()
    }

    /// Checks that the spec can be applied at all.
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(ReconcileError::InvalidSpec(format!(
                "empty table name for column '{}'",
                self.column
            )));
        }
        if self.column.trim().is_empty() {
            return Err(ReconcileError::InvalidSpec(format!(
                "empty column name on table '{}'",
                self.table
            )));
        }
        if matches!(&self.sql_type, SqlType::Custom(expr) if expr.trim().is_empty()) {
            return Err(ReconcileError::InvalidSpec(format!(
                "empty type expression for {}",
                self.qualified_name()
            )));
        }
        if !self.nullable && !self.default.is_value() {
            return Err(ReconcileError::InvalidSpec(format!(
                "NOT NULL column {} requires a non-null default",
                self.qualified_name()
            )));
        }
        Ok(())
    }
}
