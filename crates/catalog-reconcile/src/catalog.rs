//! Storefront column list and spec-file loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{ColumnSpec, DefaultValue, SqlType};

/// Category table.
pub const CATEGORY_TABLE: &str = "products_category";

/// Product table.
pub const PRODUCT_TABLE: &str = "products_product";

/// Length the model layer gives URL fields.
pub const URL_LENGTH: usize = 200;

/// Columns the storefront models declare that older deployments may lack.
///
/// Order is the order they are reconciled and logged in.
#[must_use]
pub fn storefront_columns() -> Vec<ColumnSpec> {
    let mut columns = vec![
        ColumnSpec::new(CATEGORY_TABLE, "featured_on_homepage", SqlType::Boolean)
            .not_null()
            .default(DefaultValue::Bool(false)),
    ];
    columns.extend((5..=8).map(|n| {
        ColumnSpec::new(PRODUCT_TABLE, format!("image_{n}"), SqlType::Varchar(URL_LENGTH))
    }));
    columns
}

/// On-disk list of column specs.
///
/// ```json
/// { "columns": [ { "table": "products_product", "column": "image_5", "sql_type": { "Varchar": 200 } } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecFile {
    /// Columns to reconcile, in order.
    pub columns: Vec<ColumnSpec>,
}

impl SpecFile {
    /// Parses a spec file from JSON text and validates every entry.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(text)?;
        for spec in &file.columns {
            spec.validate()?;
        }
        Ok(file)
    }
}

/// Loads column specs from a JSON spec file.
pub fn load_specs(path: &Path) -> Result<Vec<ColumnSpec>> {
    let text = std::fs::read_to_string(path)?;
    Ok(SpecFile::from_json(&text)?.columns)
}
