//! Structural snapshot of a schema
//!
//! Used to check that a reset changed data only: two snapshots taken
//! before and after must compare equal.

/// Table definition as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    pub name: String,
    pub columns: Vec<ColumnShape>,
    /// Constraint names with their type (`p`, `f`, `u`, `c`...)
    pub constraints: Vec<(String, String)>,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    pub name: String,
    /// `format_type()` output, e.g. "character varying(255)"
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl TableShape {
    pub fn column(&self, name: &str) -> Option<&ColumnShape> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_foreign_key(&self) -> bool {
        self.constraints.iter().any(|(_, kind)| kind == "f")
    }
}
