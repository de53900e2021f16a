//! Read-only description of the relational tables a domain may touch.
//!
//! Built once at startup from the live store and shared by every pipeline run
//! for the domain. Rendered into synthesis prompts so the reasoning service
//! never has to guess table or column names.

use serde::Serialize;
use std::fmt::Write as _;

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type as written in the DDL (may be empty in SQLite).
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// A foreign-key relationship from one column to another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// One table with its columns and outgoing relationships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        });
        self
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// The tables visible to one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainSchema {
    tables: Vec<TableSchema>,
}

impl DomainSchema {
    /// Creates a schema, ordering tables by name.
    pub fn new(mut tables: Vec<TableSchema>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Self { tables }
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Case-insensitive table lookup.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Keeps only the tables named in `allowlist`.
    ///
    /// Foreign keys pointing outside the allowlist are dropped too, so the
    /// rendered schema never mentions a table the domain cannot query.
    pub fn restrict_to(&self, allowlist: &[&str]) -> DomainSchema {
        let allowed = |name: &str| allowlist.iter().any(|a| a.eq_ignore_ascii_case(name));
        let tables = self
            .tables
            .iter()
            .filter(|t| allowed(&t.name))
            .map(|t| TableSchema {
                name: t.name.clone(),
                columns: t.columns.clone(),
                foreign_keys: t
                    .foreign_keys
                    .iter()
                    .filter(|fk| allowed(&fk.references_table))
                    .cloned()
                    .collect(),
            })
            .collect();
        DomainSchema::new(tables)
    }

    /// Compact textual form for prompts.
    ///
    /// ```text
    /// orders(id INTEGER PK, customer_id INTEGER, status TEXT NOT NULL)
    ///   orders.customer_id -> customers.id
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| {
                    let mut col = c.name.clone();
                    if !c.data_type.is_empty() {
                        col.push(' ');
                        col.push_str(&c.data_type);
                    }
                    if c.primary_key {
                        col.push_str(" PK");
                    } else if c.not_null {
                        col.push_str(" NOT NULL");
                    }
                    col
                })
                .collect();
            let _ = writeln!(out, "{}({})", table.name, columns.join(", "));
            for fk in &table.foreign_keys {
                let _ = writeln!(
                    out,
                    "  {}.{} -> {}.{}",
                    table.name, fk.column, fk.references_table, fk.references_column
                );
            }
        }
        out
    }
}
