//! Mutation plans - single-row inserts synthesized for create actions.
//!
//! The reasoning service proposes `{"table": ..., "values": {...}}`; the plan
//! validates that proposal against the action's target table and the domain
//! schema, then renders a parameterized insert. Values are never interpolated
//! into statement text.

use serde_json::{json, Map, Value};

use crate::domain::foundation::Timestamp;
use crate::domain::query::SqlValue;
use crate::domain::routing::ActionSpec;
use crate::domain::safety::{StatementGuard, UnsafeStatement};
use crate::domain::schema::DomainSchema;

/// Column filled with the insert time when the caller leaves it out.
const CREATED_AT: &str = "created_at";

/// Why a proposed mutation was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationPlanError {
    #[error("mutation proposal is not valid JSON: {0}")]
    Malformed(String),

    #[error(transparent)]
    Unsafe(#[from] UnsafeStatement),

    #[error("action {action} may only write to {expected}, not {found}")]
    WrongTable {
        action: String,
        expected: String,
        found: String,
    },

    #[error("table {0} does not exist")]
    UnknownTable(String),

    #[error("column {column} does not exist on {table}")]
    UnknownColumn { table: String, column: String },

    #[error("column {0} has a value that cannot be stored")]
    UnsupportedValue(String),

    #[error("mutation proposal has no values")]
    Empty,
}

/// A validated single-row insert.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationPlan {
    table: String,
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl MutationPlan {
    /// Validates a reasoning-service proposal for `action`.
    ///
    /// Check order: allowlist first, so a disallowed table is refused before
    /// anything else is looked at; then target table; then columns.
    pub fn from_proposal(
        raw: &str,
        action: &ActionSpec,
        schema: &DomainSchema,
        guard: &StatementGuard,
    ) -> Result<Self, MutationPlanError> {
        let proposal = extract_object(raw)?;
        let expected = action.target_table().unwrap_or_default();

        let table = match proposal.get("table") {
            Some(Value::String(t)) => t.trim().to_string(),
            Some(_) => return Err(MutationPlanError::Malformed("table must be a string".into())),
            None => expected.to_string(),
        };
        guard.check_table(&table)?;

        if !table.eq_ignore_ascii_case(expected) {
            return Err(MutationPlanError::WrongTable {
                action: action.name().to_string(),
                expected: expected.to_string(),
                found: table,
            });
        }

        let values = match proposal.get("values") {
            Some(Value::Object(values)) => values.clone(),
            Some(_) => return Err(MutationPlanError::Malformed("values must be an object".into())),
            None => {
                let mut flat = proposal.clone();
                flat.remove("table");
                flat
            }
        };

        Self::build(&table, &values, schema)
    }

    /// Rebuilds a plan from its canonical payload (see [`MutationPlan::payload`]).
    pub fn from_payload(payload: &Value, schema: &DomainSchema) -> Result<Self, MutationPlanError> {
        let table = payload
            .get("table")
            .and_then(Value::as_str)
            .ok_or_else(|| MutationPlanError::Malformed("payload has no table".into()))?;
        let values = payload
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| MutationPlanError::Malformed("payload has no values".into()))?;
        Self::build(table, values, schema)
    }

    fn build(
        table: &str,
        values: &Map<String, Value>,
        schema: &DomainSchema,
    ) -> Result<Self, MutationPlanError> {
        let table_schema = schema
            .table(table)
            .ok_or_else(|| MutationPlanError::UnknownTable(table.to_string()))?;

        let mut entries: Vec<(&String, &Value)> = values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut columns = Vec::with_capacity(entries.len() + 1);
        let mut params = Vec::with_capacity(entries.len() + 1);
        for (column, value) in entries {
            let known = table_schema
                .column(column)
                .ok_or_else(|| MutationPlanError::UnknownColumn {
                    table: table_schema.name.clone(),
                    column: column.clone(),
                })?;
            let value = SqlValue::from_json(value)
                .ok_or_else(|| MutationPlanError::UnsupportedValue(column.clone()))?;
            if columns.iter().any(|c: &String| c.eq_ignore_ascii_case(&known.name)) {
                continue;
            }
            columns.push(known.name.clone());
            params.push(value);
        }

        if columns.is_empty() {
            return Err(MutationPlanError::Empty);
        }

        if let Some(created) = table_schema.column(CREATED_AT) {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(CREATED_AT)) {
                columns.push(created.name.clone());
                params.push(SqlValue::Text(
                    Timestamp::now()
                        .as_datetime()
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                ));
            }
        }

        Ok(Self {
            table: table_schema.name.clone(),
            columns,
            values: params,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.values
    }

    /// Value bound to `column`, if the plan sets it.
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    /// Parameterized insert with quoted identifiers.
    pub fn statement(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            columns.join(", "),
            placeholders
        )
    }

    /// Canonical JSON form, stable across key order.
    ///
    /// The insert-time column is left out so that resubmitting the same
    /// proposal produces the same payload.
    pub fn payload(&self) -> Value {
        let values: Map<String, Value> = self
            .columns
            .iter()
            .zip(&self.values)
            .filter(|(c, _)| !c.eq_ignore_ascii_case(CREATED_AT))
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect();
        json!({ "table": self.table, "values": values })
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Finds the JSON object in a reply that may wrap it in prose or fences.
pub(crate) fn extract_object(raw: &str) -> Result<Map<String, Value>, MutationPlanError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => return Err(MutationPlanError::Malformed("no JSON object found".into())),
    };
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MutationPlanError::Malformed("expected a JSON object".into())),
        Err(e) => Err(MutationPlanError::Malformed(e.to_string())),
    }
}
