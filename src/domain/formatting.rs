//! Deterministic renderings used when no natural-language text is produced.

use serde_json::Value;

use crate::domain::query::Row;
use crate::domain::retrieval::RetrievedContext;

/// Rows shown in a raw listing before truncation.
pub const MAX_LISTED_ROWS: usize = 50;

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lists rows as `column: value` pairs, one row per line, in column order.
pub fn format_rows(rows: &[Row]) -> String {
    if rows.is_empty() {
        return no_matching_records();
    }
    let mut lines = Vec::with_capacity(rows.len().min(MAX_LISTED_ROWS) + 2);
    lines.push(format!(
        "{} record{}:",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    ));
    for (i, row) in rows.iter().take(MAX_LISTED_ROWS).enumerate() {
        let fields: Vec<String> = row
            .iter()
            .map(|(k, v)| format!("{k}: {}", render_value(v)))
            .collect();
        lines.push(format!("{}. {}", i + 1, fields.join(", ")));
    }
    if rows.len() > MAX_LISTED_ROWS {
        lines.push(format!("... and {} more", rows.len() - MAX_LISTED_ROWS));
    }
    lines.join("\n")
}

/// Response for a read that matched nothing.
pub fn no_matching_records() -> String {
    "No matching records were found.".to_string()
}

/// Response for a saved report id with no stored report.
pub fn report_not_found(report_id: i64) -> String {
    format!("Saved report {report_id} was not found.")
}

/// Response for a committed insert.
pub fn format_write(table: &str, rows_affected: u64, last_insert_id: Option<i64>) -> String {
    match last_insert_id {
        Some(id) if rows_affected > 0 => {
            format!("Created {rows_affected} record in {table} (id {id}).")
        }
        _ => format!("{rows_affected} record(s) written to {table}."),
    }
}

/// Lists retrieved snippets with their sources.
pub fn format_snippets(context: &RetrievedContext) -> String {
    if context.is_empty() {
        return "No relevant documents were found.".to_string();
    }
    context
        .snippets()
        .iter()
        .map(|s| format!("- {} ({})", s.text, s.source_id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Response for a mutation held for approval.
pub fn approval_required(
    action: &str,
    approval_id: i64,
    amount: Option<f64>,
    threshold: f64,
    already_pending: bool,
) -> String {
    let amount = match amount {
        Some(a) => format!("{a:.2}"),
        None => "an unreadable amount".to_string(),
    };
    let lead = if already_pending {
        "An identical request is already awaiting approval"
    } else {
        "Approval is required"
    };
    format!(
        "{lead}: {action} for {amount} exceeds the approval threshold of {threshold:.2}. \
         It has been recorded as pending request #{approval_id} and nothing was written yet."
    )
}
