//! Prompt builders for each reasoning step of a turn.

use serde_json::Value;

use crate::domain::prompt::{PromptSpec, ReplyFormat};
use crate::domain::query::Row;
use crate::domain::retrieval::RetrievedContext;
use crate::domain::routing::{ActionSpec, BusinessDomain, DomainConfig, Intent};
use crate::ports::Message;

const ROUTER_ROLE: &str = "You route requests for an ERP assistant to the business domain \
     that can answer them. sales: customers, orders, leads, products, support tickets. \
     finance: invoices, payments, finance policies. inventory: stock, suppliers, purchase \
     orders. analytics: revenue and order statistics, saved reports, metric definitions.";

/// Rows shown to the explanation step; the rest are summarized by count.
const EXPLAIN_ROW_LIMIT: usize = 20;

fn render_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn classification(text: &str, history: &[Message]) -> PromptSpec {
    PromptSpec::new(ROUTER_ROLE, text)
        .with_allowed_outputs(BusinessDomain::ALL.iter().map(|d| d.tag()))
        .with_format(ReplyFormat::Choice)
        .with_context("Conversation so far", render_history(history))
}

pub fn intent(config: &DomainConfig, text: &str, history: &[Message]) -> PromptSpec {
    let actions = config
        .actions()
        .iter()
        .map(|a| format!("- {}: {}", a.name(), a.description()))
        .collect::<Vec<_>>()
        .join("\n");

    PromptSpec::new(
        format!(
            "{} Identify the action the user wants and any filters. Reply as \
             {{\"action\": \"<action>\", \"filters\": {{...}}}}.",
            config.role()
        ),
        text,
    )
    .with_allowed_outputs(config.action_names())
    .with_format(ReplyFormat::Json)
    .with_context("Actions", actions)
    .with_context("Filter keys", config.filter_keys().join(", "))
    .with_context("Conversation so far", render_history(history))
}

pub fn query_synthesis(config: &DomainConfig, action: &ActionSpec, intent: &Intent, text: &str) -> PromptSpec {
    PromptSpec::new(
        format!(
            "{} Write one read-only SQLite query for the action \"{}\" ({}).",
            config.role(),
            action.name(),
            action.description()
        ),
        text,
    )
    .with_format(ReplyFormat::Sql)
    .with_context("Schema", config.schema().render())
    .with_context("Intent", intent.to_json().to_string())
}

pub fn mutation_synthesis(
    config: &DomainConfig,
    action: &ActionSpec,
    intent: &Intent,
    text: &str,
) -> PromptSpec {
    let table = action.target_table().unwrap_or_default();
    PromptSpec::new(
        format!(
            "{} Propose the new row for the action \"{}\" as \
             {{\"table\": \"{table}\", \"values\": {{<column>: <value>}}}}. Use only columns of \
             {table}; omit the primary key and columns you do not know.",
            config.role(),
            action.name()
        ),
        text,
    )
    .with_format(ReplyFormat::Json)
    .with_context("Schema", config.schema().render())
    .with_context("Intent", intent.to_json().to_string())
}

fn render_rows(rows: &[Row]) -> String {
    let shown: Vec<String> = rows
        .iter()
        .take(EXPLAIN_ROW_LIMIT)
        .map(|r| Value::Object(r.clone()).to_string())
        .collect();
    let mut body = shown.join("\n");
    if rows.len() > EXPLAIN_ROW_LIMIT {
        body.push_str(&format!("\n({} more rows not shown)", rows.len() - EXPLAIN_ROW_LIMIT));
    }
    body
}

/// Summarize rows returned by a read, blending retrieved documents.
pub fn explain_rows(config: &DomainConfig, text: &str, rows: &[Row], context: &RetrievedContext) -> PromptSpec {
    PromptSpec::new(
        format!(
            "{} Answer the user's request from the query result in plain language. \
             Do not invent records that are not in the result.",
            config.role()
        ),
        text,
    )
    .with_context(format!("Query result ({} rows)", rows.len()), render_rows(rows))
    .with_context("Related documents", context.render())
}

/// Confirm a committed write.
pub fn explain_write(config: &DomainConfig, text: &str, outcome: &str) -> PromptSpec {
    PromptSpec::new(
        format!(
            "{} Confirm to the user, in one or two sentences, what was recorded.",
            config.role()
        ),
        text,
    )
    .with_context("Outcome", outcome)
}

/// Answer from retrieved documents alone.
pub fn explain_documents(config: &DomainConfig, text: &str, context: &RetrievedContext) -> PromptSpec {
    PromptSpec::new(
        format!(
            "{} Answer the question using only the documents below and cite their \
             sources in brackets.",
            config.role()
        ),
        text,
    )
    .with_context("Documents", context.render())
}
