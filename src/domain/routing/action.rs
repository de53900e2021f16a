//! Action specifications: the enumerated operations of a domain pipeline.

use serde::Serialize;

use crate::domain::approval::ApprovalRule;

/// How an action is carried out by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Read-only statement synthesized against the domain schema.
    Retrieve,
    /// Single-row insert synthesized as a mutation plan.
    Create,
    /// Answered from the context retriever alone.
    Lookup,
    /// Runs a stored read statement chosen by id.
    SavedReport,
}

/// One member of a domain's fixed action enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    name: &'static str,
    kind: ActionKind,
    description: &'static str,
    target_table: Option<&'static str>,
    rag_eligible: bool,
    approval: Option<ApprovalRule>,
    document_tags: &'static [&'static str],
}

impl ActionSpec {
    /// A read action.
    pub fn retrieve(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ActionKind::Retrieve,
            description,
            target_table: None,
            rag_eligible: false,
            approval: None,
            document_tags: &[],
        }
    }

    /// A create action inserting into `table`.
    pub fn create(name: &'static str, description: &'static str, table: &'static str) -> Self {
        Self {
            name,
            kind: ActionKind::Create,
            description,
            target_table: Some(table),
            rag_eligible: false,
            approval: None,
            document_tags: &[],
        }
    }

    /// A knowledge lookup answered from retrieved documents.
    pub fn lookup(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ActionKind::Lookup,
            description,
            target_table: None,
            rag_eligible: true,
            approval: None,
            document_tags: &[],
        }
    }

    /// An action running a saved report's stored statement.
    pub fn saved_report(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ActionKind::SavedReport,
            description,
            target_table: None,
            rag_eligible: false,
            approval: None,
            document_tags: &[],
        }
    }

    /// Marks the action as eligible for context augmentation.
    pub fn with_context(mut self) -> Self {
        self.rag_eligible = true;
        self
    }

    /// Attaches an approval gate to a create action.
    pub fn with_approval(mut self, rule: ApprovalRule) -> Self {
        debug_assert_eq!(self.kind, ActionKind::Create);
        self.approval = Some(rule);
        self
    }

    /// Restricts context retrieval to documents carrying one of `tags`.
    pub fn with_document_tags(mut self, tags: &'static [&'static str]) -> Self {
        self.document_tags = tags;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Table a create action is permitted to write.
    pub fn target_table(&self) -> Option<&'static str> {
        self.target_table
    }

    pub fn is_rag_eligible(&self) -> bool {
        self.rag_eligible
    }

    pub fn approval(&self) -> Option<&ApprovalRule> {
        self.approval.as_ref()
    }

    pub fn document_tags(&self) -> &'static [&'static str] {
        self.document_tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_actions_always_use_context() {
        let action = ActionSpec::lookup("search_documents", "Search procedures");
        assert_eq!(action.kind(), ActionKind::Lookup);
        assert!(action.is_rag_eligible());
        assert!(action.target_table().is_none());
    }

    #[test]
    fn create_action_carries_target_and_rule() {
        let action = ActionSpec::create("new_invoice", "Create an invoice", "invoices")
            .with_approval(ApprovalRule::new("total_amount", 1000.0));

        assert_eq!(action.target_table(), Some("invoices"));
        assert_eq!(action.approval().unwrap().amount_column(), "total_amount");
        assert!(!action.is_rag_eligible());
    }

    #[test]
    fn saved_report_action_writes_nothing() {
        let action = ActionSpec::saved_report("run_saved_report", "Run a saved report");
        assert_eq!(action.kind(), ActionKind::SavedReport);
        assert!(action.target_table().is_none());
        assert!(action.approval().is_none());
    }

    #[test]
    fn retrieve_action_opts_into_context() {
        let action = ActionSpec::retrieve("retrieve_orders", "List orders").with_context();
        assert!(action.is_rag_eligible());
        assert_eq!(action.kind(), ActionKind::Retrieve);
    }
}
