//! Approval gate for high-value mutations.
//!
//! A create action with an [`ApprovalRule`] never commits a mutation whose
//! monetary value exceeds the threshold. The mutation is stored as a
//! [`PendingMutation`] instead and only an explicit approval commits it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ApprovalId, InteractionId, Timestamp};
use crate::domain::mutation::MutationPlan;
use crate::domain::routing::BusinessDomain;

/// Threshold on one monetary column of a create action.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRule {
    amount_column: &'static str,
    threshold: f64,
}

/// Outcome of evaluating a plan against its rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApprovalDecision {
    /// At or below threshold, or the plan does not set the amount.
    Clear,
    /// Above threshold (or an amount that cannot be read as a number).
    Required { amount: Option<f64>, threshold: f64 },
}

impl ApprovalRule {
    pub fn new(amount_column: &'static str, threshold: f64) -> Self {
        Self {
            amount_column,
            threshold,
        }
    }

    pub fn amount_column(&self) -> &'static str {
        self.amount_column
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decides whether `plan` must go through approval.
    ///
    /// An amount that is present but unreadable is treated as exceeding the
    /// threshold.
    pub fn evaluate(&self, plan: &MutationPlan) -> ApprovalDecision {
        match plan.value(self.amount_column) {
            None => ApprovalDecision::Clear,
            Some(value) if value.to_json().is_null() => ApprovalDecision::Clear,
            Some(value) => match value.as_f64() {
                Some(amount) if amount <= self.threshold => ApprovalDecision::Clear,
                amount => ApprovalDecision::Required {
                    amount,
                    threshold: self.threshold,
                },
            },
        }
    }
}

/// Configured monetary thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApprovalThresholds {
    pub finance_invoice: f64,
    pub finance_payment: f64,
}

impl Default for ApprovalThresholds {
    fn default() -> Self {
        Self {
            finance_invoice: 1000.0,
            finance_payment: 5000.0,
        }
    }
}

/// Lifecycle of a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status: {other}")),
        }
    }
}

/// Stable identity of a mutation proposal.
///
/// Two submissions with the same domain, action and canonical payload share a
/// fingerprint.
pub fn fingerprint(domain: BusinessDomain, action: &str, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.tag().as_bytes());
    hasher.update(b"\n");
    hasher.update(action.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A mutation submitted for approval.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPendingMutation {
    pub domain: BusinessDomain,
    pub action: String,
    pub payload: Value,
    pub amount: Option<f64>,
    pub threshold: f64,
    pub requested_by: String,
    pub interaction_id: InteractionId,
    pub fingerprint: String,
}

impl NewPendingMutation {
    pub fn new(
        domain: BusinessDomain,
        action: impl Into<String>,
        plan: &MutationPlan,
        amount: Option<f64>,
        threshold: f64,
        requested_by: impl Into<String>,
        interaction_id: InteractionId,
    ) -> Self {
        let action = action.into();
        let payload = plan.payload();
        Self {
            fingerprint: fingerprint(domain, &action, &payload),
            domain,
            action,
            payload,
            amount,
            threshold,
            requested_by: requested_by.into(),
            interaction_id,
        }
    }
}

/// A stored approval request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingMutation {
    pub id: ApprovalId,
    pub domain: BusinessDomain,
    pub action: String,
    pub payload: Value,
    pub amount: Option<f64>,
    pub threshold: f64,
    pub fingerprint: String,
    pub status: ApprovalStatus,
    pub requested_by: String,
    pub interaction_id: InteractionId,
    pub decided_by: Option<String>,
    pub created_at: Timestamp,
    pub decided_at: Option<Timestamp>,
}

impl PendingMutation {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

/// Result of submitting a mutation for approval.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Created(PendingMutation),
    /// An identical request was already pending.
    Existing(PendingMutation),
}

impl Submission {
    pub fn request(&self) -> &PendingMutation {
        match self {
            Submission::Created(r) | Submission::Existing(r) => r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::ActionSpec;
    use crate::domain::safety::StatementGuard;
    use crate::domain::schema::{ColumnSchema, DomainSchema, TableSchema};

    fn plan(amount: &str) -> MutationPlan {
        let schema = DomainSchema::new(vec![TableSchema::new(
            "invoices",
            vec![
                ColumnSchema::new("id", "INTEGER").primary_key(),
                ColumnSchema::new("customer_id", "INTEGER"),
                ColumnSchema::new("total_amount", "REAL"),
            ],
        )]);
        let action = ActionSpec::create("new_invoice", "Create an invoice", "invoices");
        let proposal = format!(r#"{{"table":"invoices","values":{{"customer_id":1,"total_amount":{amount}}}}}"#);
        MutationPlan::from_proposal(&proposal, &action, &schema, &StatementGuard::new(["invoices"]))
            .unwrap()
    }

    #[test]
    fn amount_above_threshold_requires_approval() {
        let rule = ApprovalRule::new("total_amount", 10_000.0);
        assert_eq!(
            rule.evaluate(&plan("50000")),
            ApprovalDecision::Required {
                amount: Some(50_000.0),
                threshold: 10_000.0
            }
        );
    }

    #[test]
    fn amount_at_or_below_threshold_is_clear() {
        let rule = ApprovalRule::new("total_amount", 10_000.0);
        assert_eq!(rule.evaluate(&plan("10000")), ApprovalDecision::Clear);
        assert_eq!(rule.evaluate(&plan("250.5")), ApprovalDecision::Clear);
    }

    #[test]
    fn unreadable_amount_requires_approval() {
        let rule = ApprovalRule::new("total_amount", 10_000.0);
        assert!(matches!(
            rule.evaluate(&plan("\"lots\"")),
            ApprovalDecision::Required { amount: None, .. }
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_scoped() {
        let p = plan("50000").payload();
        let a = fingerprint(BusinessDomain::Finance, "new_invoice", &p);
        let b = fingerprint(BusinessDomain::Finance, "new_invoice", &p);
        let c = fingerprint(BusinessDomain::Finance, "new_payment", &p);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn status_parses_its_own_rendering() {
        for status in [ApprovalStatus::Pending, ApprovalStatus::Approved, ApprovalStatus::Rejected] {
            assert_eq!(status.as_str().parse::<ApprovalStatus>().unwrap(), status);
        }
        assert!("maybe".parse::<ApprovalStatus>().is_err());
    }
}
