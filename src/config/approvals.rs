//! Approval threshold configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::approval::ApprovalThresholds;

/// Amounts above which a finance mutation waits for approval
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalsConfig {
    #[serde(default = "default_invoice_threshold")]
    pub finance_invoice_threshold: f64,

    #[serde(default = "default_payment_threshold")]
    pub finance_payment_threshold: f64,
}

impl ApprovalsConfig {
    pub fn thresholds(&self) -> ApprovalThresholds {
        ApprovalThresholds {
            finance_invoice: self.finance_invoice_threshold,
            finance_payment: self.finance_payment_threshold,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("approvals.finance_invoice_threshold", self.finance_invoice_threshold),
            ("approvals.finance_payment_threshold", self.finance_payment_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidThreshold(name));
            }
        }
        Ok(())
    }
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            finance_invoice_threshold: default_invoice_threshold(),
            finance_payment_threshold: default_payment_threshold(),
        }
    }
}

fn default_invoice_threshold() -> f64 {
    1000.0
}

fn default_payment_threshold() -> f64 {
    5000.0
}
