//! Per-domain configuration: the one object that parameterizes the generic
//! pipeline with an action enumeration, allowlist, filter keys, schema and
//! approval thresholds.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::approval::{ApprovalRule, ApprovalThresholds};
use crate::domain::safety::StatementGuard;
use crate::domain::schema::DomainSchema;

use super::{ActionSpec, BusinessDomain};

/// Everything a pipeline run needs to know about its domain.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    domain: BusinessDomain,
    role: &'static str,
    actions: Vec<ActionSpec>,
    allowlist: Vec<&'static str>,
    filter_keys: Vec<&'static str>,
    schema: DomainSchema,
    guard: StatementGuard,
}

impl DomainConfig {
    pub fn new(
        domain: BusinessDomain,
        role: &'static str,
        actions: Vec<ActionSpec>,
        allowlist: Vec<&'static str>,
        filter_keys: Vec<&'static str>,
    ) -> Self {
        let guard = StatementGuard::new(allowlist.iter().copied());
        Self {
            domain,
            role,
            actions,
            allowlist,
            filter_keys,
            schema: DomainSchema::default(),
            guard,
        }
    }

    pub fn sales() -> Self {
        Self::new(
            BusinessDomain::Sales,
            "You are the sales assistant of an ERP system. You help with customers, \
             orders, leads, products and support tickets.",
            vec![
                ActionSpec::retrieve("retrieve_customers", "List or look up customers"),
                ActionSpec::retrieve("retrieve_orders", "List or look up sales orders")
                    .with_context(),
                ActionSpec::retrieve("retrieve_leads", "List or look up sales leads"),
                ActionSpec::retrieve("retrieve_products", "List products and prices"),
                ActionSpec::retrieve("retrieve_tickets", "List support tickets"),
                ActionSpec::create("new_lead", "Create a new sales lead", "leads"),
                ActionSpec::create("new_order", "Create a new sales order", "orders"),
                ActionSpec::create("support_ticket", "Open a support ticket", "tickets"),
                ActionSpec::lookup(
                    "search_documents",
                    "Answer questions about sales procedures and contracts",
                ),
            ],
            vec!["customers", "orders", "order_items", "products", "leads", "tickets"],
            vec!["status", "customer", "time_window", "limit"],
        )
    }

    pub fn finance(thresholds: ApprovalThresholds) -> Self {
        Self::new(
            BusinessDomain::Finance,
            "You are the finance assistant of an ERP system. You help with invoices, \
             payments and finance policies.",
            vec![
                ActionSpec::retrieve("retrieve_invoices", "List or look up invoices").with_context(),
                ActionSpec::retrieve("retrieve_payments", "List or look up payments"),
                ActionSpec::create("new_invoice", "Create an invoice", "invoices").with_approval(
                    ApprovalRule::new("total_amount", thresholds.finance_invoice),
                ),
                ActionSpec::create("new_payment", "Record a payment", "payments")
                    .with_approval(ApprovalRule::new("amount", thresholds.finance_payment)),
                ActionSpec::lookup("search_policies", "Answer questions about finance policies")
                    .with_document_tags(&["policy", "finance"]),
            ],
            vec!["invoices", "payments", "customers", "invoice_orders"],
            vec!["status", "customer", "time_window", "min_amount", "limit"],
        )
    }

    pub fn inventory() -> Self {
        Self::new(
            BusinessDomain::Inventory,
            "You are the inventory assistant of an ERP system. You help with stock \
             levels, products, suppliers and purchase orders.",
            vec![
                ActionSpec::retrieve("retrieve_stock", "Show stock levels per product"),
                ActionSpec::retrieve("retrieve_products", "List products"),
                ActionSpec::retrieve("retrieve_suppliers", "List suppliers"),
                ActionSpec::retrieve("retrieve_purchase_orders", "List purchase orders"),
                ActionSpec::create(
                    "new_purchase_order",
                    "Create a purchase order",
                    "purchase_orders",
                ),
                ActionSpec::lookup(
                    "search_documents",
                    "Answer questions about warehouse procedures and supplier contracts",
                ),
            ],
            vec!["stock", "products", "suppliers", "purchase_orders", "po_items"],
            vec!["product", "supplier", "status", "limit"],
        )
    }

    pub fn analytics() -> Self {
        Self::new(
            BusinessDomain::Analytics,
            "You are the analytics assistant of an ERP system. You compute revenue and \
             order statistics and explain business metric definitions.",
            vec![
                ActionSpec::retrieve("analyze_revenue", "Compute revenue figures").with_context(),
                ActionSpec::retrieve("analyze_orders", "Compute order statistics"),
                ActionSpec::retrieve("retrieve_saved_reports", "List saved reports"),
                ActionSpec::saved_report("run_saved_report", "Run a saved report by its id"),
                ActionSpec::lookup(
                    "search_definitions",
                    "Explain how business metrics are defined",
                )
                .with_document_tags(&["glossary", "definition"]),
            ],
            vec![
                "orders",
                "order_items",
                "customers",
                "products",
                "invoices",
                "payments",
                "leads",
                "stock",
                "saved_reports",
            ],
            vec!["time_window", "group_by", "metric", "report_id", "limit"],
        )
    }

    /// Attaches the startup schema, restricted to the allowlist.
    pub fn with_schema(mut self, full: &DomainSchema) -> Self {
        self.schema = full.restrict_to(&self.allowlist);
        self
    }

    pub fn domain(&self) -> BusinessDomain {
        self.domain
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    pub fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(ActionSpec::name).collect()
    }

    pub fn allowlist(&self) -> &[&'static str] {
        &self.allowlist
    }

    pub fn filter_keys(&self) -> &[&'static str] {
        &self.filter_keys
    }

    pub fn schema(&self) -> &DomainSchema {
        &self.schema
    }

    pub fn guard(&self) -> &StatementGuard {
        &self.guard
    }
}

/// The four domain configurations, shared read-only by every turn.
#[derive(Debug, Clone)]
pub struct DomainCatalog {
    configs: HashMap<BusinessDomain, Arc<DomainConfig>>,
}

impl DomainCatalog {
    /// Standard catalog with schemas restricted from `schema`.
    pub fn new(thresholds: ApprovalThresholds, schema: &DomainSchema) -> Self {
        let configs = [
            DomainConfig::sales(),
            DomainConfig::finance(thresholds),
            DomainConfig::inventory(),
            DomainConfig::analytics(),
        ]
        .into_iter()
        .map(|c| (c.domain(), Arc::new(c.with_schema(schema))))
        .collect();
        Self { configs }
    }

    pub fn get(&self, domain: BusinessDomain) -> Option<Arc<DomainConfig>> {
        self.configs.get(&domain).cloned()
    }
}
