//! Shared fixture: an in-memory ERP store with a few rows per domain, the
//! bookkeeping tables, and the whole turn stack wired to a mock reasoning
//! service.

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::SqlitePool;

use erp_copilot::adapters::ai::MockAIProvider;
use erp_copilot::adapters::http::CopilotHandlers;
use erp_copilot::adapters::retrieval::KeywordRetriever;
use erp_copilot::adapters::sqlite::{
    connect_in_memory, ensure_bookkeeping_tables, SqliteApprovalStore, SqliteConversationStore,
    SqliteInteractionLog, SqliteQueryExecutor, SqliteSchemaIntrospector,
};
use erp_copilot::application::{
    ApproveMutationHandler, ChatTurnHandler, Dispatcher, GatewaySettings, ListPendingHandler,
    ReasoningGateway, RejectMutationHandler,
};
use erp_copilot::domain::approval::ApprovalThresholds;
use erp_copilot::domain::audit::ToolInvocation;
use erp_copilot::domain::foundation::InteractionId;
use erp_copilot::domain::routing::{BusinessDomain, DomainCatalog};
use erp_copilot::ports::{InteractionLog, QueryExecutor, SchemaIntrospector};

const SEED: &[&str] = &[
    "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id), \
     status TEXT, total REAL)",
    "CREATE TABLE leads (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT, created_at TEXT)",
    "CREATE TABLE invoices (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id), \
     total_amount REAL, status TEXT)",
    "CREATE TABLE payments (id INTEGER PRIMARY KEY, invoice_id INTEGER, amount REAL)",
    "CREATE TABLE documents (id TEXT PRIMARY KEY, module TEXT, path TEXT, tags TEXT)",
    "CREATE TABLE saved_reports (id INTEGER PRIMARY KEY, name TEXT NOT NULL, sql_template TEXT)",
    "INSERT INTO customers (id, name) VALUES (1, 'Acme'), (2, 'Globex')",
    "INSERT INTO orders (id, customer_id, status, total) VALUES \
     (1, 1, 'shipped', 120.0), (2, 1, 'cancelled', 80.0), (3, 2, 'open', 42.5), \
     (4, 2, 'cancelled', 19.0)",
    "INSERT INTO saved_reports (id, name, sql_template) VALUES \
     (1, 'Orders by status', 'SELECT status, COUNT(*) AS n FROM orders GROUP BY status ORDER BY status'), \
     (2, 'Approval backlog', 'SELECT * FROM approval_requests')",
    "INSERT INTO documents (id, module, path, tags) VALUES \
     ('cancellation-policy', 'sales', 'Cancelled orders are refunded. Cancelled orders keep their number.', 'policy'), \
     ('order-faq', 'sales', 'Orders ship in two days. Cancelled orders do not ship.', NULL), \
     ('returns', 'sales', 'Returns need a receipt.', NULL), \
     ('discount-rules', 'sales', 'Orders above 1000 get a discount. Cancelled orders lose it. Orders can be merged.', NULL), \
     ('invoice-policy', 'finance', 'Invoices are due in 30 days.', 'policy,finance')",
];

pub struct Harness {
    pub pool: SqlitePool,
    pub mock: MockAIProvider,
    pub executor: Arc<dyn QueryExecutor>,
    pub log: Arc<SqliteInteractionLog>,
    pub approvals: Arc<SqliteApprovalStore>,
    pub catalog: Arc<DomainCatalog>,
    pub dispatcher: Arc<Dispatcher>,
}

pub struct HarnessBuilder {
    mock: MockAIProvider,
    thresholds: ApprovalThresholds,
    default_domain: BusinessDomain,
    context_k: usize,
}

impl HarnessBuilder {
    pub fn new(mock: MockAIProvider) -> Self {
        Self {
            mock,
            thresholds: ApprovalThresholds::default(),
            default_domain: BusinessDomain::Sales,
            context_k: 3,
        }
    }

    pub fn invoice_threshold(mut self, threshold: f64) -> Self {
        self.thresholds.finance_invoice = threshold;
        self
    }

    pub fn default_domain(mut self, domain: BusinessDomain) -> Self {
        self.default_domain = domain;
        self
    }

    pub fn context_k(mut self, k: usize) -> Self {
        self.context_k = k;
        self
    }

    pub async fn build(self) -> Harness {
        let pool = connect_in_memory().await.unwrap();
        for statement in SEED {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        ensure_bookkeeping_tables(&pool).await.unwrap();

        let schema = SqliteSchemaIntrospector::new(pool.clone())
            .introspect()
            .await
            .unwrap();
        let catalog = Arc::new(DomainCatalog::new(self.thresholds, &schema));
        let executor: Arc<dyn QueryExecutor> = Arc::new(SqliteQueryExecutor::new(pool.clone()));
        let log = Arc::new(SqliteInteractionLog::new(pool.clone()));
        let approvals = Arc::new(SqliteApprovalStore::new(pool.clone()));
        let gateway = Arc::new(ReasoningGateway::new(
            Arc::new(self.mock.clone()),
            GatewaySettings::default(),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            &catalog,
            gateway,
            executor.clone(),
            Arc::new(KeywordRetriever::new(executor.clone(), 200)),
            approvals.clone(),
            log.clone(),
            self.default_domain,
            self.context_k,
        ));

        Harness {
            pool,
            mock: self.mock,
            executor,
            log,
            approvals,
            catalog,
            dispatcher,
        }
    }
}

impl Harness {
    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn invocations(&self, id: InteractionId) -> Vec<ToolInvocation> {
        self.log.invocations_for(id).await.unwrap()
    }

    pub fn approve_handler(&self) -> ApproveMutationHandler {
        ApproveMutationHandler::new(
            self.approvals.clone(),
            self.executor.clone(),
            self.catalog.clone(),
            self.log.clone(),
        )
    }

    pub fn http_handlers(&self) -> CopilotHandlers {
        CopilotHandlers::new(
            Arc::new(ChatTurnHandler::new(
                self.dispatcher.clone(),
                Arc::new(SqliteConversationStore::new(self.pool.clone())),
                5,
            )),
            Arc::new(self.approve_handler()),
            Arc::new(RejectMutationHandler::new(self.approvals.clone())),
            Arc::new(ListPendingHandler::new(self.approvals.clone())),
        )
    }
}
