//! ERP copilot server.
//!
//! Builds every process-wide collaborator once and serves the HTTP boundary.

use std::sync::Arc;

use erp_copilot::adapters::ai::OpenAIProvider;
use erp_copilot::adapters::http::{app_router, CopilotHandlers};
use erp_copilot::adapters::retrieval::{select_retriever, OpenAIEmbedder};
use erp_copilot::adapters::sqlite::{
    connect, ensure_bookkeeping_tables, SqliteApprovalStore, SqliteConversationStore,
    SqliteInteractionLog, SqliteQueryExecutor, SqliteSchemaIntrospector,
};
use erp_copilot::application::{
    ApproveMutationHandler, ChatTurnHandler, Dispatcher, ListPendingHandler, ReasoningGateway,
    RejectMutationHandler,
};
use erp_copilot::config::AppConfig;
use erp_copilot::domain::routing::DomainCatalog;
use erp_copilot::ports::{
    ApprovalStore, ConversationStore, Embedder, InteractionLog, QueryExecutor, SchemaIntrospector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    config.logging.init();

    // Business store and bookkeeping tables
    let pool = connect(
        &config.database.url,
        config.database.busy_timeout(),
        config.database.create_if_missing,
    )
    .await?;
    ensure_bookkeeping_tables(&pool).await?;

    let schema = SqliteSchemaIntrospector::new(pool.clone()).introspect().await?;
    if schema.is_empty() {
        tracing::warn!("business store has no tables; every read will be rejected");
    }
    tracing::info!(tables = schema.tables().len(), "business schema loaded");
    let catalog = Arc::new(DomainCatalog::new(config.approvals.thresholds(), &schema));

    let executor: Arc<dyn QueryExecutor> = Arc::new(SqliteQueryExecutor::new(pool.clone()));
    let log: Arc<dyn InteractionLog> = Arc::new(SqliteInteractionLog::new(pool.clone()));
    let approvals: Arc<dyn ApprovalStore> = Arc::new(SqliteApprovalStore::new(pool.clone()));
    let conversations: Arc<dyn ConversationStore> =
        Arc::new(SqliteConversationStore::new(pool.clone()));

    // Reasoning and retrieval
    let provider = OpenAIProvider::new(config.ai.provider_config())?;
    let gateway = Arc::new(ReasoningGateway::new(
        Arc::new(provider),
        config.ai.gateway_settings(),
    ));
    let retriever = select_retriever(
        config.retrieval.vector_index_path.as_deref(),
        embedder(&config),
        executor.clone(),
        config.retrieval.excerpt_chars,
    )
    .await;

    let dispatcher = Arc::new(Dispatcher::new(
        &catalog,
        gateway,
        executor.clone(),
        retriever,
        approvals.clone(),
        log.clone(),
        config.routing.default_domain()?,
        config.retrieval.default_k,
    ));

    let handlers = CopilotHandlers::new(
        Arc::new(ChatTurnHandler::new(
            dispatcher,
            conversations,
            config.routing.history_window,
        )),
        Arc::new(ApproveMutationHandler::new(
            approvals.clone(),
            executor,
            catalog,
            log,
        )),
        Arc::new(RejectMutationHandler::new(approvals.clone())),
        Arc::new(ListPendingHandler::new(approvals)),
    );
    let app = app_router(handlers, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, model = %config.ai.model, "erp copilot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Embedder for the vector index; none when no index is configured.
fn embedder(config: &AppConfig) -> Option<Arc<dyn Embedder>> {
    config.retrieval.vector_index_path.as_ref()?;

    let mut provider = config.ai.provider_config();
    provider.base_url = config
        .retrieval
        .embedding_base_url(&config.ai.base_url)
        .to_string();
    provider.model = config.retrieval.embedding_model.clone();

    match OpenAIEmbedder::new(provider) {
        Ok(embedder) => Some(Arc::new(embedder)),
        Err(e) => {
            tracing::warn!(error = %e, "embedder unavailable");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
