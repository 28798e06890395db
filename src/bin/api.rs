use financial_report_orchestrator::{
    api::{start_server, ApiState},
    audit::AuditLog,
    config::ReportConfig,
    gemini::GeminiClient,
    sources::{MockBudgetSource, MockLedgerSource},
    Supervisor,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Fails closed when GEMINI_API_KEY is missing
    let config = ReportConfig::from_env().map_err(|e| {
        eprintln!("⚠️  {}", e);
        eprintln!("📌 Set GEMINI_API_KEY in the environment or a .env file");
        e
    })?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("🚀 Financial Report Orchestrator - API Server");
    info!("📍 Port: {}", config.api_port);

    let backend = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        config.generation_timeout,
    )?);

    let supervisor = Supervisor::from_config(
        &config,
        Arc::new(MockLedgerSource::new(config.ledger_latency)),
        Arc::new(MockBudgetSource::new(config.budget_latency)),
        backend,
    );

    let state = ApiState {
        supervisor: Arc::new(supervisor),
        audit_log: Arc::new(AuditLog::new()),
        deadline: config.report_deadline,
    };

    info!("✅ Supervisor initialized");
    info!("📡 Starting API server...");

    start_server(state, config.api_port).await?;

    Ok(())
}
