use financial_report_orchestrator::{
    config::ReportConfig,
    gemini::GeminiClient,
    sources::{MockBudgetSource, MockLedgerSource},
    Supervisor,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_REQUEST: &str = "Generate the Q4 2025 Variance Analysis Report for the EMEA region.";

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ReportConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⚠️  {}", e);
            eprintln!("📌 Set GEMINI_API_KEY in the environment or a .env file");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let backend = match GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        config.generation_timeout,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to initialize Gemini client");
            eprintln!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let supervisor = Supervisor::from_config(
        &config,
        Arc::new(MockLedgerSource::new(config.ledger_latency)),
        Arc::new(MockBudgetSource::new(config.budget_latency)),
        backend,
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = if args.is_empty() {
        DEFAULT_REQUEST.to_string()
    } else {
        args.join(" ")
    };

    info!(request = %request, "Financial Report Orchestrator starting");
    let start = Instant::now();

    match supervisor
        .run_with_deadline(&request, config.report_deadline)
        .await
    {
        Ok(report) => {
            let elapsed = start.elapsed().as_secs_f64();
            let rule = "=".repeat(60);

            println!("\n{}", rule);
            println!("FINAL STRATEGIC REPORT");
            println!("{}", rule);
            println!("{}", report.analysis().metrics.render_table());
            println!("EBITDA: {} {}", report.analysis().ebitda, report.analysis().currency);
            println!("Financial Health: {}", report.analysis().health_status);
            println!("Verification: {}", report.state);
            println!("{}", rule);
            println!("{}", report.text);
            println!("{}", rule);
            println!("Total Execution Time: {:.2} seconds", elapsed);

            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Report generation failed");
            eprintln!("Report generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
