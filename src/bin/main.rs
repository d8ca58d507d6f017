use finance_assistant_orchestrator::{
    Attachment, OrchestrationRequest, Orchestrator, OrchestratorConfig,
};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: orchestrator <question> [statement.pdf]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let question = args.next().ok_or(USAGE)?;

    let mut request = OrchestrationRequest::question(question);
    if let Some(pdf_path) = args.next() {
        let data = std::fs::read(&pdf_path)?;
        let filename = Path::new(&pdf_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("statement.pdf")
            .to_string();
        request = request.with_attachment(Attachment::new(filename, "application/pdf", data));
    }

    let config = OrchestratorConfig::from_env()?;
    let orchestrator = Orchestrator::from_config(&config)?;

    info!(question = %request.question, "Running orchestrator");

    match orchestrator.run(request).await {
        Ok(execution) => {
            println!("\n=== ORCHESTRATION RESULT ===");
            println!("Question: {}", execution.state.question());
            println!(
                "Guardrail: {}",
                execution.state.guardrail_status().unwrap_or("-")
            );
            println!("Intention: {}", execution.state.intention().unwrap_or("-"));
            println!("\nPath:");
            for (i, node) in execution.path.iter().enumerate() {
                println!("  {}: {}", i + 1, node);
            }
            println!("\nAnswer:\n{}", execution.state.answer().unwrap_or_default());
            Ok(())
        }
        Err(e) => {
            eprintln!("Orchestration failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
