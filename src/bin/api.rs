use personal_finance_advisor::api::{start_server, ApiState};
use personal_finance_advisor::llm::ChatClient;
use personal_finance_advisor::orchestrator::FinancialAdvisor;
use personal_finance_advisor::reference::ReferenceData;
use personal_finance_advisor::Config;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "personal_finance_advisor=info,tower_http=info".into()),
        )
        .init();

    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    let customer_id =
        std::env::var("ADVISOR_CUSTOMER_ID").unwrap_or_else(|_| "CUSTOMER1".to_string());

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Personal Finance Advisor — API server");
    info!("Port: {}", api_port);

    let client = Arc::new(ChatClient::new(&config)?);
    let reference = Arc::new(ReferenceData::load(&config.data_path)?);

    let advisor = Arc::new(FinancialAdvisor::new(
        client,
        reference,
        customer_id,
        config.context_window,
    ));

    let state = ApiState::new(advisor, config.max_history);

    info!("Advisor initialized, starting server");
    start_server(state, api_port).await?;

    Ok(())
}
