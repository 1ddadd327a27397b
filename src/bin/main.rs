//! Interactive CLI loop: one free-text user turn in, one advisor reply out.

use personal_finance_advisor::llm::ChatClient;
use personal_finance_advisor::orchestrator::{FinancialAdvisor, Session};
use personal_finance_advisor::reference::ReferenceData;
use personal_finance_advisor::Config;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "personal_finance_advisor=info".into()),
        )
        .init();

    dotenv::dotenv().ok();

    // Configuration problems are fatal here, before any session exists.
    let config = Config::from_env()?;
    let customer_id = env::var("ADVISOR_CUSTOMER_ID").unwrap_or_else(|_| "CUSTOMER1".to_string());

    let client = Arc::new(ChatClient::new(&config)?);
    let reference = Arc::new(ReferenceData::load(&config.data_path)?);

    let advisor = FinancialAdvisor::new(
        client,
        reference,
        customer_id.clone(),
        config.context_window,
    );
    let mut session = Session::new(config.max_history);

    info!(customer_id = %customer_id, "Personal finance advisor ready");
    println!("Personal Finance Advisor — ask about goals, spending, investing, or concepts.");
    println!("Type 'quit' to exit.\n");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }

        match advisor.handle_turn(input, &mut session).await {
            Ok(reply) => println!("\n{}\n", reply),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    println!("Session ended. {} goal(s) were on the ledger.", session.ledger.snapshot().len());

    Ok(())
}
