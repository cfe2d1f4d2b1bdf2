use market_analyst_agent::{
    bootstrap::{build_orchestrator, init_tracing},
    config::AnalystConfig,
    conversation::{ChatSession, BLANK_QUERY_MESSAGE},
};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

const QUIT_WORDS: [&str; 3] = ["quit", "exit", "q"];
const CLEAR_WORD: &str = "clear";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing("warn");

    let config = AnalystConfig::from_env()?;
    if config.anthropic_api_key.is_empty() {
        eprintln!("ANTHROPIC_API_KEY not set in .env");
    }

    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    let mut session = ChatSession::new(orchestrator);
    info!("Market analyst ready");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout
            .write_all(b"\nEnter your query ('clear' to reset, 'quit' to exit): ")
            .await?;
        stdout.flush().await?;

        let Some(query) = lines.next_line().await? else {
            break;
        };

        let command = query.trim().to_lowercase();
        if QUIT_WORDS.contains(&command.as_str()) {
            break;
        }

        if command == CLEAR_WORD {
            session.clear();
            println!("Conversation cleared.");
            continue;
        }

        if query.trim().is_empty() {
            println!("{}", BLANK_QUERY_MESSAGE);
            continue;
        }

        match session.ask(&query).await {
            Ok(reply) => {
                println!("{}", reply);
                println!("\n{}\n", "-".repeat(80));
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}
