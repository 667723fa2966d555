use anima_core::{AnimaConfig, Inbound, LexicalPerception};
use anima_memory::SqliteStore;
use anima_reasoning::{providers, TurnEngine};
use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "anima.toml")]
    config: String,

    /// Agent identity to converse with
    #[arg(short, long, default_value = "default")]
    agent: String,

    /// Use the deterministic mock provider regardless of config
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anima=info".into()),
        )
        .init();
    let args = Args::parse();

    let mut config = AnimaConfig::load_or_default(&args.config);
    if args.mock {
        config.llm.provider = "mock".to_string();
    }

    info!("opening store at {}", config.persistence.db_path);
    let store = Arc::new(SqliteStore::new(&config.persistence.db_path).await?);
    let completion = providers::build(&config.llm)?;
    let agent_name = config.agent.name.clone();
    let engine = TurnEngine::new(config, Arc::new(LexicalPerception), completion, store);

    println!("{} is listening. Commands: /state, /reset, /quit", agent_name);
    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;
        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                engine.factory_reset(&args.agent).await?;
                println!("(factory reset: state and history cleared)");
            }
            "/state" => match engine.snapshot(&args.agent).await {
                Some(record) => {
                    println!(
                        "valence {:+.2}  arousal {:.2}  resentment {:.2}  intimacy {:.2}  \
                         interactions {}",
                        record.emotion.valence,
                        record.emotion.arousal,
                        record.emotion.resentment,
                        record.intimacy.intimacy,
                        record.personality.total_interactions,
                    );
                }
                None => println!("(no session yet — say something first)"),
            },
            text => {
                let message = Inbound::new("user", text, chrono::Utc::now().timestamp());
                match engine.process_turn(&args.agent, &message).await {
                    Ok(outcome) => {
                        println!("{}", outcome.reply);
                        if let Some(e) = outcome.persist_error {
                            eprintln!("(warning: state not persisted: {})", e);
                        }
                    }
                    Err(e) => eprintln!("(turn failed: {:#})", e),
                }
            }
        }
    }

    println!("bye");
    Ok(())
}
