pub mod session;
pub mod store;
pub mod transport;

use crate::cli::ChatArgs;
use crate::models::catalog::{ find_model, SUPPORTED_MODELS };
use log::info;
use session::{ ChatSession, SubmitOutcome };
use std::error::Error;
use store::FileStore;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };
use transport::HttpRelayTransport;

const HELP: &str = "Commands: /model <id>, /models, /clear, /help, /quit";

/// Terminal stand-in for the browser widget.
pub async fn run_terminal_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = HttpRelayTransport::new(args.endpoint.clone())?;
    transport.check_health().await;

    let store = FileStore::new(&args.history_dir);
    info!("Conversation stored in {}", store.path_for(store::STORAGE_KEY).display());

    let mut session = ChatSession::open(store, transport, SUPPORTED_MODELS[0].id);
    if let Some(model) = &args.model {
        session.select_model(model);
    }

    println!("Connected to {} using {}. {}", args.endpoint, session.model(), HELP);
    for message in &session.history().messages {
        println!("{}> {}", message.role, message.content);
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"user> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').map(|(cmd, rest)| (cmd, rest.trim())).unwrap_or((line, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/help", _) => println!("{}", HELP),
            ("/clear", _) => match session.clear() {
                Ok(()) => println!("Conversation cleared"),
                Err(e) => println!("Conversation cleared, but it could not be saved: {}", e),
            },
            ("/models", _) => {
                for model in SUPPORTED_MODELS {
                    let marker = if model.id == session.model() { "*" } else { " " };
                    println!("{} {:<26} {}", marker, model.id, model.description);
                }
            }
            ("/model", "") => println!("Current model: {}", session.model()),
            ("/model", id) => {
                session.select_model(id);
                match find_model(id) {
                    Some(model) => println!("Model switched to {}", model.name),
                    None => println!("Model switched to {} (not in the catalog)", id),
                }
            }
            _ => match session.submit(line).await {
                SubmitOutcome::Ignored => {}
                SubmitOutcome::Replied(reply) => println!("assistant> {}", reply),
                SubmitOutcome::Failed(apology) => println!("assistant> {}", apology),
            },
        }
    }

    Ok(())
}
