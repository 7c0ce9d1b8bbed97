use chatbot_relay::cli::{ Args, Command };
use chatbot_relay::widget::run_terminal_chat;
use clap::Parser;
use dotenv::dotenv;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command.clone() {
        Some(Command::Chat(chat_args)) => run_terminal_chat(chat_args).await,
        Some(Command::Serve) | None => chatbot_relay::run(args).await,
    }
}
