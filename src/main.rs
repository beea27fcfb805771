use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use livechat::chat::{generate_user_id, relay};
use livechat::{ChatClient, ChatUser, Config, HttpTokenProvider, LoopbackTransport};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = livechat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        livechat::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(1);
    }

    let username = match std::env::args().nth(1) {
        Some(name) => name,
        None => {
            eprintln!("usage: livechat <display-name>");
            std::process::exit(2);
        }
    };

    info!("livechat - room {}", config.chat.room_id);

    let tokens = match HttpTokenProvider::new(&config.chat) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let transport = Arc::new(
        LoopbackTransport::new().with_echo(ChatUser::new(generate_user_id(&username), &username)),
    );
    let mut client = ChatClient::from_config(&config.chat, tokens, transport);

    let entries = client.transcript().subscribe();
    tokio::spawn(relay(entries, |entry| println!("{}", entry.format())));

    if let Err(e) = client.sign_in(&username).await {
        eprintln!("Could not join the chat room: {e}");
        std::process::exit(1);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        client.set_draft(&line);
        if let Err(e) = client.submit_draft().await {
            eprintln!("{e}");
        }
    }

    client.sign_out().await;
}
