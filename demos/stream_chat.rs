//! Streams one chat reply to stdout
//!
//! Run with: cargo run --example stream_chat --features reqwest -- <request-id> <message>
//! The server is taken from `CHAT_API_URL` (default `http://localhost:5000`).

use std::io::Write;

use chatsse::{Callbacks, ChatClient, ClientConfig, Outcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let request_id = args.next().ok_or("missing request id")?;
    let message = args.collect::<Vec<_>>().join(" ");

    let client = ChatClient::new(reqwest::Client::new(), ClientConfig::from_env());
    println!("Streaming reply from {}...", client.stream_url(&request_id));

    let outcome = client
        .stream_message(
            &request_id,
            &message,
            Callbacks::new(
                |token| {
                    print!("{token}");
                    let _ = std::io::stdout().flush();
                },
                |tokens_used, new_balance| {
                    println!();
                    println!("---");
                    println!("Tokens used: {tokens_used:?}, balance: {new_balance:?}");
                },
                |message| {
                    println!();
                    eprintln!("Error: {message}");
                },
            )
            .with_file_changes(|changes| {
                println!();
                for change in changes {
                    println!("{} {}", change.operation, change.file);
                }
            }),
        )
        .await?;

    if outcome == Outcome::Failed {
        std::process::exit(1);
    }
    Ok(())
}
