mod models;
mod services;
mod utils;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use crate::services::chat;
use crate::services::generator::{self, DEFAULT_BATCH_SIZE, DEFAULT_TOTAL};
use crate::services::openai::DEFAULT_BASE_URL;
use crate::services::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let base_url =
        std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
        _ => prompt_api_key()?,
    };

    let mut state = AppState::new(api_key, base_url);
    let client = Client::new();

    println!("Invoice analysis chat. Commands: /load, /clear, /quit, or ask a question.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/load" => {
                state.dataset =
                    generator::load_dataset(DEFAULT_TOTAL, DEFAULT_BATCH_SIZE, |percent| {
                        print!("\rLoading invoices... {percent:.0}%");
                        let _ = io::stdout().flush();
                    })
                    .await;
                println!("\rLoaded {} invoices.     ", state.dataset.len());
            }
            "/clear" => {
                state.clear_conversation();
                println!("Conversation cleared.");
            }
            question => {
                if state.dataset.is_empty() {
                    println!("No dataset loaded yet. Run /load first.");
                    continue;
                }

                state.request_in_flight = true;
                let mut printed = 0usize;
                let result = chat::submit_question(&client, &mut state, question, |snapshot| {
                    print!("{}", &snapshot[printed..]);
                    let _ = io::stdout().flush();
                    printed = snapshot.len();
                })
                .await;
                state.request_in_flight = false;
                println!();

                match result {
                    Ok(()) => {
                        if !state.suggested_questions.is_empty() {
                            println!("Suggested questions:");
                            for question in &state.suggested_questions {
                                println!("  - {question}");
                            }
                        }
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }
        }
    }

    Ok(())
}

fn prompt_api_key() -> Result<String> {
    let stdin = io::stdin();
    loop {
        print!("Enter your OpenAI API key: ");
        io::stdout().flush()?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        let key = line.trim();
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }
}
