use rand::seq::SliceRandom;
use reqwest::Client;
use tracing::{debug, warn};

use crate::models::{ChatMessage, InvoiceRecord};
use crate::services::openai::{self, ChatError};
use crate::services::state::AppState;
use crate::utils::format_decimal;

pub const CONTEXT_SAMPLE_SIZE: usize = 100;

const ANSWER_MAX_TOKENS: u32 = 1000;
const SUGGESTION_MAX_TOKENS: u32 = 150;

const SUGGESTION_PROMPT: &str = "You are an AI assistant helping to generate follow-up \
questions for a conversation about Chevron's invoice data. Based on the conversation \
history, suggest 2-3 relevant questions that would help explore the data further. \
Provide only the questions, separated by newlines.";

fn analysis_prompt(context: &str) -> String {
    format!(
        "You are an AI assistant specializing in Chevron's invoice data analysis for USA \
         operations. Your responses should be concise, direct, and focused on answering the \
         user's question based on the provided invoice data. The invoices span from January \
         2024 to July 2024. You have access to 20,000 Chevron invoices in total. Here's a \
         sample of 100 for context:\n\n{context}"
    )
}

fn sample_context(dataset: &[InvoiceRecord]) -> Vec<InvoiceRecord> {
    let mut rng = rand::thread_rng();
    dataset
        .choose_multiple(&mut rng, CONTEXT_SAMPLE_SIZE)
        .cloned()
        .collect()
}

fn format_context(records: &[InvoiceRecord]) -> String {
    records
        .iter()
        .map(|inv| {
            format!(
                "Invoice {}: Vendor: {}, Service: {}, Amount: ${}, Date: {}, Due: {}, \
                 Status: {}, State: {}, Well: {}",
                inv.invoice_id,
                inv.vendor_name,
                inv.service_category,
                format_decimal(inv.invoice_amount),
                inv.invoice_date.format("%Y-%m-%d"),
                inv.due_date.format("%Y-%m-%d"),
                inv.status,
                inv.state,
                inv.well_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_transcript(conversation: &[ChatMessage]) -> String {
    conversation
        .iter()
        .map(|msg| format!("{}: {}", msg.role, msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_suggestions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Submit a user question against the loaded dataset. Appends the user message
/// and an empty assistant message to the conversation, streams the answer into
/// the assistant message (reporting each cumulative snapshot to `on_snapshot`),
/// then refreshes the suggested follow-up questions.
///
/// A primary-path failure is returned to the caller and leaves whatever partial
/// assistant content had accumulated; a suggestion failure is logged and
/// swallowed, keeping the previous list.
pub async fn submit_question<F>(
    client: &Client,
    state: &mut AppState,
    question: &str,
    mut on_snapshot: F,
) -> Result<(), ChatError>
where
    F: FnMut(&str),
{
    let sample = sample_context(&state.dataset);
    debug!("embedding {} records as request context", sample.len());
    let context = format_context(&sample);

    let mut outbound = Vec::with_capacity(state.conversation.len() + 2);
    outbound.push(ChatMessage::system(analysis_prompt(&context)));
    outbound.extend(state.conversation.iter().cloned());
    outbound.push(ChatMessage::user(question));

    state.conversation.push(ChatMessage::user(question));
    state.conversation.push(ChatMessage::assistant(""));

    let base_url = state.base_url.clone();
    let api_key = state.api_key.clone();
    let conversation = &mut state.conversation;
    openai::stream_chat(
        client,
        &base_url,
        &api_key,
        outbound,
        ANSWER_MAX_TOKENS,
        |snapshot| {
            if let Some(last) = conversation.last_mut() {
                last.content.clear();
                last.content.push_str(snapshot);
            }
            on_snapshot(snapshot);
        },
    )
    .await?;

    match suggest_questions(client, &base_url, &api_key, &state.conversation).await {
        Ok(questions) => state.suggested_questions = questions,
        Err(err) => warn!("follow-up suggestion request failed: {err}"),
    }

    Ok(())
}

async fn suggest_questions(
    client: &Client,
    base_url: &str,
    api_key: &str,
    conversation: &[ChatMessage],
) -> Result<Vec<String>, ChatError> {
    if conversation.is_empty() {
        return Ok(Vec::new());
    }

    let transcript = render_transcript(conversation);
    let messages = vec![
        ChatMessage::system(SUGGESTION_PROMPT),
        ChatMessage::user(format!(
            "Based on this conversation, suggest 2-3 follow-up questions:\n\n{transcript}"
        )),
    ];

    let reply =
        openai::complete_chat(client, base_url, api_key, messages, SUGGESTION_MAX_TOKENS).await?;
    Ok(parse_suggestions(&reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::generator;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Minimal one-connection HTTP server: reads the full request, writes a
    // canned response, closes the socket.
    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut tmp = [0u8; 4096];
                loop {
                    let n = socket.read(&mut tmp).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&tmp[..n]);
                    if request_complete(&buf) {
                        break;
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&buf[..pos]);
        let content_length = headers
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= pos + 4 + content_length
    }

    fn state_with_dataset(base_url: String) -> AppState {
        let mut state = AppState::new("test-key".to_string(), base_url);
        state.dataset = generator::generate_batch(10, 0);
        state
    }

    #[test]
    fn parse_suggestions_drops_blank_lines() {
        let reply = "What was the largest invoice?\n\n  Which vendor billed the most?  \n";
        assert_eq!(
            parse_suggestions(reply),
            vec![
                "What was the largest invoice?".to_string(),
                "Which vendor billed the most?".to_string(),
            ]
        );
        assert!(parse_suggestions("\n\n").is_empty());
    }

    #[test]
    fn context_lines_carry_every_field() {
        let records = generator::generate_batch(2, 0);
        let context = format_context(&records);
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines.len(), 2);

        let first = &records[0];
        assert!(lines[0].starts_with(&format!("Invoice {}: Vendor: {}", first.invoice_id, first.vendor_name)));
        assert!(lines[0].contains(&format!("Amount: ${}", format_decimal(first.invoice_amount))));
        assert!(lines[0].contains(&format!("Well: {}", first.well_name)));
    }

    #[test]
    fn context_sample_is_bounded() {
        let small = generator::generate_batch(5, 0);
        assert_eq!(sample_context(&small).len(), 5);

        let large = generator::generate_batch(250, 0);
        assert_eq!(sample_context(&large).len(), CONTEXT_SAMPLE_SIZE);
    }

    #[test]
    fn transcript_renders_role_prefixes() {
        let conversation = vec![
            ChatMessage::user("how much is pending?"),
            ChatMessage::assistant("About $1.2M."),
        ];
        assert_eq!(
            render_transcript(&conversation),
            "user: how much is pending?\nassistant: About $1.2M."
        );
    }

    #[tokio::test]
    async fn failed_request_surfaces_status_and_keeps_empty_assistant_message() {
        let base_url = one_shot_server(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let client = Client::new();
        let mut state = state_with_dataset(base_url);

        let result = submit_question(&client, &mut state, "total spend?", |_| {}).await;

        assert!(
            matches!(result, Err(ChatError::RequestFailed { status }) if status.as_u16() == 500)
        );
        assert_eq!(state.conversation.len(), 2);
        assert_eq!(state.conversation[0].role, Role::User);
        assert_eq!(state.conversation[1].role, Role::Assistant);
        assert_eq!(state.conversation[1].content, "");
        assert!(state.suggested_questions.is_empty());
    }

    #[tokio::test]
    async fn successful_stream_fills_trailing_assistant_message() {
        let base_url = one_shot_server(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
             data: [DONE]\n\n",
        )
        .await;
        let client = Client::new();
        let mut state = state_with_dataset(base_url);

        let mut snapshots = Vec::new();
        let result =
            submit_question(&client, &mut state, "hi", |s| snapshots.push(s.to_string())).await;

        // The suggestion request hits a server that is no longer listening;
        // that failure is swallowed and leaves the list untouched.
        assert!(result.is_ok());
        assert_eq!(snapshots, ["Hel", "Hello"]);
        assert_eq!(state.conversation.len(), 2);
        assert_eq!(state.conversation[1].content, "Hello");
        assert!(state.suggested_questions.is_empty());
    }
}
