//! lexchat - terminal client for the legal assistant chat service

use lexchat::auth::Credentials;
use lexchat::model::{Conversation, Role};
use lexchat::runtime::SendPhase;
use lexchat::transcript::{PlainTextRenderer, TranscriptRenderer};
use lexchat::transport::Attachment;
use lexchat::{
    ChatSession, ChatTransport, ClientConfig, HttpTransport, SendOutcome, SessionUpdate,
    TransportError,
};
use std::io::Write as _;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str =
    "Commands: /new, /list, /open <id>, /delete <id>, /attach <path>, /export, /help, /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with replies
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(api_url = %config.api_url, streaming = config.streaming, "Starting lexchat");

    let transport = HttpTransport::new(&config)?;
    match transport.health_check().await {
        Ok(status) if status.is_healthy() => tracing::info!("Backend healthy"),
        Ok(status) => tracing::warn!(
            database = %status.database,
            s3 = %status.s3,
            ai_service = %status.ai_service,
            "Backend degraded"
        ),
        Err(e) => tracing::warn!(error = %e, "Backend unreachable"),
    }

    if let (Ok(email), Ok(password)) = (
        std::env::var("LEXCHAT_EMAIL"),
        std::env::var("LEXCHAT_PASSWORD"),
    ) {
        let response = transport.login(&Credentials::new(email, password)).await?;
        tracing::info!(user = ?response.user.map(|u| u.email), "Logged in");
    }

    let mut session = ChatSession::new(transport, &config);
    tokio::spawn(print_replies(session.updates()));

    print_chats(&session.load_chats().await.to_vec());
    println!("{HELP}");

    let mut pending: Vec<Attachment> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();
        match command {
            "/quit" => break,
            "/help" => println!("{HELP}"),
            "/list" => print_chats(&session.load_chats().await.to_vec()),
            "/new" => match session.new_chat().await {
                Ok(chat) => println!("Opened {} ({})", chat.title, chat.id),
                Err(e) => report_error(&e),
            },
            "/open" => match session.select_chat(arg).await {
                Ok(chat) => print_history(&chat),
                Err(e) => report_error(&e),
            },
            "/delete" => match session.delete_chat(arg).await {
                Ok(()) => println!("Deleted {arg}"),
                Err(e) => report_error(&e),
            },
            "/attach" => match Attachment::from_path(Path::new(arg)).await {
                Ok(file) => {
                    println!("Attached {}", file.name);
                    pending.push(file);
                }
                Err(e) => eprintln!("Cannot read {arg}: {e}"),
            },
            "/export" => export(&session).await,
            _ => send(&mut session, line, std::mem::take(&mut pending)).await,
        }
    }

    if let Err(e) = session.transport().logout().await {
        tracing::debug!(error = %e, "Logout failed");
    }
    Ok(())
}

/// Send a message; Ctrl-C cancels it
async fn send<T: ChatTransport>(
    session: &mut ChatSession<T>,
    text: &str,
    attachments: Vec<Attachment>,
) {
    let cancel = session.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = session.send(text, attachments).await;
    interrupt.abort();

    match result {
        Ok(report) => {
            for failure in &report.upload_failures {
                eprintln!("Skipped attachment {failure}");
            }
            match report.outcome {
                SendOutcome::Completed => {}
                SendOutcome::Failed { detail } => eprintln!("Reply failed: {detail}"),
                SendOutcome::Cancelled => eprintln!("Cancelled"),
            }
        }
        Err(e) => eprintln!("{e}"),
    }
}

async fn export<T: ChatTransport>(session: &ChatSession<T>) {
    let Some(transcript) = session.export_transcript() else {
        eprintln!("No open chat");
        return;
    };
    let bytes = match PlainTextRenderer.render(&transcript) {
        Ok(bytes) => bytes,
        Err(never) => match never {},
    };
    let path = transcript.file_name().replace(".pdf", ".txt");
    match tokio::fs::write(&path, &bytes).await {
        Ok(()) => println!("Saved {path}"),
        Err(e) => eprintln!("Cannot write {path}: {e}"),
    }
}

fn report_error(error: &TransportError) {
    if error.requires_login() {
        eprintln!("Session expired. Set LEXCHAT_EMAIL and LEXCHAT_PASSWORD and restart.");
    } else {
        eprintln!("{}", error.user_message());
    }
}

fn print_chats(chats: &[lexchat::model::ChatSummary]) {
    if chats.is_empty() {
        println!("No chats yet");
    }
    for chat in chats {
        println!(
            "{}  {}  {}",
            chat.id,
            chat.updated_at.format("%Y-%m-%d %H:%M"),
            chat.title
        );
    }
}

fn print_history(conversation: &Conversation) {
    println!("== {} ==", conversation.title);
    for message in &conversation.messages {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("[{speaker}] {}", message.content);
        if let Some(name) = &message.attachment_name {
            println!("  attachment: {name}");
        }
    }
}

/// Echo assistant text as it arrives.
///
/// While a send is in flight, prints the part of the trailing assistant
/// message not written yet.
async fn print_replies(updates: impl tokio_stream::Stream<Item = SessionUpdate>) {
    tokio::pin!(updates);
    let mut in_flight = false;
    let mut printed: Option<(String, usize)> = None;
    while let Some(update) = updates.next().await {
        match update {
            SessionUpdate::Phase(SendPhase::ChatEnsured) => {
                in_flight = true;
                printed = None;
            }
            SessionUpdate::Phase(SendPhase::Terminal(_)) => {
                if in_flight && printed.is_some() {
                    println!();
                }
                in_flight = false;
            }
            SessionUpdate::Conversation(conversation) if in_flight => {
                let Some(reply) = conversation
                    .messages
                    .last()
                    .filter(|m| m.role == Role::Assistant)
                else {
                    continue;
                };
                let offset = match &printed {
                    Some((id, len)) if *id == reply.id => *len,
                    _ => 0,
                };
                if let Some(suffix) = reply.content.get(offset..) {
                    print!("{suffix}");
                    let _ = std::io::stdout().flush();
                }
                printed = Some((reply.id.clone(), reply.content.len()));
            }
            _ => {}
        }
    }
}
