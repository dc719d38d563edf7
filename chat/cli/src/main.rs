//! RagChat CLI
//!
//! Terminal surface for the RAG assistant. Answers stream to stdout as they
//! arrive; progress labels, citations and logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Ask in a new chat (titled after the question)
//! ragchat ask "What does the syllabus say about late submissions?"
//!
//! # Ask in an existing chat, restricted to two documents
//! ragchat ask --chat 65f0c1 --doc d1 --doc d2 "Summarize chapter 3"
//!
//! # Against another server, with verbose logging
//! ragchat -v --api-url https://rag.example.org/api chats
//! ```
//!
//! # Environment Variables
//!
//! - `RAGCHAT_CONFIG`: Config file path (default: `~/.config/ragchat/config.toml`)
//! - `RAGCHAT_API_URL`, `RAGCHAT_USER_ID`, `RAGCHAT_TOKEN`, `RAGCHAT_TIMEOUT_SECS`
//! - `RUST_LOG`: Log filter; overrides `-v`
//!
//! # Signals
//!
//! - SIGINT (Ctrl-C): Abandons the answer in progress

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ragchat_core::backend::ChatUpdate;
use ragchat_core::{
    default_config_path, load_config_from_path, AssemblerEvent, ChannelObserver, ChatClient,
    ChatError, ChatId, ConfigOverrides, CycleOutcome, FinalMessage, HttpBackend, Session,
    SourceRef, TransportError,
};

#[derive(Debug, Parser)]
#[command(name = "ragchat", version, about = "Chat with your documents from the terminal")]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file path
    #[arg(long, env = "RAGCHAT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Service base URL, including the /api prefix
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// User id sent as X-User-ID
    #[arg(long, global = true)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask a question and stream the answer
    Ask {
        /// Existing chat to ask in
        #[arg(long, conflicts_with = "title")]
        chat: Option<String>,

        /// Title for a new chat (default: the question)
        #[arg(long)]
        title: Option<String>,

        /// Bot to answer with (new chats only)
        #[arg(long, conflicts_with = "chat")]
        bot: Option<String>,

        /// Document to retrieve from (repeatable)
        #[arg(long = "doc", value_name = "ID")]
        docs: Vec<String>,

        /// The question
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// List chats
    Chats,
    /// List bots
    Bots,
    /// List uploaded documents
    Documents,
    /// Check the service and its model server
    Health,
    /// Upload a document for retrieval
    Upload {
        /// File to upload
        path: PathBuf,
    },
    /// Delete a chat
    DeleteChat {
        /// Chat id
        id: String,
    },
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config_from_path(cli.config.clone().or_else(default_config_path))?;
    let mut overrides = ConfigOverrides::new();
    if let Some(url) = cli.api_url.clone() {
        overrides = overrides.with_base_url(url);
    }
    if let Some(user_id) = cli.user_id.clone() {
        overrides = overrides.with_user_id(user_id);
    }
    overrides.apply(&mut config);
    config.validate()?;

    tracing::info!(
        base_url = %config.api.base_url,
        source = %config.source(),
        "Configuration loaded"
    );

    let backend = HttpBackend::new(&config.api)?;
    let max_sources = config.stream.max_sources_shown;
    let client = ChatClient::new(backend, config.stream);
    let mut out = tokio::io::stdout();

    match cli.command {
        Command::Ask {
            chat,
            title,
            bot,
            docs,
            question,
        } => {
            let question = question.join(" ");
            return ask(&client, chat, title, bot, docs, &question, max_sources).await;
        }
        Command::Chats => {
            let text: String = client
                .transport()
                .list_chats()
                .await?
                .iter()
                .map(|chat| format!("{}\t{}\t{} messages\n", chat.id, chat.title, chat.messages.len()))
                .collect();
            write_all(&mut out, &text).await?;
        }
        Command::Bots => {
            let text: String = client
                .transport()
                .list_bots()
                .await?
                .iter()
                .map(|bot| {
                    format!(
                        "{}\t{}\t{} (t={})\n",
                        bot.id, bot.config.name, bot.config.model, bot.config.temperature
                    )
                })
                .collect();
            write_all(&mut out, &text).await?;
        }
        Command::Documents => {
            let text: String = client
                .transport()
                .list_documents()
                .await?
                .iter()
                .map(|doc| {
                    format!(
                        "{}\t{}\t{}\n",
                        doc.id,
                        doc.name,
                        doc.kind.as_deref().unwrap_or("other")
                    )
                })
                .collect();
            write_all(&mut out, &text).await?;
        }
        Command::Health => {
            let health = client.transport().health().await?;
            let model = if health.ollama_available {
                "available"
            } else {
                "unavailable"
            };
            write_all(&mut out, &format!("service: ok\nmodel server: {model}\n")).await?;
        }
        Command::Upload { path } => {
            let receipt = client.transport().upload_document(&path).await?;
            let mut text = receipt.message.unwrap_or_else(|| "Uploaded".to_string());
            if let Some(chunks) = receipt.chunks {
                text.push_str(&format!("\nChunks processed: {chunks}"));
            }
            if let Some(note) = receipt.note.filter(|n| !n.is_empty()) {
                text.push_str(&format!("\n{note}"));
            }
            text.push('\n');
            write_all(&mut out, &text).await?;
        }
        Command::DeleteChat { id } => {
            client.transport().delete_chat(&ChatId::new(id)).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn ask(
    client: &ChatClient<HttpBackend>,
    chat: Option<String>,
    title: Option<String>,
    bot: Option<String>,
    docs: Vec<String>,
    question: &str,
    max_sources: usize,
) -> anyhow::Result<ExitCode> {
    let backend = client.transport();

    let mut session = match chat {
        Some(id) => {
            let chat_id = ChatId::new(id);
            let mut session = Session::from_chat(&backend.get_chat(&chat_id).await?);
            if !docs.is_empty() {
                for doc in &docs {
                    if !session.selected_documents().contains(doc) {
                        session.toggle_document(doc);
                    }
                }
                let update = ChatUpdate {
                    selected_documents: Some(session.selected_documents().to_vec()),
                    ..ChatUpdate::default()
                };
                backend.update_chat(&chat_id, &update).await?;
            }
            session
        }
        None => {
            let mut session = Session::new();
            session.title = title.unwrap_or_default();
            session.bot_id = bot;
            for doc in &docs {
                session.toggle_document(doc);
            }
            client.ensure_chat(&mut session, question).await?;
            session
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let (mut observer, events) = ChannelObserver::channel();
    let printer = tokio::spawn(render(events, max_sources));

    let result = client.ask(&mut session, question, &mut observer, &cancel).await;
    drop(observer);
    printer.await??;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(ChatError::Transport(e)) => {
            if let Some(hint) = retry_hint(&e) {
                write_all(&mut tokio::io::stderr(), hint).await?;
            }
            return Err(ChatError::Transport(e).into());
        }
        Err(e) => return Err(e.into()),
    };

    let code = match outcome {
        CycleOutcome::Completed(message) if message.is_error() => ExitCode::FAILURE,
        CycleOutcome::Completed(_) => ExitCode::SUCCESS,
        CycleOutcome::TransportFailed { .. } => ExitCode::FAILURE,
        CycleOutcome::Abandoned(_) => {
            let mut err = tokio::io::stderr();
            write_all(&mut err, "\n[cancelled]\n").await?;
            ExitCode::from(130)
        }
    };

    if let Some(ref chat_id) = session.chat_id {
        tracing::info!(chat_id = %chat_id, messages = session.messages.len(), "Chat updated");
    }
    Ok(code)
}

/// Print assembler events until the cycle's channel closes
async fn render(
    mut events: mpsc::UnboundedReceiver<AssemblerEvent>,
    max_sources: usize,
) -> std::io::Result<()> {
    let mut out = tokio::io::stdout();
    let mut err = tokio::io::stderr();
    let mut printed = 0;
    let mut last_status: Option<String> = None;

    while let Some(event) = events.recv().await {
        match event {
            AssemblerEvent::FrameApplied(snapshot) => {
                if snapshot.status != last_status {
                    if let Some(ref status) = snapshot.status {
                        write_all(&mut err, &format!("[{status}]\n")).await?;
                    }
                    last_status = snapshot.status;
                }

                if let Some(delta) = snapshot.content.get(printed..).filter(|d| !d.is_empty()) {
                    write_all(&mut out, delta).await?;
                    printed = snapshot.content.len();
                }
            }
            AssemblerEvent::CycleComplete(message) => {
                if printed > 0 {
                    write_all(&mut out, "\n").await?;
                }
                if let Some(ref error) = message.error {
                    write_all(&mut err, &format!("Error: {error}\n")).await?;
                }
                write_all(&mut err, &format_sources(&message, max_sources)).await?;
            }
            AssemblerEvent::TransportFailure(failure) => {
                if printed > 0 {
                    write_all(&mut out, "\n").await?;
                }
                let kept = if failure.had_partial_content {
                    " (partial answer kept)"
                } else {
                    ""
                };
                write_all(&mut err, &format!("Connection lost: {failure}{kept}\n")).await?;
            }
        }
    }

    Ok(())
}

fn format_sources(message: &FinalMessage, max: usize) -> String {
    if message.sources.is_empty() {
        return String::new();
    }

    let mut text = String::from("Sources:\n");
    for (i, source) in message.sources.iter().take(max).enumerate() {
        text.push_str(&format!("  [{}] {}\n", i + 1, describe_source(source)));
    }
    let hidden = message.sources.len().saturating_sub(max);
    if hidden > 0 {
        text.push_str(&format!("  +{hidden} more\n"));
    }
    text
}

/// Suggest trying again when the request failed in a way that may pass later
fn retry_hint(error: &TransportError) -> Option<&'static str> {
    error
        .is_retryable()
        .then_some("The service may be busy or unreachable; try again in a moment.\n")
}

fn describe_source(source: &SourceRef) -> String {
    format!(
        "{} (p. {})",
        source.display_name(),
        source.display_page()
    )
}

async fn write_all<W>(target: &mut W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    target.write_all(text.as_bytes()).await?;
    target.flush().await
}
