use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use docchat::ai::providers::{OllamaChatClient, OllamaEmbedder};
use docchat::ai::rag::{ContextSource, VectorStoreFactory};
use docchat::{logging, ChatService, Config, ConversationStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(about = "Chat with your documents using a local Ollama model and a pgvector index")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory and the vector schema
    Init,
    /// Start a new conversation and print its id
    New,
    /// Store a document in a conversation and index it
    Upload {
        conversation_id: String,
        file: PathBuf,
    },
    /// Rebuild the index entries of every document in a conversation
    Reindex { conversation_id: String },
    /// Ask a question in a conversation
    Ask {
        conversation_id: String,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Print the message history of a conversation
    History { conversation_id: String },
    /// List the documents of a conversation
    Documents { conversation_id: String },
    /// Delete a conversation with its documents and vectors
    Forget { conversation_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    let log_dir = config.data_dir.join("logs");
    logging::configure_logging(&cli.log_level, Some(log_dir.as_path()));
    tracing::debug!(
        "Data dir {}, vector backend {}",
        config.data_dir.display(),
        config.vector_backend
    );

    // Dropping the command future on Ctrl-C aborts in-flight requests and rolls back open transactions
    tokio::select! {
        result = run(cli.command, config) => result,
        _ = signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling");
            bail!("interrupted")
        }
    }
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let conversations = Arc::new(
        ConversationStore::open(&config.data_dir)
            .await
            .context("open conversation store")?,
    );

    match command {
        Command::Init => {
            let store = VectorStoreFactory::create(&config)
                .await
                .context("initialize vector store")?;
            let status = store.ensure_schema().await.context("ensure vector schema")?;
            println!("Data directory: {}", conversations.root().display());
            println!("Log file: {}", logging::log_file_path(&config.data_dir.join("logs")).display());
            println!("Vector backend: {} (similarity index: {})", config.vector_backend, status);
        }
        Command::New => {
            let conversation_id = conversations.create_conversation().await?;
            println!("{}", conversation_id);
        }
        Command::Upload {
            conversation_id,
            file,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.txt".to_string());

            let service = chat_service(&config, conversations).await?;
            let (document, outcome) = service
                .upload_document(&conversation_id, &name, &data)
                .await
                .with_context(|| format!("upload {}", file.display()))?;
            println!(
                "Stored {} as {} ({} chunks indexed)",
                document.name, document.id, outcome.chunk_count
            );
        }
        Command::Reindex { conversation_id } => {
            let service = chat_service(&config, conversations).await?;
            let refreshed = service.reindex_conversation(&conversation_id).await?;
            for (document, outcome) in &refreshed {
                println!("{}  {}  {} chunks", document.id, document.name, outcome.chunk_count);
            }
            println!("Reindexed {} documents", refreshed.len());
        }
        Command::Ask {
            conversation_id,
            message,
        } => {
            let service = chat_service(&config, conversations).await?;
            let reply = service
                .send_message(&conversation_id, &message.join(" "))
                .await?;
            println!("{}", reply.content);
            match reply.context {
                ContextSource::Retrieved { chunks } => {
                    tracing::info!("Answered with {} retrieved chunks", chunks)
                }
                ContextSource::FullText { documents } => {
                    tracing::info!("Answered with the full text of {} documents", documents)
                }
                ContextSource::None => tracing::info!("Answered without documents"),
            }
        }
        Command::History { conversation_id } => {
            for message in conversations.load_history(&conversation_id).await? {
                println!(
                    "[{}] {}: {}",
                    message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    message.role,
                    message.content
                );
            }
        }
        Command::Documents { conversation_id } => {
            for document in conversations.list_documents(&conversation_id).await? {
                println!(
                    "{}  {}  {} bytes  {}",
                    document.id,
                    document.name,
                    document.size,
                    document.uploaded_at.to_rfc3339()
                );
            }
        }
        Command::Forget { conversation_id } => {
            let service = chat_service(&config, conversations).await?;
            if service.delete_conversation(&conversation_id).await? {
                println!("Deleted conversation {}", conversation_id);
            } else {
                println!("Conversation {} did not exist", conversation_id);
            }
        }
    }

    Ok(())
}

async fn chat_service(
    config: &Config,
    conversations: Arc<ConversationStore>,
) -> anyhow::Result<ChatService> {
    let vectors = VectorStoreFactory::create(config)
        .await
        .context("initialize vector store")?;
    let embedder = OllamaEmbedder::from_config(&config.ollama, &config.embedding)?;
    let chat = OllamaChatClient::from_config(&config.ollama)?;

    Ok(ChatService::new(
        conversations,
        vectors,
        Arc::new(embedder),
        Arc::new(chat),
        config.database.search_top_k,
    ))
}
