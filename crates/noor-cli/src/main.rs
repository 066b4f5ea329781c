mod render;
mod store;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cliclack::{input, intro, outro, spinner};
use console::style;
use dotenv::dotenv;

use noor::agent::Agent;
use noor::models::role::Role;
use noor::providers::base::Provider;
use noor::providers::configs::{OpenAiProviderConfig, ProviderConfig};
use noor::providers::factory;
use noor::quran::client::{QuranApi, QuranClient};
use noor::session::ChatSession;
use noor::store::{ConversationStore, StoredMessage};
use noor::tools::ToolExecutor;

use crate::store::FileStore;

/// Identity used for conversations started from this terminal.
const LOCAL_USER: &str = "local";

#[derive(Parser)]
#[command(name = "noor", about = "A Quran study companion in your terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Chat {
        /// Display language code (en, ar, id, ...)
        #[arg(short, long, default_value = "en")]
        language: String,
    },
    /// Manage saved conversations
    Conversations {
        #[command(subcommand)]
        action: ConversationsCmd,
    },
}

#[derive(Subcommand)]
enum ConversationsCmd {
    /// List saved conversations, newest first
    List {
        /// Filter by title or preview text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Delete one conversation by id
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Chat { language } => run_chat(&language).await,
        Command::Conversations { action } => run_conversations(action).await,
    }
}

fn provider_from_env() -> Result<Arc<dyn Provider>> {
    let api_key = env::var("NOOR_API_KEY").context("NOOR_API_KEY must be set")?;
    let host =
        env::var("NOOR_PROVIDER_HOST").unwrap_or_else(|_| "https://api.openai.com".to_string());
    let model = env::var("NOOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let image_model = env::var("NOOR_IMAGE_MODEL").unwrap_or_else(|_| "gpt-image-1".to_string());

    let provider = factory::get_provider(ProviderConfig::OpenAi(OpenAiProviderConfig {
        host,
        api_key,
        model,
        image_model,
        temperature: None,
        max_tokens: None,
    }))?;
    Ok(Arc::from(provider))
}

async fn run_chat(language: &str) -> Result<()> {
    let provider = provider_from_env()?;
    let quran: Arc<dyn QuranApi> = Arc::new(QuranClient::new()?);
    let agent = Arc::new(Agent::new(provider, ToolExecutor::new(quran)));
    let session = ChatSession::new(agent, language);

    let store = FileStore::new(FileStore::default_dir()?)?;
    let mut conversation_id: Option<String> = None;

    intro(style(" noor ").on_cyan().black())?;
    cliclack::log::info("Ask about verses, chapters, or themes. /clear resets, /quit exits.")?;

    loop {
        let line: String = input("You").interact()?;
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                conversation_id = None;
                cliclack::log::info("Conversation cleared.")?;
                continue;
            }
            _ => {}
        }

        let progress = spinner();
        progress.start("Thinking...");
        match session.submit(trimmed).await {
            Some(reply) => {
                progress.stop("");
                render::render_answer(&reply.outcome.text);
                render::render_provenance(&reply.outcome.tool_outcomes);
                if let Err(err) = record_turn(
                    &store,
                    &mut conversation_id,
                    trimmed,
                    &reply.outcome.text,
                )
                .await
                {
                    // A persistence failure never interrupts the chat.
                    cliclack::log::warning(format!("could not save this turn: {err}"))?;
                }
            }
            None => {
                progress.stop("Superseded.");
            }
        }
    }

    outro("Ma'a salama!")?;
    Ok(())
}

async fn record_turn(
    store: &FileStore,
    conversation_id: &mut Option<String>,
    user_text: &str,
    reply_text: &str,
) -> Result<()> {
    let id = match conversation_id {
        Some(id) => id.clone(),
        None => {
            let conversation = store.create(LOCAL_USER, user_text).await?;
            *conversation_id = Some(conversation.id.clone());
            conversation.id
        }
    };
    store
        .append(&id, StoredMessage::new(&id, Role::User, user_text, None))
        .await?;
    store
        .append(&id, StoredMessage::new(&id, Role::Assistant, reply_text, None))
        .await?;
    Ok(())
}

async fn run_conversations(action: ConversationsCmd) -> Result<()> {
    let store = FileStore::new(FileStore::default_dir()?)?;
    match action {
        ConversationsCmd::List { search } => {
            let conversations = store.list(LOCAL_USER, search.as_deref()).await?;
            if conversations.is_empty() {
                println!("No saved conversations.");
                return Ok(());
            }
            for conversation in conversations {
                println!(
                    "{}  {}  {}",
                    style(&conversation.id[..8]).dim(),
                    conversation.updated_at.format("%Y-%m-%d %H:%M"),
                    conversation.title
                );
            }
        }
        ConversationsCmd::Delete { id } => {
            store.delete(&id).await?;
            println!("Deleted {id}.");
        }
    }
    Ok(())
}
