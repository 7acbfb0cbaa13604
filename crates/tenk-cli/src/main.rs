use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};

use tenk_core::agent::{run_session, Agent, ConversationContext};
use tenk_core::index::{Embedder, FastEmbedder, IndexSet};
use tenk_core::llm::{client_from_config, LLM};
use tenk_core::tools::build_tool_set;
use tenk_core::{Config, FilingLoader};

#[derive(Parser)]
#[command(name = "tenk")]
#[command(about = "Ask questions about a company's SEC 10-K filings", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to ./tenk.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the per-year indexes from the downloaded filings
    Index,
    /// Ask a single question and exit
    Ask {
        /// The question to ask
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Start an interactive session (type "exit" to quit)
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Index => cmd_index(&config).await,
        Commands::Ask { question } => cmd_ask(&config, &question.join(" ")).await,
        Commands::Chat => cmd_chat(&config).await,
    }
}

async fn cmd_index(config: &Config) -> Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(FastEmbedder::new()?);
    let loader = FilingLoader::new(config.corpus.clone());

    let bar = ProgressBar::new(config.corpus.years.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")?.progress_chars("=> "),
    );

    for &year in &config.corpus.years {
        bar.set_message(format!("indexing {} {year}", config.corpus.company));
        let filing = loader.load_year(year)?;
        IndexSet::build_year(config, Arc::clone(&embedder), &filing).await?;
        bar.inc(1);
    }

    bar.finish_with_message(format!(
        "indexed {} years under {}",
        config.corpus.years.len(),
        config.storage.index_dir
    ));
    Ok(())
}

async fn cmd_ask(config: &Config, question: &str) -> Result<()> {
    let agent = build_agent(config).await?;
    let mut ctx = ConversationContext::new();

    let answer = agent.run(question, &mut ctx).await?;
    println!("{answer}");
    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let agent = build_agent(config).await?;
    let mut ctx = ConversationContext::new();

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();

    run_session(&agent, &mut ctx, &mut input, &mut output).await?;
    Ok(())
}

/// Load the persisted indexes and wire the tool set behind an agent.
async fn build_agent(config: &Config) -> Result<Agent> {
    let embedder: Arc<dyn Embedder> = Arc::new(FastEmbedder::new()?);
    let indexes = IndexSet::ensure(config, embedder, false)
        .await
        .wrap_err("no persisted index for a configured year; run `tenk index` first")?;

    let llm: Arc<dyn LLM> = Arc::new(client_from_config(&config.llm)?);
    let tools = build_tool_set(config, &indexes, Arc::clone(&llm))?;

    Ok(Agent::new(llm, tools))
}
