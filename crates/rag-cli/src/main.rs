//! rag - Command-line interface for hybrid document question answering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rag_agent::{QueryRouter, ToolAgentLoop};
use rag_chunk::{load_documents, Indexer, RecursiveChunker};
use rag_core::{
    ChunkIndex, EngineHit, FusedResult, Generator, QueryContext, RagConfig, RagError, Response,
    Result,
};
use rag_model::{embedder_from_config, OllamaGenerator};
use rag_query::{DateCutoff, RetrievalFusionEngine};
use rag_store::{KeywordStore, VectorStore};

/// rag - Local hybrid retrieval and grounded answers over your documents
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/rag/config.toml, then ./rag.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index .txt and .md files under a directory
    Index {
        /// Root directory to index
        root: PathBuf,

        /// Wipe both indexes first
        #[arg(long)]
        reset: bool,
    },

    /// Route a question to file lookup or a cited answer
    Ask {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Chunks passed to the model
        #[arg(short = 'k', long)]
        k: Option<usize>,

        /// Only use files modified before this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,
    },

    /// Let the model choose retrieval tools before answering
    Agent {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Maximum model turns
        #[arg(long)]
        steps: Option<usize>,

        /// Only use files modified before this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,
    },

    /// Fused keyword + semantic search
    Search {
        /// Search query
        query: String,

        /// Number of results to show
        #[arg(short = 'k', long, default_value = "10")]
        k: usize,

        /// Only use files modified before this date (YYYY-MM-DD)
        #[arg(long)]
        before: Option<String>,

        /// Semantic depth
        #[arg(long)]
        ck: Option<usize>,

        /// Keyword depth
        #[arg(long)]
        bk: Option<usize>,
    },

    /// Keyword (full-text) search only
    Keyword {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        k: usize,
    },

    /// Semantic (vector) search only
    Semantic {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "5")]
        k: usize,
    },

    /// Show index statistics
    Stats,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(if e.is_input_error() { 2 } else { 1 });
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::load_or_default(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Index { root, reset } => index(&config, &root, reset).await,
        Commands::Ask {
            question,
            k,
            before,
        } => {
            let cutoff = DateCutoff::parse_optional(before.as_deref())?;
            let stores = Stores::open(&config)?;
            let mut router = QueryRouter::with_config(
                stores.engine(&config),
                generator(&config)?,
                &config.search,
                &config.router,
            );
            if let Some(k) = k {
                if k == 0 {
                    return Err(RagError::invalid_argument("-k must be at least 1"));
                }
                router = router.with_context_limit(k);
            }

            let ctx = QueryContext::new("router");
            let response = router.route(&ctx, &question.join(" "), cutoff.as_ref()).await?;
            print_response(&response, json)
        }
        Commands::Agent {
            question,
            steps,
            before,
        } => {
            let cutoff = DateCutoff::parse_optional(before.as_deref())?;
            let stores = Stores::open(&config)?;
            let mut agent = ToolAgentLoop::with_config(
                stores.engine(&config),
                generator(&config)?,
                &config.agent,
                &config.search,
                &config.router,
            );
            if let Some(steps) = steps {
                agent = agent.with_max_steps(steps);
            }

            let ctx = QueryContext::new("agent");
            let response = agent.run(&ctx, &question.join(" "), cutoff.as_ref()).await?;
            print_response(&response, json)
        }
        Commands::Search {
            query,
            k,
            before,
            ck,
            bk,
        } => {
            let cutoff = DateCutoff::parse_optional(before.as_deref())?;
            let stores = Stores::open(&config)?;
            let engine = stores.engine(&config);

            let ctx = QueryContext::new("search");
            let mut hits = engine
                .retrieve(
                    &ctx,
                    &query,
                    cutoff.as_ref(),
                    bk.unwrap_or(config.search.keyword_depth),
                    ck.unwrap_or(config.search.semantic_depth),
                )
                .await?;
            hits.truncate(k);
            print_fused(&hits, json)
        }
        Commands::Keyword { query, k } => {
            let stores = Stores::open(&config)?;
            let ctx = QueryContext::new("keyword");
            let hits = stores
                .engine(&config)
                .keyword_search(&ctx, &query, k, None)
                .await?;
            print_hits(&hits, json)
        }
        Commands::Semantic { query, k } => {
            let stores = Stores::open(&config)?;
            let ctx = QueryContext::new("semantic");
            let hits = stores
                .engine(&config)
                .semantic_search(&ctx, &query, k, None)
                .await?;
            print_hits(&hits, json)
        }
        Commands::Stats => {
            let stores = Stores::open(&config)?;
            let keyword = stores.keyword.stats().await?;
            let semantic = stores.vector.stats().await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "keyword": keyword,
                        "semantic": semantic,
                    }))?
                );
            } else {
                println!("Keyword index:  {} chunks from {} files", keyword.chunks, keyword.sources);
                println!("Semantic index: {} chunks from {} files", semantic.chunks, semantic.sources);
            }
            Ok(())
        }
    }
}

/// Both on-disk indexes.
struct Stores {
    keyword: Arc<KeywordStore>,
    vector: Arc<VectorStore>,
}

impl Stores {
    fn open(config: &RagConfig) -> Result<Self> {
        let storage = &config.storage;
        let keyword = KeywordStore::open(&storage.keyword_db, storage.busy_timeout_ms)?;
        let embedder = embedder_from_config(&config.embedding)?;
        let vector = VectorStore::open(&storage.vector_db, embedder, storage.busy_timeout_ms)?
            .with_batch_size(config.embedding.batch_size);
        Ok(Self {
            keyword: Arc::new(keyword),
            vector: Arc::new(vector),
        })
    }

    fn engine(&self, config: &RagConfig) -> Arc<RetrievalFusionEngine> {
        Arc::new(
            RetrievalFusionEngine::new(
                self.keyword.clone(),
                self.keyword.clone(),
                self.vector.clone(),
            )
            .with_rrf_k(config.search.rrf_k),
        )
    }
}

fn generator(config: &RagConfig) -> Result<Arc<dyn Generator>> {
    Ok(Arc::new(OllamaGenerator::new(&config.generation)?))
}

async fn index(config: &RagConfig, root: &Path, reset: bool) -> Result<()> {
    let docs = load_documents(root)?;
    if docs.is_empty() {
        println!("No .txt or .md files found under: {}", root.display());
        return Ok(());
    }

    let indexer = Indexer::new(RecursiveChunker::new(), config.chunk_config());
    let chunks = indexer.split_documents(&docs)?;
    println!("Loaded {} file(s), {} chunk(s)", docs.len(), chunks.len());

    let stores = Stores::open(config)?;
    let indexes: [&dyn ChunkIndex; 2] = [stores.keyword.as_ref(), stores.vector.as_ref()];

    if reset {
        for store in indexes {
            store.reset().await?;
            info!(index = store.name(), "reset");
        }
    }

    for store in indexes {
        let report = indexer.index_into(&chunks, store).await?;
        println!(
            "  {:<8} added {}, skipped {} existing",
            report.index, report.added, report.skipped
        );
    }

    Ok(())
}

fn print_response(response: &Response, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    let rule = "=".repeat(100);
    println!("\n{}", rule);
    match response {
        Response::Files { files, .. } => {
            if files.is_empty() {
                println!("No results.");
            } else {
                println!("FILES (most relevant first):\n");
                for (i, file) in files.iter().enumerate() {
                    println!(
                        "{}. {}  (page≈{}, score={:.4}, keyword {})",
                        i + 1,
                        file.path,
                        file.top_page,
                        file.fused_score,
                        if file.has_keyword_hit { "✓" } else { "-" }
                    );
                    println!("   e.g., “{}”", file.preview);
                }
            }
        }
        Response::Answer {
            answer_text,
            citations,
            ..
        } => {
            println!("ANSWER:\n");
            println!("{}", answer_text.trim());
            if !citations.is_empty() {
                println!("\nSOURCES:");
                for (i, c) in citations.iter().enumerate() {
                    println!("[{}] {} | p{} | {}", i + 1, c.path, c.page, c.chunk_id);
                }
            }
        }
    }
    println!("{}\n", rule);
    Ok(())
}

fn print_fused(hits: &[FusedResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let rank = |r: Option<usize>| r.map_or_else(|| "-".to_string(), |r| r.to_string());
        println!(
            "{}. {} p{}  rrf={:.4} semantic={} keyword={}",
            i + 1,
            hit.source,
            hit.page,
            hit.rrf_score,
            rank(hit.semantic_rank),
            rank(hit.keyword_rank)
        );
        println!("   {}", rag_agent::preview(&hit.text));
    }
    Ok(())
}

fn print_hits(hits: &[EngineHit], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        match hit.native_score {
            Some(score) => println!("{}. {} p{}  score={:.4}", i + 1, hit.source, hit.page, score),
            None => println!("{}. {} p{}", i + 1, hit.source, hit.page),
        }
        println!("   {}", rag_agent::preview(&hit.text));
    }
    Ok(())
}
