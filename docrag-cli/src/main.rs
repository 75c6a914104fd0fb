//! `docrag` command-line front end.
//!
//! Reads service endpoints from the environment (and `.env.local` / `.env`),
//! then runs a single pipeline operation and prints its result as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use docrag::{
    ConvexDocumentStore, EmbeddingProvider, GeminiEmbeddingProvider, GeminiGenerator,
    GenerativeModel, IndexWriter, OpenAIEmbeddingProvider, PointIdStrategy, QdrantVectorIndex,
    RagConfig, RagError, RagPipeline, ServiceConfig, VectorIndex,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docrag", version, about = "Ingest documents and answer questions over them")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector collection to read and write
    #[arg(long, global = true, env = "DOCRAG_COLLECTION", default_value = "rag_collection")]
    collection: String,

    /// Embedding backend
    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Gemini)]
    embedder: EmbedderKind,

    /// Tag every chunk with this source instead of the document id
    #[arg(long, global = true)]
    source_label: Option<String>,

    /// Derive point ids from chunk position only (overwrites across documents)
    #[arg(long, global = true, default_value_t = false)]
    positional_ids: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, chunk, embed, and index documents by id
    Ingest {
        /// Document ids in the document store
        #[arg(required = true)]
        document_ids: Vec<String>,
    },
    /// Answer a question from the indexed documents
    Ask {
        /// The question
        query: String,

        /// Number of chunks used as context
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Show the chunks most similar to a query without generating an answer
    Search {
        query: String,

        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Drop the collection and all of its points
    Reset,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    Gemini,
    Openai,
}

/// Stand-in model for runs without `GEMINI_API_KEY`; only `ask` needs generation.
/// `ingest` and `search` still need a key for the selected embedder.
struct UnconfiguredModel;

#[async_trait]
impl GenerativeModel for UnconfiguredModel {
    async fn generate(&self, _prompt: &str) -> docrag::Result<String> {
        Err(RagError::Config("GEMINI_API_KEY not found in environment variables".into()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn rag_config(cli: &Cli, top_k: usize) -> Result<RagConfig> {
    let mut config = RagConfig::builder().collection(&cli.collection).top_k(top_k);
    if let Some(label) = &cli.source_label {
        config = config.source_label(label);
    }
    if cli.positional_ids {
        config = config.point_ids(PointIdStrategy::Positional);
    }
    Ok(config.build()?)
}

fn vector_index(services: &ServiceConfig) -> Result<Arc<QdrantVectorIndex>> {
    let index = QdrantVectorIndex::new(
        &services.qdrant_url,
        Some(services.qdrant_api_key.clone()),
        services.index_timeout,
    )?;
    Ok(Arc::new(index))
}

fn build_pipeline(cli: &Cli, services: &ServiceConfig, top_k: usize) -> Result<RagPipeline> {
    let embedding_provider: Arc<dyn EmbeddingProvider> = match cli.embedder {
        EmbedderKind::Gemini => {
            Arc::new(GeminiEmbeddingProvider::new(services.require_gemini_key()?)?)
        }
        EmbedderKind::Openai => {
            Arc::new(OpenAIEmbeddingProvider::new(services.require_openai_key()?)?)
        }
    };

    let generative_model: Arc<dyn GenerativeModel> = match &services.gemini_api_key {
        Some(key) => Arc::new(GeminiGenerator::new(key)?),
        None => Arc::new(UnconfiguredModel),
    };

    Ok(RagPipeline::builder()
        .config(rag_config(cli, top_k)?)
        .document_store(Arc::new(ConvexDocumentStore::new(&services.convex_url)?))
        .embedding_provider(embedding_provider)
        .vector_index(vector_index(services)?)
        .generative_model(generative_model)
        .build()?)
}

/// Drop the configured collection. Needs no embedder or model credentials.
async fn reset(index: Arc<dyn VectorIndex>, config: &RagConfig) -> Result<serde_json::Value> {
    let deleted = IndexWriter::from_config(index, config).clear_collection().await?;
    Ok(serde_json::json!({
        "status": "success",
        "collection": config.collection,
        "deleted": deleted,
    }))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let services = ServiceConfig::from_env().context("loading service configuration")?;
    info!(collection = %cli.collection, embedder = ?cli.embedder, "starting docrag");

    match &cli.command {
        Command::Ingest { document_ids } => {
            let pipeline = build_pipeline(&cli, &services, 3)?;
            for document_id in document_ids {
                let report = pipeline
                    .ingest(document_id)
                    .await
                    .with_context(|| format!("failed to ingest '{document_id}'"))?;
                print_json(&report)?;
            }
        }
        Command::Ask { query, top_k } => {
            let pipeline = build_pipeline(&cli, &services, *top_k)?;
            print_json(&pipeline.answer(query).await?)?;
        }
        Command::Search { query, top_k } => {
            let pipeline = build_pipeline(&cli, &services, *top_k)?;
            print_json(&pipeline.search(query, *top_k).await?)?;
        }
        Command::Reset => {
            let report = reset(vector_index(&services)?, &rag_config(&cli, 3)?).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use docrag::{Distance, InMemoryVectorIndex};

    use super::*;

    #[test]
    fn reset_parses_without_embedder_flags() {
        let cli = Cli::try_parse_from(["docrag", "reset", "--collection", "scratch"]).unwrap();
        assert!(matches!(cli.command, Command::Reset));
        assert_eq!(rag_config(&cli, 3).unwrap().collection, "scratch");
    }

    #[tokio::test]
    async fn reset_only_needs_the_index() {
        let index = Arc::new(InMemoryVectorIndex::new());
        index.create_collection("scratch", 4, Distance::Cosine).await.unwrap();
        let config = RagConfig::builder().collection("scratch").build().unwrap();

        let report = reset(index.clone(), &config).await.unwrap();
        assert_eq!(report["deleted"], true);
        assert!(index.collection_info("scratch").await.unwrap().is_none());

        let report = reset(index, &config).await.unwrap();
        assert_eq!(report["deleted"], false);
    }
}
