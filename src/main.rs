use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oxi::engine::{EngineConfig, SearchEngine};
use oxi::ontology::MemoryOntology;
use oxi::progress::BarSink;
use oxi::scheduler::Checkpoint;
use oxi::output;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "oxi")]
#[command(about = "Incremental text search over ontology snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Search query (when no subcommand is given)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Ontology snapshot to search
    #[arg(short, long, default_value = "ontology.json")]
    ontology: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or rebuild the persistent index for a snapshot
    Build {
        /// Ontology snapshot (JSON)
        ontology: PathBuf,

        /// Index directory (defaults to the user cache dir)
        #[arg(short, long)]
        index_dir: Option<PathBuf>,
    },
    /// Search a snapshot
    Search {
        /// Query string
        query: String,

        /// Ontology snapshot (JSON)
        #[arg(short, long, default_value = "ontology.json")]
        ontology: PathBuf,

        /// Index directory (defaults to the user cache dir)
        #[arg(short, long)]
        index_dir: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Show index statistics for a snapshot
    Stats {
        /// Ontology snapshot (JSON)
        ontology: PathBuf,

        /// Index directory (defaults to the user cache dir)
        #[arg(short, long)]
        index_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build {
            ontology,
            index_dir,
        }) => {
            let mut engine = open_engine(&ontology, index_dir, true)?;
            println!("indexed {} documents", engine.doc_count());
            engine.dispose()?;
        }
        Some(Commands::Search {
            query,
            ontology,
            index_dir,
            no_color,
        }) => {
            run_search(&ontology, index_dir, &query, !no_color)?;
        }
        Some(Commands::Stats {
            ontology,
            index_dir,
        }) => {
            let mut engine = open_engine(&ontology, index_dir, false)?;
            output::print_stats(&engine.stats())?;
            engine.dispose()?;
        }
        None => {
            if cli.query.is_empty() {
                anyhow::bail!("no query given; try `oxi search <query>`");
            }
            let query = cli.query.join(" ");
            run_search(&cli.ontology, None, &query, true)?;
        }
    }

    Ok(())
}

fn run_search(
    ontology: &PathBuf,
    index_dir: Option<PathBuf>,
    query: &str,
    color: bool,
) -> Result<()> {
    let mut engine = open_engine(ontology, index_dir, false)?;
    let results = engine.search(query)?;
    output::print_results(&results, color)?;
    engine.dispose()?;
    Ok(())
}

/// Open the engine for a snapshot, rebuilding when the index is empty or
/// a rebuild is forced.
fn open_engine(
    ontology: &PathBuf,
    index_dir: Option<PathBuf>,
    force_rebuild: bool,
) -> Result<SearchEngine> {
    let source = MemoryOntology::load(ontology)
        .with_context(|| format!("failed to load ontology {}", ontology.display()))?;

    let config = EngineConfig {
        index_dir: index_dir.or_else(default_index_dir),
        ..EngineConfig::default()
    };

    let mut engine = SearchEngine::open(Arc::new(source), config)?;
    if force_rebuild || engine.doc_count() == 0 {
        let mut bar = BarSink::new("indexing");
        engine.rebuild(&Checkpoint::unfenced(), &mut bar)?;
    }
    Ok(engine)
}

fn default_index_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("oxi"))
}
