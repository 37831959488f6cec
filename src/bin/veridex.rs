//! Veridex CLI — index fragments, search, and validate candidate steps.
//!
//! Usage:
//!   veridex index <fragments.jsonl> [--priority rubric] [--untrusted]
//!   veridex search <query> [--top-k 5] [--document notes.pdf]
//!   veridex validate <steps.jsonl> --query <question> [--mode strict]
//!   veridex stats | delete <document-id> | clear

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use veridex::{
    format_evidence, CandidateStep, Embedder, EngineConfig, EvidenceEngine, Fragment,
    JsonlAuditLog, Mode, PriorityTag, SearchFilter, SqliteIndex,
};

#[derive(Parser)]
#[command(
    name = "veridex",
    version,
    about = "Retrieval-and-validation engine for document-grounded QA"
)]
struct Cli {
    /// Path to the SQLite index database
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML engine configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to the JSONL audit log
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index fragments from a JSONL file
    Index {
        /// JSONL file, one fragment object per line
        file: PathBuf,
        /// Priority tag applied to fragments that do not carry their own
        #[arg(long, default_value = "normal")]
        priority: String,
        /// Mark fragments from this file as untrusted
        #[arg(long)]
        untrusted: bool,
    },
    /// Search the index
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Restrict to one source document
        #[arg(long)]
        document: Option<String>,
        /// Print results as citation-tagged evidence blocks
        #[arg(long)]
        evidence: bool,
    },
    /// Validate candidate steps against retrieved evidence
    Validate {
        /// JSONL file, one candidate step object per line
        steps: PathBuf,
        /// The question the steps answer; used to retrieve evidence
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "strict")]
        mode: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Print index statistics
    Stats,
    /// Remove all fragments of one document
    Delete {
        document_id: String,
    },
    /// Remove every indexed fragment
    Clear,
}

/// One line of an index input file. Priority and trust may be set per
/// fragment or fall back to the command-line flags.
#[derive(Deserialize)]
struct FragmentLine {
    id: Option<String>,
    document_id: String,
    text: String,
    #[serde(default)]
    page_number: u32,
    char_span: Option<(usize, usize)>,
    priority_tag: Option<PriorityTag>,
    trusted: Option<bool>,
}

fn default_data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("veridex");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::load(&path)
            .map_err(|e| format!("failed to load config {}: {}", path.display(), e)),
        None => Ok(EngineConfig::default()),
    }
}

#[cfg(feature = "embeddings")]
fn build_embedder(config: &EngineConfig) -> Result<Arc<dyn Embedder>, String> {
    veridex::FastEmbedEmbedder::from_name(&config.embedding_model)
        .map(|e| Arc::new(e) as Arc<dyn Embedder>)
        .map_err(|e| format!("failed to load embedding model: {}", e))
}

#[cfg(not(feature = "embeddings"))]
fn build_embedder(_config: &EngineConfig) -> Result<Arc<dyn Embedder>, String> {
    // Metadata-only commands (stats, delete, clear) still work; anything
    // that embeds fails with a pointer at the missing feature.
    struct Unavailable;
    impl Embedder for Unavailable {
        fn embed_batch(
            &self,
            _texts: &[&str],
        ) -> Result<Vec<Vec<f32>>, veridex::EmbeddingError> {
            Err(veridex::EmbeddingError::Model(
                "this build has no embedding model; rebuild with --features embeddings".into(),
            ))
        }
    }
    Ok(Arc::new(Unavailable))
}

fn open_engine(cli: &Cli) -> Result<EvidenceEngine, String> {
    let config = load_config(cli.config.clone())?;
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| default_data_dir().join("index.db"));
    let index = SqliteIndex::open(&db_path, config.dimensions)
        .map_err(|e| format!("failed to open index {}: {}", db_path.display(), e))?;
    let audit_path = cli
        .audit_log
        .clone()
        .unwrap_or_else(|| default_data_dir().join("audit.jsonl"));
    let audit = JsonlAuditLog::open(&audit_path)
        .map_err(|e| format!("failed to open audit log {}: {}", audit_path.display(), e))?;
    let embedder = build_embedder(&config)?;
    EvidenceEngine::new(config, Arc::new(index), embedder, Arc::new(audit))
        .map_err(|e| format!("invalid configuration: {}", e))
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>, String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut items = Vec::new();
    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| format!("read error in {}: {}", path.display(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {}", path.display(), line_no + 1, e))?;
        items.push(item);
    }
    Ok(items)
}

fn cmd_index(engine: &EvidenceEngine, file: &PathBuf, priority: &str, untrusted: bool) -> i32 {
    let default_priority: PriorityTag = match priority.parse() {
        Ok(tag) => tag,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let lines: Vec<FragmentLine> = match read_jsonl(file) {
        Ok(lines) => lines,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let fragments: Vec<Fragment> = lines
        .into_iter()
        .map(|line| {
            let span = line.char_span.unwrap_or((0, line.text.len()));
            let priority = line.priority_tag.unwrap_or(default_priority);
            let trusted = line.trusted.unwrap_or(!untrusted);
            match line.id {
                Some(id) => Fragment::with_id(
                    id,
                    line.document_id,
                    line.page_number,
                    span,
                    line.text,
                    priority,
                    trusted,
                ),
                None => Fragment::new(
                    line.document_id,
                    line.page_number,
                    span,
                    line.text,
                    priority,
                    trusted,
                ),
            }
        })
        .collect();

    match engine.index_fragments(&fragments) {
        Ok(written) => {
            println!("Indexed {} fragments from {}", written, file.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_search(
    engine: &EvidenceEngine,
    query: &str,
    top_k: Option<usize>,
    document: Option<String>,
    evidence: bool,
) -> i32 {
    let mut filter = SearchFilter::new();
    if let Some(document_id) = document {
        filter = filter.with_document(document_id);
    }
    let results = match engine.search(query, top_k, &filter) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if results.is_empty() {
        println!("No fragments found.");
        return 0;
    }
    if evidence {
        println!("{}", format_evidence(&results, 8000));
        return 0;
    }
    println!("{:<5}  {:>8}  {:>8}  {:<24}  TEXT", "RANK", "RAW", "BOOSTED", "DOCUMENT");
    for r in &results {
        let mut text = r.fragment.text.replace('\n', " ");
        if text.len() > 60 {
            text.truncate(57);
            text.push_str("...");
        }
        println!(
            "{:<5}  {:>8.4}  {:>8.4}  {:<24}  {}",
            r.rank, r.raw_similarity, r.boosted_score, r.fragment.document_id, text
        );
    }
    0
}

fn cmd_validate(
    engine: &EvidenceEngine,
    steps_path: &PathBuf,
    query: &str,
    mode: &str,
    top_k: Option<usize>,
) -> i32 {
    let mode: Mode = match mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let steps: Vec<CandidateStep> = match read_jsonl(steps_path) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let decision = match engine.validate_answer(query, &steps, mode, top_k) {
        Ok(decision) => decision,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    for result in &decision.results {
        let verdict = if result.supported { "SUPPORTED" } else { "UNSUPPORTED" };
        println!(
            "step {:>3}: {:<11}  method={:<8?}  confidence={:?}  sim={:.4}",
            result.step_index, verdict, result.method, result.confidence, result.similarity
        );
    }
    println!(
        "{}/{} steps supported",
        decision.supported_count(),
        decision.total_steps()
    );
    if decision.accepted {
        println!("ACCEPTED");
        0
    } else {
        // The refusal literal is the contract with downstream consumers
        println!("{}", decision.refusal_reason.as_deref().unwrap_or_default());
        1
    }
}

fn cmd_stats(engine: &EvidenceEngine) -> i32 {
    match engine.stats() {
        Ok(stats) => {
            println!("fragments: {}", stats.fragment_count);
            println!("documents: {}", stats.document_count);
            for (priority, count) in &stats.priority_counts {
                println!("  {:<10} {}", priority, count);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_delete(engine: &EvidenceEngine, document_id: &str) -> i32 {
    match engine.delete_document(document_id) {
        Ok(removed) => {
            println!("Removed {} fragments of '{}'", removed, document_id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_clear(engine: &EvidenceEngine) -> i32 {
    match engine.clear() {
        Ok(()) => {
            println!("Index cleared.");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = match open_engine(&cli) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let code = match &cli.command {
        Commands::Index {
            file,
            priority,
            untrusted,
        } => cmd_index(&engine, file, priority, *untrusted),
        Commands::Search {
            query,
            top_k,
            document,
            evidence,
        } => cmd_search(&engine, query, *top_k, document.clone(), *evidence),
        Commands::Validate {
            steps,
            query,
            mode,
            top_k,
        } => cmd_validate(&engine, steps, query, mode, *top_k),
        Commands::Stats => cmd_stats(&engine),
        Commands::Delete { document_id } => cmd_delete(&engine, document_id),
        Commands::Clear => cmd_clear(&engine),
    };
    std::process::exit(code);
}
