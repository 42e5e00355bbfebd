use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use directories::BaseDirs;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kegg_graph::annotation::AnnotationTable;
use kegg_graph::config::{ConfigLoader, ConfigOverrides};
use kegg_graph::domain::EntrySpecifier;
use kegg_graph::entity::EntityRecord;
use kegg_graph::error::GraphError;
use kegg_graph::kegg::{KeggClient, KeggHttpClient};
use kegg_graph::output::{JsonOutput, OutputMode, TextOutput};
use kegg_graph::pipeline::{CrawlOptions, Crawler};
use kegg_graph::progress::TracingSink;
use kegg_graph::store::GraphStore;

#[derive(Parser)]
#[command(name = "kegg-graph")]
#[command(about = "Build a local SQLite graph of KEGG orthologs, reactions, compounds, pathways and modules")]
#[command(version)]
struct Cli {
    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Crawl KEGG starting from the orthologs in an annotation table")]
    Crawl(CrawlArgs),
    #[command(about = "Fetch and parse a single entry, e.g. rn:R00001")]
    Get(GetArgs),
}

#[derive(Args)]
struct CrawlArgs {
    /// Annotation table (TSV, optionally gzip-compressed).
    #[arg(long)]
    input_tsv: PathBuf,

    /// SQLite database to create or extend.
    #[arg(long)]
    output_db: Option<Utf8PathBuf>,

    #[arg(long)]
    config: Option<String>,

    /// Concurrent requests per chunk.
    #[arg(long)]
    threads: Option<usize>,

    /// Ids fetched and committed together.
    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Reaction fetch passes before compounds are fetched.
    #[arg(long)]
    reaction_passes: Option<usize>,

    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct GetArgs {
    specifier: String,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    base_url: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<GraphError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GraphError) -> u8 {
    match error {
        GraphError::ConfigRead(_)
        | GraphError::ConfigParse(_)
        | GraphError::InvalidConfig(_)
        | GraphError::InvalidInput(_)
        | GraphError::InvalidId(_)
        | GraphError::InvalidKind(_) => 2,
        GraphError::Persistence { .. } | GraphError::Sqlite(_) => 3,
        GraphError::Cancelled => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Commands::Crawl(args) => run_crawl(args, output_mode),
        Commands::Get(args) => run_get(args, output_mode),
    }
}

fn run_crawl(args: CrawlArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            base_url: args.base_url,
            threads: args.threads,
            chunk_size: args.chunk_size,
            timeout_secs: args.timeout_secs,
            reaction_passes: args.reaction_passes,
        },
    )?;

    let db_path = match args.output_db {
        Some(path) => path,
        None => default_db_path()?,
    };
    tracing::info!(db = %db_path, input = %args.input_tsv.display(), "starting crawl");

    let seeds = AnnotationTable::open(&args.input_tsv, &resolved.columns)?;
    let store = GraphStore::open(&db_path)?;
    let client = KeggHttpClient::new(&resolved.base_url, resolved.timeout)?;
    let mut crawler = Crawler::new(
        store,
        client,
        CrawlOptions {
            fetch: resolved.fetch,
            reaction_passes: resolved.reaction_passes,
        },
    );

    let summary = crawler.run(&seeds, &TracingSink)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&summary).into_diagnostic()?,
    }
    Ok(())
}

fn run_get(args: GetArgs, output_mode: OutputMode) -> miette::Result<()> {
    let specifier: EntrySpecifier = args.specifier.parse()?;
    let resolved = ConfigLoader::resolve(
        args.config.as_deref(),
        ConfigOverrides {
            base_url: args.base_url,
            ..ConfigOverrides::default()
        },
    )?;
    let client = KeggHttpClient::new(&resolved.base_url, resolved.timeout)?;
    let flat = client.fetch(specifier.kind, &specifier.id)?;
    let record = EntityRecord::from_record(specifier.kind, &specifier.id, &flat);

    match output_mode {
        OutputMode::Json => JsonOutput::print_json(&record).into_diagnostic()?,
        OutputMode::Text => print!("{}", flat.to_text()),
    }
    Ok(())
}

fn default_db_path() -> Result<Utf8PathBuf, GraphError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kegg-graph")).ok()
        })
        .map(|dir| dir.join("kegg.db"))
        .ok_or_else(|| GraphError::Filesystem("unable to resolve cache directory".to_string()))
}
