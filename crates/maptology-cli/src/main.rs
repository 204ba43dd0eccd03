//! Maptology CLI
//!
//! Command-line front end for annotating a CSV dataset with BioPortal
//! ontology terms:
//! - `inspect`: column types and summaries of a dataset
//! - `catalog`: list (and filter) the ontologies available for restriction
//! - `search`: one-off term lookup
//! - `repl`: the interactive mapping session (also scriptable)

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use maptology_bioportal::{BioPortalClient, BioPortalConfig};
use maptology_core::{filter_catalog, Dataset, LookupQuery, SearchMode, TermLookup};

mod render;
mod repl;

const LOG_ENV: &str = "MAPTOLOGY_LOG";

#[derive(Parser)]
#[command(name = "maptology")]
#[command(
    author,
    version,
    about = "Maptology: map dataset columns and values to ontology terms"
)]
struct Cli {
    #[command(flatten)]
    bioportal: BioPortalArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the BIOPORTAL_* environment variables.
#[derive(Args, Debug, Clone, Default)]
struct BioPortalArgs {
    /// BioPortal API key (default: $BIOPORTAL_API_KEY).
    #[arg(long, global = true, value_name = "KEY")]
    api_key: Option<String>,

    /// BioPortal REST base URL (default: $BIOPORTAL_BASE_URL or https://data.bioontology.org).
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Request timeout in seconds; 0 disables (default: $BIOPORTAL_TIMEOUT_SECS or 30).
    #[arg(long, global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show column types and summaries of a CSV file.
    Inspect {
        /// Input CSV file
        csv: PathBuf,
        /// Show one column in detail (summary and value choices).
        #[arg(long)]
        column: Option<String>,
    },

    /// List the ontologies available on BioPortal.
    Catalog {
        /// Case-insensitive match on acronym or name.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Search BioPortal for terms.
    Search {
        /// Free-text query
        query: String,
        /// Restrict to this ontology acronym (repeatable, at most 10).
        #[arg(long = "ontology", value_name = "ACRONYM", required = true)]
        ontologies: Vec<String>,
        /// Use "search all": keep terms without a definition, larger page.
        #[arg(long)]
        all: bool,
    },

    /// Interactive mapping session.
    Repl {
        /// CSV file to open on startup.
        csv: Option<PathBuf>,
        /// Ontology to select on startup (repeatable).
        #[arg(long = "ontology", value_name = "ACRONYM")]
        ontologies: Vec<String>,
        /// Run a non-interactive REPL script (one command per line). Use `-` to read from stdin.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Run one REPL command (may be repeated).
        #[arg(short = 'c', long, value_name = "CMD")]
        cmd: Vec<String>,
        /// Continue executing script/commands after a failure (default is fail-fast).
        #[arg(long)]
        continue_on_error: bool,
        /// Do not echo commands while running a script / `--cmd`.
        #[arg(long)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inspect { csv, column } => cmd_inspect(&csv, column.as_deref()),
        Commands::Catalog { filter } => {
            let client = build_client(&cli.bioportal)?;
            cmd_catalog(&client, filter.as_deref())
        }
        Commands::Search {
            query,
            ontologies,
            all,
        } => {
            let client = build_client(&cli.bioportal)?;
            cmd_search(&client, &query, &ontologies, all)
        }
        Commands::Repl {
            csv,
            ontologies,
            script,
            cmd,
            continue_on_error,
            quiet,
        } => {
            let client = build_client(&cli.bioportal)?;
            let mut state = repl::ReplState::new(Box::new(client));
            state.preselect(&ontologies, csv.as_deref())?;
            if script.is_some() || !cmd.is_empty() {
                repl::cmd_repl_script(&mut state, script.as_ref(), &cmd, continue_on_error, quiet)
            } else {
                repl::cmd_repl(&mut state)
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_client(args: &BioPortalArgs) -> Result<BioPortalClient> {
    let mut config = BioPortalConfig::from_env()?;
    if let Some(key) = &args.api_key {
        config = config.with_api_key(Some(key.clone()));
    }
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url)?;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = (secs > 0).then(|| std::time::Duration::from_secs(secs));
    }
    if !config.has_api_key() {
        tracing::warn!("no BioPortal API key configured; lookups will be skipped");
    }
    Ok(BioPortalClient::new(config)?)
}

// ============================================================================
// One-shot commands
// ============================================================================

fn cmd_inspect(path: &Path, column: Option<&str>) -> Result<()> {
    let dataset =
        Dataset::from_path(path).with_context(|| format!("failed to load {}", path.display()))?;

    println!(
        "{} {} ({} rows, {} columns)",
        "dataset".green().bold(),
        path.display(),
        dataset.row_count(),
        dataset.columns().len()
    );

    match column {
        Some(name) => {
            let summary = dataset.summary(name)?;
            println!(
                "{} ({})",
                name.bold(),
                dataset.data_type(name)?.to_string().cyan()
            );
            println!("  {}", render::summary_line(&summary));
            let choices = dataset.value_choices(name)?;
            if !choices.is_empty() {
                println!("  values: {}", choices.join(", "));
            }
        }
        None => {
            for col in dataset.columns() {
                let summary = dataset.summary(&col.name)?;
                println!(
                    "  {:<24} {:<12} {}",
                    col.name,
                    col.data_type.to_string().cyan(),
                    render::summary_line(&summary)
                );
            }
        }
    }
    Ok(())
}

fn cmd_catalog(client: &BioPortalClient, filter: Option<&str>) -> Result<()> {
    let catalog = client
        .catalog()
        .map_err(|e| anyhow!("failed to fetch ontology catalog: {e}"))?;
    let shown = filter_catalog(&catalog, filter.unwrap_or_default());
    for info in &shown {
        println!("{}", render::ontology_line(info));
    }
    println!("{} of {} ontologies", shown.len(), catalog.len());
    Ok(())
}

fn cmd_search(
    client: &BioPortalClient,
    query: &str,
    ontologies: &[String],
    all: bool,
) -> Result<()> {
    if ontologies.len() > maptology_core::ONTOLOGY_SELECTION_LIMIT {
        return Err(anyhow!(
            "at most {} ontologies can be searched at once",
            maptology_core::ONTOLOGY_SELECTION_LIMIT
        ));
    }
    let mode = if all { SearchMode::All } else { SearchMode::Auto };
    let terms = client
        .search(&LookupQuery::new(query, ontologies, mode))
        .map_err(|e| anyhow!("search failed: {e}"))?;
    if terms.is_empty() {
        println!("{} no results found for '{query}'", "warning:".yellow().bold());
        return Ok(());
    }
    for (idx, term) in terms.iter().enumerate() {
        println!("{}", render::term_line(idx + 1, term, None));
    }
    Ok(())
}
