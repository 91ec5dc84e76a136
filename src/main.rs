//! # Docmirror CLI (`docmirror`)
//!
//! Keeps a local mirror of a documentation site, indexes it into SQLite
//! FTS5, and answers queries from the command line or over HTTP/MCP.
//!
//! ## Usage
//!
//! ```bash
//! docmirror --config ./config/docmirror.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docmirror init` | Create the database, fetch the mirror, build the index if empty |
//! | `docmirror sync` | Update the mirror and rebuild the index |
//! | `docmirror rebuild` | Rebuild the index from the mirror as it is |
//! | `docmirror search "<query>"` | Ranked full-text search |
//! | `docmirror class <token>` | Documents using an exact class token |
//! | `docmirror sections` | List sections |
//! | `docmirror section <name>` | Documents in a section |
//! | `docmirror doc <slug>` | Print a whole document |
//! | `docmirror examples "<query>"` | Code samples for a query |
//! | `docmirror variant <name>` | Documentation about a variant |
//! | `docmirror list` | Every indexed document |
//! | `docmirror classes` | Class token to document mapping |
//! | `docmirror stats` | Index statistics |
//! | `docmirror serve` | Start the HTTP + MCP server |
//! | `docmirror completions <shell>` | Print shell completions |

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docmirror::config::{self, Config};
use docmirror::harness::DocsHarness;
use docmirror::{server, stats};

/// Environment variable holding a tracing filter; wins over the flags.
const LOG_ENV: &str = "DOCMIRROR_LOG";

/// Docmirror: a searchable local mirror of a documentation site.
#[derive(Parser)]
#[command(
    name = "docmirror",
    about = "Mirror, index and search a documentation site",
    version
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docmirror.toml")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database, make the mirror ready, and build the index if it is empty.
    ///
    /// Idempotent.
    Init,

    /// Update the mirror from its remote, then rebuild the whole index.
    Sync,

    /// Rebuild the whole index from the mirror without updating it.
    Rebuild,

    /// Ranked full-text search.
    Search {
        query: String,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        json: bool,
    },

    /// Documents that use an exact class token (case-sensitive).
    Class {
        token: String,
        #[arg(long)]
        json: bool,
    },

    /// List all sections.
    Sections {
        #[arg(long)]
        json: bool,
    },

    /// Documents in one section, ordered by title.
    Section {
        name: String,
        #[arg(long)]
        json: bool,
    },

    /// Print a whole document by slug (file name without extension).
    Doc {
        slug: String,
        #[arg(long)]
        json: bool,
    },

    /// Code samples from the documents best matching a query.
    Examples {
        query: String,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        json: bool,
    },

    /// Documentation about a variant such as `hover` or `dark`.
    Variant {
        name: String,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        json: bool,
    },

    /// Every indexed document, ordered by section then title.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Every class token with the documents that use it.
    Classes {
        #[arg(long)]
        json: bool,
    },

    /// Index statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server (`/tools/*`) with the MCP endpoint at `/mcp`.
    ///
    /// Builds the index first when the store is empty.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "docmirror", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let cfg: Arc<Config> = Arc::new(config::load_config(&cli.config)?);

    if let Commands::Init = cli.command {
        let harness = DocsHarness::open(cfg.clone()).await?;
        harness.initialize().await?;
        let count = harness.store().count().await?;
        println!("Database initialized: {} ({} documents)", cfg.db.path.display(), count);
        return Ok(());
    }

    let harness = DocsHarness::open(cfg.clone()).await?;
    let search = harness.search();

    match cli.command {
        Commands::Init | Commands::Completions { .. } => {}
        Commands::Sync => {
            let outcome = harness.refresh().await;
            if !outcome.success {
                bail!("{}", outcome.message);
            }
            println!("{}", outcome.message);
        }
        Commands::Rebuild => {
            let report = harness.rebuild_index().await?;
            if !report.replaced {
                bail!(
                    "No documents could be parsed ({} skipped); previous index kept",
                    report.skipped
                );
            }
            println!("Indexed {} documents ({} skipped)", report.indexed, report.skipped);
        }
        Commands::Search { query, limit, json } => {
            let hits = search.full_text_search(&query, limit).await?;
            if json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.2}] {} ({})", i + 1, hit.score, hit.title, hit.section);
                println!("   {}", hit.url);
                println!("   {}", hit.excerpt.replace('\n', " "));
                println!();
            }
        }
        Commands::Class { token, json } => {
            let hits = search.lookup_by_identifier(&token).await?;
            if json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No documents use '{}'.", token);
            }
            for hit in &hits {
                println!("{} ({})  {}", hit.title, hit.section, hit.url);
            }
        }
        Commands::Sections { json } => {
            let sections = search.list_sections().await?;
            if json {
                return print_json(&sections);
            }
            for section in &sections {
                println!("{}", section);
            }
        }
        Commands::Section { name, json } => {
            let docs = search.list_by_section(&name).await?;
            if json {
                return print_json(&docs);
            }
            if docs.is_empty() {
                println!("No documents in section '{}'.", name);
            }
            for doc in &docs {
                println!("{}  {}", doc.title, doc.url);
            }
        }
        Commands::Doc { slug, json } => {
            let Some(doc) = search.get_by_slug(&slug).await? else {
                bail!("No documentation found for slug: {}", slug);
            };
            if json {
                return print_json(&doc);
            }
            println!("{}", doc.title);
            println!("{}", "=".repeat(doc.title.chars().count().max(3)));
            println!("section: {}", doc.section);
            println!("url:     {}", doc.url);
            println!("path:    {}", doc.path);
            if !doc.description.is_empty() {
                println!();
                println!("{}", doc.description);
            }
            println!();
            println!("{}", doc.body);
        }
        Commands::Examples { query, limit, json } => {
            let hits = search.get_code_samples(&query, limit).await?;
            if json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No code examples.");
            }
            for hit in &hits {
                println!("# {} ({})  {}", hit.title, hit.section, hit.url);
                for sample in &hit.code_samples {
                    println!();
                    println!("{}", sample);
                }
                println!();
            }
        }
        Commands::Variant { name, limit, json } => {
            let hits = search.search_variant(&name, limit).await?;
            if json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No documentation found for variant '{}'.", name);
            }
            for (i, v) in hits.iter().enumerate() {
                println!("{}. [{:.2}] {} ({})", i + 1, v.hit.score, v.hit.title, v.hit.section);
                println!("   {}", v.hit.url);
            }
        }
        Commands::List { json } => {
            let docs = search.list_documents().await?;
            if json {
                return print_json(&docs);
            }
            let mut current = None;
            for doc in &docs {
                if current != Some(&doc.section) {
                    println!("{}", doc.section);
                    current = Some(&doc.section);
                }
                println!("  {}  {}", doc.title, doc.url);
            }
        }
        Commands::Classes { json } => {
            let mapping = search.identifier_mapping().await?;
            if json {
                return print_json(&mapping);
            }
            for (token, paths) in &mapping {
                println!("{}  ({})", token, paths.len());
            }
        }
        Commands::Stats { json } => {
            let stats = stats::collect_stats(harness.store(), &cfg.db.path).await?;
            if json {
                return print_json(&stats);
            }
            stats::print_stats(&stats, &cfg.db.path);
        }
        Commands::Serve => {
            harness.initialize().await?;
            server::run_server(Arc::new(harness)).await?;
        }
    }

    Ok(())
}
