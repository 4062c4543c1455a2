use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use codelens_core::bootstrap::Components;
use codelens_core::config::{Config, resolve_config_path};
use codelens_core::project::ProjectSnapshot;

mod commands;

#[derive(Parser)]
#[command(name = "codelens", version)]
#[command(about = "Index a source tree and ask review questions scoped to a file and its imports")]
struct Cli {
    /// Config file (default: $CODELENS_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project id; derived from the root path when omitted
    #[arg(long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the files that would be indexed
    Files { root: PathBuf },

    /// Print resolved import edges
    Deps { root: PathBuf },

    /// Chunk, embed and store a project, or a single file with --path
    Index {
        root: PathBuf,
        /// Re-embed only this relative path
        #[arg(long)]
        path: Option<String>,
    },

    /// Retrieve the most relevant fragments for a question
    Ask {
        root: PathBuf,
        query: String,
        /// Anchor file; scopes retrieval to it and its imports
        #[arg(long)]
        path: Option<String>,
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Report symbols that nothing outside their own file mentions
    Scan { root: PathBuf },

    /// Generate review comments (file scope) or findings (--repo)
    Review {
        root: PathBuf,
        query: String,
        #[arg(long, conflicts_with = "repo")]
        path: Option<String>,
        /// Review the whole repository
        #[arg(long)]
        repo: bool,
        /// Fragments to retrieve (default 5, or 20 with --repo)
        #[arg(short, long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let components = Components::from_config(config);

    let discover = |root: &PathBuf| {
        ProjectSnapshot::discover(root, cli.project.as_deref(), &components.config.scan)
    };

    match &cli.command {
        Command::Files { root } => commands::files(&discover(root)?),
        Command::Deps { root } => commands::deps(&discover(root)?),
        Command::Index { root, path } => {
            commands::index(&components, &discover(root)?, path.as_deref()).await
        }
        Command::Ask {
            root,
            query,
            path,
            k,
        } => commands::ask(&components, &discover(root)?, query, *k, path.as_deref()).await,
        Command::Scan { root } => commands::scan(&discover(root)?).await,
        Command::Review {
            root,
            query,
            path,
            repo,
            k,
        } => {
            let snapshot = discover(root)?;
            if *repo {
                commands::review_repo(&components, &snapshot, query, k.unwrap_or(20)).await
            } else {
                commands::review_file(&components, &snapshot, query, k.unwrap_or(5), path.as_deref())
                    .await
            }
        }
    }
}

/// Logs go to stderr so JSON on stdout stays machine-readable.
fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
