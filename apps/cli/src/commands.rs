//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use orderpack_core::MergedArtifact;
use orderpack_shared::{
    CompositionOptions, Order, PipelineConfig, ProgressReporter, config_file_path, init_config,
    load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// orderpack — compile workshop orders into printable packets.
#[derive(Parser)]
#[command(
    name = "orderpack",
    version,
    about = "Compile a workshop order and its attached documents into one printable PDF packet.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate the merged packet for an order.
    Generate {
        /// Path to the order record (JSON, as exported by the front end).
        order: PathBuf,

        /// Output file (defaults to <output_dir>/<order-number>.pdf).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Front-end origin for the scan code URL (overrides config).
        #[arg(long)]
        origin: Option<String>,

        /// Document store base URL (overrides config).
        #[arg(long)]
        store: Option<String>,

        /// Skip the attached documents; emit the cover only.
        #[arg(long)]
        no_documents: bool,

        /// Omit the components section from the cover.
        #[arg(long)]
        no_components: bool,

        /// Omit the scan code from the cover.
        #[arg(long)]
        no_code: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug,hyper=info,reqwest=info",
        _ => "trace,hyper=info,reqwest=info",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            order,
            out,
            origin,
            store,
            no_documents,
            no_components,
            no_code,
        } => {
            cmd_generate(
                &order,
                out,
                origin.as_deref(),
                store.as_deref(),
                CompositionOptions {
                    include_documents: !no_documents,
                    include_components: !no_components,
                    include_code: !no_code,
                },
            )
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    order_path: &PathBuf,
    out: Option<PathBuf>,
    origin: Option<&str>,
    store: Option<&str>,
    options: CompositionOptions,
) -> Result<()> {
    let config = load_config()?;
    let mut pipeline_config =
        PipelineConfig::from_app_config(&config, env!("CARGO_PKG_VERSION"))?;

    if let Some(origin) = origin {
        pipeline_config.origin = origin.to_string();
    }
    if let Some(store) = store {
        pipeline_config.store_url =
            Url::parse(store).map_err(|e| eyre!("invalid store URL '{store}': {e}"))?;
    }

    let json = std::fs::read_to_string(order_path)
        .map_err(|e| eyre!("cannot read order record '{}': {e}", order_path.display()))?;
    let order: Order = serde_json::from_str(&json)
        .map_err(|e| eyre!("invalid order record '{}': {e}", order_path.display()))?;

    let out_path = match out {
        Some(p) => p,
        None => PathBuf::from(&config.defaults.output_dir)
            .join(format!("{}.pdf", file_stem_for(order.display_number()))),
    };

    info!(
        order_id = %order.id,
        order_number = %order.display_number(),
        documents = order.documents.len(),
        out = %out_path.display(),
        "generating packet"
    );

    let reporter = CliProgress::new();
    let artifact =
        orderpack_core::generate(&order, &options, &pipeline_config, &reporter).await?;
    reporter.finish();

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| eyre!("cannot create '{}': {e}", parent.display()))?;
        }
    }
    std::fs::write(&out_path, &artifact.bytes)
        .map_err(|e| eyre!("cannot write '{}': {e}", out_path.display()))?;

    print_summary(&order, &artifact, &out_path);
    Ok(())
}

fn print_summary(order: &Order, artifact: &MergedArtifact, out_path: &std::path::Path) {
    let merged = artifact.documents.len() - artifact.failed_documents();

    println!();
    println!("  Packet generated!");
    println!("  Order:     {}", order.display_number());
    println!(
        "  Pages:     {} ({} cover)",
        artifact.page_count, artifact.cover_pages
    );
    println!(
        "  Documents: {merged} merged, {} replaced by error pages",
        artifact.failed_documents()
    );
    for report in artifact.documents.iter().filter(|r| !r.is_merged()) {
        if let orderpack_core::DocumentOutcome::Failed { error } = &report.outcome {
            println!("    ! {}: {error}", report.name);
        }
    }
    println!("  SHA-256:   {}", artifact.sha256);
    println!("  Path:      {}", out_path.display());
    println!("  Time:      {:.1}s", artifact.elapsed.as_secs_f64());
    println!();
}

/// Output file stem from an order number; path separators and other
/// filesystem-hostile characters become dashes.
fn file_stem_for(number: &str) -> String {
    number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_processed(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Merging [{current}/{total}] {name}"));
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let path = config_file_path()?;
    println!("# resolved from {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
