use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::source::MessageSource;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod analysis;
mod config;
mod debug_log;
mod fetch;
mod keywords;
mod ranking;
mod report;
mod roster;
mod source;
mod stats;
mod types;
mod utils;

#[derive(Parser)]
#[command(name = "chatwrapped")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (defaults to ~/.chatwrapped.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use comma-separated number formatting
    #[arg(long)]
    number_comma: bool,

    /// Use human-readable number formatting (k, m, b, t)
    #[arg(short = 'H', long)]
    number_human: bool,

    /// Locale for number formatting (en, de, fr, es, it, ja, ko, zh)
    #[arg(long)]
    locale: Option<String>,

    /// Number of decimal places for ratios and human-readable formatting
    #[arg(long)]
    decimal_places: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a saved chat export and write the summary tables
    Analyze(AnalyzeArgs),
    /// Download the chat's message history into an export file
    Fetch(FetchArgs),
    /// Output the analysis report as JSON
    Stats(StatsArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Chat export file (JSON array of messages)
    export: PathBuf,

    /// Directory to write the CSV tables into
    #[arg(long, short, default_value = "wrapped")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct FetchArgs {
    /// Where to save the export
    #[arg(long, short, default_value = "chat.json")]
    output: PathBuf,
}

#[derive(Args)]
struct StatsArgs {
    /// Chat export file (JSON array of messages)
    export: PathBuf,

    /// Pretty-print JSON instead of a single line
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (chat-name, group-id, access-token, message-request-limit,
        /// retry-attempts, num-messages-rank, exclude-assistant, number-comma,
        /// number-human, locale, decimal-places)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    debug_log::init();

    let cli = Cli::parse();

    // Config management works even when no valid config exists yet.
    let command = match cli.command {
        Commands::Config(args) => {
            if let Err(e) = handle_config_subcommand(cli.config.as_deref(), args) {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            return;
        }
        command => command,
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            std::process::exit(1);
        }
    };

    // Merge config defaults with CLI overrides
    let format_options = utils::NumberFormatOptions {
        use_comma: cli.number_comma || config.formatting.number_comma,
        use_human: cli.number_human || config.formatting.number_human,
        locale: cli.locale.unwrap_or(config.formatting.locale.clone()),
        decimal_places: cli
            .decimal_places
            .unwrap_or(config.formatting.decimal_places),
    };

    let result = match command {
        Commands::Analyze(args) => run_analyze(&config, args, &format_options).await,
        Commands::Fetch(args) => run_fetch(&config, args).await,
        Commands::Stats(args) => run_stats(&config, args).await,
        Commands::Config(_) => Ok(()),
    };
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<config::Config> {
    let mut config = match path {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?.unwrap_or_default(),
    };
    config.validate()?;
    Ok(config)
}

async fn run_analyze(
    config: &config::Config,
    args: AnalyzeArgs,
    format_options: &utils::NumberFormatOptions,
) -> Result<()> {
    let source = source::ExportFile::new(&args.export);
    let messages = source
        .load_messages()
        .await
        .with_context(|| format!("Failed to load {}", source.describe()))?;

    let report = analysis::Analysis::run(config, &messages)?;
    report::write_reports(&report, &args.out_dir, format_options)?;

    println!(
        "Analyzed {} messages from {} members.",
        utils::format_number(report.chat_stats.num_messages, format_options),
        report.member_stats.len()
    );
    println!("Tables written to {}", args.out_dir.display());
    Ok(())
}

async fn run_fetch(config: &config::Config, args: FetchArgs) -> Result<()> {
    let fetcher = fetch::ChatFetcher::from_config(config)?;
    println!("Fetching {}...", fetcher.describe());

    let messages = fetcher.fetch_messages().await?;
    source::write_export(&args.output, &messages)?;

    println!("Saved {} messages to {}", messages.len(), args.output.display());
    Ok(())
}

async fn run_stats(config: &config::Config, args: StatsArgs) -> Result<()> {
    let source = source::ExportFile::new(&args.export);
    let messages = source
        .load_messages()
        .await
        .with_context(|| format!("Failed to load {}", source.describe()))?;

    let report = analysis::Analysis::run(config, &messages)?;
    let json = if args.pretty {
        simd_json::to_string_pretty(&report)?
    } else {
        simd_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

fn handle_config_subcommand(path: Option<&std::path::Path>, config_args: ConfigArgs) -> Result<()> {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            config::create_default_config(path, overwrite).context("Failed to create config")
        }
        ConfigSubcommands::Show => config::show_config(path).context("Failed to show config"),
        ConfigSubcommands::Set { key, value } => {
            config::set_config_value(path, &key, &value).context("Failed to set config value")
        }
    }
}
