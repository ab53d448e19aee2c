use clap::{Parser, Subcommand};
use shiprail::commands;
use shiprail::core::context::WorkspaceContext;
use shiprail::core::error::{ShipError, ShipResult, print_error};
use shiprail::core::logging::{LogSettings, init_tracing};
use shiprail::ui::output::OutputFormat;
use std::path::PathBuf;

/// Conventional-commit release automation: classify, version, propose, publish
#[derive(Parser)]
#[command(name = "shiprail")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// Config file (default: shiprail.toml, .shiprail.toml, .config/shiprail.toml)
  #[arg(long, global = true, env = "SHIPRAIL_CONFIG")]
  config: Option<PathBuf>,

  /// Log level: debug, info, warn, error
  #[arg(long, global = true, env = "SHIPRAIL_LOG_LEVEL")]
  log_level: Option<String>,

  /// Log format: auto, text, json
  #[arg(long, global = true)]
  log_format: Option<String>,

  /// Output format
  #[arg(short = 'o', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Shorthand for `--output json`
  #[arg(long, global = true, conflicts_with = "output")]
  json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Inspection
  // ============================================================================
  /// Classify commit subjects or PR titles
  Classify {
    /// One or more subjects, e.g. "feat(auth): add device login flow"
    #[arg(required = true)]
    texts: Vec<String>,
  },

  /// Compute the next version for a set of changes
  NextVersion {
    /// Current version (X.Y.Z)
    #[arg(long)]
    current: String,
    /// Change subject (repeatable)
    #[arg(long = "change")]
    changes: Vec<String>,
  },

  /// Render the changelog section for a set of changes
  Changelog {
    /// Release version (X.Y.Z)
    #[arg(long)]
    version: String,
    /// Change subject (repeatable)
    #[arg(long = "change")]
    changes: Vec<String>,
  },

  // ============================================================================
  // Release flow
  // ============================================================================
  /// Record landed changes and update the release proposal
  Ingest {
    /// Change subject (repeatable)
    #[arg(long = "change", required_unless_present = "from_git", conflicts_with = "from_git")]
    changes: Vec<String>,
    /// Source ref for the change at the same position (repeatable)
    #[arg(long = "ref", requires = "changes")]
    refs: Vec<String>,
    /// Ingest commits since the latest release tag
    #[arg(long)]
    from_git: bool,
  },

  /// Inspect or resolve the pending release proposal
  #[command(subcommand)]
  Proposal(ProposalCommands),

  /// Build, sign, attest and publish promoted releases
  #[command(subcommand)]
  Publish(PublishCommands),

  // ============================================================================
  // Setup
  // ============================================================================
  /// Validate, show or scaffold configuration
  #[command(subcommand)]
  Config(ConfigCommands),

  /// Build metadata and resolved environment
  #[command(subcommand)]
  Meta(MetaCommands),
}

#[derive(Subcommand)]
enum ProposalCommands {
  /// Show the pending proposal
  Show,

  /// Promote the pending proposal to a release (human merge)
  Merge {
    /// Proposal id the merge was approved against
    #[arg(long)]
    id: String,
    /// Prepend the dated section to the changelog file
    #[arg(long)]
    write_changelog: bool,
  },

  /// Close a stale or conflicting proposal and re-evaluate
  Close {
    #[arg(long)]
    id: String,
    #[arg(long)]
    reason: String,
  },

  /// Discard the pending proposal
  Cancel {
    #[arg(long)]
    id: String,
  },
}

#[derive(Subcommand)]
enum PublishCommands {
  /// Show publish runs
  Status {
    /// Run id (default: all runs)
    run: Option<String>,
  },

  /// Start the queued run for a version (default: most recent)
  Run { version: Option<String> },

  /// Resume a failed run from its failed stage
  Retry { run: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
  /// Validate a config file
  Validate {
    /// File to validate (default: the resolved config)
    #[arg(long)]
    file: Option<PathBuf>,
    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
  },

  /// Print the effective configuration
  Show,

  /// Write a default shiprail.toml
  Init {
    /// Overwrite an existing config
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum MetaCommands {
  /// Build metadata
  Info,

  /// Config sources, state location and relevant environment variables
  Env,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  let workspace_root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  // config and meta commands must work on a broken config
  let ctx = match WorkspaceContext::build(&workspace_root, cli.config.as_deref()) {
    Ok(ctx) => ctx,
    Err(e) if matches!(cli.command, Commands::Config(_) | Commands::Meta(_)) => {
      eprintln!("⚠️  Could not load configuration: {}", e);
      WorkspaceContext::with_defaults(&workspace_root)
    }
    Err(e) => handle_error(e),
  };

  match LogSettings::resolve(&ctx.config.logging, cli.log_level.as_deref(), cli.log_format.as_deref()) {
    Ok(settings) => init_tracing(settings),
    Err(e) => handle_error(e),
  }

  let format = if cli.json { OutputFormat::Json } else { cli.output };
  if let Err(err) = run(&ctx, cli.command, format) {
    handle_error(err);
  }
}

fn run(ctx: &WorkspaceContext, command: Commands, format: OutputFormat) -> ShipResult<()> {
  match command {
    Commands::Classify { texts } => commands::run_classify(ctx, texts, format),
    Commands::NextVersion { current, changes } => commands::run_next_version(ctx, current, changes, format),
    Commands::Changelog { version, changes } => commands::run_changelog(ctx, version, changes, format),

    Commands::Ingest {
      changes,
      refs,
      from_git,
    } => {
      let source = if from_git {
        commands::IngestSource::Git
      } else {
        commands::IngestSource::Manual { changes, refs }
      };
      commands::run_ingest(ctx, source, format)
    }

    Commands::Proposal(proposal_cmd) => match proposal_cmd {
      ProposalCommands::Show => commands::run_proposal_show(ctx, format),
      ProposalCommands::Merge { id, write_changelog } => commands::run_proposal_merge(ctx, id, write_changelog, format),
      ProposalCommands::Close { id, reason } => commands::run_proposal_close(ctx, id, reason, format),
      ProposalCommands::Cancel { id } => commands::run_proposal_cancel(ctx, id, format),
    },

    Commands::Publish(publish_cmd) => match publish_cmd {
      PublishCommands::Status { run } => commands::run_publish_status(ctx, run, format),
      PublishCommands::Run { version } => commands::run_publish_start(ctx, version, format),
      PublishCommands::Retry { run } => commands::run_publish_retry(ctx, run, format),
    },

    Commands::Config(config_cmd) => match config_cmd {
      ConfigCommands::Validate { file, strict } => commands::run_config_validate(ctx, file, strict, format),
      ConfigCommands::Show => commands::run_config_show(ctx, format),
      ConfigCommands::Init { force } => commands::run_config_init(ctx, force, format),
    },

    Commands::Meta(meta_cmd) => match meta_cmd {
      MetaCommands::Info => commands::run_meta_info(format),
      MetaCommands::Env => commands::run_meta_env(ctx, format),
    },
  }
}

fn handle_error(err: ShipError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
