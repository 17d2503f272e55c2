mod app;
mod background;
mod channel;
mod config;
mod credentials;
mod draft;
mod event;
mod matcher;
mod page;
mod presenter;
mod scheduler;
mod todoist;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nwtask")]
#[command(about = "Track Laravel Nightwatch issues in Todoist without duplicates")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./nwtask.yaml, then $XDG_CONFIG_HOME/nwtask/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Verify the Todoist token
  Check,

  /// Show the tasks that already track the given issues
  Match {
    /// Issue id; repeat for several
    #[arg(long = "issue", required = true)]
    issues: Vec<String>,

    /// Title hint for the issue at the same position
    #[arg(long = "title")]
    titles: Vec<String>,
  },

  /// Print the task draft for the issue in a page snapshot
  Draft {
    #[arg(long)]
    snapshot: PathBuf,
  },

  /// Create a task for the issue in a page snapshot
  Create {
    #[arg(long)]
    snapshot: PathBuf,

    /// Create even when a matching task exists
    #[arg(long)]
    force: bool,
  },

  /// Follow a page snapshot file and report matches as it changes
  Watch {
    #[arg(long)]
    snapshot: PathBuf,
  },
}

/// Log to stderr, or to `log_file` through a background writer.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nwtask=info"));
  let builder = tracing_subscriber::fmt().with_env_filter(filter);

  match log_file {
    Some(path) => {
      let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
      };
      let file_name = path
        .file_name()
        .ok_or_else(|| color_eyre::eyre::eyre!("invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(directory, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      builder.with_writer(writer).with_ansi(false).init();
      Ok(Some(guard))
    }
    None => {
      builder.with_writer(std::io::stderr).init();
      Ok(None)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config)?;
  match args.command {
    Cmd::Check => app.check().await,
    Cmd::Match { issues, titles } => app.find_matches(&issues, &titles).await,
    Cmd::Draft { snapshot } => app.draft(&snapshot).await,
    Cmd::Create { snapshot, force } => app.create(&snapshot, force).await,
    Cmd::Watch { snapshot } => app.watch(snapshot).await,
  }
}
