//! CLI binary for bloom.

use bloom::progress::ProgressEvent;
use bloom::shell::drive_session_blocking;
use bloom::update::SessionState;
use bloom::{BloomConfig, CheckMode, SessionOutcome, StrategyKind, UpdateOrchestrator, UpdateUi};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Beautiful Flower Display: self-update tool.
#[derive(Parser)]
#[command(name = "bloom", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured install strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Check for updates and report the result (default).
    Check,

    /// Quiet startup check: only speaks up when an update is available.
    Startup,

    /// Print the running version.
    Version,

    /// Print the effective configuration.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    DirectInstall,
    OpenInBrowser,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::DirectInstall => Self::DirectInstall,
            StrategyArg::OpenInBrowser => Self::OpenInBrowser,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(BloomConfig::default_config_path);
    let mut config = BloomConfig::load_or_default(&config_path)?;
    if let Some(strategy) = cli.strategy {
        config.update.strategy = strategy.into();
    }

    let _log_guard = bloom::logging::init(&config.log);

    if bloom::update::was_just_updated() {
        info!("running freshly installed version {}", config.update.current_version);
    }

    match cli.command.unwrap_or(Command::Check) {
        Command::Check => run_session(config, CheckMode::Verbose),
        Command::Startup => run_session(config, CheckMode::Silent),
        Command::Version => {
            println!("{} v{}", config.update.app_name, config.update.current_version);
            Ok(())
        }
        Command::Config => {
            println!("# {}", config_path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_session(config: BloomConfig, mode: CheckMode) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let orchestrator = UpdateOrchestrator::from_config(config.update, runtime.handle().clone())?
        .with_state_file(bloom::bloom_dirs::update_state_file());

    let handle = orchestrator.start(mode)?;
    let mut ui = TerminalUi::new(mode);
    let outcome = drive_session_blocking(handle, &mut ui, runtime.handle())?;
    info!("update session finished: {outcome:?}");

    match outcome {
        SessionOutcome::Relaunched { bundle } => {
            // Returning ends the process; the new bundle is already running.
            println!("Launched {}; exiting.", bundle.display());
        }
        SessionOutcome::OpenedReleasePage { url } => {
            println!("Opened {url}");
        }
        SessionOutcome::Installed { version, bundle } => {
            println!("Version {version} is installed at {}.", bundle.display());
        }
        SessionOutcome::Skipped
        | SessionOutcome::UpToDate
        | SessionOutcome::Declined
        | SessionOutcome::Failed { .. } => {}
    }
    Ok(())
}

/// Terminal dialogs: stdin yes/no prompts and an `indicatif` download bar.
struct TerminalUi {
    mode: CheckMode,
    bar: Option<ProgressBar>,
}

impl TerminalUi {
    fn new(mode: CheckMode) -> Self {
        Self { mode, bar: None }
    }

    fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl UpdateUi for TerminalUi {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.clear_bar();
        println!("\n{title}\n\n{message}");
        print!("[y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn info(&mut self, title: &str, message: &str) {
        self.clear_bar();
        println!("\n{title}\n\n{message}");
    }

    fn error(&mut self, title: &str, message: &str) {
        self.clear_bar();
        eprintln!("\n{title}\n\n{message}");
    }

    fn progress(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DownloadStarted {
                filename,
                total_bytes,
            } => {
                let bar = ProgressBar::new(total_bytes.unwrap_or(0));
                if let Ok(style) = ProgressStyle::with_template(
                    "  {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}",
                ) {
                    bar.set_style(style);
                }
                bar.set_message(filename.clone());
                self.bar = Some(bar);
            }
            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
            } => {
                if let Some(bar) = &self.bar {
                    if let Some(total) = total_bytes {
                        bar.set_length(*total);
                    }
                    bar.set_position(*bytes_downloaded);
                }
            }
            ProgressEvent::DownloadComplete { .. } => self.clear_bar(),
        }
    }

    fn state_changed(&mut self, state: &SessionState) {
        match state {
            SessionState::Checking if self.mode.is_verbose() => {
                println!("Checking for updates...");
            }
            SessionState::Installing { version } => {
                self.clear_bar();
                println!("Installing version {version}...");
            }
            _ => {}
        }
    }
}
