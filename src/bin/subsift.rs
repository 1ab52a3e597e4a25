//! CLI binary for subsift.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use subsift::config::SinkKind;
use subsift::{
    FileSink, JobStore, StatusServer, SqliteSink, SubsiftConfig, WriteMode, default_registry,
    load_keys,
};
use subsift_core::{BatchEvent, LookupMode, ProgressCallback, Sink, SourceId};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// subsift: concurrent multi-source subdomain and reverse-IP discovery.
#[derive(Parser)]
#[command(name = "subsift", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Options shared by the batch subcommands.
#[derive(clap::Args)]
struct BatchArgs {
    /// File of newline-separated keys.
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (defaults to a file under `[output].directory`).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File write mode: `append` (`a`) or `overwrite` (`w`).
    #[arg(short, long)]
    mode: Option<WriteMode>,

    /// Write to this SQLite database instead of a text file.
    #[arg(long)]
    sqlite: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Find subdomains for every domain in the input.
    Enumerate(BatchArgs),

    /// Find domains hosted on every IP or CIDR range in the input.
    Reverse(BatchArgs),

    /// Run the HTTP status service.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config and `PORT`).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the registered lookup sources.
    Sources {
        /// Only list sources for this mode.
        #[arg(short, long)]
        mode: Option<LookupMode>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    let config = SubsiftConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Enumerate(args) => run_batch(config, LookupMode::Subdomain, args).await,
        Command::Reverse(args) => run_batch(config, LookupMode::ReverseIp, args).await,
        Command::Serve { host, port } => run_serve(config, host, port).await,
        Command::Sources { mode } => {
            list_sources(mode);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for results, or to `log_file`
/// through a non-blocking writer whose guard must outlive `main`.
fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("subsift=info,subsift_core=info"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("not a file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

async fn run_batch(config: SubsiftConfig, mode: LookupMode, args: BatchArgs) -> anyhow::Result<()> {
    let loaded = load_keys(&args.input, mode, config.batch.max_keys)?;
    if loaded.keys.is_empty() {
        anyhow::bail!("no valid keys in {}", args.input.display());
    }
    eprintln!(
        "subsift v{}: {} {} keys ({} skipped)",
        env!("CARGO_PKG_VERSION"),
        loaded.keys.len(),
        mode,
        loaded.skipped
    );

    let sink: Box<dyn Sink> = match (&args.sqlite, config.output.sink) {
        (Some(path), _) => Box::new(SqliteSink::open(path, mode)?),
        (None, SinkKind::Sqlite) => Box::new(SqliteSink::open(
            config.output.directory.join("results.db"),
            mode,
        )?),
        (None, SinkKind::File) => {
            let path = args
                .output
                .unwrap_or_else(|| config.output.directory.join(default_file_name(mode)));
            let write_mode = args.mode.unwrap_or(config.output.mode);
            Box::new(FileSink::create(path, write_mode).await?)
        }
    };

    let _terminal = TerminalGuard::new();
    let bar = progress_bar();
    let runner = subsift_core::runner_for(
        mode,
        &config.engine,
        config.batch.clone(),
        Some(progress_callback(bar.clone())),
    )?;

    let results = runner.run(&loaded.keys, &*sink, None).await;
    bar.finish_and_clear();
    let results = results?;

    println!(
        "\nFound {} distinct results across {} keys. Saved to {}",
        results.len(),
        loaded.keys.len(),
        sink.destination()
    );
    Ok(())
}

fn default_file_name(mode: LookupMode) -> &'static str {
    match mode {
        LookupMode::Subdomain => "subdomains.txt",
        LookupMode::ReverseIp => "reverse_ip.txt",
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("  [{bar:30}] {pos}/{len} keys {elapsed_precise} ETA {eta}")
    {
        bar.set_style(style);
    }
    bar
}

fn progress_callback(bar: ProgressBar) -> ProgressCallback {
    Arc::new(move |event: BatchEvent| match event {
        BatchEvent::BatchStarted { total } => bar.set_length(total as u64),
        BatchEvent::KeyStarted { key } => bar.println(format!("[*] {key}")),
        BatchEvent::KeyCompleted { key, found } => bar.println(format!("[+] {key}: {found}")),
        BatchEvent::KeyFailed { key, error } => bar.println(format!("[!] {key}: {error}")),
        BatchEvent::Progress { completed, .. } => bar.set_position(completed as u64),
        BatchEvent::BatchFinished { .. } => bar.finish_and_clear(),
        BatchEvent::KeySkipped { .. } | BatchEvent::SourceFailed { .. } => {}
    })
}

async fn run_serve(
    mut config: SubsiftConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let store = Arc::new(JobStore::open(&config.server.storage_dir)?);
    let registry = default_registry(&config.engine)?;
    let mut server = StatusServer::start(&config, store, registry).await?;
    println!("subsift status service on http://{}", server.addr());

    tokio::select! {
        () = server.wait() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("received Ctrl+C, shutting down...");
        }
    }
    server.shutdown();
    Ok(())
}

fn list_sources(mode: Option<LookupMode>) {
    for id in SourceId::all() {
        if mode.is_some_and(|m| m != id.mode()) {
            continue;
        }
        println!("{:<14} {}", id.name(), id.mode());
    }
}

/// Hides the cursor while a batch draws progress, restoring it on drop.
struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    fn new() -> Self {
        let active = std::io::stderr().is_terminal();
        if active {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\x1b[?25l");
            let _ = stderr.flush();
        }
        Self { active }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\x1b[?25h");
            let _ = stderr.flush();
        }
    }
}
