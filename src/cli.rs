use crate::{
    archive::{self, SessionPhase},
    config::Config,
    download::DownloadRequest,
    health,
    prompt::TerminalOperator,
    registry::{self, Registry},
    session::{self, Preset, SessionRunner},
    util::{ensure_dir, parse_date, today},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ruwai-check")]
#[command(about = "Field-service runs for Ruwai dataloggers (identify, archive, health check, download)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./ruwai-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Service run against the connected datalogger.
    Run {
        /// Answer the BEFORE/AFTER sd card exchange prompt up front.
        #[arg(long, value_enum)]
        phase: Option<PhaseArg>,
        /// Answer the download prompt up front (0, 1, 2 or 3).
        #[arg(long)]
        download: Option<String>,
        /// Datalogger address, overrides `device.address`.
        #[arg(long)]
        address: Option<String>,
    },
    /// Show the identity and archive path a serial number maps to.
    Resolve {
        #[arg(long)]
        serial: String,
        #[arg(long, value_enum, default_value = "none")]
        phase: PhaseArg,
        /// Service date as YYYY-MM-DD (default: today).
        #[arg(long)]
        date: Option<String>,
    },
    /// Status extraction over an already downloaded var_log directory.
    Scan {
        #[arg(long)]
        logs: PathBuf,
        /// Logger process id(s) to scope the status lines to.
        #[arg(long)]
        pid: Vec<u32>,
    },
    /// Print the configured station registry.
    Registry {},
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PhaseArg {
    Before,
    After,
    None,
}

impl From<PhaseArg> for SessionPhase {
    fn from(p: PhaseArg) -> Self {
        match p {
            PhaseArg::Before => SessionPhase::BeforeExchange,
            PhaseArg::After => SessionPhase::AfterExchange,
            PhaseArg::None => SessionPhase::Unspecified,
        }
    }
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref())? {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Run {
            phase,
            download,
            address,
        } => {
            let mut cfg = cfg.clone();
            if let Some(addr) = address {
                cfg.device.address = addr.clone();
            }
            let preset = Preset {
                phase: phase.map(SessionPhase::from),
                download: download.as_deref().map(DownloadRequest::from_choice),
            };
            run(&args, &cfg, preset)
        }
        Command::Resolve {
            serial,
            phase,
            date,
        } => {
            let _guard = init_logging(&args, &cfg, None)?;
            resolve(&cfg, serial, (*phase).into(), date.as_deref())
        }
        Command::Scan { logs, pid } => {
            let _guard = init_logging(&args, &cfg, None)?;
            scan(&cfg, logs, pid)
        }
        Command::Registry {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            let registry = Registry::from_config(&cfg.registry);
            println!("{}", serde_json::to_string_pretty(registry.entries())?);
            Ok(())
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config not found: {}", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    let default = PathBuf::from("ruwai-check.toml");
    if default.exists() {
        Ok(Some(default))
    } else {
        Ok(None)
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else if cfg.logging.plain {
        tracing_subscriber::fmt::layer()
            .without_time()
            .with_level(false)
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = if cfg.logging.plain {
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .without_time()
                .with_level(false)
                .with_target(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn run(args: &Args, cfg: &Config, preset: Preset) -> Result<()> {
    // The local offset is only readable while the process is single-threaded.
    let date = today();
    let log_path = resolve_log_path(cfg);
    let guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("\n************************************\nWelcome to the Ruwai service script.\n************************************\n");

    let archive_base = archive::resolve_base(&cfg.paths.archive_base)?;
    let operator = TerminalOperator;

    let mut remote = match session::open_device_session(cfg) {
        Ok(remote) => remote,
        Err(err) => {
            error!("session aborted: {err:#}");
            return Err(err);
        }
    };
    let mut runner = SessionRunner::new(cfg, &remote, &operator, archive_base, date)
        .with_preset(preset);
    let result = runner.run();
    let archive_root = runner.archive_root().map(Path::to_path_buf);
    if let Err(err) = &result {
        error!("session aborted: {err:#}");
    }

    if let Err(err) = remote.close() {
        warn!("closing ssh session: {err:#}");
    }
    // Flush the run log before it is moved.
    drop(guard);

    if let Some(path) = log_path.as_deref() {
        match session::finalize_run_log(path, archive_root.as_deref()) {
            Ok(Some(dest)) => info!("run log moved to {}", dest.display()),
            Ok(None) => {}
            Err(err) => warn!("run log left at {}: {err:#}", path.display()),
        }
    }

    let report = result?;
    if cfg.output.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "station": report.identity.station,
                "network": report.identity.network,
                "serial": report.identity.serial,
                "archive_root": report.paths.local_dest,
                "logs_harvested": report.harvested.len(),
                "logging": report.activity.as_ref().map(|a| a.verdict),
                "download": report.download,
                "issues": report.issues.len(),
                "status": "ok"
            }))?
        );
    }
    Ok(())
}

fn resolve(cfg: &Config, serial: &str, phase: SessionPhase, date: Option<&str>) -> Result<()> {
    let registry = Registry::from_config(&cfg.registry);
    let identity = registry::resolve(serial, &registry);
    if !identity.is_known() {
        warn!("serial {:?} is not in the registry", identity.serial);
    }
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };
    let base = archive::resolve_base(&cfg.paths.archive_base)?;
    let paths = archive::plan(&base, &identity, phase, date);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "identity": identity,
            "phase": phase,
            "paths": paths,
        }))?
    );
    Ok(())
}

fn scan(cfg: &Config, logs: &Path, pids: &[u32]) -> Result<()> {
    let extracts = health::extract_status(
        logs,
        &cfg.remote.log_prefix,
        &cfg.device.process_name,
        pids,
        cfg.health.tail_lines,
    )?;
    println!("{}", serde_json::to_string_pretty(&extracts)?);
    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file || cfg.paths.run_log.is_empty() {
        return None;
    }
    Some(PathBuf::from(&cfg.paths.run_log))
}
