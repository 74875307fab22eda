use crate::{
    archive::{self, SessionPhase},
    config::Config,
    download::{self, DownloadRequest},
    harvest,
    health::{self, ActivityVerdict},
    prompt::{self, Operator},
    registry::{self, Registry},
    remote::{RemoteShell, SshSession, ssh::forget_host_key},
    report::{SessionReport, StepIssue},
    util::{move_file, now_rfc3339},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::Date;
use tracing::{debug, info, warn};

const RULE: &str = "--------------------------------------------------------------------------";

fn banner(title: &str) {
    info!("\n{RULE}\n{title}\n{RULE}");
}

/// Clears the stale host key (best effort) and opens the device session.
pub fn open_device_session(cfg: &Config) -> Result<SshSession> {
    if cfg.ssh.forget_host_key {
        if let Err(err) = forget_host_key(cfg) {
            warn!("could not remove cached host key for {}: {err:#}", cfg.device.address);
        }
    }
    let session = SshSession::connect(cfg)?;
    info!("\n...ssh-connection with Ruwai datalogger established.");
    Ok(session)
}

/// Answers given up front (command line); missing ones are asked for.
#[derive(Debug, Clone, Default)]
pub struct Preset {
    pub phase: Option<SessionPhase>,
    pub download: Option<DownloadRequest>,
}

/// One service run over an open remote session: identify, archive, harvest
/// logs, health checks, download. Steps run in that fixed order.
pub struct SessionRunner<'a> {
    cfg: &'a Config,
    registry: Registry,
    remote: &'a dyn RemoteShell,
    operator: &'a dyn Operator,
    archive_base: PathBuf,
    date: Date,
    preset: Preset,
    archive_root: Option<PathBuf>,
}

impl<'a> SessionRunner<'a> {
    pub fn new(
        cfg: &'a Config,
        remote: &'a dyn RemoteShell,
        operator: &'a dyn Operator,
        archive_base: PathBuf,
        date: Date,
    ) -> Self {
        Self {
            cfg,
            registry: Registry::from_config(&cfg.registry),
            remote,
            operator,
            archive_base,
            date,
            preset: Preset::default(),
            archive_root: None,
        }
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Station directory of this run, once it has been created.
    pub fn archive_root(&self) -> Option<&Path> {
        self.archive_root.as_deref()
    }

    pub fn run(&mut self) -> Result<SessionReport> {
        let started = now_rfc3339();

        let serial = self
            .remote
            .execute(&self.cfg.device.serial_command)
            .context("reading the datalogger serial number")?;
        let identity = registry::resolve(&serial, &self.registry);
        if identity.serial.is_empty() {
            warn!("the datalogger returned an empty serial number");
        }
        if identity.is_known() {
            info!(
                "\n...you are at the {} station ({}).",
                identity.station, identity.network
            );
        } else {
            warn!(
                "\n...the Ruwai S/N {:?} does not fit to any station in the registry.",
                identity.serial
            );
        }

        let phase = match self.preset.phase {
            Some(phase) => phase,
            None => prompt::ask_phase(self.operator)?,
        };
        banner(phase.describe());

        let paths = archive::build(&self.archive_base, &identity, phase, self.date)
            .context("creating the archive directory")?;
        self.archive_root = Some(paths.local_dest.clone());
        info!("\n...directory structure on local machine done.");
        debug!(
            "archive root {} log dir {}",
            paths.local_dest.display(),
            paths.log_dest.display()
        );

        let mut report = SessionReport {
            started,
            finished: String::new(),
            device_address: self.cfg.device.address.clone(),
            identity,
            phase,
            paths: paths.clone(),
            harvested: Vec::new(),
            logger_pids: Vec::new(),
            activity: None,
            extracts: Vec::new(),
            media: None,
            download: None,
            issues: Vec::new(),
        };

        self.harvest_logs(&mut report);
        self.check_health(&mut report);

        banner("Ruwai data download");
        let request = match self.preset.download.clone() {
            Some(request) => request,
            None => prompt::ask_download(self.operator)?,
        };
        match download::execute(self.remote, &request, &self.cfg.remote, &paths.local_dest) {
            Ok(outcome) => report.download = Some(outcome),
            Err(err) => {
                report.issues.push(issue("download", &err));
                report.finished = now_rfc3339();
                self.write_report(&report);
                return Err(err);
            }
        }

        info!("\n\n************************************\nAll tasks finished.        Bye, Bye!\n************************************\n");
        report.finished = now_rfc3339();
        self.write_report(&report);
        Ok(report)
    }

    fn harvest_logs(&self, report: &mut SessionReport) {
        let remote_cfg = &self.cfg.remote;
        let batch = harvest::harvest(
            self.remote,
            &remote_cfg.log_dir,
            &remote_cfg.log_prefix,
            &report.paths.log_dest,
        );
        info!(
            "\n...{} Ruwai log-files downloaded to {}/.",
            batch.files.len(),
            report.paths.log_dest.display()
        );
        report.harvested = batch.files;
        if let Some(err) = batch.error {
            warn!("log download stopped: {err:#}");
            report.issues.push(issue("harvest", &err));
        }
    }

    fn check_health(&self, report: &mut SessionReport) {
        banner("Ruwai status checks initiated.");

        match health::logger_pids(self.remote, &self.cfg.device.process_name) {
            Ok(pids) => {
                if pids.is_empty() {
                    warn!("{} is not running; status lines of any process id are shown.", self.cfg.device.process_name);
                } else {
                    info!(
                        "Process ID of running {} software: {}",
                        self.cfg.device.process_name,
                        pids.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
                    );
                }
                report.logger_pids = pids;
            }
            Err(err) => {
                warn!("could not query the logger process id: {err:#}");
                report.issues.push(issue("pid", &err));
            }
        }

        let buffer_dir = &self.cfg.remote.buffer_dir;
        banner(&format!("Checking the current size of the {buffer_dir} directory."));
        let interval = Duration::from_secs(self.cfg.health.sample_interval_seconds);
        let sampled = health::sample_activity(self.remote, buffer_dir, interval, |kb| {
            info!("The current size of the directory is {kb} kB.");
        });
        match sampled {
            Ok(sample) => {
                info!("The current size of the directory is {} kB.", sample.second_kb);
                match sample.verdict {
                    ActivityVerdict::LoggingActive => banner("Ruwai IS logging :) "),
                    ActivityVerdict::LoggingInactive => banner("Ruwai is NOT logging :("),
                }
                report.activity = Some(sample);
            }
            Err(err) => {
                warn!("logging activity could not be determined: {err:#}");
                report.issues.push(issue("activity", &err));
            }
        }

        match health::extract_status(
            &report.paths.log_dest,
            &self.cfg.remote.log_prefix,
            &self.cfg.device.process_name,
            &report.logger_pids,
            self.cfg.health.tail_lines,
        ) {
            Ok(extracts) => {
                for extract in &extracts {
                    banner(extract.category.title());
                    if extract.lines.is_empty() {
                        info!("(no matching lines)");
                    }
                    for line in &extract.lines {
                        info!("{line}");
                    }
                }
                report.extracts = extracts;
            }
            Err(err) => {
                warn!("status extraction failed: {err:#}");
                report.issues.push(issue("status", &err));
            }
        }

        if self.cfg.health.media_overview {
            match health::media_overview(self.remote, &self.cfg.remote.media_data_dir, self.date) {
                Ok(media) => {
                    banner("Ruwai datalogger filesystem output:");
                    info!("{}", media.filesystems);
                    info!(
                        "\n{RULE}\nDate of today: \t{}\nDay of year: \t{:03}\n\nCurrent directories in {}/:\n{RULE}",
                        media.date, media.day_of_year, media.data_dir
                    );
                    info!("{}", media.data_listing.join("\n"));
                    report.media = Some(media);
                }
                Err(err) => {
                    warn!("media overview failed: {err:#}");
                    report.issues.push(issue("media", &err));
                }
            }
        }
    }

    fn write_report(&self, report: &SessionReport) {
        if !self.cfg.output.write_report_json {
            return;
        }
        let path = report.paths.local_dest.join(&self.cfg.output.report_filename);
        let written = serde_json::to_string_pretty(report)
            .map_err(anyhow::Error::from)
            .and_then(|raw| {
                std::fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))
            });
        if let Err(err) = written {
            warn!("session report not written: {err:#}");
        }
    }
}

fn issue(step: &str, err: &anyhow::Error) -> StepIssue {
    StepIssue {
        step: step.to_string(),
        message: format!("{err:#}"),
    }
}

/// Moves the run log into the archive root. Without a root, or when the
/// log was never written, it stays where it is.
pub fn finalize_run_log(run_log: &Path, archive_root: Option<&Path>) -> Result<Option<PathBuf>> {
    let Some(root) = archive_root else {
        debug!("no archive root; run log stays at {}", run_log.display());
        return Ok(None);
    };
    if !run_log.exists() {
        return Ok(None);
    }
    let dest = move_file(run_log, root)?;
    Ok(Some(dest))
}
