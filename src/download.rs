use crate::{config::Remote, remote::RemoteShell, util::shell_quote};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadTier {
    None,
    CurrentBuffer,
    FullMediaCopy,
    /// Irreversible: removes the logged data from the SD card.
    FullMediaCopyAndWipe,
}

impl DownloadTier {
    pub fn option_number(self) -> u8 {
        match self {
            Self::None => 0,
            Self::CurrentBuffer => 1,
            Self::FullMediaCopy => 2,
            Self::FullMediaCopyAndWipe => 3,
        }
    }
}

/// Operator's answer to the download menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadRequest {
    Tier(DownloadTier),
    Unrecognized(String),
}

impl DownloadRequest {
    pub fn from_choice(raw: &str) -> Self {
        match raw.trim() {
            "0" => Self::Tier(DownloadTier::None),
            "1" => Self::Tier(DownloadTier::CurrentBuffer),
            "2" => Self::Tier(DownloadTier::FullMediaCopy),
            "3" => Self::Tier(DownloadTier::FullMediaCopyAndWipe),
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

pub const MENU: &str = "Download options:

\t0. Continue without any data download.
\t1. Download the current mseed_tmp directory.
\t2. Download all the log and mseed directories of the sd-card.
\t3. Download all the log and mseed directories and clear the sd-card.

Choose 0, 1, 2, or 3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeResult {
    pub path: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadOutcome {
    Skipped,
    Unrecognized { choice: String },
    Copied { tier: DownloadTier, source: String },
    CopiedAndWiped { source: String, wiped: Vec<WipeResult> },
}

/// Executes the single action of `request`. The wipe tier deletes only after
/// its copy returned successfully; a failed copy returns an error before any
/// delete command is sent.
pub fn execute(
    remote: &dyn RemoteShell,
    request: &DownloadRequest,
    cfg: &Remote,
    local_dest: &Path,
) -> Result<DownloadOutcome> {
    let tier = match request {
        DownloadRequest::Unrecognized(choice) => {
            warn!("Unrecognized download option {choice:?}: no data downloaded.");
            return Ok(DownloadOutcome::Unrecognized {
                choice: choice.clone(),
            });
        }
        DownloadRequest::Tier(tier) => *tier,
    };
    let option = tier.option_number();

    match tier {
        DownloadTier::None => {
            info!("You chose download option {option}:\nContinue without any data download.\n");
            Ok(DownloadOutcome::Skipped)
        }
        DownloadTier::CurrentBuffer => {
            remote
                .fetch_dir(&cfg.buffer_dir, local_dest, false)
                .with_context(|| format!("downloading {}", cfg.buffer_dir))?;
            info!(
                "You chose download option {option}:\nCurrent mseed_tmp/ directory was downloaded to\n\n{}",
                local_dest.display()
            );
            Ok(DownloadOutcome::Copied {
                tier,
                source: cfg.buffer_dir.clone(),
            })
        }
        DownloadTier::FullMediaCopy => {
            let source = copy_media(remote, cfg, local_dest)?;
            info!(
                "You chose download option {option}:\nAll the log and mseed directories were downloaded to\n\n{}",
                local_dest.display()
            );
            Ok(DownloadOutcome::Copied { tier, source })
        }
        DownloadTier::FullMediaCopyAndWipe => {
            let source = copy_media(remote, cfg, local_dest)
                .context("media copy failed; the sd card was NOT cleared")?;
            let wiped = wipe(remote, &cfg.wipe_dirs);
            if wiped.iter().all(|w| w.ok) {
                info!(
                    "You chose download option {option}:\nAll the log and mseed directories were downloaded to\n\n{}\n\nand the sd card was cleared.",
                    local_dest.display()
                );
            } else {
                warn!(
                    "You chose download option {option}:\nData was downloaded to\n\n{}\n\nbut clearing the sd card did not fully succeed.",
                    local_dest.display()
                );
            }
            Ok(DownloadOutcome::CopiedAndWiped { source, wiped })
        }
    }
}

fn media_source(cfg: &Remote) -> String {
    format!("{}/.", cfg.media_mount.trim_end_matches('/'))
}

fn copy_media(remote: &dyn RemoteShell, cfg: &Remote, local_dest: &Path) -> Result<String> {
    let source = media_source(cfg);
    remote
        .fetch_dir(&source, local_dest, true)
        .with_context(|| format!("downloading {source}"))?;
    Ok(source)
}

/// One `rm -r` per directory, in order. Each failure is recorded and the
/// next directory is still attempted.
fn wipe(remote: &dyn RemoteShell, dirs: &[String]) -> Vec<WipeResult> {
    dirs.iter()
        .map(|dir| {
            let result = remote
                .run(&format!("rm -r {}", shell_quote(dir)))
                .and_then(|out| {
                    if out.success() {
                        Ok(())
                    } else {
                        Err(anyhow!("exit status {}: {}", out.status, out.stderr.trim()))
                    }
                });
            match result {
                Ok(()) => {
                    info!("Removed {dir} on the datalogger.");
                    WipeResult {
                        path: dir.clone(),
                        ok: true,
                        detail: String::new(),
                    }
                }
                Err(err) => {
                    warn!("Removing {dir} failed: {err:#}");
                    WipeResult {
                        path: dir.clone(),
                        ok: false,
                        detail: format!("{err:#}"),
                    }
                }
            }
        })
        .collect()
}
