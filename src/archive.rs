use crate::{
    registry::DeviceIdentity,
    util::{date_stamp, ensure_dir},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Date;

pub const LOG_SUBDIR: &str = "var_log";

/// Whether the visit happens before or after the SD card exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    BeforeExchange,
    AfterExchange,
    Unspecified,
}

impl SessionPhase {
    /// Maps operator input: `1` before, `2` after, anything else unspecified.
    /// The words `before`/`after`/`bex`/`aex` are accepted as well.
    pub fn from_choice(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "before" | "bex" => Self::BeforeExchange,
            "2" | "after" | "aex" => Self::AfterExchange,
            _ => Self::Unspecified,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::BeforeExchange => "_1_BEX",
            Self::AfterExchange => "_2_AEX",
            Self::Unspecified => "",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::BeforeExchange => "This is the service BEFORE the sd card exchange.",
            Self::AfterExchange => "This is the service AFTER the sd card exchange.",
            Self::Unspecified => "Service phase not specified; no phase suffix is used.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePaths {
    pub local_dest: PathBuf,
    pub log_dest: PathBuf,
}

/// `<base>/<year>/<network>/sr<YYYYMMDD>/<station>_sn_<serial>[<suffix>]`
pub fn station_dir(base: &Path, identity: &DeviceIdentity, phase: SessionPhase, date: Date) -> PathBuf {
    base.join(date.year().to_string())
        .join(&identity.network)
        .join(format!("sr{}", date_stamp(date)))
        .join(format!(
            "{}_sn_{}{}",
            identity.station,
            identity.serial,
            phase.suffix()
        ))
}

/// Derives the archive paths without touching the filesystem.
pub fn plan(base: &Path, identity: &DeviceIdentity, phase: SessionPhase, date: Date) -> ArchivePaths {
    let local_dest = station_dir(base, identity, phase, date);
    let log_dest = local_dest.join(LOG_SUBDIR);
    ArchivePaths {
        local_dest,
        log_dest,
    }
}

/// Derives the archive paths and creates both directories. Existing
/// directories are reused.
pub fn build(base: &Path, identity: &DeviceIdentity, phase: SessionPhase, date: Date) -> Result<ArchivePaths> {
    let paths = plan(base, identity, phase, date);
    ensure_dir(&paths.local_dest)?;
    ensure_dir(&paths.log_dest)?;
    Ok(paths)
}

/// Absolute archive base: configured path, or the current directory when empty.
pub fn resolve_base(configured: &str) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    if configured.trim().is_empty() {
        return Ok(cwd);
    }
    let p = crate::util::expand_tilde(configured.trim());
    Ok(if p.is_absolute() { p } else { cwd.join(p) })
}
