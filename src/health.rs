use crate::{
    remote::RemoteShell,
    util::shell_quote,
};
use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::{Date, macros::format_description};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityVerdict {
    LoggingActive,
    LoggingInactive,
}

impl ActivityVerdict {
    pub fn from_samples(first_kb: u64, second_kb: u64) -> Self {
        if second_kb > first_kb {
            Self::LoggingActive
        } else {
            Self::LoggingInactive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub directory: String,
    pub first_kb: u64,
    pub second_kb: u64,
    pub interval_seconds: u64,
    pub verdict: ActivityVerdict,
}

/// Leading decimal integer of `du`-style output (`1234\t/path`).
pub fn parse_size_kb(raw: &str) -> Result<u64> {
    let trimmed = raw.trim_start();
    let digits: &str = &trimmed[..trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len())];
    if digits.is_empty() {
        return Err(anyhow!("no size in output: {:?}", raw.trim()));
    }
    digits
        .parse()
        .with_context(|| format!("size out of range: {digits}"))
}

pub fn size_command(dir: &str) -> String {
    format!("du -s {} | cut -f1", shell_quote(dir))
}

pub fn query_size_kb(remote: &dyn RemoteShell, dir: &str) -> Result<u64> {
    let out = remote.execute(&size_command(dir))?;
    parse_size_kb(&out)
}

/// Samples the size of `dir` twice, `interval` apart. One blocking wait,
/// no polling.
pub fn sample_activity(
    remote: &dyn RemoteShell,
    dir: &str,
    interval: Duration,
    mut on_first: impl FnMut(u64),
) -> Result<ActivitySample> {
    let first_kb = query_size_kb(remote, dir)?;
    on_first(first_kb);
    std::thread::sleep(interval);
    let second_kb = query_size_kb(remote, dir)?;
    Ok(ActivitySample {
        directory: dir.to_string(),
        first_kb,
        second_kb,
        interval_seconds: interval.as_secs(),
        verdict: ActivityVerdict::from_samples(first_kb, second_kb),
    })
}

/// Pids reported by `pidof`; empty when the process is not running.
pub fn logger_pids(remote: &dyn RemoteShell, process_name: &str) -> Result<Vec<u32>> {
    let out = remote.execute(&format!("pidof {}", shell_quote(process_name)))?;
    Ok(parse_pids(&out))
}

pub fn parse_pids(raw: &str) -> Vec<u32> {
    raw.split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCategory {
    SdCard,
    GpsFix,
    UtcAvailable,
    LastOutput,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 4] = [
        StatusCategory::SdCard,
        StatusCategory::GpsFix,
        StatusCategory::UtcAvailable,
        StatusCategory::LastOutput,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::SdCard => "SD card status:",
            Self::GpsFix => "GPS status:",
            Self::UtcAvailable => "UTC status:",
            Self::LastOutput => "Last log-file output:",
        }
    }

    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Self::SdCard => Some("SD"),
            Self::GpsFix => Some("GPS_FIX"),
            Self::UtcAvailable => Some("UTC_AVAILABLE"),
            Self::LastOutput => None,
        }
    }

    /// UTC lines are matched from any process, not only the running logger.
    pub fn process_scoped(self) -> bool {
        !matches!(self, Self::UtcAvailable)
    }

    /// Line filter for this category. Without known pids the process marker
    /// accepts any pid.
    pub fn pattern(self, process_name: &str, pids: &[u32]) -> Result<Regex> {
        let pid = match pids {
            [] => "[0-9]+".to_string(),
            [one] => one.to_string(),
            many => format!(
                "(?:{})",
                many.iter().map(u32::to_string).collect::<Vec<_>>().join("|")
            ),
        };
        let marker = format!(r"{}\[{}\]", regex::escape(process_name), pid);
        let raw = match (self.process_scoped(), self.keyword()) {
            (true, Some(kw)) => format!("{marker}.*{}", regex::escape(kw)),
            (true, None) => marker,
            (false, Some(kw)) => regex::escape(kw),
            (false, None) => String::new(),
        };
        Regex::new(&raw).with_context(|| format!("compiling pattern {raw:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogExtract {
    pub category: StatusCategory,
    pub pattern: String,
    pub lines: Vec<String>,
}

/// Harvested log files belonging to `prefix` (`<prefix>.log*`), in name order.
pub fn log_files(log_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let stem = format!("{prefix}.log");
    let mut files = Vec::new();
    for entry in std::fs::read_dir(log_dir)
        .with_context(|| format!("reading {}", log_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&stem) && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Last `tail` lines matching `pattern` across `files`, in file order.
pub fn tail_matches(files: &[PathBuf], pattern: &Regex, tail: usize) -> Result<Vec<String>> {
    let mut kept: VecDeque<String> = VecDeque::with_capacity(tail);
    if tail == 0 {
        return Ok(Vec::new());
    }
    for path in files {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        for line in text.lines() {
            if !pattern.is_match(line) {
                continue;
            }
            if kept.len() == tail {
                kept.pop_front();
            }
            kept.push_back(line.to_string());
        }
    }
    Ok(kept.into())
}

pub fn extract_status(
    log_dir: &Path,
    prefix: &str,
    process_name: &str,
    pids: &[u32],
    tail: usize,
) -> Result<Vec<LogExtract>> {
    let files = log_files(log_dir, prefix)?;
    debug!("scanning {} log files in {}", files.len(), log_dir.display());
    StatusCategory::ALL
        .iter()
        .map(|&category| -> Result<LogExtract> {
            let pattern = category.pattern(process_name, pids)?;
            let lines = tail_matches(&files, &pattern, tail)?;
            Ok(LogExtract {
                category,
                pattern: pattern.as_str().to_string(),
                lines,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOverview {
    pub filesystems: String,
    pub date: String,
    pub day_of_year: u16,
    pub data_dir: String,
    pub data_listing: Vec<String>,
}

/// Disk usage of the logger plus the day directories of the current year.
pub fn media_overview(remote: &dyn RemoteShell, media_data_dir: &str, date: Date) -> Result<MediaOverview> {
    let filesystems = remote.execute("df -h")?;
    let data_dir = format!("{}/{}", media_data_dir.trim_end_matches('/'), date.year());
    let data_listing = remote.list_dir(&data_dir)?;
    let date_text = date
        .format(format_description!("[year]-[month]-[day]"))
        .context("formatting the service date")?;
    Ok(MediaOverview {
        filesystems,
        date: date_text,
        day_of_year: date.ordinal(),
        data_dir,
        data_listing,
    })
}
