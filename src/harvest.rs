use crate::{
    remote::{RemoteShell, remote_join},
    util::sha256_file,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedFile {
    pub name: String,
    pub bytes: u64,
    pub sha256: String,
}

/// Selection is done on the part of `name` before its first `.`: it must
/// start with `prefix`. With prefix `ruwai`, `ruwai.log`, `ruwai.log.1` and
/// `ruwaicom.conf` are selected, `system.log` and `.ruwai` are not.
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    name.split('.')
        .next()
        .is_some_and(|segment| segment.starts_with(prefix))
}

pub fn select_logs(entries: &[String], prefix: &str) -> Vec<String> {
    entries
        .iter()
        .filter(|e| matches_prefix(e, prefix))
        .cloned()
        .collect()
}

/// Outcome of one harvest: the files copied so far and, when the batch
/// stopped early, the reason.
#[derive(Debug)]
pub struct Harvest {
    pub files: Vec<HarvestedFile>,
    pub error: Option<anyhow::Error>,
}

impl Harvest {
    pub fn into_result(self) -> Result<Vec<HarvestedFile>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.files),
        }
    }
}

/// Lists `remote_dir` once and copies every selected file into `log_dest`
/// under its own name. Stops at the first failed copy; files copied before
/// it stay in place and are returned alongside the error.
pub fn harvest(remote: &dyn RemoteShell, remote_dir: &str, prefix: &str, log_dest: &Path) -> Harvest {
    let mut files = Vec::new();
    let error = copy_selected(remote, remote_dir, prefix, log_dest, &mut files).err();
    Harvest { files, error }
}

fn copy_selected(
    remote: &dyn RemoteShell,
    remote_dir: &str,
    prefix: &str,
    log_dest: &Path,
    out: &mut Vec<HarvestedFile>,
) -> Result<()> {
    let entries = remote
        .list_dir(remote_dir)
        .with_context(|| format!("listing {remote_dir}"))?;
    let selected = select_logs(&entries, prefix);
    debug!("{} of {} entries in {remote_dir} selected", selected.len(), entries.len());

    for name in selected {
        let src = remote_join(remote_dir, &name);
        let dest = log_dest.join(&name);
        remote
            .fetch_file(&src, &dest)
            .with_context(|| format!("copying {src}"))?;
        let bytes = std::fs::metadata(&dest)
            .with_context(|| format!("stat {}", dest.display()))?
            .len();
        let sha256 = sha256_file(&dest)?;
        out.push(HarvestedFile { name, bytes, sha256 });
    }
    Ok(())
}
