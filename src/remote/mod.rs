pub mod ssh;

use anyhow::Result;
use std::path::Path;

pub use ssh::SshSession;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Blocking remote-shell operations used by a service run.
pub trait RemoteShell {
    /// Runs `command` on the device. A non-zero exit status of the remote
    /// command is not an error; transport failures are.
    fn run(&self, command: &str) -> Result<CommandOutput>;
    /// Entry names (not paths) of a remote directory.
    fn list_dir(&self, path: &str) -> Result<Vec<String>>;
    fn fetch_file(&self, remote: &str, local: &Path) -> Result<()>;
    /// Copies the remote directory into `local_parent`. The copy lands in a
    /// directory named after the remote one, except for a trailing `/.`,
    /// whose contents go straight into `local_parent`. Non-recursive
    /// fetches copy regular files only.
    fn fetch_dir(&self, remote: &str, local_parent: &Path, recursive: bool) -> Result<()>;

    /// Stdout of `command` without the trailing newline.
    fn execute(&self, command: &str) -> Result<String> {
        let out = self.run(command)?;
        Ok(out.stdout.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Joins a remote directory and an entry name with exactly one `/`.
pub fn remote_join(dir: &str, name: &str) -> String {
    let dir = dir.strip_suffix("/.").unwrap_or(dir);
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Local directory a `fetch_dir` of `remote` into `local_parent` writes to.
pub fn fetch_dir_target(remote: &str, local_parent: &Path) -> std::path::PathBuf {
    let trimmed = remote.trim_end_matches('/');
    if trimmed == "." || trimmed.ends_with("/.") {
        return local_parent.to_path_buf();
    }
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => local_parent.join(name),
        _ => local_parent.to_path_buf(),
    }
}
