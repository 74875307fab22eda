use super::{CommandOutput, RemoteShell, fetch_dir_target, remote_join};
use crate::{config::Config, util::{ensure_dir, expand_tilde, shell_quote}};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, warn};

/// ssh reserves this exit status for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// One multiplexed ssh connection to the datalogger, driven through the
/// system `ssh`/`scp` binaries. A control master is opened by `connect` and
/// reused by every later call until `close` (or drop).
pub struct SshSession {
    ssh_exe: String,
    scp_exe: String,
    sshpass_exe: String,
    options: Vec<String>,
    port: u16,
    target: String,
    password: Option<String>,
    control_path: PathBuf,
    open: bool,
}

impl SshSession {
    /// Opens and authenticates the session. Fails when the device cannot be
    /// reached or rejects the credentials.
    pub fn connect(cfg: &Config) -> Result<Self> {
        let password = cfg.device.resolve_password();
        let control_path =
            std::env::temp_dir().join(format!("ruwai-check-{}.ctl", std::process::id()));

        let mut options = vec![
            "ControlMaster=auto".to_string(),
            format!("ControlPath={}", control_path.display()),
            "ControlPersist=600".to_string(),
            format!("ConnectTimeout={}", cfg.ssh.connect_timeout_seconds),
        ];
        if password.is_none() {
            options.push("BatchMode=yes".to_string());
        }
        options.extend(cfg.ssh.extra_options.iter().cloned());

        let mut session = Self {
            ssh_exe: cfg.ssh.ssh_exe.clone(),
            scp_exe: cfg.ssh.scp_exe.clone(),
            sshpass_exe: cfg.ssh.sshpass_exe.clone(),
            options,
            port: cfg.device.port,
            target: format!("{}@{}", cfg.device.user, cfg.device.address),
            password,
            control_path,
            open: false,
        };

        let out = session
            .ssh_output(&["true"])
            .with_context(|| format!("opening ssh session to {}", session.target))?;
        if !out.status.success() {
            return Err(anyhow!(
                "ssh session to {} failed: {}",
                session.target,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        session.open = true;
        debug!("ssh control master up at {}", session.control_path.display());
        Ok(session)
    }

    /// Shuts down the control master.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let out = self.ssh_output_with(&["-O", "exit"], &[])?;
        if !out.status.success() {
            debug!(
                "ssh -O exit: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }

    fn command(&self, exe: &str) -> Command {
        match &self.password {
            Some(pw) => {
                let mut cmd = Command::new(&self.sshpass_exe);
                cmd.arg("-e").arg(exe).env("SSHPASS", pw);
                cmd
            }
            None => Command::new(exe),
        }
    }

    fn option_args(&self) -> Vec<String> {
        self.options
            .iter()
            .flat_map(|o| ["-o".to_string(), o.clone()])
            .collect()
    }

    fn ssh_output(&self, remote_cmd: &[&str]) -> Result<Output> {
        self.ssh_output_with(&[], remote_cmd)
    }

    fn ssh_output_with(&self, extra: &[&str], remote_cmd: &[&str]) -> Result<Output> {
        let mut cmd = self.command(&self.ssh_exe);
        cmd.args(self.option_args())
            .arg("-p")
            .arg(self.port.to_string())
            .args(extra)
            .arg(&self.target);
        if !remote_cmd.is_empty() {
            cmd.arg("--").args(remote_cmd);
        }
        cmd.stdin(Stdio::null());
        cmd.output()
            .with_context(|| format!("spawning {}", self.ssh_exe))
    }

    fn scp(&self, args: &[&str]) -> Result<()> {
        let mut cmd = self.command(&self.scp_exe);
        cmd.args(self.option_args())
            .arg("-P")
            .arg(self.port.to_string())
            .arg("-q")
            .args(args)
            .stdin(Stdio::null());
        debug!("scp {:?}", args);
        let out = cmd
            .output()
            .with_context(|| format!("spawning {}", self.scp_exe))?;
        if !out.status.success() {
            return Err(anyhow!(
                "scp {:?} failed: {}",
                args,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(())
    }

    fn remote_spec(&self, path: &str) -> String {
        format!("{}:{}", self.target, path)
    }
}

impl RemoteShell for SshSession {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("remote exec: {command}");
        let out = self.ssh_output(&[command])?;
        let status = out.status.code().unwrap_or(SSH_TRANSPORT_FAILURE);
        let stderr = String::from_utf8_lossy(&out.stderr).to_string();
        if status == SSH_TRANSPORT_FAILURE {
            return Err(anyhow!("ssh transport failure running {command:?}: {}", stderr.trim()));
        }
        if status != 0 {
            debug!("remote exit status {status} for {command:?}: {}", stderr.trim());
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr,
            status,
        })
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let out = self.run(&format!("ls -1A -- {}", shell_quote(path)))?;
        if !out.success() {
            return Err(anyhow!("listing {path} failed: {}", out.stderr.trim()));
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn fetch_file(&self, remote: &str, local: &Path) -> Result<()> {
        let src = self.remote_spec(remote);
        let local_str = local.display().to_string();
        self.scp(&[src.as_str(), local_str.as_str()])
    }

    fn fetch_dir(&self, remote: &str, local_parent: &Path, recursive: bool) -> Result<()> {
        let dest = fetch_dir_target(remote, local_parent);
        ensure_dir(&dest)?;
        let dest_str = format!("{}/", dest.display());

        if recursive {
            for entry in self.list_dir(remote)? {
                let src = self.remote_spec(&remote_join(remote, &entry));
                self.scp(&["-r", "-p", src.as_str(), dest_str.as_str()])?;
            }
            return Ok(());
        }

        let out = self.run(&format!(
            "find {} -mindepth 1 -maxdepth 1 -type f",
            shell_quote(remote)
        ))?;
        if !out.success() {
            return Err(anyhow!("listing files of {remote} failed: {}", out.stderr.trim()));
        }
        for file in out.stdout.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            let src = self.remote_spec(file);
            self.scp(&["-p", src.as_str(), dest_str.as_str()])?;
        }
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("closing ssh session: {err:#}");
        }
    }
}

/// Removes cached host keys for `address` from the known_hosts store, so a
/// replaced logger answering on the same address does not trip a host key
/// mismatch. Missing store is not an error.
pub fn forget_host_key(cfg: &Config) -> Result<()> {
    let path = if cfg.ssh.known_hosts_path.is_empty() {
        let home = std::env::var("HOME").map_err(|_| anyhow!("cannot determine home directory"))?;
        PathBuf::from(home).join(".ssh").join("known_hosts")
    } else {
        expand_tilde(&cfg.ssh.known_hosts_path)
    };
    if !path.exists() {
        debug!("no known_hosts at {}", path.display());
        return Ok(());
    }

    let mut hosts = vec![cfg.device.address.clone()];
    if cfg.device.port != 22 {
        hosts.push(format!("[{}]:{}", cfg.device.address, cfg.device.port));
    }
    for host in hosts {
        let out = Command::new(&cfg.ssh.ssh_keygen_exe)
            .arg("-f")
            .arg(&path)
            .arg("-R")
            .arg(&host)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawning {}", cfg.ssh.ssh_keygen_exe))?;
        if !out.status.success() {
            return Err(anyhow!(
                "ssh-keygen -R {host} failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
    }
    Ok(())
}
