use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub ssh: Ssh,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub health: Health,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub registry: Registry,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing TOML: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(raw)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub address: String,
    pub port: u16,
    pub user: String,
    /// Plain password. Prefer `password_env` outside of lab setups.
    pub password: Option<String>,
    pub password_env: String,
    pub serial_command: String,
    pub process_name: String,
}
impl Default for Device {
    fn default() -> Self {
        Self {
            address: "192.168.20.100".into(),
            port: 22,
            user: "ruwai".into(),
            password: None,
            password_env: "RUWAI_PASSWORD".into(),
            serial_command: "cat /etc/ruwai_serial".into(),
            process_name: "ruwaicom".into(),
        }
    }
}

impl Device {
    /// Explicit password first, then the environment variable.
    pub fn resolve_password(&self) -> Option<String> {
        if let Some(p) = self.password.as_deref().filter(|p| !p.is_empty()) {
            return Some(p.to_string());
        }
        if self.password_env.is_empty() {
            return None;
        }
        std::env::var(&self.password_env)
            .ok()
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ssh {
    pub ssh_exe: String,
    pub scp_exe: String,
    pub sshpass_exe: String,
    pub ssh_keygen_exe: String,
    pub extra_options: Vec<String>,
    pub connect_timeout_seconds: u64,
    pub forget_host_key: bool,
    /// Empty means `~/.ssh/known_hosts`.
    pub known_hosts_path: String,
}
impl Default for Ssh {
    fn default() -> Self {
        Self {
            ssh_exe: "ssh".into(),
            scp_exe: "scp".into(),
            sshpass_exe: "sshpass".into(),
            ssh_keygen_exe: "ssh-keygen".into(),
            extra_options: vec!["StrictHostKeyChecking=accept-new".into()],
            connect_timeout_seconds: 15,
            forget_host_key: true,
            known_hosts_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Remote {
    pub log_dir: String,
    pub log_prefix: String,
    pub buffer_dir: String,
    pub media_mount: String,
    pub media_data_dir: String,
    pub wipe_dirs: Vec<String>,
}
impl Default for Remote {
    fn default() -> Self {
        Self {
            log_dir: "/var/log/".into(),
            log_prefix: "ruwai".into(),
            buffer_dir: "/home/ruwai/ruwaicom/mseed_tmp".into(),
            media_mount: "/media".into(),
            media_data_dir: "/media/sd/mseed".into(),
            wipe_dirs: vec!["/media/sd/log".into(), "/media/sd/mseed".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    pub sample_interval_seconds: u64,
    pub tail_lines: usize,
    pub media_overview: bool,
}
impl Default for Health {
    fn default() -> Self {
        Self {
            sample_interval_seconds: 10,
            tail_lines: 10,
            media_overview: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Root of the archive tree. Empty means the current directory.
    pub archive_base: String,
    pub run_log: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            archive_base: "".into(),
            run_log: "ruwai_check.log".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_report_json: bool,
    pub report_filename: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            report_filename: "session-report.json".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    /// Bare message lines without timestamp, level or target.
    pub plain: bool,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            plain: true,
        }
    }
}

/// Ordered list of networks; lookup order is file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub networks: Vec<NetworkStations>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStations {
    pub name: String,
    #[serde(default)]
    pub stations: BTreeMap<String, String>,
}

impl Default for Registry {
    fn default() -> Self {
        fn network(name: &str, stations: &[(&str, &str)]) -> NetworkStations {
            NetworkStations {
                name: name.into(),
                stations: stations
                    .iter()
                    .map(|(sn, st)| ((*sn).to_string(), (*st).to_string()))
                    .collect(),
            }
        }

        Self {
            networks: vec![
                network(
                    "SBK_stations",
                    &[
                        ("00006", "OBS"),
                        ("0000B", "PIL"),
                        ("00009", "MOR"),
                        ("00008", "MIT"),
                        ("00004", "STO"),
                    ],
                ),
                network(
                    "KITZ_stations",
                    &[("00007", "BH1"), ("0000A", "BH2"), ("00005", "BH3")],
                ),
                network(
                    "NOW_stations",
                    &[
                        ("0000F", "NUKL"),
                        ("0000G", "ZACP"),
                        ("0000H", "ZACR"),
                        ("0000K", "PATW"),
                        ("0000J", "PATE"),
                        ("0000I", "PATT"),
                    ],
                ),
            ],
        }
    }
}
