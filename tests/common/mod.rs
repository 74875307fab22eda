#![allow(dead_code)]

use anyhow::{Result, anyhow};
use ruwai_check::remote::{CommandOutput, RemoteShell, fetch_dir_target};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(String),
    ListDir(String),
    FetchFile(String),
    FetchDir { remote: String, recursive: bool },
}

/// In-memory datalogger. Records every call in order.
pub struct FakeRemote {
    pub serial: String,
    pub pids: String,
    pub sizes: RefCell<VecDeque<String>>,
    pub log_dir: String,
    pub logs: BTreeMap<String, String>,
    pub other_entries: Vec<String>,
    pub fail_fetch_file: Option<String>,
    pub fail_fetch_dir: bool,
    pub calls: RefCell<Vec<Call>>,
}

impl FakeRemote {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: format!("{serial}\n"),
            pids: "512\n".into(),
            sizes: RefCell::new(VecDeque::from(["100".to_string(), "150".to_string()])),
            log_dir: "/var/log/".into(),
            logs: BTreeMap::new(),
            other_entries: vec!["system.log".into(), "messages".into()],
            fail_fetch_file: None,
            fail_fetch_dir: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_log(mut self, name: &str, content: &str) -> Self {
        self.logs.insert(name.into(), content.into());
        self
    }

    pub fn with_sizes(self, first: &str, second: &str) -> Self {
        *self.sizes.borrow_mut() = VecDeque::from([first.to_string(), second.to_string()]);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Run(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn delete_commands(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with("rm "))
            .collect()
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            status: 0,
        }
    }
}

impl RemoteShell for FakeRemote {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(Call::Run(command.to_string()));
        if command == "cat /etc/ruwai_serial" {
            return Ok(Self::ok(&self.serial));
        }
        if command.starts_with("pidof ") {
            return Ok(Self::ok(&self.pids));
        }
        if command.starts_with("du -s ") {
            let size = self.sizes.borrow_mut().pop_front().unwrap_or_default();
            return Ok(Self::ok(&format!("{size}\n")));
        }
        if command == "df -h" {
            return Ok(Self::ok("Filesystem Size Used Avail Use% Mounted on\n/dev/mmcblk1p1 29G 3.1G 26G 11% /media/sd\n"));
        }
        if command.starts_with("rm -r ") {
            return Ok(Self::ok(""));
        }
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: format!("sh: {command}: not found"),
            status: 127,
        })
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        self.calls.borrow_mut().push(Call::ListDir(path.to_string()));
        if path == self.log_dir {
            let mut names: Vec<String> = self.logs.keys().cloned().collect();
            names.extend(self.other_entries.iter().cloned());
            return Ok(names);
        }
        if path.starts_with("/media/sd/mseed/") {
            return Ok(vec!["059".into(), "060".into(), "061".into()]);
        }
        Err(anyhow!("ls: cannot access '{path}': No such file or directory"))
    }

    fn fetch_file(&self, remote: &str, local: &Path) -> Result<()> {
        self.calls.borrow_mut().push(Call::FetchFile(remote.to_string()));
        let name = remote.rsplit('/').next().unwrap_or(remote);
        if self.fail_fetch_file.as_deref() == Some(name) {
            return Err(anyhow!("scp: {remote}: connection lost"));
        }
        let content = self.logs.get(name).cloned().unwrap_or_default();
        std::fs::write(local, content)?;
        Ok(())
    }

    fn fetch_dir(&self, remote: &str, local_parent: &Path, recursive: bool) -> Result<()> {
        self.calls.borrow_mut().push(Call::FetchDir {
            remote: remote.to_string(),
            recursive,
        });
        if self.fail_fetch_dir {
            return Err(anyhow!("scp: {remote}: connection lost"));
        }
        let dest = fetch_dir_target(remote, local_parent);
        std::fs::create_dir_all(&dest)?;
        std::fs::write(dest.join("fetched.marker"), remote)?;
        Ok(())
    }
}

pub fn ruwai_line(pid: u32, msg: &str) -> String {
    format!("Mar  1 10:00:00 ruwai ruwaicom[{pid}]: {msg}")
}
