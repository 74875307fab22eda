use crate::{
    archive::{ArchivePaths, SessionPhase},
    download::DownloadOutcome,
    harvest::HarvestedFile,
    health::{ActivitySample, LogExtract, MediaOverview},
    registry::DeviceIdentity,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub started: String,
    pub finished: String,
    pub device_address: String,
    pub identity: DeviceIdentity,
    pub phase: SessionPhase,
    pub paths: ArchivePaths,
    pub harvested: Vec<HarvestedFile>,
    pub logger_pids: Vec<u32>,
    pub activity: Option<ActivitySample>,
    pub extracts: Vec<LogExtract>,
    pub media: Option<MediaOverview>,
    pub download: Option<DownloadOutcome>,
    /// Steps that failed without ending the session.
    pub issues: Vec<StepIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepIssue {
    pub step: String,
    pub message: String,
}
