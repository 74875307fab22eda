pub mod archive;
pub mod cli;
pub mod config;
pub mod download;
pub mod harvest;
pub mod health;
pub mod prompt;
pub mod registry;
pub mod remote;
pub mod report;
pub mod session;
pub mod util;
