use crate::{
    archive::SessionPhase,
    download::{DownloadRequest, MENU},
};
use anyhow::{Context, Result, anyhow};
use std::cell::RefCell;
use std::collections::VecDeque;

pub const PHASE_MENU: &str = "Is this the service BEFORE or AFTER the sd card exchange?

\t1. BEFORE the sd card exchange.
\t2. AFTER the sd card exchange.

Choose 1, or 2";

/// Source of operator answers. Returns the raw text; interpretation happens
/// in [`ask_phase`] and [`ask_download`].
pub trait Operator {
    fn choose(&self, message: &str, options: &[&str]) -> Result<String>;
}

/// Free-text prompt on the controlling terminal.
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn choose(&self, message: &str, _options: &[&str]) -> Result<String> {
        let answer: String = dialoguer::Input::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()
            .context("reading operator input")?;
        Ok(answer)
    }
}

/// Replays prepared answers in order. Runs out with an error.
pub struct ScriptedOperator {
    answers: RefCell<VecDeque<String>>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
        }
    }
}

impl Operator for ScriptedOperator {
    fn choose(&self, message: &str, _options: &[&str]) -> Result<String> {
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer left for prompt: {message}"))
    }
}

pub fn ask_phase(op: &dyn Operator) -> Result<SessionPhase> {
    let raw = op.choose(PHASE_MENU, &["1", "2"])?;
    Ok(SessionPhase::from_choice(&raw))
}

pub fn ask_download(op: &dyn Operator) -> Result<DownloadRequest> {
    let raw = op.choose(MENU, &["0", "1", "2", "3"])?;
    Ok(DownloadRequest::from_choice(&raw))
}
