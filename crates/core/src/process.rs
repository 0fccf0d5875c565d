// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled processes: named, runnable scripts

use crate::schedule::ValidationError;
use serde::{Deserialize, Serialize};

/// A named, runnable script registered with the platform
///
/// `script` is an argv template: the first element is the program, the rest
/// are fixed arguments. The launcher appends per-task arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledProcess {
    pub name: String,
    pub script: Vec<String>,
}

impl ScheduledProcess {
    pub fn new<S: Into<String>>(name: impl Into<String>, script: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            script: script.into_iter().map(Into::into).collect(),
        }
    }

    /// Program to execute (first element of the script)
    pub fn program(&self) -> Option<&str> {
        self.script.first().map(String::as_str)
    }

    /// Fixed arguments following the program
    pub fn args(&self) -> &[String] {
        self.script.get(1..).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyProcessName);
        }
        match self.program() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::EmptyScript(self.name.clone())),
        }
    }
}
