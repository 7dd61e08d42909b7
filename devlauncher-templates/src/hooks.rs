//! Per-hook outcome reporting

use devlauncher_core::{CommandOutput, HookType};
use serde::{Deserialize, Serialize};

/// Result of one hook command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookOutcome {
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
}

impl HookOutcome {
    pub fn from_output(command: String, output: &CommandOutput) -> Self {
        Self {
            command,
            success: output.success(),
            exit_code: output.exit_code,
            output: if output.success() {
                output.stdout.trim().to_string()
            } else {
                output.diagnostics()
            },
        }
    }

    /// A command that could not be dispatched at all
    pub fn failed_to_run(command: String, error: String) -> Self {
        Self {
            command,
            success: false,
            exit_code: None,
            output: error,
        }
    }
}

/// Outcomes of every command at one lifecycle point, in manifest order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookReport {
    pub hook: HookType,
    pub outcomes: Vec<HookOutcome>,
}

impl HookReport {
    pub fn new(hook: HookType) -> Self {
        Self {
            hook,
            outcomes: Vec::new(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &HookOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
