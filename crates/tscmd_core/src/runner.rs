//! Drives a list of commands through check, discovery and run.

use std::fmt;

use crate::command::{Command, DiscoveryObject};
use crate::error::CommandError;
use crate::processor::{CommandProcessor, MemoryProcessor};
use crate::status::CommandPhase;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Run a discovery pass before the real run
    pub discovery: bool,
    /// Stop after the discovery pass
    pub discovery_only: bool,
    /// Halt at the first failed command
    pub stop_on_failure: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            discovery: true,
            discovery_only: false,
            stop_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeState {
    Success,
    Warning,
    Failure,
    InvalidParameters,
    NotRun,
}

impl fmt::Display for OutcomeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failure => "failure",
            Self::InvalidParameters => "invalid parameters",
            Self::NotRun => "not run",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub state: OutcomeState,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<CommandOutcome>,
    /// Labels of objects produced by the discovery pass
    pub discovered: Vec<String>,
}

impl RunSummary {
    pub fn count(&self, state: OutcomeState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// No failures and no invalid parameters; warnings are allowed
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| {
            matches!(o.state, OutcomeState::Success | OutcomeState::Warning)
        })
    }
}

fn outcome_of(command: &str, result: Result<(), CommandError>) -> CommandOutcome {
    let (state, message) = match result {
        Ok(()) => (OutcomeState::Success, None),
        Err(e) if e.is_warning() => (OutcomeState::Warning, Some(e.to_string())),
        Err(e @ CommandError::InvalidParameters { .. }) => {
            (OutcomeState::InvalidParameters, Some(e.to_string()))
        }
        Err(e) => (OutcomeState::Failure, Some(e.to_string())),
    };
    CommandOutcome {
        command: command.to_string(),
        state,
        message,
    }
}

fn register_discovery(processor: &mut MemoryProcessor, objects: Vec<DiscoveryObject>) -> Vec<String> {
    let mut labels = Vec::new();
    for object in objects {
        labels.push(object.label());
        let result = match object {
            DiscoveryObject::Table(table) => processor.set_table(table),
            DiscoveryObject::TimeSeries(ts) => processor.append_time_series(vec![ts]),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "unable to register discovery object");
        }
    }
    labels
}

impl MemoryProcessor {
    /// Check every command, optionally run discovery on a scratch processor,
    /// then run the valid commands in order.
    pub fn run_commands(
        &mut self,
        commands: &mut [Box<dyn Command>],
        options: RunOptions,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let valid: Vec<bool> = commands
            .iter_mut()
            .map(|c| match c.check_parameters() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(command = c.name(), "{e}");
                    false
                }
            })
            .collect();

        if options.discovery || options.discovery_only {
            let mut scratch = self.scratch();
            for (command, ok) in commands.iter_mut().zip(&valid) {
                if !ok {
                    continue;
                }
                if let Err(e) = command.run_command(&mut scratch, CommandPhase::Discovery) {
                    tracing::warn!(command = command.name(), "discovery: {e}");
                }
                let labels = register_discovery(&mut scratch, command.discovery_objects());
                summary.discovered.extend(labels);
            }
            if options.discovery_only {
                for (command, ok) in commands.iter().zip(&valid) {
                    summary.outcomes.push(CommandOutcome {
                        command: command.name().to_string(),
                        state: if *ok { OutcomeState::NotRun } else { OutcomeState::InvalidParameters },
                        message: None,
                    });
                }
                return summary;
            }
        }

        let mut halted = false;
        for (command, ok) in commands.iter_mut().zip(&valid) {
            let name = command.name();
            if halted {
                summary.outcomes.push(CommandOutcome {
                    command: name.to_string(),
                    state: OutcomeState::NotRun,
                    message: None,
                });
                continue;
            }
            let outcome = if *ok {
                tracing::info!(command = name, "running command");
                outcome_of(name, command.run_command(self, CommandPhase::Run))
            } else {
                outcome_of(name, command.check_parameters())
            };
            if options.stop_on_failure
                && matches!(outcome.state, OutcomeState::Failure | OutcomeState::InvalidParameters)
            {
                tracing::error!(command = name, "stopping after failed command");
                halted = true;
            }
            summary.outcomes.push(outcome);
        }
        summary
    }
}
