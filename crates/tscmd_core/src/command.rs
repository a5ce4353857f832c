//! Command lifecycle: parameter check, discovery and run.

use crate::error::{CommandError, CommandResult};
use crate::processor::CommandProcessor;
use crate::props::PropList;
use crate::status::{CommandPhase, CommandStatus, Severity, StatusMessage};
use crate::table::DataTable;
use crate::timeseries::TimeSeries;

/// Placeholder produced in discovery mode so later commands can resolve IDs
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryObject {
    Table(DataTable),
    TimeSeries(TimeSeries),
}

impl DiscoveryObject {
    pub fn label(&self) -> String {
        match self {
            Self::Table(t) => format!("table {}", t.id()),
            Self::TimeSeries(ts) => format!("time series {}", ts.name()),
        }
    }
}

/// A command plugin invoked by a processor
pub trait Command {
    /// Command name as used in workflow files, e.g. `CompareTables`
    fn name(&self) -> &'static str;

    fn parameters(&self) -> &PropList;

    fn status(&self) -> &CommandStatus;

    /// Validate parameters. All problems are logged to the initialization
    /// status and returned together as [`CommandError::InvalidParameters`].
    fn check_parameters(&mut self) -> CommandResult<()>;

    /// Run in discovery or run phase
    fn run_command(
        &mut self,
        processor: &mut dyn CommandProcessor,
        phase: CommandPhase,
    ) -> CommandResult<()>;

    /// Objects created by the last discovery run
    fn discovery_objects(&self) -> Vec<DiscoveryObject> {
        Vec::new()
    }
}

/// Accumulates parameter problems so all of them are reported at once.
#[derive(Debug)]
pub struct ParameterCheck<'a> {
    props: &'a PropList,
    problems: Vec<StatusMessage>,
}

impl<'a> ParameterCheck<'a> {
    pub fn new(props: &'a PropList) -> Self {
        Self {
            props,
            problems: Vec::new(),
        }
    }

    pub fn problem(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        self.problems
            .push(StatusMessage::new(Severity::Failure, message, recommendation));
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Report parameters that are not in `valid`
    pub fn allowed(&mut self, valid: &[&str]) {
        let unknown: Vec<String> = self
            .props
            .keys()
            .filter(|k| !valid.contains(k))
            .map(str::to_string)
            .collect();
        for key in unknown {
            self.problem(
                format!("Parameter \"{key}\" is not recognized"),
                format!("Remove the parameter. Valid parameters are: {}", valid.join(", ")),
            );
        }
    }

    /// Required parameter; returns the value when present
    pub fn require(&mut self, key: &str) -> Option<&'a str> {
        let value = self.props.get(key);
        if value.is_none() {
            self.problem(
                format!("The {key} parameter must be specified"),
                format!("Specify the {key} parameter."),
            );
        }
        value
    }

    /// Optional parameter restricted to `choices` (case-insensitive)
    pub fn choice(&mut self, key: &str, choices: &[&'static str]) -> Option<&'static str> {
        let value = self.props.get(key)?;
        match choices.iter().find(|c| c.eq_ignore_ascii_case(value.trim())) {
            Some(c) => Some(*c),
            None => {
                self.problem(
                    format!("The {key} value \"{value}\" is invalid"),
                    format!("Specify {key} as one of: {}", choices.join(", ")),
                );
                None
            }
        }
    }

    pub fn boolean(&mut self, key: &str) -> Option<bool> {
        match self.props.get_bool(key)? {
            Ok(b) => Some(b),
            Err(value) => {
                self.problem(
                    format!("The {key} value \"{value}\" is invalid"),
                    format!("Specify {key} as True or False."),
                );
                None
            }
        }
    }

    /// Optional integer `>= min`
    pub fn integer(&mut self, key: &str, min: i64) -> Option<i64> {
        let value = self.props.get(key)?;
        match self.props.get_i64(key)? {
            Ok(n) if n >= min => Some(n),
            _ => {
                self.problem(
                    format!("The {key} value \"{value}\" is invalid"),
                    format!("Specify {key} as an integer >= {min}."),
                );
                None
            }
        }
    }

    /// Optional number `>= min`
    pub fn number(&mut self, key: &str, min: f64) -> Option<f64> {
        let value = self.props.get(key)?;
        match self.props.get_f64(key)? {
            Ok(n) if n >= min => Some(n),
            _ => {
                self.problem(
                    format!("The {key} value \"{value}\" is invalid"),
                    format!("Specify {key} as a number >= {min}."),
                );
                None
            }
        }
    }

    /// Log problems into `status` and fail if there were any
    pub fn finish(self, command: &str, status: &mut CommandStatus) -> CommandResult<()> {
        status.clear(CommandPhase::Initialization);
        if self.problems.is_empty() {
            return Ok(());
        }
        let message = self
            .problems
            .iter()
            .map(|p| format!("{} ({})", p.message, p.recommendation))
            .collect::<Vec<_>>()
            .join("\n");
        for problem in self.problems {
            status.add(CommandPhase::Initialization, problem);
        }
        Err(CommandError::InvalidParameters {
            command: command.to_string(),
            message,
        })
    }
}

/// Turn the problems logged in `phase` into the error the host sees.
pub fn finish_phase(command: &str, status: &CommandStatus, phase: CommandPhase) -> CommandResult<()> {
    let count = status.warning_count(phase);
    if count == 0 {
        return Ok(());
    }
    let messages = status.messages(phase);
    if let Some(failure) = messages.iter().find(|m| m.severity == Severity::Failure) {
        return Err(CommandError::failure(command, failure.message.clone()));
    }
    let first = messages
        .iter()
        .find(|m| m.severity == Severity::Warning)
        .map(|m| m.message.clone())
        .unwrap_or_default();
    Err(CommandError::Warnings {
        command: command.to_string(),
        count,
        message: first,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_all_problems() {
        let props = PropList::new()
            .with("Top", "-1")
            .with("Append", "maybe")
            .with("Bogus", "x");
        let mut check = ParameterCheck::new(&props);
        check.allowed(&["Top", "Append", "TableID"]);
        assert!(check.require("TableID").is_none());
        assert!(check.integer("Top", 1).is_none());
        assert!(check.boolean("Append").is_none());
        let mut status = CommandStatus::new("Test");
        let err = check.finish("Test", &mut status).unwrap_err();
        assert_eq!(status.messages(CommandPhase::Initialization).len(), 4);
        assert!(err.to_string().contains("Bogus"));
        assert!(err.to_string().contains("TableID"));
    }

    #[test]
    fn choice_is_case_insensitive() {
        let props = PropList::new().with("IfDifferent", "warn");
        let mut check = ParameterCheck::new(&props);
        assert_eq!(check.choice("IfDifferent", &["Ignore", "Warn", "Fail"]), Some("Warn"));
        assert!(!check.has_problems());
    }

    #[test]
    fn finish_phase_maps_severity() {
        let mut status = CommandStatus::new("Test");
        assert!(finish_phase("Test", &status, CommandPhase::Run).is_ok());
        status.log(CommandPhase::Run, Severity::Warning, "w", "");
        assert!(finish_phase("Test", &status, CommandPhase::Run).unwrap_err().is_warning());
        status.log(CommandPhase::Run, Severity::Failure, "f", "");
        let err = finish_phase("Test", &status, CommandPhase::Run).unwrap_err();
        assert!(matches!(err, CommandError::Failure { .. }));
    }
}
