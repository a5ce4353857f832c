//! Per-command status log.
//!
//! Each command keeps messages for the phase they were raised in so a host
//! can tell initialization (parameter) problems from discovery or run
//! problems. Every message is mirrored to `tracing`.

use std::fmt;

/// Lifecycle phase of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandPhase {
    Initialization,
    Discovery,
    Run,
}

impl fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initialization => "initialization",
            Self::Discovery => "discovery",
            Self::Run => "run",
        })
    }
}

/// Message severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Failure,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Failure => "FAILURE",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
}

impl StatusMessage {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }
}

/// Status messages of one command, kept per phase
#[derive(Debug, Clone, Default)]
pub struct CommandStatus {
    command: String,
    initialization: Vec<StatusMessage>,
    discovery: Vec<StatusMessage>,
    run: Vec<StatusMessage>,
}

impl CommandStatus {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, phase: CommandPhase, message: StatusMessage) {
        let command = self.command.as_str();
        match message.severity {
            Severity::Info => {
                tracing::info!(command, %phase, recommendation = %message.recommendation, "{}", message.message)
            }
            Severity::Warning => {
                tracing::warn!(command, %phase, recommendation = %message.recommendation, "{}", message.message)
            }
            Severity::Failure => {
                tracing::error!(command, %phase, recommendation = %message.recommendation, "{}", message.message)
            }
        }
        self.phase_mut(phase).push(message);
    }

    /// Shorthand for [`CommandStatus::add`]
    pub fn log(
        &mut self,
        phase: CommandPhase,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        self.add(phase, StatusMessage::new(severity, message, recommendation));
    }

    pub fn clear(&mut self, phase: CommandPhase) {
        self.phase_mut(phase).clear();
    }

    pub fn messages(&self, phase: CommandPhase) -> &[StatusMessage] {
        match phase {
            CommandPhase::Initialization => &self.initialization,
            CommandPhase::Discovery => &self.discovery,
            CommandPhase::Run => &self.run,
        }
    }

    /// Highest severity logged in `phase`, `None` if nothing was logged
    pub fn max_severity(&self, phase: CommandPhase) -> Option<Severity> {
        self.messages(phase).iter().map(|m| m.severity).max()
    }

    /// Highest severity over all phases
    pub fn overall_severity(&self) -> Option<Severity> {
        [
            CommandPhase::Initialization,
            CommandPhase::Discovery,
            CommandPhase::Run,
        ]
        .into_iter()
        .filter_map(|p| self.max_severity(p))
        .max()
    }

    /// Number of Warning or Failure messages in `phase`
    pub fn warning_count(&self, phase: CommandPhase) -> usize {
        self.messages(phase)
            .iter()
            .filter(|m| m.severity >= Severity::Warning)
            .count()
    }

    fn phase_mut(&mut self, phase: CommandPhase) -> &mut Vec<StatusMessage> {
        match phase {
            CommandPhase::Initialization => &mut self.initialization,
            CommandPhase::Discovery => &mut self.discovery,
            CommandPhase::Run => &mut self.run,
        }
    }
}

/// Default number of problem messages recorded per run
pub const DEFAULT_PROBLEM_LIMIT: usize = 50;

/// Counts problems during a run, recording only the first `limit` of them.
#[derive(Debug, Clone)]
pub struct ProblemCounter {
    limit: usize,
    count: usize,
}

impl Default for ProblemCounter {
    fn default() -> Self {
        Self::new(DEFAULT_PROBLEM_LIMIT)
    }
}

impl ProblemCounter {
    pub fn new(limit: usize) -> Self {
        Self { limit, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn record(
        &mut self,
        status: &mut CommandStatus,
        phase: CommandPhase,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        self.count += 1;
        if self.count <= self.limit {
            status.log(phase, severity, message, recommendation);
        } else {
            crate::tscmd_log_debug!(count = self.count, "problem message suppressed: {}", message.into());
        }
    }

    /// Count problems whose messages were already dropped upstream
    pub fn skip(&mut self, count: usize) {
        self.count += count;
    }

    /// Log a summary if messages were suppressed
    pub fn finish(&self, status: &mut CommandStatus, phase: CommandPhase) {
        if self.count > self.limit {
            status.log(
                phase,
                Severity::Warning,
                format!(
                    "{} problems total; only the first {} were listed",
                    self.count, self.limit
                ),
                "Check the input data and the log file for details.",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_per_phase() {
        let mut status = CommandStatus::new("Test");
        status.log(CommandPhase::Run, Severity::Info, "ok", "");
        status.log(CommandPhase::Run, Severity::Warning, "hmm", "look");
        status.log(CommandPhase::Initialization, Severity::Failure, "bad", "fix");
        assert_eq!(status.max_severity(CommandPhase::Run), Some(Severity::Warning));
        assert_eq!(status.max_severity(CommandPhase::Discovery), None);
        assert_eq!(status.overall_severity(), Some(Severity::Failure));
        assert_eq!(status.warning_count(CommandPhase::Run), 1);
        status.clear(CommandPhase::Run);
        assert!(status.messages(CommandPhase::Run).is_empty());
    }

    #[test]
    fn skipped_problems_are_summarized() {
        let mut status = CommandStatus::new("Test");
        let mut problems = ProblemCounter::new(2);
        problems.record(&mut status, CommandPhase::Run, Severity::Warning, "p0", "");
        problems.record(&mut status, CommandPhase::Run, Severity::Warning, "p1", "");
        problems.skip(5);
        problems.finish(&mut status, CommandPhase::Run);
        assert_eq!(problems.count(), 7);
        let messages = status.messages(CommandPhase::Run);
        assert_eq!(messages.len(), 3);
        assert!(messages[2].message.starts_with("7 problems total"));
    }

    #[test]
    fn problem_counter_bounds_messages() {
        let mut status = CommandStatus::new("Test");
        let mut problems = ProblemCounter::new(3);
        for i in 0..10 {
            problems.record(&mut status, CommandPhase::Run, Severity::Warning, format!("p{i}"), "");
        }
        problems.finish(&mut status, CommandPhase::Run);
        assert_eq!(problems.count(), 10);
        // three problems plus the summary
        assert_eq!(status.messages(CommandPhase::Run).len(), 4);
        assert!(status.messages(CommandPhase::Run)[3].message.starts_with("10 problems"));
    }
}
