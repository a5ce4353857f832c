use tscmd_core::{
    finish_phase, Command, CommandPhase, CommandProcessor, CommandResult, CommandStatus,
    DataTable, DiscoveryObject, MemoryProcessor, OutcomeState, ParameterCheck, PropList,
    RunOptions, Severity,
};

/// Creates an empty table, optionally logging a warning or failure.
struct MakeTable {
    props: PropList,
    status: CommandStatus,
    discovered: Vec<DiscoveryObject>,
}

impl MakeTable {
    fn new(props: PropList) -> Box<dyn Command> {
        Box::new(Self {
            props,
            status: CommandStatus::new("MakeTable"),
            discovered: Vec::new(),
        })
    }
}

impl Command for MakeTable {
    fn name(&self) -> &'static str {
        "MakeTable"
    }

    fn parameters(&self) -> &PropList {
        &self.props
    }

    fn status(&self) -> &CommandStatus {
        &self.status
    }

    fn check_parameters(&mut self) -> CommandResult<()> {
        let mut check = ParameterCheck::new(&self.props);
        check.allowed(&["TableID", "Outcome"]);
        check.require("TableID");
        check.choice("Outcome", &["Ok", "Warn", "Fail"]);
        check.finish("MakeTable", &mut self.status)
    }

    fn run_command(
        &mut self,
        processor: &mut dyn CommandProcessor,
        phase: CommandPhase,
    ) -> CommandResult<()> {
        self.status.clear(phase);
        let id = self.props.get("TableID").unwrap_or_default().to_string();
        if phase == CommandPhase::Discovery {
            self.discovered = vec![DiscoveryObject::Table(DataTable::new(id))];
            return Ok(());
        }
        match self.props.get("Outcome") {
            Some("Warn") => self.status.log(phase, Severity::Warning, "careful", ""),
            Some("Fail") => self.status.log(phase, Severity::Failure, "broken", ""),
            _ => {}
        }
        processor.set_table(DataTable::new(id))?;
        finish_phase("MakeTable", &self.status, phase)
    }

    fn discovery_objects(&self) -> Vec<DiscoveryObject> {
        self.discovered.clone()
    }
}

fn cmd(pairs: &[(&str, &str)]) -> Box<dyn Command> {
    MakeTable::new(pairs.iter().copied().collect())
}

#[test]
fn runs_all_commands_and_reports_outcomes() {
    let mut processor = MemoryProcessor::new();
    let mut commands = vec![
        cmd(&[("TableID", "a")]),
        cmd(&[("TableID", "b"), ("Outcome", "Warn")]),
    ];
    let summary = processor.run_commands(&mut commands, RunOptions::default());
    assert_eq!(summary.count(OutcomeState::Success), 1);
    assert_eq!(summary.count(OutcomeState::Warning), 1);
    assert!(summary.is_success());
    assert_eq!(summary.discovered, vec!["table a", "table b"]);
    assert_eq!(processor.tables().len(), 2);
}

#[test]
fn stops_after_failure() {
    let mut processor = MemoryProcessor::new();
    let mut commands = vec![
        cmd(&[("TableID", "a"), ("Outcome", "Fail")]),
        cmd(&[("TableID", "b")]),
    ];
    let summary = processor.run_commands(&mut commands, RunOptions::default());
    assert_eq!(summary.outcomes[0].state, OutcomeState::Failure);
    assert_eq!(summary.outcomes[1].state, OutcomeState::NotRun);
    assert!(!summary.is_success());
    assert!(processor.table("b").is_none());
}

#[test]
fn invalid_parameters_are_reported_without_running() {
    let mut processor = MemoryProcessor::new();
    let mut commands = vec![cmd(&[("Outcome", "Maybe")]), cmd(&[("TableID", "b")])];
    let options = RunOptions {
        stop_on_failure: false,
        ..RunOptions::default()
    };
    let summary = processor.run_commands(&mut commands, options);
    assert_eq!(summary.outcomes[0].state, OutcomeState::InvalidParameters);
    assert_eq!(summary.outcomes[1].state, OutcomeState::Success);
    assert_eq!(
        commands[0].status().messages(CommandPhase::Initialization).len(),
        2
    );
}

#[test]
fn discovery_only_leaves_processor_untouched() {
    let mut processor = MemoryProcessor::new();
    let mut commands = vec![cmd(&[("TableID", "a")])];
    let options = RunOptions {
        discovery_only: true,
        ..RunOptions::default()
    };
    let summary = processor.run_commands(&mut commands, options);
    assert_eq!(summary.discovered, vec!["table a"]);
    assert_eq!(summary.outcomes[0].state, OutcomeState::NotRun);
    assert!(processor.tables().is_empty());
}
