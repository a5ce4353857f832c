//! Error types shared by the table model, the processor and the commands.

/// Result type for command execution
pub type CommandResult<T> = Result<T, CommandError>;

/// Error raised by a command to its host.
///
/// `InvalidParameters` and `Warnings` carry an already formatted, multi-line
/// message; the individual problems are also available in the command status.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid parameters for {command}:\n{message}")]
    InvalidParameters { command: String, message: String },

    #[error("{count} warning(s) running {command}: {message}")]
    Warnings {
        command: String,
        count: usize,
        message: String,
    },

    #[error("{command} failed: {message}")]
    Failure { command: String, message: String },

    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl CommandError {
    pub fn failure(command: &str, message: impl Into<String>) -> Self {
        CommandError::Failure {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// True for errors that only report warnings; the host may keep going.
    pub fn is_warning(&self) -> bool {
        matches!(self, CommandError::Warnings { .. })
    }
}

/// Errors returned by a command processor request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessorError {
    #[error("Table \"{0}\" was not found")]
    TableNotFound(String),

    #[error("Property \"{0}\" is not defined")]
    PropertyNotFound(String),

    #[error("Unable to resolve date/time \"{0}\"")]
    InvalidDateTime(String),

    #[error("No time series matched {0}")]
    NoTimeSeries(String),

    #[error("Request {0} is not supported by this processor")]
    UnsupportedRequest(&'static str),

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

/// Errors from [`crate::table::DataTable`] manipulation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("Field \"{0}\" already exists")]
    DuplicateField(String),

    #[error("Field \"{0}\" was not found")]
    FieldNotFound(String),

    #[error("Record has {actual} values but the table has {expected} fields")]
    RecordLength { expected: usize, actual: usize },

    #[error("Row {row} is out of range (row count {count})")]
    RowOutOfRange { row: usize, count: usize },

    #[error("Column {column} is out of range (field count {count})")]
    ColumnOutOfRange { column: usize, count: usize },
}

/// Errors parsing values, date/times, intervals and identifiers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid date/time \"{0}\"")]
    DateTime(String),

    #[error("Invalid time interval \"{0}\"")]
    Interval(String),

    #[error("Invalid time series identifier \"{0}\"")]
    TsIdent(String),

    #[error("Cannot convert \"{value}\" to {target}")]
    Conversion { value: String, target: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_errors_are_flagged() {
        let err = CommandError::Warnings {
            command: "CompareTables".to_string(),
            count: 2,
            message: "differences found".to_string(),
        };
        assert!(err.is_warning());
        assert!(!CommandError::failure("CompareTables", "boom").is_warning());
    }

    #[test]
    fn processor_error_converts() {
        let err: CommandError = ProcessorError::TableNotFound("t1".to_string()).into();
        assert_eq!(err.to_string(), "Processor error: Table \"t1\" was not found");
    }
}
