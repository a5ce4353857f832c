//! tscmd core library
//!
//! Table and time series model, command lifecycle and the processor that
//! commands talk to. Command implementations live in `tscmd_commands`.

// Re-export commonly used types
pub use command::{finish_phase, Command, DiscoveryObject, ParameterCheck};
pub use datetime::{DateTime, DateTimePrecision};
pub use error::{CommandError, CommandResult, ParseError, ProcessorError, TableError};
pub use processor::{CommandProcessor, MemoryProcessor, Request, Response, TsList};
pub use props::{expand_properties, parse_bool, split_list, PropList, PropValue};
pub use runner::{CommandOutcome, OutcomeState, RunOptions, RunSummary};
pub use status::{CommandPhase, CommandStatus, ProblemCounter, Severity, StatusMessage};
pub use table::{DataTable, TableField};
pub use timeseries::{IntervalBase, TimeInterval, TimeSeries, TsIdent, TsValue};
pub use value::{FieldType, FieldValue};

pub mod command;
pub mod datetime;
pub mod error;
pub mod processor;
pub mod props;
pub mod runner;
pub mod status;
pub mod table;
pub mod timeseries;
pub mod value;

// Lightweight logging facade macros; debug output can be stripped in minimal builds
#[cfg(feature = "minimal-logging")]
#[macro_export]
macro_rules! tscmd_log_debug { ($($tt:tt)*) => { /* stripped in minimal build */ }; }
#[cfg(not(feature = "minimal-logging"))]
#[macro_export]
macro_rules! tscmd_log_debug { ($($tt:tt)*) => { tracing::debug!($($tt)*); }; }
