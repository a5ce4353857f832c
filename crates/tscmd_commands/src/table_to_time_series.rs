//! TableToTimeSeries: create time series from table columns.
//!
//! Each record supplies a date/time and one value per value column. One
//! series is created per (location, value column) pair, where the location
//! comes from a location column or from the LocationID list.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use tscmd_core::{
    finish_phase, Command, CommandError, CommandPhase, CommandProcessor, CommandResult,
    CommandStatus, DataTable, DateTime, DiscoveryObject, FieldValue, ParameterCheck,
    ProblemCounter, PropList, Severity, TimeInterval, TimeSeries, TsIdent,
};

use crate::common::fail;

const NAME: &str = "TableToTimeSeries";

const PARAMETERS: &[&str] = &[
    "TableID",
    "DateTimeColumn",
    "ValueColumn",
    "Interval",
    "LocationColumn",
    "LocationID",
    "FlagColumn",
    "DataSource",
    "DataType",
    "Units",
    "MissingValue",
    "Alias",
    "InputStart",
    "InputEnd",
    "HandleDuplicatesHow",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Duplicates {
    Add,
    UseFirst,
    UseLast,
}

#[derive(Debug, Clone)]
enum Locations {
    Column(String),
    /// One ID, or one per value column
    Ids(Vec<String>),
}

#[derive(Debug, Clone)]
struct Params {
    table_id: String,
    datetime_column: String,
    value_columns: Vec<String>,
    interval: TimeInterval,
    locations: Locations,
    flag_columns: Vec<String>,
    data_source: String,
    data_types: Vec<String>,
    units: String,
    missing_values: Vec<String>,
    alias: Option<String>,
    input_start: Option<String>,
    input_end: Option<String>,
    duplicates: Duplicates,
}

impl Params {
    fn data_type(&self, value_column: usize) -> &str {
        match self.data_types.len() {
            0 => &self.value_columns[value_column],
            1 => &self.data_types[0],
            _ => &self.data_types[value_column],
        }
    }

    fn new_series(&self, location: &str, value_column: usize) -> TimeSeries {
        let ident = TsIdent::new(location, &self.data_source, self.data_type(value_column), self.interval);
        let mut ts = TimeSeries::new(ident);
        ts.units = self.units.clone();
        ts.description = format!("{location} {}", self.value_columns[value_column]);
        if let Some(format) = &self.alias {
            ts.alias = format
                .replace("%L", location)
                .replace("%S", &self.data_source)
                .replace("%T", self.data_type(value_column))
                .replace("%I", &self.interval.to_string());
        }
        ts
    }

    fn is_missing_token(&self, text: &str) -> bool {
        let text = text.trim();
        text.is_empty()
            || self.missing_values.iter().any(|m| {
                m == text || matches!((m.parse::<f64>(), text.parse::<f64>()), (Ok(a), Ok(b)) if a == b)
            })
    }
}

/// Accumulates series in creation order
struct SeriesSet<'p> {
    params: &'p Params,
    series: Vec<TimeSeries>,
    index: HashMap<(String, usize), usize>,
    set: HashSet<(usize, NaiveDateTime)>,
}

impl<'p> SeriesSet<'p> {
    fn new(params: &'p Params) -> Self {
        Self {
            params,
            series: Vec::new(),
            index: HashMap::new(),
            set: HashSet::new(),
        }
    }

    fn series_for(&mut self, location: &str, value_column: usize) -> usize {
        let key = (location.to_string(), value_column);
        if let Some(i) = self.index.get(&key) {
            return *i;
        }
        self.series.push(self.params.new_series(location, value_column));
        let i = self.series.len() - 1;
        self.index.insert(key, i);
        i
    }

    /// Store a value; `None` is missing
    fn set_value(&mut self, series: usize, dt: &DateTime, value: Option<f64>, flag: Option<String>) {
        let ts = &mut self.series[series];
        let key = dt.with_precision(ts.precision()).value();
        let seen = !self.set.insert((series, key));
        let value = match (seen, self.params.duplicates) {
            (false, _) | (true, Duplicates::UseLast) => value,
            (true, Duplicates::UseFirst) => return,
            (true, Duplicates::Add) => match (ts.get(dt), value) {
                (Some(a), Some(b)) => Some(a + b),
                (a, b) => b.or(a),
            },
        };
        let value = value.unwrap_or(ts.missing);
        ts.set_value_with_flag(dt, value, flag);
    }
}

pub struct TableToTimeSeries {
    props: PropList,
    status: CommandStatus,
    params: Option<Params>,
    discovered: Vec<DiscoveryObject>,
}

impl TableToTimeSeries {
    pub fn new(props: PropList) -> Self {
        Self {
            props,
            status: CommandStatus::new(NAME),
            params: None,
            discovered: Vec::new(),
        }
    }

    fn params(&mut self) -> CommandResult<Params> {
        if self.params.is_none() {
            self.check_parameters()?;
        }
        self.params
            .clone()
            .ok_or_else(|| CommandError::failure(NAME, "parameters have not been checked"))
    }

    fn resolve_period(
        &mut self,
        processor: &mut dyn CommandProcessor,
        params: &Params,
        phase: CommandPhase,
    ) -> CommandResult<(Option<DateTime>, Option<DateTime>)> {
        let mut resolve = |text: &Option<String>, name: &str| -> CommandResult<Option<DateTime>> {
            let Some(text) = text else {
                return Ok(None);
            };
            processor.resolve_datetime(text).map(Some).map_err(|e| {
                fail(
                    &mut self.status,
                    NAME,
                    phase,
                    format!("{name} \"{text}\" is invalid: {e}"),
                    format!("Specify {name} as a date/time or a property name."),
                )
            })
        };
        let start = resolve(&params.input_start, "InputStart")?;
        let end = resolve(&params.input_end, "InputEnd")?;
        Ok((start, end))
    }

    fn discover(&mut self, processor: &mut dyn CommandProcessor, params: &Params) {
        let mut set = SeriesSet::new(params);
        match &params.locations {
            Locations::Ids(ids) => {
                for k in 0..params.value_columns.len() {
                    set.series_for(location_id(ids, k), k);
                }
            }
            Locations::Column(column) => {
                // the table may only be known once it is read
                if let Ok(table) = processor.get_table(&params.table_id) {
                    if let Ok(col) = table.require_field(column) {
                        for value in table.column(col) {
                            let location = value.to_string();
                            if location.trim().is_empty() {
                                continue;
                            }
                            for k in 0..params.value_columns.len() {
                                set.series_for(location.trim(), k);
                            }
                        }
                    }
                }
            }
        }
        self.discovered = set.series.into_iter().map(DiscoveryObject::TimeSeries).collect();
    }
}

fn location_id(ids: &[String], value_column: usize) -> &str {
    ids.get(value_column).or_else(|| ids.first()).map(String::as_str).unwrap_or("")
}

/// Date/time of a record cell, truncated to `interval` precision
fn record_datetime(value: &FieldValue, interval: TimeInterval) -> Result<Option<DateTime>, String> {
    let dt = match value {
        FieldValue::Null => return Ok(None),
        FieldValue::DateTime(dt) => *dt,
        FieldValue::Text(s) if s.trim().is_empty() => return Ok(None),
        FieldValue::Text(s) => DateTime::parse(s).map_err(|e| e.to_string())?,
        FieldValue::Integer(year) => i32::try_from(*year)
            .ok()
            .and_then(DateTime::from_year)
            .ok_or_else(|| format!("{year} is not a valid year"))?,
        other => return Err(format!("\"{other}\" is not a date/time")),
    };
    Ok(Some(match interval.precision() {
        Some(precision) => dt.with_precision(precision),
        None => dt,
    }))
}

impl Command for TableToTimeSeries {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> &PropList {
        &self.props
    }

    fn status(&self) -> &CommandStatus {
        &self.status
    }

    fn check_parameters(&mut self) -> CommandResult<()> {
        self.params = None;
        let props = &self.props;
        let mut check = ParameterCheck::new(props);
        check.allowed(PARAMETERS);
        let table_id = check.require("TableID");
        let datetime_column = check.require("DateTimeColumn");
        check.require("ValueColumn");
        let value_columns = props.get_list("ValueColumn");
        let interval = check.require("Interval").and_then(|text| match text.parse::<TimeInterval>() {
            Ok(interval) => Some(interval),
            Err(e) => {
                check.problem(
                    format!("The Interval \"{text}\" is invalid: {e}"),
                    "Specify an interval such as Day, 6Hour, Month or Irregular.",
                );
                None
            }
        });

        let count = value_columns.len();
        let parallel = |check: &mut ParameterCheck<'_>, key: &str, list: &[String], single_ok: bool| {
            let ok = list.is_empty() || list.len() == count || (single_ok && list.len() == 1);
            if !ok {
                check.problem(
                    format!("{key} has {} values but there are {count} value columns", list.len()),
                    format!("Specify one {key} per value column."),
                );
            }
        };

        let location_ids = props.get_list("LocationID");
        let locations = match (props.get("LocationColumn"), location_ids.is_empty()) {
            (Some(_), false) => {
                check.problem(
                    "LocationColumn and LocationID cannot both be specified",
                    "Specify only one of LocationColumn and LocationID.",
                );
                None
            }
            (Some(column), true) => Some(Locations::Column(column.to_string())),
            (None, false) => {
                parallel(&mut check, "LocationID", &location_ids, true);
                Some(Locations::Ids(location_ids))
            }
            (None, true) => {
                check.problem(
                    "LocationColumn or LocationID must be specified",
                    "Specify the location column or the location identifiers.",
                );
                None
            }
        };
        let flag_columns = props.get_list("FlagColumn");
        parallel(&mut check, "FlagColumn", &flag_columns, false);
        let data_types = props.get_list("DataType");
        parallel(&mut check, "DataType", &data_types, true);
        let duplicates = match check.choice("HandleDuplicatesHow", &["Add", "UseFirst", "UseLast"]) {
            Some("Add") => Duplicates::Add,
            Some("UseFirst") => Duplicates::UseFirst,
            _ => Duplicates::UseLast,
        };
        for key in ["InputStart", "InputEnd"] {
            if let Some(text) = props.get(key) {
                let property_like = text.contains("${") || !text.starts_with(|c: char| c.is_ascii_digit());
                if !property_like && DateTime::parse(text).is_err() {
                    check.problem(
                        format!("The {key} \"{text}\" is not a valid date/time"),
                        format!("Specify {key} as YYYY-MM-DD, a longer date/time, or a property."),
                    );
                }
            }
        }

        let params = match (table_id, datetime_column, interval, locations) {
            (Some(table_id), Some(datetime_column), Some(interval), Some(locations)) if count > 0 => {
                Some(Params {
                    table_id: table_id.to_string(),
                    datetime_column: datetime_column.to_string(),
                    value_columns,
                    interval,
                    locations,
                    flag_columns,
                    data_source: props.get("DataSource").unwrap_or_default().to_string(),
                    data_types,
                    units: props.get("Units").unwrap_or_default().to_string(),
                    missing_values: props.get_list("MissingValue"),
                    alias: props.get("Alias").map(str::to_string),
                    input_start: props.get("InputStart").map(str::to_string),
                    input_end: props.get("InputEnd").map(str::to_string),
                    duplicates,
                })
            }
            _ => None,
        };
        check.finish(NAME, &mut self.status)?;
        self.params = params;
        Ok(())
    }

    fn run_command(
        &mut self,
        processor: &mut dyn CommandProcessor,
        phase: CommandPhase,
    ) -> CommandResult<()> {
        self.status.clear(phase);
        let params = self.params()?;

        if phase == CommandPhase::Discovery {
            self.discover(processor, &params);
            return Ok(());
        }

        let table = processor.get_table(&params.table_id).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("Unable to get table \"{}\": {e}", params.table_id),
                "Verify that a table exists with the requested ID.",
            )
        })?;
        let columns = Columns::resolve(&table, &params).map_err(|e| {
            fail(
                &mut self.status,
                NAME,
                phase,
                format!("Table \"{}\": {e}", params.table_id),
                "Check the column parameters against the table columns.",
            )
        })?;
        let (input_start, input_end) = self.resolve_period(processor, &params, phase)?;

        let mut problems = ProblemCounter::default();
        let mut set = SeriesSet::new(&params);
        for (row, record) in table.records().iter().enumerate() {
            let dt = match record_datetime(&record[columns.datetime], params.interval) {
                Ok(Some(dt)) => dt,
                Ok(None) => {
                    problems.record(
                        &mut self.status,
                        phase,
                        Severity::Warning,
                        format!("Row {}: the date/time is empty", row + 1),
                        "Check the date/time column.",
                    );
                    continue;
                }
                Err(e) => {
                    problems.record(
                        &mut self.status,
                        phase,
                        Severity::Warning,
                        format!("Row {}: {e}", row + 1),
                        "Check the date/time column.",
                    );
                    continue;
                }
            };
            if input_start.is_some_and(|s| dt < s) || input_end.is_some_and(|e| dt > e) {
                continue;
            }
            let location = match (&params.locations, columns.location) {
                (Locations::Column(_), Some(col)) => {
                    let text = record[col].to_string();
                    if text.trim().is_empty() {
                        problems.record(
                            &mut self.status,
                            phase,
                            Severity::Warning,
                            format!("Row {}: the location is empty", row + 1),
                            "Check the location column.",
                        );
                        continue;
                    }
                    Some(text.trim().to_string())
                }
                _ => None,
            };
            for (k, &col) in columns.values.iter().enumerate() {
                let location = match (&location, &params.locations) {
                    (Some(l), _) => l.as_str(),
                    (None, Locations::Ids(ids)) => location_id(ids, k),
                    (None, Locations::Column(_)) => continue,
                };
                let value = match parse_value(&record[col], &params) {
                    Ok(v) => v,
                    Err(text) => {
                        problems.record(
                            &mut self.status,
                            phase,
                            Severity::Warning,
                            format!(
                                "Row {} column \"{}\": \"{text}\" is not a number",
                                row + 1,
                                params.value_columns[k]
                            ),
                            "Check the value column or add the token to MissingValue.",
                        );
                        None
                    }
                };
                let flag = columns
                    .flags
                    .get(k)
                    .map(|&c| record[c].to_string())
                    .filter(|f| !f.trim().is_empty());
                let series = set.series_for(location, k);
                set.set_value(series, &dt, value, flag);
            }
        }
        problems.finish(&mut self.status, phase);

        let mut series = set.series;
        for ts in &mut series {
            ts.set_period(input_start, input_end);
        }
        tracing::info!(
            command = NAME,
            table = %params.table_id,
            series = series.len(),
            "created time series from table"
        );
        processor.append_time_series(series)?;
        finish_phase(NAME, &self.status, phase)
    }

    fn discovery_objects(&self) -> Vec<DiscoveryObject> {
        self.discovered.clone()
    }
}

/// Resolved column indices
struct Columns {
    datetime: usize,
    values: Vec<usize>,
    flags: Vec<usize>,
    location: Option<usize>,
}

impl Columns {
    fn resolve(table: &DataTable, params: &Params) -> Result<Self, tscmd_core::TableError> {
        let lookup = |names: &[String]| -> Result<Vec<usize>, tscmd_core::TableError> {
            names.iter().map(|n| table.require_field(n)).collect()
        };
        Ok(Self {
            datetime: table.require_field(&params.datetime_column)?,
            values: lookup(&params.value_columns)?,
            flags: lookup(&params.flag_columns)?,
            location: match &params.locations {
                Locations::Column(name) => Some(table.require_field(name)?),
                Locations::Ids(_) => None,
            },
        })
    }
}

/// Numeric value of a cell; `Ok(None)` for missing, `Err(text)` if unparseable
fn parse_value(value: &FieldValue, params: &Params) -> Result<Option<f64>, String> {
    if value.is_null() {
        return Ok(None);
    }
    let text = value.to_string();
    if params.is_missing_token(&text) {
        return Ok(None);
    }
    match value.as_f64() {
        Some(v) => Ok(Some(v)),
        None => Err(text),
    }
}
