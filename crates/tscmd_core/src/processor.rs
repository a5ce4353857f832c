//! Request/response protocol between commands and their processor, and an
//! in-memory processor implementation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::datetime::DateTime;
use crate::error::{ParseError, ProcessorError};
use crate::props::{expand_properties, PropValue};
use crate::table::DataTable;
use crate::timeseries::TimeSeries;

/// Which time series a command operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TsList {
    #[default]
    AllTs,
    AllMatchingTsid,
    FirstMatchingTsid,
    LastMatchingTsid,
}

impl TsList {
    pub const NAMES: [&'static str; 4] = [
        "AllTS",
        "AllMatchingTSID",
        "FirstMatchingTSID",
        "LastMatchingTSID",
    ];

    pub fn needs_tsid(&self) -> bool {
        !matches!(self, Self::AllTs)
    }
}

impl FromStr for TsList {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allts" => Ok(Self::AllTs),
            "allmatchingtsid" => Ok(Self::AllMatchingTsid),
            "firstmatchingtsid" => Ok(Self::FirstMatchingTsid),
            "lastmatchingtsid" => Ok(Self::LastMatchingTsid),
            _ => Err(ParseError::Conversion {
                value: s.to_string(),
                target: "TSList",
            }),
        }
    }
}

impl fmt::Display for TsList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idx = match self {
            Self::AllTs => 0,
            Self::AllMatchingTsid => 1,
            Self::FirstMatchingTsid => 2,
            Self::LastMatchingTsid => 3,
        };
        f.write_str(Self::NAMES[idx])
    }
}

/// Request sent by a command to its processor
#[derive(Debug, Clone)]
pub enum Request {
    GetTable { table_id: String },
    SetTable { table: DataTable },
    GetProperty { name: String },
    SetProperty { name: String, value: PropValue },
    GetTimeSeriesToProcess { ts_list: TsList, tsid: Option<String> },
    /// Resolve a date/time string, which may name a property
    DateTime { date_time: String },
    AppendTimeSeries { series: Vec<TimeSeries> },
    /// Expand `${Property}` references
    ExpandProperties { text: String },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetTable { .. } => "GetTable",
            Self::SetTable { .. } => "SetTable",
            Self::GetProperty { .. } => "GetProperty",
            Self::SetProperty { .. } => "SetProperty",
            Self::GetTimeSeriesToProcess { .. } => "GetTimeSeriesToProcess",
            Self::DateTime { .. } => "DateTime",
            Self::AppendTimeSeries { .. } => "AppendTimeSeries",
            Self::ExpandProperties { .. } => "ExpandProperties",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    Done,
    Table(DataTable),
    Property(PropValue),
    /// Matching series and their positions in the processor list
    TimeSeriesList {
        series: Vec<TimeSeries>,
        indices: Vec<usize>,
    },
    DateTime(DateTime),
    Text(String),
}

/// Host side of the command protocol.
///
/// Only `process_request` must be implemented; the helpers unwrap the
/// expected response variant.
pub trait CommandProcessor {
    fn process_request(&mut self, request: Request) -> Result<Response, ProcessorError>;

    fn get_table(&mut self, table_id: &str) -> Result<DataTable, ProcessorError> {
        match self.process_request(Request::GetTable {
            table_id: table_id.to_string(),
        })? {
            Response::Table(t) => Ok(t),
            _ => Err(ProcessorError::UnexpectedResponse("GetTable")),
        }
    }

    fn set_table(&mut self, table: DataTable) -> Result<(), ProcessorError> {
        self.process_request(Request::SetTable { table }).map(|_| ())
    }

    fn get_property(&mut self, name: &str) -> Result<PropValue, ProcessorError> {
        match self.process_request(Request::GetProperty {
            name: name.to_string(),
        })? {
            Response::Property(p) => Ok(p),
            _ => Err(ProcessorError::UnexpectedResponse("GetProperty")),
        }
    }

    fn set_property(&mut self, name: &str, value: PropValue) -> Result<(), ProcessorError> {
        self.process_request(Request::SetProperty {
            name: name.to_string(),
            value,
        })
        .map(|_| ())
    }

    fn get_time_series_to_process(
        &mut self,
        ts_list: TsList,
        tsid: Option<&str>,
    ) -> Result<(Vec<TimeSeries>, Vec<usize>), ProcessorError> {
        match self.process_request(Request::GetTimeSeriesToProcess {
            ts_list,
            tsid: tsid.map(str::to_string),
        })? {
            Response::TimeSeriesList { series, indices } => Ok((series, indices)),
            _ => Err(ProcessorError::UnexpectedResponse("GetTimeSeriesToProcess")),
        }
    }

    fn resolve_datetime(&mut self, date_time: &str) -> Result<DateTime, ProcessorError> {
        match self.process_request(Request::DateTime {
            date_time: date_time.to_string(),
        })? {
            Response::DateTime(dt) => Ok(dt),
            _ => Err(ProcessorError::UnexpectedResponse("DateTime")),
        }
    }

    fn append_time_series(&mut self, series: Vec<TimeSeries>) -> Result<(), ProcessorError> {
        self.process_request(Request::AppendTimeSeries { series })
            .map(|_| ())
    }

    fn expand_properties(&mut self, text: &str) -> Result<String, ProcessorError> {
        match self.process_request(Request::ExpandProperties {
            text: text.to_string(),
        })? {
            Response::Text(t) => Ok(t),
            _ => Err(ProcessorError::UnexpectedResponse("ExpandProperties")),
        }
    }
}

/// Processor that keeps tables, time series and properties in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProcessor {
    tables: Vec<DataTable>,
    time_series: Vec<TimeSeries>,
    properties: HashMap<String, PropValue>,
}

impl MemoryProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn tables(&self) -> &[DataTable] {
        &self.tables
    }

    /// Table by ID, case-insensitive
    pub fn table(&self, table_id: &str) -> Option<&DataTable> {
        self.tables
            .iter()
            .find(|t| t.id().eq_ignore_ascii_case(table_id))
    }

    pub fn time_series(&self) -> &[TimeSeries] {
        &self.time_series
    }

    pub fn properties(&self) -> &HashMap<String, PropValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.properties.get(name)
    }

    /// Fresh processor sharing only the properties, used for discovery passes
    pub fn scratch(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            ..Default::default()
        }
    }

    fn select_time_series(
        &self,
        ts_list: TsList,
        tsid: Option<&str>,
    ) -> Result<(Vec<TimeSeries>, Vec<usize>), ProcessorError> {
        let pattern = tsid.unwrap_or("*");
        let matching: Vec<usize> = self
            .time_series
            .iter()
            .enumerate()
            .filter(|(_, ts)| {
                ts_list == TsList::AllTs
                    || ts.ident.matches(pattern)
                    || ts.alias.eq_ignore_ascii_case(pattern)
            })
            .map(|(i, _)| i)
            .collect();
        let indices = match ts_list {
            TsList::AllTs | TsList::AllMatchingTsid => matching,
            TsList::FirstMatchingTsid => matching.first().copied().into_iter().collect(),
            TsList::LastMatchingTsid => matching.last().copied().into_iter().collect(),
        };
        if indices.is_empty() {
            return Err(ProcessorError::NoTimeSeries(format!(
                "TSList={ts_list} TSID={pattern}"
            )));
        }
        let series = indices.iter().map(|i| self.time_series[*i].clone()).collect();
        Ok((series, indices))
    }

    fn resolve_datetime_text(&self, text: &str) -> Result<DateTime, ProcessorError> {
        let expanded = expand_properties(text.trim(), &self.properties);
        let name = expanded
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(&expanded);
        if let Some(value) = self.properties.get(name) {
            return match value {
                PropValue::DateTime(dt) => Ok(*dt),
                other => DateTime::parse(&other.to_string())
                    .map_err(|_| ProcessorError::InvalidDateTime(text.to_string())),
            };
        }
        DateTime::parse(&expanded).map_err(|_| ProcessorError::InvalidDateTime(text.to_string()))
    }
}

impl CommandProcessor for MemoryProcessor {
    fn process_request(&mut self, request: Request) -> Result<Response, ProcessorError> {
        crate::tscmd_log_debug!(request = request.name(), "processing request");
        match request {
            Request::GetTable { table_id } => self
                .table(&table_id)
                .cloned()
                .map(Response::Table)
                .ok_or(ProcessorError::TableNotFound(table_id)),
            Request::SetTable { table } => {
                match self
                    .tables
                    .iter_mut()
                    .find(|t| t.id().eq_ignore_ascii_case(table.id()))
                {
                    Some(existing) => *existing = table,
                    None => self.tables.push(table),
                }
                Ok(Response::Done)
            }
            Request::GetProperty { name } => self
                .properties
                .get(&name)
                .cloned()
                .map(Response::Property)
                .ok_or(ProcessorError::PropertyNotFound(name)),
            Request::SetProperty { name, value } => {
                self.properties.insert(name, value);
                Ok(Response::Done)
            }
            Request::GetTimeSeriesToProcess { ts_list, tsid } => {
                let (series, indices) = self.select_time_series(ts_list, tsid.as_deref())?;
                Ok(Response::TimeSeriesList { series, indices })
            }
            Request::DateTime { date_time } => {
                self.resolve_datetime_text(&date_time).map(Response::DateTime)
            }
            Request::AppendTimeSeries { series } => {
                self.time_series.extend(series);
                Ok(Response::Done)
            }
            Request::ExpandProperties { text } => {
                Ok(Response::Text(expand_properties(&text, &self.properties)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::TsIdent;

    fn ts(id: &str) -> TimeSeries {
        TimeSeries::new(id.parse::<TsIdent>().unwrap())
    }

    #[test]
    fn tables_are_replaced_by_id() {
        let mut p = MemoryProcessor::new();
        p.set_table(DataTable::new("T1")).unwrap();
        p.set_table(DataTable::new("t1")).unwrap();
        assert_eq!(p.tables().len(), 1);
        assert!(p.get_table("T1").is_ok());
        assert_eq!(
            p.get_table("nope").unwrap_err(),
            ProcessorError::TableNotFound("nope".to_string())
        );
    }

    #[test]
    fn time_series_selection() {
        let mut p = MemoryProcessor::new();
        p.append_time_series(vec![
            ts("A.S.Flow.Day"),
            ts("B.S.Flow.Day"),
            ts("A.S.Stage.Day"),
        ])
        .unwrap();
        let (all, _) = p.get_time_series_to_process(TsList::AllTs, None).unwrap();
        assert_eq!(all.len(), 3);
        let (_, idx) = p
            .get_time_series_to_process(TsList::AllMatchingTsid, Some("*.Flow.*"))
            .unwrap();
        assert_eq!(idx, vec![0, 1]);
        let (last, idx) = p
            .get_time_series_to_process(TsList::LastMatchingTsid, Some("A.*"))
            .unwrap();
        assert_eq!(idx, vec![2]);
        assert_eq!(last[0].ident.data_type, "Stage");
        assert!(p
            .get_time_series_to_process(TsList::AllMatchingTsid, Some("Z.*"))
            .is_err());
    }

    #[test]
    fn datetime_request_resolves_properties() {
        let start = DateTime::parse("2020-01-01").unwrap();
        let mut p = MemoryProcessor::new()
            .with_property("OutputStart", PropValue::DateTime(start))
            .with_property("EndText", PropValue::Text("2020-12".to_string()));
        assert_eq!(p.resolve_datetime("OutputStart").unwrap(), start);
        assert_eq!(p.resolve_datetime("${OutputStart}").unwrap(), start);
        assert_eq!(p.resolve_datetime("EndText").unwrap().to_string(), "2020-12");
        assert_eq!(p.resolve_datetime("2021-05-06").unwrap().to_string(), "2021-05-06");
        assert!(p.resolve_datetime("whenever").is_err());
    }

    #[test]
    fn scratch_keeps_only_properties() {
        let mut p = MemoryProcessor::new().with_property("X", PropValue::Integer(1));
        p.set_table(DataTable::new("T")).unwrap();
        let s = p.scratch();
        assert!(s.tables().is_empty());
        assert_eq!(s.property("X"), Some(&PropValue::Integer(1)));
    }
}
