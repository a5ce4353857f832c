//! TimeSeriesToTable: copy time series into a table, one column per series.

use std::collections::BTreeSet;

use tscmd_core::{
    finish_phase, Command, CommandError, CommandPhase, CommandProcessor, CommandResult,
    CommandStatus, DataTable, DateTime, DiscoveryObject, FieldType, FieldValue, ParameterCheck,
    PropList, TableField, TimeSeries, TsList,
};

use crate::common::fail;

const NAME: &str = "TimeSeriesToTable";

const PARAMETERS: &[&str] = &[
    "TSList",
    "TSID",
    "TableID",
    "DateTimeColumn",
    "ValueColumn",
    "Precision",
    "OutputStart",
    "OutputEnd",
];

#[derive(Debug, Clone)]
struct Params {
    ts_list: TsList,
    tsid: Option<String>,
    table_id: String,
    datetime_column: String,
    value_column: String,
    precision: usize,
    output_start: Option<String>,
    output_end: Option<String>,
}

pub struct TimeSeriesToTable {
    props: PropList,
    status: CommandStatus,
    params: Option<Params>,
    discovered: Vec<DiscoveryObject>,
}

/// Column name for `ts` from a `%L_%T` style format
fn column_name(format: &str, ts: &TimeSeries) -> String {
    format
        .replace("%L", &ts.ident.location)
        .replace("%S", &ts.ident.data_source)
        .replace("%T", &ts.ident.data_type)
        .replace("%I", &ts.ident.interval.to_string())
        .replace("%A", &ts.alias)
}

/// Dates to output: every step for regular data, data dates otherwise
fn output_dates(series: &[TimeSeries], start: DateTime, end: DateTime) -> Vec<DateTime> {
    let Some(first) = series.first() else {
        return Vec::new();
    };
    let interval = first.interval();
    if !interval.is_regular() {
        let dates: BTreeSet<DateTime> = series
            .iter()
            .flat_map(|ts| ts.dates())
            .filter(|d| *d >= start && *d <= end)
            .collect();
        return dates.into_iter().collect();
    }
    let precision = first.precision();
    let mut dates = Vec::new();
    let mut dt = start.with_precision(precision);
    let end = end.with_precision(precision);
    while dt <= end {
        dates.push(dt);
        match interval.advance(&dt, 1) {
            Some(next) => dt = next,
            None => break,
        }
    }
    dates
}

impl TimeSeriesToTable {
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

    fn empty_table(params: &Params) -> DataTable {
        let mut table = DataTable::new(&params.table_id);
        let _ = table.add_field(TableField::new(&params.datetime_column, FieldType::DateTime));
        table
    }

    fn resolve(
        &mut self,
        processor: &mut dyn CommandProcessor,
        text: Option<&str>,
        name: &str,
        phase: CommandPhase,
    ) -> CommandResult<Option<DateTime>> {
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
    }
}

impl Command for TimeSeriesToTable {
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
        let ts_list = match check.choice("TSList", &TsList::NAMES).map(str::parse::<TsList>) {
            Some(Ok(list)) => list,
            _ => TsList::AllTs,
        };
        let tsid = props.get("TSID");
        if ts_list.needs_tsid() && tsid.is_none() {
            check.problem(
                format!("TSID must be specified when TSList={ts_list}"),
                "Specify a TSID pattern.",
            );
        }
        let precision = check.integer("Precision", 0);

        let params = table_id.map(|table_id| Params {
            ts_list,
            tsid: tsid.map(str::to_string),
            table_id: table_id.to_string(),
            datetime_column: props.get("DateTimeColumn").unwrap_or("DateTime").to_string(),
            value_column: props.get("ValueColumn").unwrap_or("%L_%T").to_string(),
            precision: precision.and_then(|p| usize::try_from(p).ok()).unwrap_or(4),
            output_start: props.get("OutputStart").map(str::to_string),
            output_end: props.get("OutputEnd").map(str::to_string),
        });
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
            self.discovered = vec![DiscoveryObject::Table(Self::empty_table(&params))];
            return Ok(());
        }

        let (series, _) = processor
            .get_time_series_to_process(params.ts_list, params.tsid.as_deref())
            .map_err(|e| {
                fail(
                    &mut self.status,
                    NAME,
                    phase,
                    format!("Unable to get time series to process: {e}"),
                    "Verify that the TSList and TSID parameters match time series.",
                )
            })?;
        if let Some(first) = series.first() {
            let interval = first.interval();
            if let Some(other) = series.iter().find(|ts| ts.interval() != interval) {
                return Err(fail(
                    &mut self.status,
                    NAME,
                    phase,
                    format!(
                        "Time series \"{}\" has interval {} but \"{}\" has {interval}",
                        other.name(),
                        other.interval(),
                        first.name()
                    ),
                    "Only time series with the same interval can be copied to one table.",
                ));
            }
        }

        let start = self.resolve(processor, params.output_start.as_deref(), "OutputStart", phase)?;
        let end = self.resolve(processor, params.output_end.as_deref(), "OutputEnd", phase)?;
        let periods: Vec<(DateTime, DateTime)> = series.iter().filter_map(TimeSeries::period).collect();
        let start = start.or_else(|| periods.iter().map(|p| p.0).min());
        let end = end.or_else(|| periods.iter().map(|p| p.1).max());

        let mut table = Self::empty_table(&params);
        for ts in &series {
            let mut name = column_name(&params.value_column, ts);
            let mut suffix = 2;
            while table.field_index(&name).is_some() {
                name = format!("{}_{suffix}", column_name(&params.value_column, ts));
                suffix += 1;
            }
            table.add_field(TableField::new(name, FieldType::Double).with_precision(params.precision))?;
        }
        if let (Some(start), Some(end)) = (start, end) {
            for dt in output_dates(&series, start, end) {
                let mut record = Vec::with_capacity(series.len() + 1);
                record.push(FieldValue::DateTime(dt));
                record.extend(
                    series
                        .iter()
                        .map(|ts| ts.get(&dt).map(FieldValue::Double).unwrap_or_default()),
                );
                table.add_record(record)?;
            }
        }
        tracing::info!(
            command = NAME,
            table = %params.table_id,
            series = series.len(),
            rows = table.row_count(),
            "copied time series to table"
        );
        processor.set_table(table)?;
        finish_phase(NAME, &self.status, phase)
    }

    fn discovery_objects(&self) -> Vec<DiscoveryObject> {
        self.discovered.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscmd_core::{MemoryProcessor, PropValue, TsIdent};

    fn day(text: &str) -> DateTime {
        DateTime::parse(text).unwrap()
    }

    fn series(id: &str, points: &[(&str, f64)]) -> TimeSeries {
        let mut ts = TimeSeries::new(id.parse::<TsIdent>().unwrap());
        for (date, value) in points {
            ts.set_value(&day(date), *value);
        }
        ts
    }

    fn processor() -> MemoryProcessor {
        let mut p = MemoryProcessor::new();
        p.append_time_series(vec![
            series("A.USGS.Flow.Day", &[("2020-01-01", 1.0), ("2020-01-03", 3.0)]),
            series("B.USGS.Flow.Day", &[("2020-01-02", 20.0), ("2020-01-04", 40.0)]),
        ])
        .unwrap();
        p
    }

    #[test]
    fn regular_series_fill_every_day() {
        let mut p = processor();
        let mut cmd = TimeSeriesToTable::new(PropList::new().with("TableID", "Flows"));
        cmd.run_command(&mut p, CommandPhase::Run).unwrap();
        let table = p.table("Flows").unwrap();
        assert_eq!(table.field_names(), vec!["DateTime", "A_Flow", "B_Flow"]);
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.value(1, 0).unwrap().to_string(), "2020-01-02");
        assert_eq!(table.value(1, 1).unwrap(), &FieldValue::Null);
        assert_eq!(table.value(3, 2).unwrap(), &FieldValue::Double(40.0));
        assert_eq!(table.fields()[1].precision, Some(4));
    }

    #[test]
    fn output_period_and_selection() {
        let mut p = processor().with_property("End", PropValue::Text("2020-01-02".into()));
        let mut cmd = TimeSeriesToTable::new(
            PropList::new()
                .with("TableID", "Flows")
                .with("TSList", "AllMatchingTSID")
                .with("TSID", "B.*")
                .with("ValueColumn", "%L %I")
                .with("OutputStart", "2020-01-01")
                .with("OutputEnd", "End"),
        );
        cmd.check_parameters().unwrap();
        cmd.run_command(&mut p, CommandPhase::Run).unwrap();
        let table = p.table("Flows").unwrap();
        assert_eq!(table.field_names(), vec!["DateTime", "B Day"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn mixed_intervals_fail() {
        let mut p = processor();
        p.append_time_series(vec![series("C.USGS.Flow.Month", &[("2020-01", 1.0)])])
            .unwrap();
        let mut cmd = TimeSeriesToTable::new(PropList::new().with("TableID", "T"));
        let err = cmd.run_command(&mut p, CommandPhase::Run).unwrap_err();
        assert!(matches!(err, CommandError::Failure { .. }));
    }

    #[test]
    fn irregular_series_use_data_dates() {
        let mut p = MemoryProcessor::new();
        p.append_time_series(vec![
            series("X.S.T.Irregular", &[("2020-01-01 06:00", 1.0), ("2020-01-05 07:30", 2.0)]),
            series("Y.S.T.Irregular", &[("2020-01-01 06:00", 3.0)]),
        ])
        .unwrap();
        let mut cmd = TimeSeriesToTable::new(PropList::new().with("TableID", "T"));
        cmd.run_command(&mut p, CommandPhase::Run).unwrap();
        let table = p.table("T").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(1, 2).unwrap(), &FieldValue::Null);
    }

    #[test]
    fn tsid_required_for_matching_lists() {
        let mut cmd = TimeSeriesToTable::new(
            PropList::new()
                .with("TableID", "T")
                .with("TSList", "FirstMatchingTSID"),
        );
        assert!(cmd.check_parameters().is_err());
    }
}
