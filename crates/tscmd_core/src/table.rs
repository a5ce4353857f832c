//! In-memory data table: named, typed fields and rows of [`FieldValue`].

use tabled::builder::Builder;
use tabled::settings::Style;

use crate::error::TableError;
use crate::value::{FieldType, FieldValue};

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct TableField {
    pub name: String,
    pub field_type: FieldType,
    /// Digits after the decimal point when formatting doubles
    pub precision: Option<usize>,
    pub description: String,
}

impl TableField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            precision: None,
            description: String::new(),
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }
}

/// Table identified by `id`. Every record holds exactly one value per field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTable {
    id: String,
    fields: Vec<TableField>,
    records: Vec<Vec<FieldValue>>,
}

impl DataTable {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn fields(&self) -> &[TableField] {
        &self.fields
    }

    pub fn field(&self, column: usize) -> Option<&TableField> {
        self.fields.get(column)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn records(&self) -> &[Vec<FieldValue>] {
        &self.records
    }

    /// Append a field; existing records get a null value for it.
    pub fn add_field(&mut self, field: TableField) -> Result<usize, TableError> {
        if self.field_index(&field.name).is_some() {
            return Err(TableError::DuplicateField(field.name));
        }
        self.fields.push(field);
        for record in &mut self.records {
            record.push(FieldValue::Null);
        }
        Ok(self.fields.len() - 1)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_index_ignore_case(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Exact match first, then case-insensitive
    pub fn require_field(&self, name: &str) -> Result<usize, TableError> {
        self.field_index(name)
            .or_else(|| self.field_index_ignore_case(name))
            .ok_or_else(|| TableError::FieldNotFound(name.to_string()))
    }

    pub fn add_record(&mut self, record: Vec<FieldValue>) -> Result<usize, TableError> {
        if record.len() != self.fields.len() {
            return Err(TableError::RecordLength {
                expected: self.fields.len(),
                actual: record.len(),
            });
        }
        self.records.push(record);
        Ok(self.records.len() - 1)
    }

    /// Append a record of nulls and return its row index
    pub fn push_empty_record(&mut self) -> usize {
        self.records.push(vec![FieldValue::Null; self.fields.len()]);
        self.records.len() - 1
    }

    pub fn value(&self, row: usize, column: usize) -> Result<&FieldValue, TableError> {
        self.check_cell(row, column)?;
        Ok(&self.records[row][column])
    }

    pub fn set_value(
        &mut self,
        row: usize,
        column: usize,
        value: FieldValue,
    ) -> Result<(), TableError> {
        self.check_cell(row, column)?;
        self.records[row][column] = value;
        Ok(())
    }

    /// Values of one column, top to bottom
    pub fn column(&self, column: usize) -> impl Iterator<Item = &FieldValue> + '_ {
        self.records.iter().filter_map(move |r| r.get(column))
    }

    /// Change a field's type, converting its values. Values that cannot be
    /// converted become null; the number of such values is returned.
    pub fn change_field_type(
        &mut self,
        column: usize,
        field_type: FieldType,
    ) -> Result<usize, TableError> {
        let count = self.fields.len();
        let field = self
            .fields
            .get_mut(column)
            .ok_or(TableError::ColumnOutOfRange { column, count })?;
        field.field_type = field_type;
        let mut lost = 0;
        for record in &mut self.records {
            let cell = &mut record[column];
            match cell.convert_to(field_type) {
                Ok(v) => *cell = v,
                Err(_) => {
                    *cell = FieldValue::Null;
                    lost += 1;
                }
            }
        }
        Ok(lost)
    }

    /// Cell text honouring the field precision
    pub fn format_value(&self, row: usize, column: usize) -> Result<String, TableError> {
        let value = self.value(row, column)?;
        Ok(value.format(self.fields[column].precision))
    }

    /// Render for terminal display
    pub fn to_pretty_string(&self) -> String {
        if self.fields.is_empty() {
            return format!("{} (empty table)", self.id);
        }
        let mut builder = Builder::default();
        builder.push_record(self.fields.iter().map(|f| f.name.clone()));
        for row in 0..self.records.len() {
            builder.push_record(
                (0..self.fields.len()).map(|col| self.format_value(row, col).unwrap_or_default()),
            );
        }
        let mut table = builder.build();
        table.with(Style::rounded());
        format!("{}\n{}", self.id, table)
    }

    fn check_cell(&self, row: usize, column: usize) -> Result<(), TableError> {
        if row >= self.records.len() {
            return Err(TableError::RowOutOfRange {
                row,
                count: self.records.len(),
            });
        }
        if column >= self.fields.len() {
            return Err(TableError::ColumnOutOfRange {
                column,
                count: self.fields.len(),
            });
        }
        Ok(())
    }
}
