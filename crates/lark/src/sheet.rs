//! Row layout: turns Lark value ranges into `ShipmentRecord`s and
//! `RowUpdate`s back into cell writes.

use serde_json::{json, Value};
use shiptrack_config::settings::{column_index, ColumnSettings, LarkSettings};
use shiptrack_recon::{RowUpdate, ShipmentId, ShipmentRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub letter: String,
    pub index: usize,
}

impl Column {
    pub fn parse(letter: &str) -> Option<Self> {
        Some(Self {
            index: column_index(letter)?,
            letter: letter.trim().to_ascii_uppercase(),
        })
    }
}

/// Where shipment fields live in a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    /// Data starts on the row after this one (1-indexed).
    pub header_row: u32,
    pub max_row: u32,
    pub recipient: Column,
    pub customer: Column,
    pub tracking: Column,
    pub carrier: Column,
    pub status: Column,
    pub delivery_date: Column,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 2,
            max_row: 500,
            recipient: Column { letter: "C".into(), index: 2 },
            customer: Column { letter: "E".into(), index: 4 },
            tracking: Column { letter: "G".into(), index: 6 },
            carrier: Column { letter: "H".into(), index: 7 },
            status: Column { letter: "M".into(), index: 12 },
            delivery_date: Column { letter: "Q".into(), index: 16 },
        }
    }
}

impl SheetLayout {
    /// `None` when a column letter is invalid. Validated settings never are.
    pub fn from_settings(lark: &LarkSettings, columns: &ColumnSettings) -> Option<Self> {
        Some(Self {
            header_row: lark.header_row,
            max_row: lark.max_row,
            recipient: Column::parse(&columns.recipient)?,
            customer: Column::parse(&columns.customer)?,
            tracking: Column::parse(&columns.tracking)?,
            carrier: Column::parse(&columns.carrier)?,
            status: Column::parse(&columns.status)?,
            delivery_date: Column::parse(&columns.delivery_date)?,
        })
    }

    pub fn first_data_row(&self) -> u32 {
        self.header_row + 1
    }

    fn last_column(&self) -> &Column {
        [
            &self.recipient,
            &self.customer,
            &self.tracking,
            &self.carrier,
            &self.status,
            &self.delivery_date,
        ]
        .into_iter()
        .max_by_key(|c| c.index)
        .unwrap_or(&self.delivery_date)
    }

    /// Read range for one tab: `{sheet_id}!A{first}:{last}{max}`.
    pub fn read_range(&self, sheet_id: &str) -> String {
        format!(
            "{sheet_id}!A{}:{}{}",
            self.first_data_row(),
            self.last_column().letter,
            self.max_row
        )
    }

    /// Build records from a value range that starts at `first_data_row`.
    /// Rows without a tracking number are skipped.
    pub fn parse_rows(&self, spreadsheet: &str, tab: &str, sheet_id: &str, values: &[Value]) -> Vec<ShipmentRecord> {
        let mut records = Vec::new();
        for (offset, row) in values.iter().enumerate() {
            let cells = row.as_array().map(Vec::as_slice).unwrap_or(&[]);
            // Lark trims trailing empty cells, so short rows read as blank.
            let cell = |column: &Column| cells.get(column.index).map(cell_text).unwrap_or_default();

            let tracking_number = cell(&self.tracking);
            if tracking_number.is_empty() {
                continue;
            }
            let delivery_date = Some(cell(&self.delivery_date)).filter(|d| !d.is_empty());

            records.push(ShipmentRecord {
                id: ShipmentId {
                    spreadsheet: spreadsheet.to_string(),
                    tab: tab.to_string(),
                    sheet_id: sheet_id.to_string(),
                    row: self.first_data_row() + offset as u32,
                },
                tracking_number,
                carrier_label: cell(&self.carrier),
                recipient: cell(&self.recipient),
                customer: cell(&self.customer),
                status: cell(&self.status),
                delivery_date,
            });
        }
        records
    }

    /// One single-cell value range per written field.
    pub fn value_ranges(&self, update: &RowUpdate) -> Vec<Value> {
        let sheet_id = &update.id.sheet_id;
        let row = update.id.row;
        let cell = |column: &Column, value: String| {
            json!({
                "range": format!("{sheet_id}!{0}{row}:{0}{row}", column.letter),
                "values": [[value]],
            })
        };

        let mut ranges = Vec::with_capacity(2);
        if let Some(status) = update.status {
            ranges.push(cell(&self.status, status.sheet_label().to_string()));
        }
        if let Some(date) = update.delivery_date {
            ranges.push(cell(&self.delivery_date, date.format("%Y-%m-%d").to_string()));
        }
        ranges
    }
}

/// Plain text of one cell. `ToString` rendering still returns numbers as
/// numbers and rich text as segment lists.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(segments) => segments
            .iter()
            .map(|s| match s {
                Value::Object(_) => s["text"].as_str().unwrap_or_default().to_string(),
                other => cell_text(other),
            })
            .collect::<String>()
            .trim()
            .to_string(),
        Value::Object(_) => value["text"]
            .as_str()
            .or_else(|| value["link"].as_str())
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}
