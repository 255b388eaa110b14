//! A presentation-agnostic sortable table over dynamic rows.
//!
//! Rows are JSON objects so any derived collection of the report can feed a
//! table instance. The table owns its sort state, computes a visible row
//! window for virtualized rendering, and exports the currently sorted view
//! as delimited text or structured JSON.

use crate::error::{AnalyticsError, Result};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::ops::Range;
use std::path::Path;

pub type Row = serde_json::Map<String, Value>;

/// Turns a display value into the string shown in a cell. Exports always use
/// the raw field value, never the renderer.
pub type CellRenderer = Box<dyn Fn(&Value) -> String>;

/// Optional style tag for a whole row, e.g. "inflow"/"outflow" highlighting.
pub type RowStyler = Box<dyn Fn(&Row) -> Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

impl ColumnKind {
    /// Direction a freshly activated sort column starts with: quantities and
    /// dates show biggest/most recent first, text shows A to Z.
    pub fn default_direction(self) -> SortDirection {
        match self {
            Self::Text => SortDirection::Ascending,
            Self::Number | Self::Date => SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

pub struct Column {
    pub key: String,
    pub header: String,
    pub kind: ColumnKind,
    pub renderer: Option<CellRenderer>,
    pub row_style: Option<RowStyler>,
}

impl Column {
    pub fn new(key: &str, header: &str, kind: ColumnKind) -> Self {
        Self {
            key: key.to_string(),
            header: header.to_string(),
            kind,
            renderer: None,
            row_style: None,
        }
    }

    pub fn text(key: &str, header: &str) -> Self {
        Self::new(key, header, ColumnKind::Text)
    }

    pub fn number(key: &str, header: &str) -> Self {
        Self::new(key, header, ColumnKind::Number)
    }

    pub fn date(key: &str, header: &str) -> Self {
        Self::new(key, header, ColumnKind::Date)
    }

    pub fn with_renderer(mut self, renderer: CellRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_row_style(mut self, styler: RowStyler) -> Self {
        self.row_style = Some(styler);
        self
    }
}

/// Fixed-height scroll viewport for virtualized rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub viewport_height: f64,
    pub row_height: f64,
    pub scroll_top: f64,
}

/// Explicit, per-instance sort state. No terminal state: toggling the active
/// column flips direction, toggling another column re-enters with that
/// column's type default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableState {
    pub sort: Option<SortSpec>,
}

/// One row as it would render: raw index into the sorted order, rendered
/// cell strings, and the optional style tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub index: usize,
    pub cells: Vec<String>,
    pub style: Option<String>,
}

pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
    state: TableState,
    viewport: Option<Viewport>,
    delimiter: char,
}

impl Table {
    pub fn new(name: &str, columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            rows,
            state: TableState::default(),
            viewport: None,
            delimiter: ',',
        }
    }

    /// Starts the table with an active sort instead of the unsorted default.
    pub fn with_default_sort(mut self, sort: SortSpec) -> Result<Self> {
        self.column(&sort.key)?;
        self.state.sort = Some(sort);
        Ok(self)
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column(&self, key: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| AnalyticsError::UnknownColumn(key.to_string()))
    }

    /// Activates `key` as the sort column. A repeat activation flips the
    /// direction; a fresh activation starts from the column type's default.
    pub fn toggle_sort(&mut self, key: &str) -> Result<()> {
        let kind = self.column(key)?.kind;
        self.state.sort = Some(match &self.state.sort {
            Some(current) if current.key == key => SortSpec {
                key: key.to_string(),
                direction: current.direction.flipped(),
            },
            _ => SortSpec {
                key: key.to_string(),
                direction: kind.default_direction(),
            },
        });
        Ok(())
    }

    /// Rows in the current sort order. Unsorted state returns input order;
    /// the sort is stable, so equal keys keep their input order too.
    pub fn sorted_rows(&self) -> Vec<&Row> {
        let mut view: Vec<&Row> = self.rows.iter().collect();

        if let Some(sort) = &self.state.sort {
            // Column existence was checked when the sort was set.
            if let Ok(column) = self.column(&sort.key) {
                let kind = column.kind;
                view.sort_by(|a, b| {
                    let ordering = compare_cells(a.get(&sort.key), b.get(&sort.key), kind);
                    match sort.direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    }
                });
            }
        }

        view
    }

    pub fn set_scroll(&mut self, scroll_top: f64) {
        if let Some(viewport) = &mut self.viewport {
            viewport.scroll_top = scroll_top.max(0.0);
        }
    }

    /// Index range of rows intersecting the viewport. Without a viewport
    /// this is the full range, which makes the non-virtualized mode the
    /// same code path with a bigger window.
    pub fn visible_range(&self) -> Range<usize> {
        let count = self.rows.len();
        match &self.viewport {
            None => 0..count,
            Some(vp) => {
                if vp.row_height <= 0.0 {
                    return 0..count;
                }
                let first = (vp.scroll_top / vp.row_height).floor() as usize;
                let visible = (vp.viewport_height / vp.row_height).ceil() as usize + 1;
                let first = first.min(count);
                let last = (first + visible).min(count);
                first..last
            }
        }
    }

    /// Renders the rows of the visible window in sort order. Cell strings go
    /// through the column renderer when one is set; the first styling column
    /// that yields a tag styles the row.
    pub fn visible_rows(&self) -> Vec<RowView> {
        let sorted = self.sorted_rows();
        let range = self.visible_range();

        sorted[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, row)| RowView {
                index: range.start + offset,
                cells: self
                    .columns
                    .iter()
                    .map(|column| {
                        let value = row.get(&column.key).unwrap_or(&Value::Null);
                        match &column.renderer {
                            Some(render) => render(value),
                            None => plain_cell(value),
                        }
                    })
                    .collect(),
                style: self
                    .columns
                    .iter()
                    .filter_map(|c| c.row_style.as_ref())
                    .find_map(|style| style(row)),
            })
            .collect()
    }

    /// Serializes the currently sorted view as delimited text. Header row
    /// uses display names; a cell containing the delimiter, a quote, or a
    /// newline is quoted; missing values become empty fields.
    pub fn to_delimited(&self) -> Result<String> {
        if self.rows.is_empty() {
            return Err(AnalyticsError::NoData("nothing to export".to_string()));
        }

        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .map(|c| quote_field(&c.header, self.delimiter))
            .collect();
        out.push_str(&header.join(&self.delimiter.to_string()));
        out.push('\n');

        for row in self.sorted_rows() {
            let fields: Vec<String> = self
                .columns
                .iter()
                .map(|column| {
                    let value = row.get(&column.key).unwrap_or(&Value::Null);
                    quote_field(&plain_cell(value), self.delimiter)
                })
                .collect();
            out.push_str(&fields.join(&self.delimiter.to_string()));
            out.push('\n');
        }

        Ok(out)
    }

    /// Serializes the currently sorted view as a JSON array of objects keyed
    /// by column display name. Values are the raw row fields, independent of
    /// any cell renderer.
    pub fn to_structured(&self) -> Result<Value> {
        if self.rows.is_empty() {
            return Err(AnalyticsError::NoData("nothing to export".to_string()));
        }

        let objects: Vec<Value> = self
            .sorted_rows()
            .into_iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for column in &self.columns {
                    let value = row.get(&column.key).cloned().unwrap_or(Value::Null);
                    object.insert(column.header.clone(), value);
                }
                Value::Object(object)
            })
            .collect();

        Ok(Value::Array(objects))
    }

    /// File name for an export of this table, e.g. "transactions_2024-03-07.csv".
    pub fn export_file_name(&self, extension: &str) -> String {
        format!(
            "{}_{}.{}",
            self.name.to_lowercase().replace(' ', "_"),
            Utc::now().date_naive().format("%Y-%m-%d"),
            extension
        )
    }

    pub fn write_delimited(&self, path: &Path) -> Result<()> {
        let content = self.to_delimited()?;
        fs::write(path, content)?;
        info!("Exported table '{}' to {}", self.name, path.display());
        Ok(())
    }

    pub fn write_structured(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.to_structured()?)?;
        fs::write(path, content)?;
        info!("Exported table '{}' to {}", self.name, path.display());
        Ok(())
    }
}

/// Converts any serializable collection into table rows. Elements that do
/// not serialize to JSON objects are rejected.
pub fn rows_from_serialize<T: Serialize>(items: &[T]) -> Result<Vec<Row>> {
    items
        .iter()
        .map(|item| match serde_json::to_value(item)? {
            Value::Object(map) => Ok(map),
            other => Err(AnalyticsError::Computation(format!(
                "table rows must be objects, got {other}"
            ))),
        })
        .collect()
}

fn plain_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quote_field(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn numeric_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn date_value(value: Option<&Value>) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    match value {
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or(epoch),
        _ => epoch,
    }
}

fn text_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => plain_cell(v).to_lowercase(),
        None => String::new(),
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>, kind: ColumnKind) -> Ordering {
    match kind {
        ColumnKind::Number => numeric_value(a).total_cmp(&numeric_value(b)),
        ColumnKind::Date => date_value(a).cmp(&date_value(b)),
        ColumnKind::Text => text_value(a).cmp(&text_value(b)),
    }
}
