// src/table/store.rs
// =============================================================================
// Loads the resource table from CSV and writes validation status back.
//
// The engine owns only two cells per row: `Last Status` and `Last Checked`.
// Everything else (other columns, their order, row order, cells the engine
// doesn't understand) is kept exactly as read, so sorting and README
// generation tools see no noise in their diffs.
//
// Rust concepts:
// - csv::StringRecord: One row of raw cells, kept verbatim for write-back
// - Temp file + rename: The table is never left half-written
// =============================================================================

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::resource::{parse_active, parse_date_added, parse_link, Resource};
use crate::error::TableError;

pub const COL_ID: &str = "ID";
pub const COL_NAME: &str = "Display Name";
pub const COL_CATEGORY: &str = "Category";
pub const COL_SUB_CATEGORY: &str = "Sub-Category";
pub const COL_PRIMARY: &str = "Primary Link";
pub const COL_SECONDARY: &str = "Secondary Link";
pub const COL_LICENSE: &str = "License";
pub const COL_ACTIVE: &str = "Active";
pub const COL_LAST_CHECKED: &str = "Last Checked";
pub const COL_LAST_STATUS: &str = "Last Status";
pub const COL_DATE_ADDED: &str = "Date Added";

// Column positions resolved from the header row
#[derive(Debug, Clone)]
struct Columns {
    name: usize,
    category: usize,
    sub_category: usize,
    primary: usize,
    secondary: usize,
    license: usize,
    active: usize,
    last_checked: usize,
    id: Option<usize>,
    date_added: Option<usize>,
    last_status: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, TableError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| find(name).ok_or_else(|| TableError::MissingColumn(name.to_string()));

        Ok(Self {
            name: require(COL_NAME)?,
            category: require(COL_CATEGORY)?,
            sub_category: require(COL_SUB_CATEGORY)?,
            primary: require(COL_PRIMARY)?,
            secondary: require(COL_SECONDARY)?,
            license: require(COL_LICENSE)?,
            active: require(COL_ACTIVE)?,
            last_checked: require(COL_LAST_CHECKED)?,
            id: find(COL_ID),
            date_added: find(COL_DATE_ADDED),
            last_status: find(COL_LAST_STATUS),
        })
    }
}

/// The resource table, as parsed resources plus the raw rows behind them.
#[derive(Debug, Clone)]
pub struct ResourceTable {
    path: Option<PathBuf>,
    headers: StringRecord,
    rows: Vec<StringRecord>,
    resources: Vec<Resource>,
    columns: Columns,
}

impl ResourceTable {
    /// Loads and validates the table at `path`. Any invalid row is fatal.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|e| TableError::Read {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let mut table = Self::from_reader(file, path)?;
        table.path = Some(path.to_path_buf());
        info!(path = %path.display(), resources = table.resources.len(), "loaded resource table");
        Ok(table)
    }

    /// Parses a table from any reader; `origin` is only used in errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, TableError> {
        let read_error = |source: csv::Error| TableError::Read {
            path: origin.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new().from_reader(reader);
        let headers = reader.headers().map_err(read_error)?.clone();
        let columns = Columns::resolve(&headers)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record.map_err(read_error)?);
        }

        if rows.is_empty() {
            return Err(TableError::Empty);
        }

        let resources = parse_rows(&rows, &columns)?;

        Ok(Self {
            path: None,
            headers,
            rows,
            resources,
            columns,
        })
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, sequence: usize) -> Option<&Resource> {
        self.resources.get(sequence)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The most recently appended resource.
    ///
    /// With a `Date Added` column the latest date wins; rows without a date
    /// rank below dated ones, and ties go to the later row.
    pub fn newest(&self) -> Option<&Resource> {
        self.resources
            .iter()
            .max_by_key(|resource| (resource.date_added, resource.sequence))
    }

    /// Records a check result for the resource at `sequence`.
    pub fn record_status(&mut self, sequence: usize, status: &str, checked_at: &str) {
        if sequence >= self.rows.len() {
            warn!(sequence, "ignoring status for unknown row");
            return;
        }

        let status_col = self.ensure_status_column();
        let checked_col = self.columns.last_checked;

        set_cell(&mut self.rows[sequence], status_col, status);
        set_cell(&mut self.rows[sequence], checked_col, checked_at);

        if let Some(resource) = self.resources.get_mut(sequence) {
            resource.last_status = Some(status.to_string());
            resource.last_checked = Some(checked_at.to_string());
        }
    }

    /// Writes the table back to the path it was loaded from.
    pub fn save(&self) -> Result<(), TableError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => {
                debug!("table has no backing file, nothing to save");
                Ok(())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TableError> {
        let write_error = |source: std::io::Error| TableError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp_name = path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let file = std::fs::File::create(&tmp_path).map_err(write_error)?;
            let mut writer = WriterBuilder::new()
                .terminator(Terminator::Any(b'\n'))
                .from_writer(file);
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush().map_err(write_error)?;
        }

        std::fs::rename(&tmp_path, path).map_err(write_error)?;
        info!(path = %path.display(), "wrote validation status back to resource table");
        Ok(())
    }

    // Appends a `Last Status` column to every row the first time it's needed
    fn ensure_status_column(&mut self) -> usize {
        if let Some(index) = self.columns.last_status {
            return index;
        }

        let index = self.headers.len();
        self.headers.push_field(COL_LAST_STATUS);
        for row in &mut self.rows {
            while row.len() < index {
                row.push_field("");
            }
            row.push_field("");
        }
        self.columns.last_status = Some(index);
        index
    }
}

fn set_cell(row: &mut StringRecord, index: usize, value: &str) {
    let mut fields: Vec<String> = row.iter().map(str::to_string).collect();
    if fields.len() <= index {
        fields.resize(index + 1, String::new());
    }
    fields[index] = value.to_string();
    *row = StringRecord::from(fields);
}

fn parse_rows(rows: &[StringRecord], columns: &Columns) -> Result<Vec<Resource>, TableError> {
    let mut resources = Vec::with_capacity(rows.len());
    let mut names = HashSet::new();
    let mut primaries = HashSet::new();

    for (sequence, row) in rows.iter().enumerate() {
        let line = row
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(sequence + 2);
        let cell = |index: usize| row.get(index).unwrap_or("").trim();
        let invalid = |field: &str, reason: String| TableError::InvalidRow {
            line,
            field: field.to_string(),
            reason,
        };

        let name = cell(columns.name);
        if name.is_empty() {
            return Err(invalid(COL_NAME, "must not be empty".to_string()));
        }

        let primary_url = parse_link(cell(columns.primary)).map_err(|reason| invalid(COL_PRIMARY, reason))?;

        let secondary_raw = cell(columns.secondary);
        let secondary_url = if secondary_raw.is_empty() {
            None
        } else {
            Some(parse_link(secondary_raw).map_err(|reason| invalid(COL_SECONDARY, reason))?)
        };

        let active = parse_active(cell(columns.active)).map_err(|reason| invalid(COL_ACTIVE, reason))?;

        let category = cell(columns.category).to_string();
        let sub_category = cell(columns.sub_category).to_string();

        if !names.insert((category.clone(), sub_category.clone(), name.to_string())) {
            return Err(invalid(
                COL_NAME,
                format!("'{}' appears twice in {} / {}", name, category, sub_category),
            ));
        }
        if !primaries.insert(primary_url.as_str().to_string()) {
            return Err(invalid(COL_PRIMARY, format!("{} appears twice", primary_url)));
        }

        let date_added = columns.date_added.and_then(|index| {
            let raw = cell(index);
            let parsed = parse_date_added(raw);
            if parsed.is_none() && !raw.is_empty() {
                warn!(line, value = raw, "unparseable Date Added, ignoring");
            }
            parsed
        });

        let optional = |index: Option<usize>| {
            index
                .map(cell)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        resources.push(Resource {
            sequence,
            id: optional(columns.id),
            name: name.to_string(),
            category,
            sub_category,
            primary_url,
            secondary_url,
            license: cell(columns.license).to_string(),
            active,
            last_checked: optional(Some(columns.last_checked)),
            last_status: optional(columns.last_status),
            date_added,
        });
    }

    Ok(resources)
}
