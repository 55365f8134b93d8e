use std::collections::HashSet;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::{debug, instrument};

use crate::notixel::tools::config::pick_single_worksheet;
use crate::notixel::tools::error::{Result, ToolError};
use crate::notixel::tools::model::FieldDescriptor;

/// Worksheet names of a workbook, in workbook order.
pub fn worksheet_names(path: &Path) -> Result<Vec<String>> {
    let workbook: Xlsx<_> = open_workbook(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Returns `requested` when the workbook has it, or the only worksheet when
/// none was requested and there is exactly one.
pub fn resolve_worksheet(path: &Path, requested: Option<&str>) -> Result<String> {
    let names = worksheet_names(path)?;
    match requested {
        Some(name) if names.iter().any(|sheet| sheet == name) => Ok(name.to_string()),
        Some(name) => Err(ToolError::InvalidWorkbook(format!("missing sheet '{name}'"))),
        None => pick_single_worksheet(&names),
    }
}

/// Reads the header row of `worksheet` as source fields.
///
/// The first row holding any non-empty cell is the header. Blank headers are
/// skipped and repeated names keep their first occurrence.
#[instrument(level = "info", skip_all, fields(path = %path.display(), worksheet = %worksheet))]
pub fn read_source_fields(path: &Path, worksheet: &str) -> Result<Vec<FieldDescriptor>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = read_required_sheet(&mut workbook, worksheet)?;

    let header = range
        .rows()
        .find(|row| row.iter().any(|cell| !cell_to_string(Some(cell)).trim().is_empty()));
    let Some(header) = header else {
        return Err(ToolError::InvalidWorkbook(format!(
            "sheet '{worksheet}' has no header row"
        )));
    };

    let mut seen = HashSet::new();
    let fields: Vec<FieldDescriptor> = header
        .iter()
        .map(|cell| cell_to_string(Some(cell)).trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .map(FieldDescriptor::source)
        .collect();

    if !fields.iter().any(FieldDescriptor::is_identifier) {
        return Err(ToolError::MissingIdentifierColumn(format!(
            "sheet '{worksheet}'"
        )));
    }

    debug!(field_count = fields.len(), "header row read");
    Ok(fields)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
