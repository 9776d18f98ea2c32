// Primitives shared by the dataset readers.

use crate::survey::*;

/// The columns of the scenario dataset, in order.
pub const DATASET_COLUMNS: [&str; 5] = ["Task", "Alternative", "Time", "Cost", "Wait"];

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Spreadsheet exports often carry line breaks and double spaces in the headers.
pub fn normalize_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}')
        .replace(['\n', '\r'], " ")
        .split(' ')
        .filter(|s| !s.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn check_header(path: &str, header: &[String]) -> BAppResult<Vec<String>> {
    let normalized = trim_trailing_empty(header.iter().map(|h| normalize_header(h)).collect());
    debug!("check_header: {:?}", normalized);
    if normalized.len() != DATASET_COLUMNS.len() {
        return DatasetSchemaSnafu {
            path,
            lineno: 1_usize,
            message: format!(
                "expected {} columns ({}), found {}: {:?}",
                DATASET_COLUMNS.len(),
                DATASET_COLUMNS.join(", "),
                normalized.len(),
                normalized
            ),
        }
        .fail()
        .map_err(Box::new);
    }
    Ok(normalized)
}

/// Task ids are non-negative integers, written with digits only.
pub fn parse_task_id(s: &str) -> Option<TaskId> {
    let s = s.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<TaskId>().ok()
}

fn parse_number(path: &str, lineno: usize, column: &str, s: &str) -> BAppResult<f64> {
    match s.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => DatasetSchemaSnafu {
            path,
            lineno,
            message: format!("column {} is not a number: {:?}", column, s),
        }
        .fail()
        .map_err(Box::new),
    }
}

/// Drops empty cells past the last column, left by trailing separators or by
/// the rectangular range of a wider sheet.
pub fn trim_trailing_empty(mut fields: Vec<String>) -> Vec<String> {
    while fields.len() > DATASET_COLUMNS.len() && fields.last().map(|s| s.trim().is_empty()) == Some(true) {
        fields.pop();
    }
    fields
}

/// Turns one data line into a scenario row.
///
/// Lines without a valid task id are not part of the design and are skipped.
pub fn build_row(path: &str, lineno: usize, fields: &[String]) -> BAppResult<Option<ScenarioRow>> {
    let task_id = match fields.first().and_then(|s| parse_task_id(s)) {
        Some(t) => t,
        None => {
            debug!("build_row: line {}: skipping {:?}", lineno, fields);
            return Ok(None);
        }
    };
    if fields.len() != DATASET_COLUMNS.len() {
        return DatasetSchemaSnafu {
            path,
            lineno,
            message: format!(
                "expected {} fields, found {}",
                DATASET_COLUMNS.len(),
                fields.len()
            ),
        }
        .fail()
        .map_err(Box::new);
    }
    let alternative = match Alternative::parse(&fields[1]) {
        Some(a) => a,
        None => {
            return DatasetSchemaSnafu {
                path,
                lineno,
                message: SurveyError::UnknownAlternative(fields[1].clone()).to_string(),
            }
            .fail()
            .map_err(Box::new)
        }
    };
    Ok(Some(ScenarioRow {
        task_id,
        alternative,
        time_minutes: parse_number(path, lineno, DATASET_COLUMNS[2], &fields[2])?,
        cost_inr: parse_number(path, lineno, DATASET_COLUMNS[3], &fields[3])?,
        wait_minutes: parse_number(path, lineno, DATASET_COLUMNS[4], &fields[4])?,
    }))
}
