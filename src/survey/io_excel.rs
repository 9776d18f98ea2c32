use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::survey::{io_common::*, *};

/// Reads the scenario dataset from a worksheet: the named one, or the first.
pub fn read_excel_dataset(path: &str, worksheet: Option<&str>) -> BAppResult<Vec<ScenarioRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    }
    .context(EmptyExcelSnafu { path })?
    .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(read_cell)
        .collect();
    debug!("read_excel_dataset: header: {:?}", header);
    check_header(path, &header)?;

    let mut res: Vec<ScenarioRow> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let fields: Vec<String> = row.iter().map(read_cell).collect();
        let fields = trim_trailing_empty(fields);
        if let Some(r) = build_row(path, lineno, &fields)? {
            res.push(r);
        }
    }
    Ok(res)
}

fn read_cell(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => format_number(*f),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => "".to_string(),
        _ => format!("{:?}", cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_as_text() {
        assert_eq!(read_cell(&DataType::Float(3.0)), "3");
        assert_eq!(read_cell(&DataType::Float(2.5)), "2.5");
        assert_eq!(read_cell(&DataType::Int(7)), "7");
        assert_eq!(read_cell(&DataType::String("walking".to_string())), "walking");
        assert_eq!(read_cell(&DataType::Empty), "");
    }

    #[test]
    fn trailing_cells() {
        let f: Vec<String> = ["1", "walking", "3", "0", "0", "", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(trim_trailing_empty(f).len(), 5);
    }

    #[test]
    fn missing_workbook() {
        let err = read_excel_dataset("/nonexistent/design.xlsx", None).unwrap_err();
        assert!(matches!(*err, AppError::OpeningExcel { .. }));
    }
}
