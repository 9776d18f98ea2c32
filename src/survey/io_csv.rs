// Primitives for reading CSV files.

use crate::survey::{io_common::*, *};

pub fn read_csv_dataset(path: &str) -> BAppResult<Vec<ScenarioRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1_usize })?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => {
            return DatasetSchemaSnafu {
                path,
                lineno: 1_usize,
                message: "the file is empty",
            }
            .fail()
            .map_err(Box::new)
        }
    };
    check_header(path, &header)?;

    let mut res: Vec<ScenarioRow> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let fields = trim_trailing_empty(line.iter().map(|s| s.to_string()).collect());
        if let Some(row) = build_row(path, lineno, &fields)? {
            res.push(row);
        }
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_and_skips_notes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data.csv");
        fs::write(
            &p,
            "\u{feff}Task,Alternative,Time,Cost,Wait\n\
             1,e-rickshaw,12,20,5\n\
             Block 2,,,,\n\
             2,walking,30,0,0\n",
        )
        .unwrap();
        let rows = read_csv_dataset(p.to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].task_id, 2);
        assert_eq!(rows[1].alternative, Alternative::Walking);
    }

    #[test]
    fn wrong_column_count_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data.csv");
        fs::write(&p, "Task,Alternative,Time,Cost\n1,walking,3,0\n").unwrap();
        let err = read_csv_dataset(p.to_str().unwrap()).unwrap_err();
        assert!(matches!(*err, AppError::DatasetSchema { lineno: 1, .. }));
    }

    #[test]
    fn missing_file() {
        let err = read_csv_dataset("/nonexistent/survey_data.csv").unwrap_err();
        assert!(matches!(*err, AppError::CsvOpen { .. }));
    }
}
