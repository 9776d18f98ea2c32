use log::{debug, info, warn};

use stated_preference::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::args::Args;
use crate::survey::assets::ImageCatalog;
use crate::survey::config_reader::*;
use crate::survey::console::Console;
use crate::survey::io_sheets::{HttpSheetClient, SpreadsheetSink};
use crate::survey::sinks::{CumulativeCsvSink, JsonFileSink};

pub mod assets;
pub mod config_reader;
pub mod console;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod io_sheets;
pub mod sinks;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Missing worksheet or header row in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Invalid dataset {path}, line {lineno}: {message}"))]
    DatasetSchema {
        path: String,
        lineno: usize,
        message: String,
    },
    #[snafu(display("I/O error on {path}"))]
    Io {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The input was closed before the end of the survey"))]
    InputClosed {},
    #[snafu(display("The survey cannot continue"))]
    Survey { source: SurveyError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;
pub type BAppResult<T> = Result<T, Box<AppError>>;

/// The summary printed by --show-blocks.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct BlockSummary {
    #[serde(rename = "allTasks")]
    all_tasks: Vec<TaskId>,
    blocks: Vec<Vec<TaskId>>,
}

fn read_dataset(source: &DataSourceSettings) -> BAppResult<Vec<ScenarioRow>> {
    let p = source.path.display().to_string();
    info!("Attempting to read scenario dataset {:?}", p);
    let rows = match source.provider {
        DatasetProvider::Csv => io_csv::read_csv_dataset(&p)?,
        DatasetProvider::Xlsx => {
            io_excel::read_excel_dataset(&p, source.excel_worksheet_name.as_deref())?
        }
    };
    info!(
        "read_dataset: {} rows read from {}",
        rows.len(),
        io_common::simplify_file_name(&p)
    );
    Ok(rows)
}

pub fn build_catalog(settings: &SurveySettings) -> BAppResult<TaskCatalog> {
    let mut rows: Vec<ScenarioRow> = Vec::new();
    for source in settings.data_sources.iter() {
        let mut file_rows = read_dataset(source)?;
        rows.append(&mut file_rows);
    }
    if rows.is_empty() {
        warn!("build_catalog: the dataset is empty, sessions will skip the scenarios");
    }
    Ok(TaskCatalog::with_blocks(&rows, settings.num_blocks))
}

/// The local sinks first, then the spreadsheet if configured.
pub fn build_sinks(settings: &SurveySettings) -> BAppResult<Vec<Box<dyn RecordSink>>> {
    let out = &settings.output_directory;
    fs::create_dir_all(out).context(IoSnafu {
        path: out.display().to_string(),
    })?;
    let mut sinks: Vec<Box<dyn RecordSink>> = vec![
        Box::new(JsonFileSink::new(out)),
        Box::new(CumulativeCsvSink::new(&out.join(&settings.cumulative_file_name))),
    ];
    if let Some(sheet) = &settings.spreadsheet {
        info!(
            "build_sinks: responses will also go to sheet {:?} of {}",
            sheet.sheet_name, sheet.spreadsheet_id
        );
        sinks.push(Box::new(SpreadsheetSink::new(HttpSheetClient::new(sheet))));
    } else {
        info!("build_sinks: no spreadsheet configured");
    }
    Ok(sinks)
}

fn block_summary_js(catalog: &TaskCatalog) -> BAppResult<String> {
    let summary = BlockSummary {
        all_tasks: catalog.all_tasks().to_vec(),
        blocks: catalog.blocks().to_vec(),
    };
    let js: JSValue = serde_json::to_value(&summary).context(ParsingJsonSnafu {
        path: "<blocks>".to_string(),
    })?;
    let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {
        path: "<blocks>".to_string(),
    })?;
    Ok(pretty)
}

/// Runs one interactive session on the terminal.
pub fn run_survey(args: &Args) -> BAppResult<()> {
    let settings = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root: PathBuf = Path::new(config_path)
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            SurveySettings::resolve(&config, &root)
        }
        None => SurveySettings::resolve(&SurveyConfig::default(), Path::new("")),
    }
    .with_overrides(args)?;
    debug!("run_survey: settings: {:?}", settings);

    let catalog = build_catalog(&settings)?;
    if args.show_blocks {
        println!("{}", block_summary_js(&catalog)?);
        return Ok(());
    }

    let shuffled_tasks = match args.seed {
        Some(seed) => ShuffleCache::seeded(seed),
        None => ShuffleCache::from_entropy(),
    };
    let mut flow = match &args.session_id {
        Some(id) => SurveyFlow::resume(&catalog, id, shuffled_tasks),
        None => SurveyFlow::start(&catalog, shuffled_tasks),
    };
    let mut sinks = build_sinks(&settings)?;
    let images = ImageCatalog::new(&settings.image_directory, &settings.image_fallback);

    let stdin = io::stdin();
    let mut console = Console::new(
        stdin.lock(),
        io::stdout(),
        images,
        &settings.survey_name,
    );
    let submission = console.run(&mut flow, &mut sinks)?;
    if let Some(s) = submission {
        info!(
            "run_survey: session {} completed as record {} ({:?})",
            flow.state().session_id,
            s.record.id(),
            s.report.status
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DATASET: &str = "Task,Alternative,\"Time\n(min)\",Cost,  Wait \n\
        1,e-rickshaw,12,20,5\n1,public bike sharing system,15,10,3\n1,Walking,40,0,0\n\
        2,e-rickshaw,10,30,2\n2,public bike sharing system,18,5,4\n2,walking,35,0,0\n\
        notes,,,,\n\
        3,walking,20,0,0\n";

    fn settings(dir: &Path) -> SurveySettings {
        let data = dir.join("survey_data.csv");
        fs::write(&data, DATASET).unwrap();
        let mut s = SurveySettings::resolve(&SurveyConfig::default(), dir);
        s.output_directory = dir.join("out");
        s
    }

    #[test]
    fn catalog_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = build_catalog(&settings(dir.path())).unwrap();
        assert_eq!(catalog.all_tasks(), &[1, 2]);
        assert_eq!(catalog.block(0), &[1]);
        assert_eq!(catalog.block(1), &[2]);
        let js = block_summary_js(&catalog).unwrap();
        assert!(js.contains("\"allTasks\""));
    }

    const ANSWERS: [&str; 16] = [
        "",   // begin
        "n",  // next without a selection: refused
        "2",  // select
        "n",  // next
        "Pune", "2", "1", "3", "1", "2", // general information
        "1", "2", "", "1", "1", "3", // travel habits
    ];

    // One complete session of group 1 on the terminal.
    fn run_session(
        dir: &Path,
        flow: &mut SurveyFlow,
        sinks: &mut [Box<dyn RecordSink>],
    ) -> (Submission, String) {
        let input = Cursor::new(ANSWERS.join("\n") + "\n");
        let mut output: Vec<u8> = Vec::new();
        let images = ImageCatalog::new(&dir.join("images"), "default.jpg");
        let submission = {
            let mut console = Console::new(input, &mut output, images, "Test survey");
            console.run(flow, sinks).unwrap()
        };
        (submission.unwrap(), String::from_utf8(output).unwrap())
    }

    #[test]
    fn terminal_session_writes_local_files() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let catalog = build_catalog(&s).unwrap();
        let mut sinks = build_sinks(&s).unwrap();
        assert_eq!(sinks.len(), 2);
        let mut flow = SurveyFlow::with_group(&catalog, "t", 1, ShuffleCache::seeded(9));

        let (submission, text) = run_session(dir.path(), &mut flow, &mut sinks);
        assert_eq!(flow.page(), Page::ThankYou);
        assert_eq!(submission.report.status, PersistStatus::Persisted);
        assert_eq!(submission.record.len(), 15);
        assert_eq!(submission.record.get("residence"), Some("Pune"));
        assert_eq!(submission.record.get("age_group"), Some("18–24"));
        assert_eq!(submission.record.get("gender"), Some("Female"));
        assert_eq!(submission.record.get("public_transport_usage"), Some("Never"));

        assert!(text.contains("Scenario 1 of 1"));
        assert!(text.contains("Please select an option"));
        assert!(text.contains("Image not found"));

        let json_path = s
            .output_directory
            .join(format!("responses_{}.json", submission.record.id()));
        let js: JSValue = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(js["Task_2"].as_str(), submission.record.get("Task_2"));
        let csv_text = fs::read_to_string(s.output_directory.join("responses.csv")).unwrap();
        assert!(csv_text.starts_with('\u{feff}'));
        assert_eq!(csv_text.lines().count(), 2);
    }

    #[test]
    fn unreachable_sheet_keeps_local_files() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.spreadsheet = Some(SheetSettings {
            spreadsheet_id: "abc".to_string(),
            sheet_name: "Micromobility Responses".to_string(),
            credentials_path: dir.path().join("missing_credentials.json"),
            endpoint: None,
        });
        let catalog = build_catalog(&s).unwrap();
        let mut sinks = build_sinks(&s).unwrap();
        assert_eq!(sinks.len(), 3);
        let mut flow = SurveyFlow::with_group(&catalog, "t", 1, ShuffleCache::seeded(9));

        let (submission, text) = run_session(dir.path(), &mut flow, &mut sinks);
        assert_eq!(flow.page(), Page::ThankYou);
        assert_eq!(submission.report.status, PersistStatus::LocalOnly);
        assert_eq!(submission.report.failures.len(), 1);
        assert_eq!(submission.report.failures[0].sink, "Google Sheets");
        assert!(text.contains("saved locally only"));
        assert!(text.contains("Thank you for completing the survey"));

        let json_path = s
            .output_directory
            .join(format!("responses_{}.json", submission.record.id()));
        assert!(json_path.is_file());
        let csv_text = fs::read_to_string(s.output_directory.join("responses.csv")).unwrap();
        assert_eq!(csv_text.lines().count(), 2);
    }

    #[test]
    fn closed_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let catalog = build_catalog(&s).unwrap();
        let mut sinks = build_sinks(&s).unwrap();
        let mut flow = SurveyFlow::with_group(&catalog, "t", 0, ShuffleCache::seeded(9));
        let images = ImageCatalog::new(&dir.path().join("images"), "default.jpg");
        let mut output: Vec<u8> = Vec::new();
        let mut console = Console::new(Cursor::new("\n1\n"), &mut output, images, "Test survey");
        let err = console.run(&mut flow, &mut sinks).unwrap_err();
        assert!(matches!(*err, AppError::InputClosed {}));
        assert_eq!(flow.page(), Page::Survey);
    }
}
