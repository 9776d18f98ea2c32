use crate::args::Args;
use crate::survey::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SURVEY_NAME: &str = "Micromobility Choice Survey";
pub const DEFAULT_DATASET: &str = "survey_data.csv";
pub const DEFAULT_CUMULATIVE_FILE: &str = "responses.csv";
pub const DEFAULT_IMAGE_DIRECTORY: &str = "images";
pub const DEFAULT_IMAGE_FALLBACK: &str = "default.jpg";
pub const DEFAULT_SHEET_NAME: &str = "Micromobility Responses";
pub const DEFAULT_CREDENTIALS: &str = "gcp_credentials.json";
pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com";

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "surveyName")]
    pub survey_name: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "cumulativeFileName")]
    pub cumulative_file_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    #[serde(rename = "spreadsheetId")]
    pub spreadsheet_id: String,
    #[serde(rename = "sheetName")]
    pub sheet_name: Option<String>,
    #[serde(rename = "credentialsPath")]
    pub credentials_path: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSettings {
    pub directory: Option<String>,
    pub fallback: Option<String>,
}

/// The configuration file, as written by the survey operator.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    #[serde(rename = "dataSources")]
    pub data_sources: Option<Vec<DataSource>>,
    pub spreadsheet: Option<SpreadsheetConfig>,
    pub images: Option<ImageSettings>,
    #[serde(rename = "numBlocks")]
    pub num_blocks: Option<usize>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DatasetProvider {
    Csv,
    Xlsx,
}

impl DatasetProvider {
    pub fn parse(s: &str) -> AppResult<DatasetProvider> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(DatasetProvider::Csv),
            "xlsx" | "excel" => Ok(DatasetProvider::Xlsx),
            x => whatever!("Provider not implemented {:?}", x),
        }
    }

    pub fn from_extension(path: &Path) -> DatasetProvider {
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("xlsx") => DatasetProvider::Xlsx,
            _ => DatasetProvider::Csv,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DataSourceSettings {
    pub provider: DatasetProvider,
    pub path: PathBuf,
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetSettings {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub credentials_path: PathBuf,
    pub endpoint: Option<String>,
}

/// The configuration with all the defaults applied and all the paths resolved.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveySettings {
    pub survey_name: String,
    pub data_sources: Vec<DataSourceSettings>,
    pub output_directory: PathBuf,
    pub cumulative_file_name: String,
    pub spreadsheet: Option<SheetSettings>,
    pub image_directory: PathBuf,
    pub image_fallback: String,
    pub num_blocks: usize,
}

impl SurveySettings {
    /// Applies the defaults. Relative paths are taken from `root`.
    ///
    /// Unknown providers fall back to the file extension, with a warning.
    pub fn resolve(config: &SurveyConfig, root: &Path) -> SurveySettings {
        let output = config.output_settings.clone().unwrap_or_default();
        let images = config.images.clone().unwrap_or_default();

        let data_sources: Vec<DataSourceSettings> = match &config.data_sources {
            Some(sources) if !sources.is_empty() => sources
                .iter()
                .map(|ds| {
                    let path = root.join(&ds.file_path);
                    let provider = match ds.provider.as_deref().map(DatasetProvider::parse) {
                        Some(Ok(p)) => p,
                        Some(Err(e)) => {
                            warn!("resolve: {}, using the file extension of {:?}", e, path);
                            DatasetProvider::from_extension(&path)
                        }
                        None => DatasetProvider::from_extension(&path),
                    };
                    DataSourceSettings {
                        provider,
                        path,
                        excel_worksheet_name: ds.excel_worksheet_name.clone(),
                    }
                })
                .collect(),
            _ => vec![DataSourceSettings {
                provider: DatasetProvider::Csv,
                path: root.join(DEFAULT_DATASET),
                excel_worksheet_name: None,
            }],
        };

        let spreadsheet = config.spreadsheet.as_ref().map(|sc| SheetSettings {
            spreadsheet_id: sc.spreadsheet_id.clone(),
            sheet_name: sc
                .sheet_name
                .clone()
                .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            credentials_path: root.join(
                sc.credentials_path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CREDENTIALS.to_string()),
            ),
            endpoint: sc.endpoint.clone(),
        });

        SurveySettings {
            survey_name: output
                .survey_name
                .unwrap_or_else(|| DEFAULT_SURVEY_NAME.to_string()),
            data_sources,
            output_directory: root.join(output.output_directory.unwrap_or_default()),
            cumulative_file_name: output
                .cumulative_file_name
                .unwrap_or_else(|| DEFAULT_CUMULATIVE_FILE.to_string()),
            spreadsheet,
            image_directory: root.join(
                images
                    .directory
                    .unwrap_or_else(|| DEFAULT_IMAGE_DIRECTORY.to_string()),
            ),
            image_fallback: images
                .fallback
                .unwrap_or_else(|| DEFAULT_IMAGE_FALLBACK.to_string()),
            num_blocks: config.num_blocks.filter(|n| *n > 0).unwrap_or(NUM_BLOCKS),
        }
    }

    /// The command line takes precedence over the configuration file.
    pub fn with_overrides(mut self, args: &Args) -> BAppResult<SurveySettings> {
        if let Some(data) = &args.data {
            let path = PathBuf::from(data);
            let provider = match &args.input_type {
                Some(t) => DatasetProvider::parse(t)?,
                None => DatasetProvider::from_extension(&path),
            };
            self.data_sources = vec![DataSourceSettings {
                provider,
                path,
                excel_worksheet_name: args.excel_worksheet_name.clone(),
            }];
        }
        if let Some(out) = &args.out {
            self.output_directory = PathBuf::from(out);
        }
        Ok(self)
    }
}

pub fn read_config(path: &str) -> BAppResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config() {
        let s = SurveySettings::resolve(&SurveyConfig::default(), Path::new("/srv/survey"));
        assert_eq!(s.data_sources.len(), 1);
        assert_eq!(s.data_sources[0].path, PathBuf::from("/srv/survey/survey_data.csv"));
        assert_eq!(s.data_sources[0].provider, DatasetProvider::Csv);
        assert_eq!(s.cumulative_file_name, "responses.csv");
        assert_eq!(s.image_directory, PathBuf::from("/srv/survey/images"));
        assert_eq!(s.num_blocks, 4);
        assert!(s.spreadsheet.is_none());
    }

    #[test]
    fn parse_full_config() {
        let js = r#"{
            "outputSettings": {"surveyName": "Pune pilot", "outputDirectory": "out"},
            "dataSources": [
                {"provider": "xlsx", "filePath": "data/tasks.xlsx", "excelWorksheetName": "Design"},
                {"filePath": "extra.csv"}
            ],
            "spreadsheet": {"spreadsheetId": "abc123"},
            "numBlocks": 0
        }"#;
        let config: SurveyConfig = serde_json::from_str(js).unwrap();
        let s = SurveySettings::resolve(&config, Path::new("/cfg"));
        assert_eq!(s.survey_name, "Pune pilot");
        assert_eq!(s.output_directory, PathBuf::from("/cfg/out"));
        assert_eq!(s.data_sources[0].provider, DatasetProvider::Xlsx);
        assert_eq!(s.data_sources[0].excel_worksheet_name.as_deref(), Some("Design"));
        assert_eq!(s.data_sources[1].provider, DatasetProvider::Csv);
        let sheet = s.spreadsheet.unwrap();
        assert_eq!(sheet.sheet_name, "Micromobility Responses");
        assert_eq!(sheet.credentials_path, PathBuf::from("/cfg/gcp_credentials.json"));
        assert_eq!(s.num_blocks, 4);
    }

    #[test]
    fn provider_names() {
        assert_eq!(DatasetProvider::parse("CSV").unwrap(), DatasetProvider::Csv);
        assert_eq!(DatasetProvider::parse("excel").unwrap(), DatasetProvider::Xlsx);
        assert!(DatasetProvider::parse("ods").is_err());
        assert_eq!(
            DatasetProvider::from_extension(Path::new("a/b.XLSX")),
            DatasetProvider::Xlsx
        );
    }
}
