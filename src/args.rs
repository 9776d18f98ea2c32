use clap::Parser;

/// Runs the micromobility stated-preference survey on the terminal.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the survey. Relative paths inside it are
    /// resolved from the directory of the file. Without it, the defaults apply: survey_data.csv
    /// in the current directory, outputs in the current directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The scenario dataset. Setting this option overrides the data sources of the
    /// --config option.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (csv or xlsx, default from the file extension) The type of the dataset given with --data.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (directory) Where the response files are written. Overrides the outputDirectory setting.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (string) Resumes the block assignment of a given session identity: the same identity
    /// always receives the same block. A fresh identity is generated otherwise.
    #[clap(long, value_parser)]
    pub session_id: Option<String>,

    /// (integer) Seeds the shuffling of the alternatives, for reproducible sessions.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// Prints the task blocks as JSON and exits without running a session.
    #[clap(long, takes_value = false)]
    pub show_blocks: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
