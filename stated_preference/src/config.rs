// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

pub type TaskId = u32;

/// The transportation modes offered in every scenario.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Alternative {
    ERickshaw,
    PublicBikeSharing,
    Walking,
}

impl Alternative {
    pub const ALL: [Alternative; 3] = [
        Alternative::ERickshaw,
        Alternative::PublicBikeSharing,
        Alternative::Walking,
    ];

    /// The canonical name, as it appears in the dataset and in the responses.
    pub fn name(&self) -> &'static str {
        match self {
            Alternative::ERickshaw => "e-rickshaw",
            Alternative::PublicBikeSharing => "public bike sharing system",
            Alternative::Walking => "walking",
        }
    }

    /// Case-insensitive lookup. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Alternative> {
        let key = s.trim().to_lowercase();
        Alternative::ALL.iter().find(|a| a.name() == key).cloned()
    }

    // Walking has no vehicle, so the attributes are worded differently.
    pub fn time_label(&self) -> &'static str {
        match self {
            Alternative::Walking => "Travel Time (in minutes)",
            _ => "In-vehicle Time (in minutes)",
        }
    }

    pub fn cost_label(&self) -> &'static str {
        match self {
            Alternative::Walking => "Travel Cost (in INR)",
            _ => "In-vehicle Cost (in INR)",
        }
    }

    pub fn wait_label(&self) -> &'static str {
        "Waiting Time (in minutes)"
    }
}

impl Display for Alternative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One alternative within one task, as read from the scenario dataset.
#[derive(PartialEq, Debug, Clone)]
pub struct ScenarioRow {
    pub task_id: TaskId,
    pub alternative: Alternative,
    pub time_minutes: f64,
    pub cost_inr: f64,
    pub wait_minutes: f64,
}

impl ScenarioRow {
    /// The label stored in the responses when this row is chosen.
    ///
    /// It embeds the alternative and its three attributes, so that a response
    /// can be read without going back to the dataset.
    pub fn response_label(&self) -> String {
        format!(
            "{} (Time: {} mins, Cost: ₹{}, Wait: {} mins)",
            self.alternative,
            format_number(self.time_minutes),
            format_number(self.cost_inr),
            format_number(self.wait_minutes)
        )
    }
}

/// Integral values are printed without a fractional part.
pub fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

// ********* Session data structures ***********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Page {
    Intro,
    Survey,
    Demographics,
    ThankYou,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Intro => "intro",
            Page::Survey => "survey",
            Page::Demographics => "demographics",
            Page::ThankYou => "thankyou",
        }
    }
}

impl Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ********* Questionnaire **********

/// The value shown by an unanswered drop-down.
pub const PLACEHOLDER: &str = "-- Select --";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum QuestionKind {
    /// Free text, must not be blank.
    Text,
    /// Drop-down starting on the placeholder. Must be changed before submitting.
    Select,
    /// Mandatory single choice. The first option is selected by default.
    Radio,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Question {
    pub key: &'static str,
    pub prompt: &'static str,
    pub kind: QuestionKind,
    pub options: &'static [&'static str],
}

const FREQUENCIES: &[&str] = &[
    "Never",
    "Every day",
    "Few times/week",
    "Few times/month or less",
];

/// First demographic sub-form: general information.
pub const GENERAL_QUESTIONS: &[Question] = &[
    Question {
        key: "residence",
        prompt: "Place of current residence",
        kind: QuestionKind::Text,
        options: &[],
    },
    Question {
        key: "age_group",
        prompt: "Age Group",
        kind: QuestionKind::Select,
        options: &["Up to 18", "18–24", "24–34", "34–44", "44+"],
    },
    Question {
        key: "gender",
        prompt: "Gender",
        kind: QuestionKind::Radio,
        options: &["Female", "Male", "Other"],
    },
    Question {
        key: "education",
        prompt: "Highest Education",
        kind: QuestionKind::Select,
        options: &[
            "No formal education",
            "Higher secondary/ITI/certificate",
            "Graduate/Postgraduate/PhD/equivalent",
        ],
    },
    Question {
        key: "occupation",
        prompt: "Occupation",
        kind: QuestionKind::Select,
        options: &[
            "Student/Scholar",
            "Employed/Self-employed",
            "Unemployed/Home-maker",
        ],
    },
    Question {
        key: "income",
        prompt: "Monthly Household Income (INR)",
        kind: QuestionKind::Select,
        options: &[
            "Up to 25,000",
            "25,001–50,000",
            "50,001–100,000",
            "Above 100,000",
        ],
    },
];

/// Second demographic sub-form: travel habits.
pub const TRAVEL_QUESTIONS: &[Question] = &[
    Question {
        key: "cars_owned",
        prompt: "Cars owned by household",
        kind: QuestionKind::Select,
        options: &["0", "1", "2", "3 or more"],
    },
    Question {
        key: "bicycles_owned",
        prompt: "Bicycles owned by household",
        kind: QuestionKind::Select,
        options: &["0", "1", "2 or more"],
    },
    Question {
        key: "public_transport_usage",
        prompt: "Frequency of Public Transport usage",
        kind: QuestionKind::Radio,
        options: &[
            "Never",
            "Every day",
            "A few times a week",
            "A few times a month",
        ],
    },
    Question {
        key: "last_mile_e_rickshaw",
        prompt: "Last-mile travel by E-rickshaw",
        kind: QuestionKind::Select,
        options: FREQUENCIES,
    },
    Question {
        key: "last_mile_pbss",
        prompt: "Last-mile travel by Public Bike Sharing System",
        kind: QuestionKind::Select,
        options: FREQUENCIES,
    },
    Question {
        key: "last_mile_walking",
        prompt: "Last-mile travel by Walking",
        kind: QuestionKind::Select,
        options: FREQUENCIES,
    },
];

/// The raw answers of one sub-form, as entered by the participant.
///
/// Nothing is checked when setting an answer; `validate` does all the work when
/// the form is submitted.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FormAnswers {
    answers: HashMap<String, String>,
}

impl FormAnswers {
    pub fn new() -> FormAnswers {
        FormAnswers::default()
    }

    pub fn set(mut self, key: &str, value: &str) -> FormAnswers {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.answers.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.answers.get(key).map(|s| s.as_str())
    }

    /// Checks the answers against the questions and returns the fields in
    /// question order.
    ///
    /// All the missing fields are reported at once.
    pub fn validate(
        &self,
        step: u8,
        questions: &[Question],
    ) -> Result<Vec<(String, String)>, SurveyError> {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for q in questions {
            let answer = self.get(q.key).map(|s| s.trim());
            let value: Option<String> = match (q.kind, answer) {
                (QuestionKind::Text, Some(s)) if !s.is_empty() => Some(s.to_string()),
                (QuestionKind::Text, _) => None,
                (_, Some(s)) if s != PLACEHOLDER && q.options.contains(&s) => Some(s.to_string()),
                (QuestionKind::Radio, None) => q.options.first().map(|s| s.to_string()),
                _ => None,
            };
            match value {
                Some(v) => fields.push((q.key.to_string(), v)),
                None => missing.push(q.key.to_string()),
            }
        }
        if missing.is_empty() {
            Ok(fields)
        } else {
            Err(SurveyError::IncompleteForm { step, missing })
        }
    }
}

// ********* Errors **********

/// Errors reported back to the participant. None of them modifies the session.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SurveyError {
    /// Some fields of a demographic sub-form are blank or still on the placeholder.
    IncompleteForm { step: u8, missing: Vec<String> },
    /// "Next" was activated before choosing an alternative.
    NoSelection { task_id: TaskId },
    OptionOutOfRange {
        task_id: TaskId,
        index: usize,
        available: usize,
    },
    /// The task does not have its three alternatives.
    IncompleteTask { task_id: TaskId, found: usize },
    /// The action does not belong to the current page.
    WrongPage { expected: Page, actual: Page },
    WrongStep { expected: u8, actual: u8 },
    UnknownAlternative(String),
}

impl Error for SurveyError {}

impl Display for SurveyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyError::IncompleteForm { missing, .. } => write!(
                f,
                "Please complete all fields before continuing (missing: {})",
                missing.join(", ")
            ),
            SurveyError::NoSelection { task_id } => {
                write!(f, "Please select an option for task {}", task_id)
            }
            SurveyError::OptionOutOfRange {
                task_id,
                index,
                available,
            } => write!(
                f,
                "Option {} does not exist for task {} ({} options)",
                index, task_id, available
            ),
            SurveyError::IncompleteTask { task_id, found } => write!(
                f,
                "Task {} cannot be shown: expected 3 alternatives, found {}",
                task_id, found
            ),
            SurveyError::WrongPage { expected, actual } => write!(
                f,
                "Action only valid on page {}, current page is {}",
                expected, actual
            ),
            SurveyError::WrongStep { expected, actual } => write!(
                f,
                "Action only valid on demographic step {}, current step is {}",
                expected, actual
            ),
            SurveyError::UnknownAlternative(s) => write!(f, "Unknown alternative {:?}", s),
        }
    }
}

/// Failure of one submission sink. Never propagated past the dispatch.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SinkError {
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(sink: &str, message: impl Display) -> SinkError {
        SinkError {
            sink: sink.to_string(),
            message: message.to_string(),
        }
    }
}

impl Error for SinkError {}

impl Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} save failed: {}", self.sink, self.message)
    }
}
