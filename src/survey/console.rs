// The survey on a terminal: one page at a time, answers read line by line.

use std::io::{BufRead, Write};

use crate::survey::assets::{ImageCatalog, ImageLookup};
use crate::survey::*;

const TERMINAL: &str = "<terminal>";

const INTRO: &str = "\
This survey studies how urban travellers choose between e-rickshaws, public bike
sharing systems (PBSS) and walking for short trips.

It has three short sections and takes about 5 to 10 minutes:
  - a few choice scenarios, each describing a trip with three modes of transport
  - general information about you
  - your travel habits

Participation is voluntary and anonymous. By continuing, you agree that your
responses are used for academic research.";

const SCENARIO_PROMPT: &str = "Suppose you have just arrived from a transit facility and have to reach \
your destination which is about 5 km away. What mode will you prefer?";

const THANKS: &str = "\
Your responses have been submitted. Your feedback will contribute to research on
micromobility and urban transport.";

/// Drives a survey flow from a line-oriented input.
///
/// Scenario pages accept the number of an alternative, or `n` to move on.
/// Form questions are asked one after the other, then the form is submitted
/// as a whole.
pub struct Console<R: BufRead, W: Write> {
    input: R,
    output: W,
    images: ImageCatalog,
    survey_name: String,
}

// The errors the participant can fix by answering again.
fn is_retryable(e: &SurveyError) -> bool {
    matches!(
        e,
        SurveyError::NoSelection { .. }
            | SurveyError::OptionOutOfRange { .. }
            | SurveyError::IncompleteForm { .. }
    )
}

/// 1-based menu entry to 0-based index.
fn parse_choice(line: &str, count: usize) -> Option<usize> {
    match line.trim().parse::<usize>() {
        Ok(k) if k >= 1 && k <= count => Some(k - 1),
        _ => None,
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, images: ImageCatalog, survey_name: &str) -> Console<R, W> {
        Console {
            input,
            output,
            images,
            survey_name: survey_name.to_string(),
        }
    }

    fn say(&mut self, text: &str) -> BAppResult<()> {
        writeln!(self.output, "{}", text).context(IoSnafu { path: TERMINAL })?;
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> BAppResult<String> {
        write!(self.output, "{}", prompt).context(IoSnafu { path: TERMINAL })?;
        self.output.flush().context(IoSnafu { path: TERMINAL })?;
        let mut line = String::new();
        let n = self
            .input
            .read_line(&mut line)
            .context(IoSnafu { path: TERMINAL })?;
        if n == 0 {
            return InputClosedSnafu {}.fail().map_err(Box::new);
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn warn_participant(&mut self, e: SurveyError) -> BAppResult<()> {
        if is_retryable(&e) {
            debug!("Console: {:?}", e);
            self.say(&format!("! {}", e))
        } else {
            Err(e).context(SurveySnafu).map_err(Box::new)
        }
    }

    /// Runs the session until the thank-you page.
    ///
    /// Returns the submission, or `None` when the session had already been
    /// submitted.
    pub fn run(
        &mut self,
        flow: &mut SurveyFlow,
        sinks: &mut [Box<dyn RecordSink>],
    ) -> BAppResult<Option<Submission>> {
        loop {
            match flow.page() {
                Page::Intro => self.intro(flow)?,
                Page::Survey => self.scenario(flow)?,
                Page::Demographics => {
                    if let Some(s) = self.demographics(flow, sinks)? {
                        self.thanks(&s)?;
                        return Ok(Some(s));
                    }
                }
                Page::ThankYou => {
                    self.say(THANKS)?;
                    return Ok(None);
                }
            }
        }
    }

    fn intro(&mut self, flow: &mut SurveyFlow) -> BAppResult<()> {
        let title = format!("=== {} ===", self.survey_name);
        self.say(&title)?;
        self.say(INTRO)?;
        self.ask("\nPress Enter to begin the survey. ")?;
        flow.begin().context(SurveySnafu)?;
        Ok(())
    }

    fn scenario(&mut self, flow: &mut SurveyFlow) -> BAppResult<()> {
        let (task_id, count, text) = match flow.current_view().context(SurveySnafu)? {
            View::Scenario(v) => (v.task_id, v.options.len(), self.render_scenario(&v)),
            // The flow moved on by itself (empty block).
            _ => return Ok(()),
        };
        self.say(&text)?;
        let line = self.ask("Your choice (number), or n for next: ")?;
        let line = line.trim();
        if line.eq_ignore_ascii_case("n") || line.eq_ignore_ascii_case("next") {
            if let Err(e) = flow.next() {
                self.warn_participant(e)?;
            }
        } else if let Some(index) = parse_choice(line, count) {
            if let Err(e) = flow.select(index) {
                self.warn_participant(e)?;
            }
        } else {
            self.say(&format!(
                "! Please enter a number between 1 and {} for task {}, or n",
                count, task_id
            ))?;
        }
        Ok(())
    }

    fn render_scenario(&self, v: &ScenarioView) -> String {
        let mut lines: Vec<String> = vec![
            String::new(),
            format!("--- Scenario {} of {} ---", v.position, v.total),
            SCENARIO_PROMPT.to_string(),
        ];
        for (idx, row) in v.options.iter().enumerate() {
            let marker = if v.selected == Some(idx) { "*" } else { " " };
            let alt = row.alternative;
            lines.push(format!("{} {}. {}", marker, idx + 1, alt));
            match self.images.lookup(alt.name()) {
                ImageLookup::Found(p) => lines.push(format!("     [image: {}]", p.display())),
                ImageLookup::Missing(p) => {
                    lines.push(format!("     Image not found: {}", p.display()))
                }
            }
            lines.push(format!(
                "     {}: {}",
                alt.time_label(),
                format_number(row.time_minutes)
            ));
            lines.push(format!(
                "     {}: ₹{}",
                alt.cost_label(),
                format_number(row.cost_inr)
            ));
            lines.push(format!(
                "     {}: {}",
                alt.wait_label(),
                format_number(row.wait_minutes)
            ));
        }
        lines.join("\n")
    }

    fn demographics(
        &mut self,
        flow: &mut SurveyFlow,
        sinks: &mut [Box<dyn RecordSink>],
    ) -> BAppResult<Option<Submission>> {
        let (step, questions) = match flow.current_view().context(SurveySnafu)? {
            View::Demographics { step, questions } => (step, questions),
            _ => return Ok(None),
        };
        let title = if step == 0 {
            "General Information"
        } else {
            "Travel Habits"
        };
        self.say(&format!("\n--- {} ---", title))?;
        let answers = self.fill_form(questions)?;
        if step == 0 {
            if let Err(e) = flow.submit_general(&answers) {
                self.warn_participant(e)?;
            }
            Ok(None)
        } else {
            match flow.submit_travel(&answers, sinks) {
                Ok(s) => Ok(Some(s)),
                Err(e) => {
                    self.warn_participant(e)?;
                    Ok(None)
                }
            }
        }
    }

    fn fill_form(&mut self, questions: &[Question]) -> BAppResult<FormAnswers> {
        let mut answers = FormAnswers::new();
        for q in questions {
            match q.kind {
                QuestionKind::Text => {
                    let line = self.ask(&format!("{}: ", q.prompt))?;
                    answers.insert(q.key, &line);
                }
                QuestionKind::Select | QuestionKind::Radio => {
                    self.say(q.prompt)?;
                    for (idx, o) in q.options.iter().enumerate() {
                        self.say(&format!("  {}. {}", idx + 1, o))?;
                    }
                    let default = match q.kind {
                        QuestionKind::Radio => q.options.first().cloned().unwrap_or(PLACEHOLDER),
                        _ => PLACEHOLDER,
                    };
                    let line = self.ask(&format!("Choice [{}]: ", default))?;
                    // An empty or invalid entry leaves the question on its default.
                    if let Some(idx) = parse_choice(&line, q.options.len()) {
                        answers.insert(q.key, q.options[idx]);
                    }
                }
            }
        }
        Ok(answers)
    }

    fn thanks(&mut self, s: &Submission) -> BAppResult<()> {
        match s.report.status {
            PersistStatus::Persisted => {}
            PersistStatus::LocalOnly => {
                for f in s.report.failures.iter() {
                    self.say(&format!("! {}", f))?;
                }
                self.say("! Your responses were saved locally only.")?;
            }
            PersistStatus::Failed => {
                for f in s.report.failures.iter() {
                    self.say(&format!("! {}", f))?;
                }
                self.say("! Your responses could not be saved.")?;
            }
        }
        self.say("\n=== Thank you for completing the survey! ===")?;
        self.say(THANKS)
    }
}
