use chrono::Local;
use log::{debug, info, warn};
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::*;
use crate::config::*;
use crate::record::*;
use crate::shuffle::ShuffleCache;

/// Everything one participant's attempt accumulates.
///
/// A session is owned by exactly one flow. Nothing in it is shared with other
/// sessions.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub current_page: Page,
    pub group_index: usize,
    /// `Task_<id>` -> label of the chosen alternative. Only grows.
    pub responses: HashMap<String, String>,
    pub shuffled_tasks: ShuffleCache,
    /// Index, in the shuffled order, of the alternative currently chosen.
    pub selected_options: HashMap<TaskId, usize>,
    pub demographic_step: u8,
    pub demographic_data: Vec<(String, String)>,
}

impl SessionState {
    pub fn new(session_id: &str, group_index: usize, shuffled_tasks: ShuffleCache) -> SessionState {
        SessionState {
            session_id: session_id.to_string(),
            current_page: Page::Intro,
            group_index,
            responses: HashMap::new(),
            shuffled_tasks,
            selected_options: HashMap::new(),
            demographic_step: 0,
            demographic_data: Vec::new(),
        }
    }

    fn merge_demographics(&mut self, fields: Vec<(String, String)>) {
        for (k, v) in fields {
            if let Some(existing) = self.demographic_data.iter_mut().find(|(k2, _)| *k2 == k) {
                existing.1 = v;
            } else {
                self.demographic_data.push((k, v));
            }
        }
    }
}

pub fn response_key(task_id: TaskId) -> String {
    format!("Task_{}", task_id)
}

/// What the participant currently sees.
#[derive(PartialEq, Debug, Clone)]
pub enum View<'s> {
    Intro,
    Scenario(ScenarioView<'s>),
    Demographics { step: u8, questions: &'static [Question] },
    ThankYou,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScenarioView<'s> {
    pub task_id: TaskId,
    /// 1-based position of the task in the session.
    pub position: usize,
    pub total: usize,
    pub options: &'s [ScenarioRow],
    pub selected: Option<usize>,
}

impl<'s> ScenarioView<'s> {
    /// "Next" is only available once an alternative is chosen.
    pub fn can_advance(&self) -> bool {
        self.selected.is_some()
    }
}

/// The outcome of the final submit.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Submission {
    pub record: SubmissionRecord,
    pub report: DispatchReport,
}

/// The survey state machine: intro, one page per assigned task, two
/// demographic steps, thank-you.
///
/// Each event handler either performs exactly one transition or returns an
/// error and leaves the session untouched. There is no way back.
pub struct SurveyFlow<'c> {
    catalog: &'c TaskCatalog,
    user_tasks: Vec<TaskId>,
    state: SessionState,
}

impl<'c> SurveyFlow<'c> {
    /// Starts a session with a fresh identity.
    pub fn start(catalog: &'c TaskCatalog, shuffled_tasks: ShuffleCache) -> SurveyFlow<'c> {
        let session_id = Uuid::new_v4().to_string();
        SurveyFlow::resume(catalog, &session_id, shuffled_tasks)
    }

    /// Starts a session for a known identity. The same identity always gets
    /// the same block of tasks.
    pub fn resume(
        catalog: &'c TaskCatalog,
        session_id: &str,
        shuffled_tasks: ShuffleCache,
    ) -> SurveyFlow<'c> {
        let group_index = catalog.group_index(session_id);
        SurveyFlow::with_group(catalog, session_id, group_index, shuffled_tasks)
    }

    pub fn with_group(
        catalog: &'c TaskCatalog,
        session_id: &str,
        group_index: usize,
        shuffled_tasks: ShuffleCache,
    ) -> SurveyFlow<'c> {
        let user_tasks = catalog.block(group_index).to_vec();
        info!(
            "SurveyFlow: session {} in group {} with tasks {:?}",
            session_id, group_index, user_tasks
        );
        SurveyFlow {
            catalog,
            user_tasks,
            state: SessionState::new(session_id, group_index, shuffled_tasks),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn page(&self) -> Page {
        self.state.current_page
    }

    pub fn user_tasks(&self) -> &[TaskId] {
        &self.user_tasks
    }

    pub fn total_tasks(&self) -> usize {
        self.user_tasks.len()
    }

    pub fn answered(&self) -> usize {
        self.user_tasks
            .iter()
            .filter(|t| self.state.responses.contains_key(&response_key(**t)))
            .count()
    }

    /// The first assigned task without a response.
    pub fn current_task(&self) -> Option<TaskId> {
        self.user_tasks
            .iter()
            .find(|t| !self.state.responses.contains_key(&response_key(**t)))
            .cloned()
    }

    /// Renders the current page. Showing a task pins its shuffled order.
    pub fn current_view(&mut self) -> Result<View<'_>, SurveyError> {
        match self.state.current_page {
            Page::Intro => Ok(View::Intro),
            Page::ThankYou => Ok(View::ThankYou),
            Page::Demographics => {
                let step = self.state.demographic_step;
                let questions = if step == 0 {
                    GENERAL_QUESTIONS
                } else {
                    TRAVEL_QUESTIONS
                };
                Ok(View::Demographics { step, questions })
            }
            Page::Survey => {
                // Reaching the survey page without a pending task does not happen through
                // the event handlers, which move on to the demographics first.
                let task_id = match self.current_task() {
                    Some(t) => t,
                    None => {
                        return Ok(View::Demographics {
                            step: self.state.demographic_step,
                            questions: GENERAL_QUESTIONS,
                        })
                    }
                };
                let position = self.answered() + 1;
                let total = self.total_tasks();
                let selected = self.state.selected_options.get(&task_id).cloned();
                let options = self.shuffled(task_id)?;
                Ok(View::Scenario(ScenarioView {
                    task_id,
                    position,
                    total,
                    options,
                    selected,
                }))
            }
        }
    }

    fn shuffled(&mut self, task_id: TaskId) -> Result<&[ScenarioRow], SurveyError> {
        let catalog = self.catalog;
        let rows = catalog.rows(task_id);
        let options = self.state.shuffled_tasks.get_shuffled(task_id, rows);
        if options.len() < ALTERNATIVES_PER_TASK {
            warn!(
                "SurveyFlow: task {} has only {} alternatives",
                task_id,
                options.len()
            );
            return Err(SurveyError::IncompleteTask {
                task_id,
                found: options.len(),
            });
        }
        Ok(options)
    }

    fn expect_page(&self, expected: Page) -> Result<(), SurveyError> {
        if self.state.current_page == expected {
            Ok(())
        } else {
            Err(SurveyError::WrongPage {
                expected,
                actual: self.state.current_page,
            })
        }
    }

    fn expect_step(&self, expected: u8) -> Result<(), SurveyError> {
        self.expect_page(Page::Demographics)?;
        if self.state.demographic_step == expected {
            Ok(())
        } else {
            Err(SurveyError::WrongStep {
                expected,
                actual: self.state.demographic_step,
            })
        }
    }

    fn pending_task(&self) -> Result<TaskId, SurveyError> {
        self.expect_page(Page::Survey)?;
        self.current_task().ok_or(SurveyError::WrongPage {
            expected: Page::Survey,
            actual: Page::Demographics,
        })
    }

    // An empty block goes straight to the demographics.
    fn leave_survey_if_done(&mut self) {
        if self.state.current_page == Page::Survey && self.current_task().is_none() {
            info!(
                "SurveyFlow: session {} answered {} tasks",
                self.state.session_id,
                self.answered()
            );
            self.state.current_page = Page::Demographics;
        }
    }

    /// "Begin" on the intro page.
    pub fn begin(&mut self) -> Result<Page, SurveyError> {
        self.expect_page(Page::Intro)?;
        self.state.current_page = Page::Survey;
        self.leave_survey_if_done();
        Ok(self.state.current_page)
    }

    /// Chooses the alternative at `index` in the displayed order of the current
    /// task. Choosing again replaces the previous choice.
    pub fn select(&mut self, index: usize) -> Result<(), SurveyError> {
        let task_id = self.pending_task()?;
        let available = self.shuffled(task_id)?.len();
        if index >= available {
            return Err(SurveyError::OptionOutOfRange {
                task_id,
                index,
                available,
            });
        }
        debug!("SurveyFlow: task {} selected option {}", task_id, index);
        self.state.selected_options.insert(task_id, index);
        Ok(())
    }

    /// "Next" on a scenario: records the chosen alternative and moves to the
    /// following task, or to the demographics after the last one.
    pub fn next(&mut self) -> Result<Page, SurveyError> {
        let task_id = self.pending_task()?;
        let index = *self
            .state
            .selected_options
            .get(&task_id)
            .ok_or(SurveyError::NoSelection { task_id })?;
        let options = self.shuffled(task_id)?;
        let label = options
            .get(index)
            .map(|r| r.response_label())
            .ok_or(SurveyError::OptionOutOfRange {
                task_id,
                index,
                available: options.len(),
            })?;
        info!("SurveyFlow: task {} answered: {}", task_id, label);
        self.state.responses.insert(response_key(task_id), label);
        self.leave_survey_if_done();
        Ok(self.state.current_page)
    }

    // A rejected form leaves the session untouched.
    fn validate_form(
        &self,
        answers: &FormAnswers,
        step: u8,
        questions: &[Question],
    ) -> Result<Vec<(String, String)>, SurveyError> {
        answers.validate(step, questions).map_err(|e| {
            warn!(
                "SurveyFlow: session {}: form {} rejected: {}",
                self.state.session_id, step, e
            );
            e
        })
    }

    /// Submits the general information form.
    pub fn submit_general(&mut self, answers: &FormAnswers) -> Result<(), SurveyError> {
        self.expect_step(0)?;
        let fields = self.validate_form(answers, 0, GENERAL_QUESTIONS)?;
        self.state.demographic_data = fields;
        self.state.demographic_step = 1;
        Ok(())
    }

    /// Submits the travel habits form, builds the submission record and sends
    /// it to the sinks.
    ///
    /// Sink failures do not prevent the session from completing: they are in
    /// the returned report.
    pub fn submit_travel(
        &mut self,
        answers: &FormAnswers,
        sinks: &mut [Box<dyn RecordSink>],
    ) -> Result<Submission, SurveyError> {
        self.expect_step(1)?;
        let fields = self.validate_form(answers, 1, TRAVEL_QUESTIONS)?;
        self.state.merge_demographics(fields);

        let record = SubmissionRecord::new(
            Uuid::new_v4(),
            Local::now(),
            &self.state.demographic_data,
            &self.ordered_responses(),
        );
        info!(
            "SurveyFlow: session {} submitting record {} with {} fields",
            self.state.session_id,
            record.id(),
            record.len()
        );
        let report = dispatch(&record, sinks);
        self.state.current_page = Page::ThankYou;
        Ok(Submission { record, report })
    }

    fn ordered_responses(&self) -> Vec<(String, String)> {
        self.user_tasks
            .iter()
            .filter_map(|t| {
                let k = response_key(*t);
                self.state.responses.get(&k).map(|v| (k, v.clone()))
            })
            .collect()
    }
}
