use std::cell::RefCell;
use std::rc::Rc;

use stated_preference::*;

struct SharedSink {
    name: &'static str,
    kind: SinkKind,
    fail: bool,
    written: Rc<RefCell<Vec<SubmissionRecord>>>,
}

impl RecordSink for SharedSink {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> SinkKind {
        self.kind
    }

    fn write(&mut self, record: &SubmissionRecord) -> Result<Vec<String>, SinkError> {
        if self.fail {
            return Err(SinkError::new(self.name, "authentication failed"));
        }
        self.written.borrow_mut().push(record.clone());
        Ok(vec![])
    }
}

fn dataset() -> Vec<ScenarioRow> {
    let mut rows = Vec::new();
    // Listed out of order on purpose, plus one broken task.
    for t in [12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1] {
        for (idx, a) in Alternative::ALL.iter().enumerate() {
            rows.push(ScenarioRow {
                task_id: t,
                alternative: *a,
                time_minutes: (t + idx as u32) as f64,
                cost_inr: (10 * idx) as f64,
                wait_minutes: 2.0,
            });
        }
    }
    rows.push(ScenarioRow {
        task_id: 13,
        alternative: Alternative::Walking,
        time_minutes: 30.0,
        cost_inr: 0.0,
        wait_minutes: 0.0,
    });
    rows
}

fn general() -> FormAnswers {
    FormAnswers::new()
        .set("residence", "Pune")
        .set("age_group", "18–24")
        .set("gender", "Female")
        .set("education", "Higher secondary/ITI/certificate")
        .set("occupation", "Student/Scholar")
        .set("income", "Up to 25,000")
}

fn travel() -> FormAnswers {
    FormAnswers::new()
        .set("cars_owned", "0")
        .set("bicycles_owned", "1")
        .set("last_mile_e_rickshaw", "Every day")
        .set("last_mile_pbss", "Never")
        .set("last_mile_walking", "Few times/week")
}

#[test]
fn complete_session_with_failing_spreadsheet() {
    let _ = env_logger::try_init();
    let catalog = TaskCatalog::build(&dataset());
    assert_eq!(catalog.all_tasks().len(), 12);
    assert!(catalog.blocks().iter().all(|b| b.len() == 3));

    let mut flow = SurveyFlow::with_group(&catalog, "participant", 2, ShuffleCache::from_entropy());
    assert_eq!(flow.user_tasks(), &[7, 8, 9]);
    assert!(matches!(flow.current_view(), Ok(View::Intro)));
    assert_eq!(flow.begin(), Ok(Page::Survey));

    let mut seen: Vec<TaskId> = Vec::new();
    let mut chosen: Vec<String> = Vec::new();
    while flow.page() == Page::Survey {
        let (task_id, label) = match flow.current_view().unwrap() {
            View::Scenario(v) => {
                assert_eq!(v.position, seen.len() + 1);
                assert_eq!(v.total, 3);
                assert_eq!(v.options.len(), 3);
                (v.task_id, v.options[1].response_label())
            }
            v => panic!("unexpected view {:?}", v),
        };
        seen.push(task_id);
        chosen.push(label);
        flow.select(1).unwrap();
        flow.next().unwrap();
    }
    assert_eq!(seen, vec![7, 8, 9]);
    assert_eq!(flow.page(), Page::Demographics);

    assert!(flow.submit_general(&general().set("age_group", PLACEHOLDER)).is_err());
    flow.submit_general(&general()).unwrap();
    assert!(flow
        .submit_travel(&travel().set("cars_owned", PLACEHOLDER), &mut [])
        .is_err());
    assert_eq!(flow.page(), Page::Demographics);

    let json = Rc::new(RefCell::new(Vec::new()));
    let csv = Rc::new(RefCell::new(Vec::new()));
    let sheet = Rc::new(RefCell::new(Vec::new()));
    let mut sinks: Vec<Box<dyn RecordSink>> = vec![
        Box::new(SharedSink {
            name: "json",
            kind: SinkKind::Local,
            fail: false,
            written: json.clone(),
        }),
        Box::new(SharedSink {
            name: "csv",
            kind: SinkKind::Local,
            fail: false,
            written: csv.clone(),
        }),
        Box::new(SharedSink {
            name: "sheet",
            kind: SinkKind::Remote,
            fail: true,
            written: sheet.clone(),
        }),
    ];
    let submission = flow.submit_travel(&travel(), &mut sinks).unwrap();
    assert_eq!(flow.page(), Page::ThankYou);
    assert_eq!(submission.report.status, PersistStatus::LocalOnly);
    assert_eq!(submission.report.failures[0].sink, "sheet");

    let record = submission.record;
    assert_eq!(json.borrow().len(), 1);
    assert_eq!(csv.borrow().len(), 1);
    assert!(sheet.borrow().is_empty());
    assert_eq!(json.borrow()[0], record);

    assert_eq!(
        record.keys(),
        vec![
            "id",
            "timestamp",
            "residence",
            "age_group",
            "gender",
            "education",
            "occupation",
            "income",
            "cars_owned",
            "bicycles_owned",
            "public_transport_usage",
            "last_mile_e_rickshaw",
            "last_mile_pbss",
            "last_mile_walking",
            "Task_7",
            "Task_8",
            "Task_9",
        ]
    );
    assert_eq!(record.get("public_transport_usage"), Some("Never"));
    assert_eq!(record.get("Task_8"), Some(chosen[1].as_str()));

    // The session is over.
    assert!(flow.begin().is_err());
    assert!(flow.select(0).is_err());
    assert!(matches!(flow.current_view(), Ok(View::ThankYou)));
}

#[test]
fn same_identity_same_tasks() {
    let catalog = TaskCatalog::build(&dataset());
    let f1 = SurveyFlow::resume(&catalog, "returning-participant", ShuffleCache::from_entropy());
    let f2 = SurveyFlow::resume(&catalog, "returning-participant", ShuffleCache::from_entropy());
    assert_eq!(f1.state().group_index, f2.state().group_index);
    assert_eq!(f1.user_tasks(), f2.user_tasks());
    assert_eq!(f1.user_tasks().len(), 3);
}
