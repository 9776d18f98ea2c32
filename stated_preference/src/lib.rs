/*!

Engine for stated-preference surveys on last-mile mode choice.

Participants see a block of scenarios, each offering three alternatives
(e-rickshaw, public bike sharing system, walking) described by their travel
time, cost and waiting time. After choosing an alternative in every scenario,
they fill in two short demographic forms. The answers are flattened into one
[`SubmissionRecord`] and sent to a set of [`RecordSink`]s.

```
use stated_preference::*;

let rows: Vec<ScenarioRow> = Alternative::ALL
    .iter()
    .map(|a| ScenarioRow {
        task_id: 1,
        alternative: *a,
        time_minutes: 10.0,
        cost_inr: 20.0,
        wait_minutes: 3.0,
    })
    .collect();
let catalog = TaskCatalog::build(&rows);
let mut flow = SurveyFlow::with_group(&catalog, "session-1", 0, ShuffleCache::seeded(7));

flow.begin()?;
flow.select(2)?;
assert_eq!(flow.next()?, Page::Demographics);
# Ok::<(), SurveyError>(())
```

The long-form documentation is in the [`manual`] module.
*/

mod catalog;
mod config;
mod flow;
pub mod manual;
mod record;
mod shuffle;

pub use crate::catalog::*;
pub use crate::config::*;
pub use crate::flow::*;
pub use crate::record::*;
pub use crate::shuffle::ShuffleCache;
