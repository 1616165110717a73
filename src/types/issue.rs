use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Priority, Status};

/// A normalized Linear issue. Every field is populated at mapping time.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub estimate: Option<f64>,
    pub started_at: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub status: Status,
    pub assignee: Option<String>,
    pub labels: BTreeSet<String>,
    pub parent_id: Option<String>,
    pub project_id: Option<String>,
}

impl Issue {
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    /// Due date passed without the issue being completed.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match (self.due_date, self.completed_at) {
            (Some(due), None) => today > due,
            _ => false,
        }
    }
}
