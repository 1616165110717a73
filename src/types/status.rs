use std::fmt;

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Normalized lifecycle state shared by issues and projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl Status {
    /// Map a Linear workflow state type (`backlog`, `unstarted`, `started`,
    /// `completed`, `canceled`, `triage`) onto a status.
    pub fn from_issue_state_type(state_type: &str) -> Self {
        match state_type.trim().to_lowercase().as_str() {
            "completed" | "done" => Status::Done,
            "canceled" | "cancelled" => Status::Cancelled,
            "started" => Status::InProgress,
            _ => Status::Todo,
        }
    }

    /// Map a Linear project state (`planned`, `started`, `paused`,
    /// `completed`, `canceled`, `backlog`) onto a status.
    pub fn from_project_state(state: &str) -> Self {
        match state.trim().to_lowercase().as_str() {
            "completed" | "done" => Status::Done,
            "canceled" | "cancelled" => Status::Cancelled,
            "started" | "in progress" | "active" => Status::InProgress,
            _ => Status::Todo,
        }
    }

    /// Work that still counts towards the remaining load of a project.
    pub fn is_open(self) -> bool {
        matches!(self, Status::Todo | Status::InProgress)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        }
    }

    /// Colored label using the timeline palette (gray, blue, green, red).
    pub fn colored(self) -> String {
        let label = self.label();
        match self {
            Status::Todo => label.truecolor(0x6B, 0x72, 0x80).to_string(),
            Status::InProgress => label.truecolor(0x3B, 0x82, 0xF6).to_string(),
            Status::Done => label.truecolor(0x10, 0xB9, 0x81).to_string(),
            Status::Cancelled => label.truecolor(0xEF, 0x44, 0x44).to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_state_types() {
        assert_eq!(Status::from_issue_state_type("completed"), Status::Done);
        assert_eq!(Status::from_issue_state_type("canceled"), Status::Cancelled);
        assert_eq!(Status::from_issue_state_type("started"), Status::InProgress);
        assert_eq!(Status::from_issue_state_type("backlog"), Status::Todo);
        assert_eq!(Status::from_issue_state_type("triage"), Status::Todo);
    }

    #[test]
    fn project_states() {
        assert_eq!(Status::from_project_state("Started"), Status::InProgress);
        assert_eq!(Status::from_project_state("planned"), Status::Todo);
        assert_eq!(Status::from_project_state("paused"), Status::Todo);
        assert_eq!(Status::from_project_state("completed"), Status::Done);
    }
}
