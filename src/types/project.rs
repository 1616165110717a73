use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Status;
use crate::estimator::EndDateBasis;

/// A normalized Linear project, as mapped from the API. Derived values live on
/// [`EnrichedProject`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub state: Status,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub lead: Option<String>,
    pub teams: BTreeSet<String>,
    pub issue_ids: Vec<String>,
    pub blocked_by: BTreeSet<String>,
    pub blocks: BTreeSet<String>,
}

impl Project {
    /// Planned length in days, when both ends are set.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.start_date, self.target_date) {
            (Some(start), Some(target)) => Some((target - start).num_days()),
            _ => None,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match (self.target_date, self.completed_at) {
            (Some(target), None) => today > target,
            _ => false,
        }
    }

    pub fn owns_issue(&self, issue_id: &str) -> bool {
        self.issue_ids.iter().any(|id| id == issue_id)
    }
}

/// A project together with the values derived from its issues.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EnrichedProject {
    #[serde(flatten)]
    pub project: Project,
    pub issue_count: usize,
    pub completed_issue_count: usize,
    /// Done issues over all issues, 0 when the project has none.
    pub completion_fraction: f64,
    pub effective_start_date: Option<NaiveDate>,
    pub effective_end_date: Option<NaiveDate>,
    pub end_date_basis: EndDateBasis,
}

impl EnrichedProject {
    /// Flatten into the row shape a Gantt renderer draws.
    pub fn timeline_entry(&self, today: NaiveDate) -> TimelineEntry {
        TimelineEntry {
            id: self.project.id.clone(),
            name: self.project.name.clone(),
            start: self.effective_start_date,
            end: self.effective_end_date,
            progress: (self.completion_fraction * 10_000.0).round() / 100.0,
            status: self.project.state,
            color: self.project.color.clone(),
            lead: self.project.lead.clone(),
            teams: self.project.teams.iter().cloned().collect(),
            is_overdue: self.project.is_overdue(today),
            estimated: !matches!(self.end_date_basis, EndDateBasis::TargetDate),
            issue_count: self.issue_count,
            completed_issues: self.completed_issue_count,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub id: String,
    pub name: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Percent complete, two decimals.
    pub progress: f64,
    pub status: Status,
    pub color: Option<String>,
    pub lead: Option<String>,
    pub teams: Vec<String>,
    pub is_overdue: bool,
    /// End date came from an estimate rather than the project's target date.
    pub estimated: bool,
    pub issue_count: usize,
    pub completed_issues: usize,
}

/// Keep entries whose span overlaps `[from, to]`. Entries missing either end
/// cannot be placed and are dropped whenever a bound is given.
pub fn filter_by_date_range(
    entries: Vec<TimelineEntry>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<TimelineEntry> {
    if from.is_none() && to.is_none() {
        return entries;
    }

    entries
        .into_iter()
        .filter(|entry| {
            let (Some(start), Some(end)) = (entry.start, entry.end) else {
                return false;
            };
            to.map_or(true, |to| start <= to) && from.map_or(true, |from| end >= from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::issue::fixtures::date;

    fn entry(id: &str, start: Option<&str>, end: Option<&str>) -> TimelineEntry {
        TimelineEntry {
            id: id.to_string(),
            name: id.to_string(),
            start: start.map(date),
            end: end.map(date),
            progress: 0.0,
            status: Status::Todo,
            color: None,
            lead: None,
            teams: Vec::new(),
            is_overdue: false,
            estimated: false,
            issue_count: 0,
            completed_issues: 0,
        }
    }

    #[test]
    fn duration_and_overdue() {
        let project = Project {
            id: "p".into(),
            start_date: Some(date("2024-01-01")),
            target_date: Some(date("2024-01-31")),
            ..Project::default()
        };
        assert_eq!(project.duration_days(), Some(30));
        assert!(project.is_overdue(date("2024-02-01")));

        let shipped = Project {
            completed_at: Some(date("2024-02-10")),
            ..project
        };
        assert!(!shipped.is_overdue(date("2024-03-01")));
    }

    #[test]
    fn date_range_filter_keeps_overlapping_spans() {
        let entries = vec![
            entry("before", Some("2024-01-01"), Some("2024-01-31")),
            entry("overlap", Some("2024-01-15"), Some("2024-03-01")),
            entry("inside", Some("2024-02-05"), Some("2024-02-10")),
            entry("after", Some("2024-04-01"), Some("2024-05-01")),
            entry("undated", None, Some("2024-02-01")),
        ];

        let kept = filter_by_date_range(entries, Some(date("2024-02-01")), Some(date("2024-02-28")));
        let ids: Vec<_> = kept.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["overlap", "inside"]);
    }

    #[test]
    fn no_bounds_keeps_everything() {
        let entries = vec![entry("undated", None, None)];
        assert_eq!(filter_by_date_range(entries, None, None).len(), 1);
    }
}
