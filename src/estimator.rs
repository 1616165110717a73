//! Effective timeline dates for projects.
//!
//! Explicit target dates always win. Without one, the end date is projected
//! from the velocity of completed issues, and failing that from a fixed
//! planning horizon after the project's start.

use std::collections::HashSet;
use std::fmt;

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;

use crate::types::{Issue, Project, Status, Warning};

/// Placeholder horizon used when there is no completion history.
pub const PLANNING_HORIZON_MONTHS: u32 = 6;

/// Completed issues needed before velocity is trusted.
pub const MIN_VELOCITY_SAMPLES: usize = 2;

/// Where an effective end date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndDateBasis {
    /// The project's own target date.
    TargetDate,
    /// Latest completion plus remaining work divided by velocity.
    Velocity,
    /// Velocity was measurable and no open work remains.
    WorkComplete,
    /// Start date plus the planning horizon.
    PlanningHorizon,
    /// Nothing to go on.
    Unknown,
}

impl EndDateBasis {
    /// Fallback bases are surfaced to the consumer as insufficient data.
    pub fn is_fallback(self) -> bool {
        matches!(self, EndDateBasis::PlanningHorizon | EndDateBasis::Unknown)
    }
}

impl fmt::Display for EndDateBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndDateBasis::TargetDate => "target date",
            EndDateBasis::Velocity => "velocity projection",
            EndDateBasis::WorkComplete => "last completion",
            EndDateBasis::PlanningHorizon => "start + 6 months",
            EndDateBasis::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndDateEstimate {
    pub date: Option<NaiveDate>,
    pub basis: EndDateBasis,
}

impl EndDateEstimate {
    /// The `InsufficientData` warning for fallback estimates.
    pub fn warning(&self, project_id: &str) -> Option<Warning> {
        self.basis.is_fallback().then(|| Warning::InsufficientData {
            project_id: project_id.to_string(),
            basis: self.basis,
        })
    }
}

/// Effective end date of `project`, or `None` when it cannot be estimated.
///
/// `issues` may contain issues of other projects; only the ones listed in
/// `project.issue_ids` are considered.
pub fn effective_end_date(project: &Project, issues: &[Issue]) -> Option<NaiveDate> {
    estimate(project, issues).date
}

/// Like [`effective_end_date`], also reporting which rule produced the date.
pub fn estimate(project: &Project, issues: &[Issue]) -> EndDateEstimate {
    if let Some(target) = project.target_date {
        return EndDateEstimate {
            date: Some(target),
            basis: EndDateBasis::TargetDate,
        };
    }

    let owned = project_issues(project, issues);
    if let Some(estimate) = velocity_estimate(&owned) {
        return estimate;
    }

    match project
        .start_date
        .and_then(|start| start.checked_add_months(Months::new(PLANNING_HORIZON_MONTHS)))
    {
        Some(date) => EndDateEstimate {
            date: Some(date),
            basis: EndDateBasis::PlanningHorizon,
        },
        None => EndDateEstimate {
            date: None,
            basis: EndDateBasis::Unknown,
        },
    }
}

fn velocity_estimate(issues: &[&Issue]) -> Option<EndDateEstimate> {
    let samples: Vec<(NaiveDate, NaiveDate)> = issues
        .iter()
        .filter(|i| i.status == Status::Done)
        .filter_map(|i| Some((i.started_at?, i.completed_at?)))
        .collect();

    if samples.len() < MIN_VELOCITY_SAMPLES {
        return None;
    }

    let earliest_start = samples.iter().map(|(s, _)| *s).min()?;
    let latest_completion = samples.iter().map(|(_, c)| *c).max()?;
    let span_days = (latest_completion - earliest_start).num_days();
    if span_days <= 0 {
        return None;
    }

    let remaining = issues.iter().filter(|i| i.status.is_open()).count() as u64;
    if remaining == 0 {
        return Some(EndDateEstimate {
            date: Some(latest_completion),
            basis: EndDateBasis::WorkComplete,
        });
    }

    // remaining / (completed / span), rounded up, without floating point.
    let completed = samples.len() as u64;
    let days = (remaining * span_days as u64).div_ceil(completed);

    Some(EndDateEstimate {
        date: latest_completion.checked_add_days(Days::new(days)),
        basis: EndDateBasis::Velocity,
    })
}

/// Effective start date: the project start for planned work; for active or
/// finished projects the earliest activity among its issues, falling back to
/// the project start.
pub fn effective_start_date(project: &Project, issues: &[Issue]) -> Option<NaiveDate> {
    if project.state == Status::Todo {
        return project.start_date;
    }

    project_issues(project, issues)
        .into_iter()
        .filter(|i| matches!(i.status, Status::InProgress | Status::Done))
        .flat_map(|i| [i.started_at, i.completed_at])
        .flatten()
        .min()
        .or(project.start_date)
}

/// Fraction of the project's issues that are done, 0 without issues.
pub fn completion_fraction(project: &Project, issues: &[Issue]) -> f64 {
    let owned = project_issues(project, issues);
    if owned.is_empty() {
        return 0.0;
    }
    let done = owned.iter().filter(|i| i.is_done()).count();
    done as f64 / owned.len() as f64
}

fn project_issues<'a>(project: &Project, issues: &'a [Issue]) -> Vec<&'a Issue> {
    let ids: HashSet<&str> = project.issue_ids.iter().map(String::as_str).collect();
    issues.iter().filter(|i| ids.contains(i.id.as_str())).collect()
}
