//! Turns raw GraphQL nodes into [`Project`] and [`Issue`] values.
//!
//! Optional fields fall back to explicit defaults. Anything required that is
//! missing or malformed rejects only the record it belongs to.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MappingError, MappingErrorKind};
use crate::responses::{ApiIssue, ApiProject, ApiProjectRelation, Connection, NodeRef};
use crate::types::{Issue, Project, ProjectRelationType, Status};

const PROJECT: &str = "project";
const ISSUE: &str = "issue";

/// Map one raw project node. Issue ids are filled in later by the caller.
pub fn map_project(raw: &Value) -> Result<Project, MappingError> {
    let (api, fail): (ApiProject, _) = decode(PROJECT, raw)?;

    let id = required(api.id, "id").map_err(&fail)?;
    let fail = |kind| MappingError {
        record_type: PROJECT,
        record_id: Some(id.clone()),
        kind,
    };
    let name = required(api.name, "name").map_err(fail)?;

    let start_date = parse_optional_date("startDate", api.start_date.as_deref()).map_err(fail)?;
    let target_date = parse_optional_date("targetDate", api.target_date.as_deref()).map_err(fail)?;
    let completed_at =
        parse_optional_date("completedAt", api.completed_at.as_deref()).map_err(fail)?;

    let state = if completed_at.is_some() {
        Status::Done
    } else {
        Status::from_project_state(api.state.as_deref().unwrap_or("planned"))
    };

    let mut blocked_by = BTreeSet::new();
    let mut blocks = BTreeSet::new();
    let relations = api
        .relations
        .unwrap_or_default()
        .nodes
        .into_iter()
        .chain(api.inverse_relations.unwrap_or_default().nodes);
    for relation in relations {
        match orient_relation(&id, relation) {
            Some((ProjectRelationType::Blocks, other)) => {
                blocks.insert(other);
            }
            Some((ProjectRelationType::BlockedBy, other)) => {
                blocked_by.insert(other);
            }
            _ => {}
        }
    }

    Ok(Project {
        name,
        state,
        start_date,
        target_date,
        completed_at,
        description: non_blank(api.description),
        color: non_blank(api.color),
        lead: api.lead.and_then(|l| non_blank(l.name)),
        teams: names(api.teams),
        issue_ids: Vec::new(),
        blocked_by,
        blocks,
        id,
    })
}

/// Map one raw issue node.
pub fn map_issue(raw: &Value) -> Result<Issue, MappingError> {
    let (api, fail): (ApiIssue, _) = decode(ISSUE, raw)?;

    let id = required(api.id, "id").map_err(&fail)?;
    let fail = |kind| MappingError {
        record_type: ISSUE,
        record_id: Some(id.clone()),
        kind,
    };
    let title = required(api.title, "title").map_err(fail)?;

    let status = api
        .state
        .and_then(|s| s.state_type)
        .map_or(Status::Todo, |t| Status::from_issue_state_type(&t));

    let started_at = parse_optional_date("startedAt", api.started_at.as_deref()).map_err(fail)?;
    let due_date = parse_optional_date("dueDate", api.due_date.as_deref()).map_err(fail)?;
    let mut completed_at =
        parse_optional_date("completedAt", api.completed_at.as_deref()).map_err(fail)?;

    if completed_at.is_some() && status != Status::Done {
        debug!(issue = %id, %status, "dropping completedAt on an issue that is not done");
        completed_at = None;
    }
    if let (Some(started), Some(completed)) = (started_at, completed_at) {
        if completed < started {
            return Err(fail(MappingErrorKind::CompletedBeforeStarted { started, completed }));
        }
    }

    Ok(Issue {
        title,
        priority: api.priority,
        estimate: api.estimate,
        started_at,
        due_date,
        completed_at,
        status,
        assignee: api.assignee.and_then(|a| non_blank(a.name)),
        labels: names(api.labels),
        parent_id: api.parent.and_then(|p| non_blank(p.id)),
        project_id: api.project.and_then(|p| non_blank(p.id)),
        id,
    })
}

/// Map a batch of projects, skipping (and reporting) the records that fail.
pub fn map_projects(raw: &[Value]) -> (Vec<Project>, Vec<MappingError>) {
    map_batch(raw, map_project)
}

/// Map a batch of issues, skipping (and reporting) the records that fail.
pub fn map_issues(raw: &[Value]) -> (Vec<Issue>, Vec<MappingError>) {
    map_batch(raw, map_issue)
}

fn map_batch<T>(
    raw: &[Value],
    map: impl Fn(&Value) -> Result<T, MappingError>,
) -> (Vec<T>, Vec<MappingError>) {
    let mut mapped = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for node in raw {
        match map(node) {
            Ok(value) => mapped.push(value),
            Err(err) => {
                warn!(record = err.record_type, error = %err, "skipping record");
                errors.push(err);
            }
        }
    }

    (mapped, errors)
}

/// Parse an ISO-8601 calendar date or RFC 3339 timestamp (reduced to its UTC
/// date). Blank input means "not set".
pub fn parse_date(field: &'static str, value: &str) -> Result<Option<NaiveDate>, MappingErrorKind> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Some(date));
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| Some(dt.with_timezone(&Utc).date_naive()))
        .map_err(|_| MappingErrorKind::InvalidDate {
            field,
            value: value.to_string(),
        })
}

fn parse_optional_date(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, MappingErrorKind> {
    value.map_or(Ok(None), |v| parse_date(field, v))
}

type Fail = Box<dyn Fn(MappingErrorKind) -> MappingError>;

/// Decode a node into its lenient API shape, returning an error builder keyed
/// on whatever id the node carries.
fn decode<T: DeserializeOwned>(
    record_type: &'static str,
    raw: &Value,
) -> Result<(T, Fail), MappingError> {
    let record_id = raw
        .get("id")
        .and_then(Value::as_str)
        .map(String::from);
    let fail: Fail = Box::new(move |kind| MappingError {
        record_type,
        record_id: record_id.clone(),
        kind,
    });

    if !raw.is_object() {
        return Err(fail(MappingErrorKind::NotAnObject));
    }

    match serde_json::from_value(raw.clone()) {
        Ok(api) => Ok((api, fail)),
        Err(e) => Err(fail(MappingErrorKind::Decode(e.to_string()))),
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, MappingErrorKind> {
    non_blank(value).ok_or(MappingErrorKind::MissingField(field))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn names(connection: Option<Connection<NodeRef>>) -> BTreeSet<String> {
    connection
        .map(|c| c.nodes.into_iter().filter_map(|n| non_blank(n.name)).collect())
        .unwrap_or_default()
}

/// Express a relation from the point of view of `anchor`, returning the
/// relation type and the other project's id.
fn orient_relation(
    anchor: &str,
    relation: ApiProjectRelation,
) -> Option<(ProjectRelationType, String)> {
    let source = relation.project.and_then(|p| p.id);
    let target = relation.related_project.and_then(|p| p.id);

    match (source, target) {
        (Some(source), Some(target)) if source == anchor && target != anchor => {
            Some((relation.relation_type, target))
        }
        (Some(source), Some(target)) if target == anchor && source != anchor => {
            Some((relation.relation_type.inverse(), source))
        }
        // Self-relation, kept so the graph can report it as a cycle.
        (Some(source), Some(target)) if source == anchor && target == anchor => {
            Some((relation.relation_type, target))
        }
        _ => None,
    }
}
