//! GraphQL response shapes.
//!
//! Page envelopes are decoded strictly; individual nodes stay as raw JSON and
//! are decoded one by one into the lenient `Api*` records below, so a single
//! bad node never poisons a page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Priority, ProjectRelationType};

/// Pagination info for cursor-based pagination.
#[derive(Deserialize, Debug, Default)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

/// A GraphQL connection (`{ nodes, pageInfo }`).
#[derive(Deserialize, Debug)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

#[derive(Deserialize)]
pub struct ProjectsPage {
    pub projects: Connection<Value>,
}

#[derive(Deserialize)]
pub struct ProjectIssuesPage {
    pub project: Option<ProjectIssues>,
}

#[derive(Deserialize)]
pub struct ProjectIssues {
    pub issues: Connection<Value>,
}

/// Viewer (current user) response.
#[derive(Deserialize, Debug)]
pub struct ViewerResponse {
    pub viewer: Viewer,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Viewer {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// `{ id }` / `{ id name }` reference.
#[derive(Deserialize, Debug, Default)]
pub struct NodeRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ApiProject {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "targetDate")]
    pub target_date: Option<String>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<String>,
    pub color: Option<String>,
    pub lead: Option<NodeRef>,
    pub teams: Option<Connection<NodeRef>>,
    pub relations: Option<Connection<ApiProjectRelation>>,
    #[serde(rename = "inverseRelations")]
    pub inverse_relations: Option<Connection<ApiProjectRelation>>,
}

#[derive(Deserialize, Debug)]
pub struct ApiProjectRelation {
    #[serde(rename = "type", default)]
    pub relation_type: ProjectRelationType,
    #[serde(default)]
    pub project: Option<NodeRef>,
    #[serde(rename = "relatedProject", default)]
    pub related_project: Option<NodeRef>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ApiIssue {
    pub id: Option<String>,
    pub title: Option<String>,
    pub priority: Priority,
    pub estimate: Option<f64>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<String>,
    #[serde(rename = "dueDate")]
    pub due_date: Option<String>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<String>,
    pub state: Option<ApiWorkflowState>,
    pub assignee: Option<NodeRef>,
    pub labels: Option<Connection<NodeRef>>,
    pub parent: Option<NodeRef>,
    pub project: Option<NodeRef>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ApiWorkflowState {
    #[serde(rename = "type", default)]
    pub state_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
