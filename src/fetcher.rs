//! Paginated, budgeted and retried reads from the Linear API.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backoff::{BackoffPolicy, Step};
use crate::client::Transport;
use crate::error::FetchError;
use crate::rate_limit::RateLimiter;
use crate::responses::{Connection, ProjectIssuesPage, ProjectsPage, Viewer, ViewerResponse};

pub const PROJECT_PAGE_SIZE: u32 = 50;
pub const ISSUE_PAGE_SIZE: u32 = 100;

const LIST_PROJECTS_QUERY: &str = r#"
query ListProjects($first: Int!, $after: String) {
    projects(first: $first, after: $after) {
        pageInfo {
            hasNextPage
            endCursor
        }
        nodes {
            id
            name
            description
            state
            startDate
            targetDate
            completedAt
            color
            lead {
                id
                name
            }
            teams {
                nodes {
                    id
                    name
                }
            }
            relations {
                nodes {
                    type
                    project { id }
                    relatedProject { id }
                }
            }
            inverseRelations {
                nodes {
                    type
                    project { id }
                    relatedProject { id }
                }
            }
        }
    }
}
"#;

const PROJECT_ISSUES_QUERY: &str = r#"
query ProjectIssues($projectId: String!, $first: Int!, $after: String) {
    project(id: $projectId) {
        issues(first: $first, after: $after) {
            pageInfo {
                hasNextPage
                endCursor
            }
            nodes {
                id
                title
                priority
                estimate
                startedAt
                dueDate
                completedAt
                state {
                    name
                    type
                }
                assignee {
                    id
                    name
                }
                labels {
                    nodes {
                        id
                        name
                    }
                }
                parent {
                    id
                }
                project {
                    id
                }
            }
        }
    }
}
"#;

const VIEWER_QUERY: &str = r#"
query Viewer {
    viewer {
        id
        name
        email
    }
}
"#;

/// Reads projects and issues page by page through a shared request budget,
/// retrying throttled and transient failures with exponential backoff.
pub struct RateLimitedFetcher<T> {
    transport: T,
    limiter: Arc<RateLimiter>,
    backoff: BackoffPolicy,
}

impl<T: Transport> RateLimitedFetcher<T> {
    pub fn new(transport: T, limiter: Arc<RateLimiter>, backoff: BackoffPolicy) -> Self {
        Self {
            transport,
            limiter,
            backoff,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Every project node in the workspace, in server order.
    pub async fn fetch_all_projects(&self) -> Result<Vec<Value>, FetchError> {
        self.fetch_paginated(LIST_PROJECTS_QUERY, json!({ "first": PROJECT_PAGE_SIZE }), |page| {
            let page: ProjectsPage = decode(page)?;
            Ok(page.projects)
        })
        .await
    }

    /// Every issue node of one project, in server order.
    pub async fn fetch_issues(&self, project_id: &str) -> Result<Vec<Value>, FetchError> {
        self.fetch_paginated(
            PROJECT_ISSUES_QUERY,
            json!({ "projectId": project_id, "first": ISSUE_PAGE_SIZE }),
            |page| {
                let page: ProjectIssuesPage = decode(page)?;
                Ok(page.project.map(|p| p.issues).unwrap_or_default())
            },
        )
        .await
    }

    /// The user the API key belongs to.
    pub async fn viewer(&self) -> Result<Viewer, FetchError> {
        let data = self.execute_with_retry(VIEWER_QUERY, Value::Null).await?;
        let response: ViewerResponse = decode(data)?;
        Ok(response.viewer)
    }

    /// Follow `endCursor` until the server reports no further page. Any page
    /// failing fails the whole fetch; nothing partial is returned.
    async fn fetch_paginated<F>(
        &self,
        query: &str,
        mut variables: Value,
        extract: F,
    ) -> Result<Vec<Value>, FetchError>
    where
        F: Fn(Value) -> Result<Connection<Value>, FetchError>,
    {
        let mut items = Vec::new();
        let mut after: Option<String> = None;
        let mut pages = 0u32;

        loop {
            variables["after"] = after.map_or(Value::Null, Value::String);

            let data = self.execute_with_retry(query, variables.clone()).await?;
            let connection = extract(data)?;
            pages += 1;
            items.extend(connection.nodes);

            match connection.page_info {
                info if info.has_next_page => match info.end_cursor {
                    Some(cursor) => after = Some(cursor),
                    None => {
                        return Err(FetchError::Decode(
                            "hasNextPage without an endCursor".to_string(),
                        ))
                    }
                },
                _ => break,
            }
        }

        debug!(pages, items = items.len(), "pagination complete");
        Ok(items)
    }

    async fn execute_with_retry(&self, query: &str, variables: Value) -> Result<Value, FetchError> {
        let mut backoff = self.backoff.start();

        loop {
            self.limiter.acquire().await;
            backoff.begin_attempt();

            let err = match self.transport.execute(query, variables.clone()).await {
                Ok(data) => {
                    backoff.succeed();
                    return Ok(data);
                }
                Err(err) => err,
            };

            if let Some(pause) = err.retry_after() {
                self.limiter.pause_for(pause);
            }

            match backoff.fail(err.is_retryable(), err.retry_after()) {
                Step::Retry(delay) => {
                    warn!(
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Step::GiveUp if err.is_retryable() => {
                    return Err(FetchError::RetriesExhausted {
                        attempts: backoff.attempts(),
                        last: Box::new(err),
                    });
                }
                Step::GiveUp => return Err(err),
            }
        }
    }
}

fn decode<D: DeserializeOwned>(data: Value) -> Result<D, FetchError> {
    serde_json::from_value(data).map_err(|e| FetchError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    /// Transport answering from a fixed script and recording the variables it saw.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<Value, FetchError>>>,
        seen: Mutex<Vec<Value>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Value, FetchError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            }
        }
    }

    impl Transport for Scripted {
        async fn execute(&self, _query: &str, variables: Value) -> Result<Value, FetchError> {
            self.seen.lock().push(variables);
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Err(FetchError::EmptyResponse))
        }
    }

    fn projects_page(ids: &[&str], next: Option<&str>) -> Value {
        json!({
            "projects": {
                "nodes": ids.iter().map(|id| json!({ "id": id, "name": id })).collect::<Vec<_>>(),
                "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
            }
        })
    }

    fn fetcher(replies: Vec<Result<Value, FetchError>>) -> RateLimitedFetcher<Scripted> {
        RateLimitedFetcher::new(
            Scripted::new(replies),
            Arc::new(RateLimiter::per_hour(1000)),
            BackoffPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
            },
        )
    }

    #[tokio::test]
    async fn follows_cursors_in_order() {
        let fetcher = fetcher(vec![
            Ok(projects_page(&["a", "b"], Some("c1"))),
            Ok(projects_page(&["c"], Some("c2"))),
            Ok(projects_page(&["d"], None)),
        ]);

        let nodes = fetcher.fetch_all_projects().await.unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| n["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);

        let seen = fetcher.transport.seen.lock();
        let cursors: Vec<_> = seen.iter().map(|v| v["after"].clone()).collect();
        assert_eq!(cursors, [Value::Null, json!("c1"), json!("c2")]);
        assert_eq!(seen[0]["first"], PROJECT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn failing_page_fails_the_whole_fetch() {
        let fetcher = fetcher(vec![
            Ok(projects_page(&["a"], Some("c1"))),
            Err(FetchError::GraphQl {
                messages: vec!["boom".into()],
            }),
        ]);
        let err = fetcher.fetch_all_projects().await.unwrap_err();
        assert!(matches!(err, FetchError::GraphQl { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_and_recover() {
        let fetcher = fetcher(vec![
            Err(FetchError::Transient("502".into())),
            Err(FetchError::Throttled { retry_after: None }),
            Ok(projects_page(&["a"], None)),
        ]);
        let start = Instant::now();

        let nodes = fetcher.fetch_all_projects().await.unwrap();
        assert_eq!(nodes.len(), 1);
        // 1s then 2s.
        assert_eq!(Instant::now() - start, Duration::from_secs(3));
        assert_eq!(fetcher.limiter().remaining(), 997);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_carry_the_last_cause() {
        let fetcher = fetcher(vec![
            Err(FetchError::Transient("first".into())),
            Err(FetchError::Transient("second".into())),
            Err(FetchError::Transient("third".into())),
        ]);

        match fetcher.fetch_all_projects().await.unwrap_err() {
            FetchError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.to_string(), "transient failure: third");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_pauses_the_shared_limiter() {
        let fetcher = fetcher(vec![
            Err(FetchError::Throttled {
                retry_after: Some(Duration::from_secs(30)),
            }),
            Ok(projects_page(&[], None)),
        ]);
        let start = Instant::now();
        fetcher.fetch_all_projects().await.unwrap();
        assert_eq!(Instant::now() - start, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let fetcher = fetcher(vec![Err(FetchError::Unauthorized { status: 401 })]);
        let err = fetcher.fetch_all_projects().await.unwrap_err();
        assert!(matches!(err, FetchError::Unauthorized { status: 401 }));
        assert_eq!(fetcher.transport.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn issues_of_missing_project_are_empty() {
        let fetcher = fetcher(vec![Ok(json!({ "project": null }))]);
        assert!(fetcher.fetch_issues("gone").await.unwrap().is_empty());
        assert_eq!(fetcher.transport.seen.lock()[0]["projectId"], "gone");
    }

    #[tokio::test]
    async fn malformed_envelope_is_a_decode_error() {
        let fetcher = fetcher(vec![Ok(json!({ "projects": 5 }))]);
        let err = fetcher.fetch_all_projects().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn viewer_is_decoded() {
        let fetcher = fetcher(vec![Ok(json!({ "viewer": { "id": "u1", "name": "Ana" } }))]);
        let viewer = fetcher.viewer().await.unwrap();
        assert_eq!(viewer.id, "u1");
        assert_eq!(viewer.name.as_deref(), Some("Ana"));
    }
}
