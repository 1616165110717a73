//! The outbound surface: cached, enriched project snapshots.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::SyncCache;
use crate::client::{LinearClient, Transport};
use crate::config::Config;
use crate::error::{FetchError, LinearError, Result};
use crate::estimator::{self, EndDateEstimate};
use crate::fetcher::RateLimitedFetcher;
use crate::graph::DependencyGraph;
use crate::mapper;
use crate::rate_limit::RateLimiter;
use crate::responses::Viewer;
use crate::types::{filter_by_date_range, EnrichedProject, Issue, Project, TimelineEntry, Warning};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_ISSUE_CONCURRENCY: usize = 4;

/// Logical identity of a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    WorkspaceProjects,
}

/// One consistent view of the workspace, replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub projects: Vec<EnrichedProject>,
    pub issues: Vec<Issue>,
    pub graph: DependencyGraph,
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<Warning>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn project(&self, id: &str) -> Option<&EnrichedProject> {
        self.projects.iter().find(|p| p.project.id == id)
    }

    /// End-date estimate for one project of this snapshot.
    /// Like [`Snapshot::project`], but an unknown id is an error.
    pub fn require_project(&self, id: &str) -> Result<&EnrichedProject> {
        self.project(id)
            .ok_or_else(|| LinearError::ProjectNotFound(id.to_string()))
    }

    pub fn estimate(&self, project_id: &str) -> Result<EndDateEstimate> {
        let enriched = self.require_project(project_id)?;
        Ok(estimator::estimate(&enriched.project, &self.issues))
    }

    pub fn issues_of<'a>(&'a self, project: &'a Project) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues.iter().filter(move |i| project.owns_issue(&i.id))
    }

    /// Gantt rows, optionally narrowed to a team and a date range.
    pub fn timeline(
        &self,
        today: NaiveDate,
        team: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Vec<TimelineEntry> {
        let entries = self
            .projects
            .iter()
            .filter(|p| {
                team.map_or(true, |team| {
                    p.project.teams.iter().any(|t| t.eq_ignore_ascii_case(team))
                })
            })
            .map(|p| p.timeline_entry(today))
            .collect();
        filter_by_date_range(entries, from, to)
    }
}

fn serialize_warnings<S: serde::Serializer>(
    warnings: &[Warning],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(warnings.iter().map(ToString::to_string))
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub cache_ttl: Duration,
    pub issue_concurrency: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            issue_concurrency: DEFAULT_ISSUE_CONCURRENCY,
        }
    }
}

/// Fetches, maps, enriches and caches the workspace's projects.
pub struct TimelineService<T> {
    fetcher: Arc<RateLimitedFetcher<T>>,
    cache: SyncCache<QueryKey, Arc<Snapshot>, FetchError>,
    options: ServiceOptions,
}

impl TimelineService<LinearClient> {
    /// Service talking to the real API with the settings in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = LinearClient::new(
            config.api_key()?,
            config.endpoint()?,
            config.request_timeout(),
        )?;
        let fetcher = RateLimitedFetcher::new(
            client,
            Arc::new(RateLimiter::per_hour(config.rate_limit_per_hour)),
            config.backoff_policy(),
        );
        let options = ServiceOptions {
            cache_ttl: config.cache_ttl(),
            issue_concurrency: config.issue_concurrency,
        };
        Ok(Self::new(fetcher, options))
    }
}

impl<T: Transport + 'static> TimelineService<T> {
    pub fn new(fetcher: RateLimitedFetcher<T>, options: ServiceOptions) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            cache: SyncCache::new(),
            options,
        }
    }

    /// The current snapshot, fetching it if the cached one is missing or
    /// expired. `force_refresh` treats the cached snapshot as expired.
    ///
    /// On failure the previous snapshot stays available through
    /// [`TimelineService::last_known_snapshot`] but is not returned here.
    pub async fn get_projects(&self, force_refresh: bool) -> Result<Arc<Snapshot>> {
        let ttl = if force_refresh {
            Duration::ZERO
        } else {
            self.options.cache_ttl
        };

        let fetcher = Arc::clone(&self.fetcher);
        let concurrency = self.options.issue_concurrency;
        self.cache
            .get_or_fetch(
                QueryKey::WorkspaceProjects,
                move || load_snapshot(fetcher, concurrency),
                ttl,
            )
            .await
            .map_err(LinearError::Refresh)
    }

    /// Drop the cached snapshot; the next call fetches.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    pub fn last_known_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.cache
            .last_known(&QueryKey::WorkspaceProjects)
            .map(|entry| entry.value)
    }

    /// Effective end date of `project` given `issues`.
    pub fn estimate_end_date(&self, project: &Project, issues: &[Issue]) -> Option<NaiveDate> {
        estimator::effective_end_date(project, issues)
    }

    /// Check the API key by asking who it belongs to.
    pub async fn validate_credentials(&self) -> Result<Viewer> {
        Ok(self.fetcher.viewer().await?)
    }

    pub fn remaining_requests(&self) -> u32 {
        self.fetcher.limiter().remaining()
    }
}

async fn load_snapshot<T: Transport + 'static>(
    fetcher: Arc<RateLimitedFetcher<T>>,
    concurrency: usize,
) -> std::result::Result<Arc<Snapshot>, FetchError> {
    let raw_projects = fetcher.fetch_all_projects().await?;
    let (mut projects, project_errors) = mapper::map_projects(&raw_projects);

    let ids: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();
    let issue_fetcher = Arc::clone(&fetcher);
    let raw_issues: Vec<Vec<serde_json::Value>> = stream::iter(ids.into_iter().map(move |id| {
        let fetcher = Arc::clone(&issue_fetcher);
        async move { fetcher.fetch_issues(&id).await }
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await?;

    let mut warnings: Vec<Warning> = project_errors.into_iter().map(Warning::from).collect();
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (project, raw) in projects.iter_mut().zip(&raw_issues) {
        let (mapped, errors) = mapper::map_issues(raw);
        warnings.extend(errors.into_iter().map(Warning::from));

        project.issue_ids = mapped.iter().map(|i| i.id.clone()).collect();
        for mut issue in mapped {
            if !seen.insert(issue.id.clone()) {
                continue;
            }
            if issue.project_id.is_none() {
                issue.project_id = Some(project.id.clone());
            }
            issues.push(issue);
        }
    }

    let (graph, graph_warnings) = DependencyGraph::build(&projects);
    warnings.extend(graph_warnings);

    let projects: Vec<EnrichedProject> = projects
        .into_iter()
        .map(|project| {
            let (enriched, warning) = enrich(project, &issues);
            warnings.extend(warning);
            enriched
        })
        .collect();

    if !graph.is_valid() {
        warn!(cycles = graph.cycles().len(), "dependency graph has cycles");
    }
    info!(
        projects = projects.len(),
        issues = issues.len(),
        edges = graph.edge_count(),
        warnings = warnings.len(),
        "snapshot refreshed"
    );

    Ok(Arc::new(Snapshot {
        projects,
        issues,
        graph,
        warnings,
        fetched_at: Utc::now(),
    }))
}

fn enrich(project: Project, issues: &[Issue]) -> (EnrichedProject, Option<Warning>) {
    let estimate = estimator::estimate(&project, issues);
    let warning = estimate.warning(&project.id);
    let completed_issue_count = issues
        .iter()
        .filter(|i| i.is_done() && project.owns_issue(&i.id))
        .count();

    let enriched = EnrichedProject {
        issue_count: project.issue_ids.len(),
        completed_issue_count,
        completion_fraction: estimator::completion_fraction(&project, issues),
        effective_start_date: estimator::effective_start_date(&project, issues),
        effective_end_date: estimate.date,
        end_date_basis: estimate.basis,
        project,
    };
    (enriched, warning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::EndDateBasis;
    use crate::types::issue::fixtures::{date, done_issue, issue};
    use crate::types::Status;

    #[test]
    fn enrich_derives_counts_and_dates() {
        let project = Project {
            id: "p".into(),
            name: "P".into(),
            state: Status::InProgress,
            issue_ids: vec!["a".into(), "b".into(), "c".into()],
            ..Project::default()
        };
        let issues = vec![
            done_issue("a", "2024-01-01", "2024-01-11"),
            done_issue("b", "2024-01-05", "2024-01-21"),
            issue("c", Status::Todo),
            done_issue("elsewhere", "2023-01-01", "2023-01-02"),
        ];

        let (enriched, warning) = enrich(project, &issues);
        assert_eq!(enriched.issue_count, 3);
        assert_eq!(enriched.completed_issue_count, 2);
        assert!((enriched.completion_fraction - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(enriched.effective_start_date, Some(date("2024-01-01")));
        assert_eq!(enriched.end_date_basis, EndDateBasis::Velocity);
        assert!(warning.is_none());
    }

    #[test]
    fn enrich_warns_on_fallback_basis() {
        let project = Project {
            id: "p".into(),
            start_date: Some(date("2024-01-01")),
            ..Project::default()
        };
        let (enriched, warning) = enrich(project, &[]);
        assert_eq!(enriched.completion_fraction, 0.0);
        assert_eq!(enriched.effective_end_date, Some(date("2024-07-01")));
        assert_eq!(
            warning,
            Some(Warning::InsufficientData {
                project_id: "p".into(),
                basis: EndDateBasis::PlanningHorizon,
            })
        );
    }
}
