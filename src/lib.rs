//! Cached, rate-limited sync of Linear projects and issues, with effective
//! end-date estimation and project dependency graphs.

pub mod backoff;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod estimator;
pub mod fetcher;
pub mod graph;
pub mod logging;
pub mod mapper;
pub mod rate_limit;
pub mod responses;
pub mod service;
pub mod types;

pub use client::{LinearClient, Transport};
pub use config::Config;
pub use error::{FetchError, LinearError, MappingError, Result};
pub use estimator::{effective_end_date as estimate_end_date, EndDateBasis, EndDateEstimate};
pub use graph::DependencyGraph;
pub use service::{QueryKey, ServiceOptions, Snapshot, TimelineService};
pub use types::{EnrichedProject, Issue, Project, Status, TimelineEntry, Warning};
