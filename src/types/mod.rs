pub(crate) mod issue;
mod priority;
mod project;
mod relation;
mod status;
mod warning;

pub use issue::Issue;
pub use priority::Priority;
pub use project::{filter_by_date_range, EnrichedProject, Project, TimelineEntry};
pub use relation::ProjectRelationType;
pub use status::Status;
pub use warning::Warning;
