use std::fmt;

use crate::error::MappingError;
use crate::estimator::EndDateBasis;

/// Non-fatal findings collected while building a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A raw record was skipped.
    Mapping(MappingError),
    /// Dependency arrows along this cycle must not be drawn unacknowledged.
    CycleDetected { cycle: Vec<String> },
    /// The end date is a placeholder or missing.
    InsufficientData {
        project_id: String,
        basis: EndDateBasis,
    },
    /// `project_id` is blocked by `blocker_id` but the blocker does not list
    /// it under `blocks`, or the other way round.
    InconsistentRelation {
        project_id: String,
        blocker_id: String,
    },
    /// A relation points at a project outside the snapshot.
    UnknownDependency {
        project_id: String,
        dependency_id: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Mapping(err) => write!(f, "skipped {}: {err}", err.record_type),
            Warning::CycleDetected { cycle } => {
                write!(f, "dependency cycle: {}", cycle.join(" -> "))?;
                if let Some(first) = cycle.first() {
                    write!(f, " -> {first}")?;
                }
                Ok(())
            }
            Warning::InsufficientData { project_id, basis } => {
                write!(f, "project {project_id}: not enough history, end date {basis}")
            }
            Warning::InconsistentRelation {
                project_id,
                blocker_id,
            } => write!(
                f,
                "project {project_id} is blocked by {blocker_id} but the inverse relation is missing"
            ),
            Warning::UnknownDependency {
                project_id,
                dependency_id,
            } => write!(f, "project {project_id} depends on unknown project {dependency_id}"),
        }
    }
}

impl From<MappingError> for Warning {
    fn from(err: MappingError) -> Self {
        Warning::Mapping(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_closes_the_loop() {
        let w = Warning::CycleDetected {
            cycle: vec!["a".into(), "b".into()],
        };
        assert_eq!(w.to_string(), "dependency cycle: a -> b -> a");
    }
}
