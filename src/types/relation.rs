use std::fmt;

use serde::{Deserialize, Serialize};

/// Relation types between projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRelationType {
    /// The anchor project blocks the related project
    Blocks,
    /// The anchor project is blocked by the related project
    BlockedBy,
    /// General relationship, carries no ordering
    #[default]
    #[serde(other)]
    Related,
}

impl fmt::Display for ProjectRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks => write!(f, "blocks"),
            Self::BlockedBy => write!(f, "blocked by"),
            Self::Related => write!(f, "related"),
        }
    }
}

impl ProjectRelationType {
    /// The same relation seen from the other project.
    pub fn inverse(self) -> Self {
        match self {
            Self::Blocks => Self::BlockedBy,
            Self::BlockedBy => Self::Blocks,
            Self::Related => Self::Related,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_relation_types_are_related() {
        let t: ProjectRelationType = serde_json::from_str("\"dependency\"").unwrap();
        assert_eq!(t, ProjectRelationType::Related);
        let t: ProjectRelationType = serde_json::from_str("\"blocked_by\"").unwrap();
        assert_eq!(t, ProjectRelationType::BlockedBy);
        assert_eq!(t.inverse(), ProjectRelationType::Blocks);
    }
}
