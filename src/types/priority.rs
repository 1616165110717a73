use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Priority levels for issues.
///
/// Ordered from least to most pressing, so `Priority::Urgent > Priority::Low`.
/// On the wire Linear encodes these as integers where 1 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Create Priority from Linear's integer encoding. Unknown values map to `None`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Priority::Urgent,
            2 => Priority::High,
            3 => Priority::Medium,
            4 => Priority::Low,
            _ => Priority::None,
        }
    }

    /// Linear's integer encoding.
    pub fn as_i32(self) -> i32 {
        match self {
            Priority::None => 0,
            Priority::Urgent => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.map_or(Priority::None, |v| Priority::from_i32(v as i32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_encoding_maps_one_to_urgent() {
        assert_eq!(Priority::from_i32(1), Priority::Urgent);
        assert_eq!(Priority::from_i32(4), Priority::Low);
        assert_eq!(Priority::from_i32(0), Priority::None);
        assert_eq!(Priority::from_i32(17), Priority::None);
        assert_eq!(Priority::Urgent.as_i32(), 1);
    }

    #[test]
    fn ordering_follows_urgency() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low > Priority::None);
    }

    #[test]
    fn deserializes_null_and_float_encodings() {
        let p: Priority = serde_json::from_str("null").unwrap();
        assert_eq!(p, Priority::None);
        let p: Priority = serde_json::from_str("2.0").unwrap();
        assert_eq!(p, Priority::High);
    }
}
