//! Post reaction kinds.

use serde::{Deserialize, Serialize};

/// A reaction a user may attach to a post; at most one per user at a time.
///
/// Wire format: `u8` (0 = Like, 1 = Love, 2 = Haha).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like = 0,
    Love = 1,
    Haha = 2,
}

impl ReactionKind {
    /// Convert from `u8` wire value. Returns `None` for unknown values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Like),
            1 => Some(Self::Love),
            2 => Some(Self::Haha),
            _ => None,
        }
    }

    /// Convert to `u8` wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_u8_to_reaction_kind() {
        assert_eq!(ReactionKind::from_u8(0), Some(ReactionKind::Like));
        assert_eq!(ReactionKind::from_u8(1), Some(ReactionKind::Love));
        assert_eq!(ReactionKind::from_u8(2), Some(ReactionKind::Haha));
        assert_eq!(ReactionKind::from_u8(3), None);
    }

    #[test]
    fn should_serialize_reaction_kind_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReactionKind::Like).unwrap(),
            "\"like\""
        );
        assert_eq!(
            serde_json::to_string(&ReactionKind::Haha).unwrap(),
            "\"haha\""
        );
    }
}
