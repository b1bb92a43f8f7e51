//! Cognitive classification levels.
//!
//! Eleven ordinal tiers, `M0` to `M10`, keyed by average centipawn loss.
//! Each tier has an upper loss threshold; thresholds strictly decrease as
//! the level rises, so better play lands on a higher level.

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// One classification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MLevel {
    pub level: u8,
    pub name: &'static str,
    /// Average loss must strictly exceed this value for the tier to apply.
    pub threshold: u32,
    /// Approximate playing-strength band (min, max).
    pub rating_range: (u32, u32),
}

impl MLevel {
    /// Short label such as `M6-Strategic-integrated`.
    pub fn label(&self) -> String {
        format!("M{}-{}", self.level, self.name)
    }
}

impl Serialize for MLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MLevel", 5)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("name", self.name)?;
        state.serialize_field("label", &self.label())?;
        state.serialize_field("threshold", &self.threshold)?;
        state.serialize_field("rating_range", &self.rating_range)?;
        state.end()
    }
}

/// All tiers, ordered by level.
pub const M_LEVELS: [MLevel; 11] = [
    MLevel { level: 0, name: "Pre-geometric", threshold: 150, rating_range: (0, 800) },
    MLevel { level: 1, name: "Rule-bound", threshold: 100, rating_range: (800, 1000) },
    MLevel { level: 2, name: "Pattern-nascent", threshold: 80, rating_range: (1000, 1200) },
    MLevel { level: 3, name: "Tactical-linear", threshold: 60, rating_range: (1200, 1400) },
    MLevel { level: 4, name: "Tactical-branching", threshold: 45, rating_range: (1400, 1600) },
    MLevel { level: 5, name: "Strategic-emergent", threshold: 35, rating_range: (1600, 1800) },
    MLevel { level: 6, name: "Strategic-integrated", threshold: 25, rating_range: (1800, 2000) },
    MLevel { level: 7, name: "Positional-intuitive", threshold: 18, rating_range: (2000, 2200) },
    MLevel { level: 8, name: "Dimensional-fluid", threshold: 12, rating_range: (2200, 2400) },
    MLevel { level: 9, name: "Geometric-transcendent", threshold: 8, rating_range: (2400, 2600) },
    MLevel { level: 10, name: "Master-unified", threshold: 0, rating_range: (2600, 2800) },
];

/// Maps an average centipawn loss to its tier.
///
/// Tiers are scanned from level 0 upwards and the first one whose threshold
/// the loss strictly exceeds wins. A loss at or below every threshold
/// (including `0`) falls through to level 10.
pub fn classify(average_loss: f64) -> MLevel {
    M_LEVELS
        .iter()
        .find(|level| average_loss > f64::from(level.threshold))
        .copied()
        .unwrap_or(M_LEVELS[M_LEVELS.len() - 1])
}
