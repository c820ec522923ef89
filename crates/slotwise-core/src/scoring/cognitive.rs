//! Cognitive load matching.
//!
//! Each hour of the day carries a productivity level. Work whose complexity
//! suits that level gets a small bonus; mismatches are discounted down to a
//! floor.

use serde::{Deserialize, Serialize};

use super::ScoringConfig;

/// Productivity level of a time slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductivityLevel {
    Low,
    Moderate,
    High,
    Peak,
}

impl ProductivityLevel {
    /// Numeric level on the 1-4 scale used for mismatch distance.
    pub fn value(self) -> i32 {
        match self {
            Self::Peak => 4,
            Self::High => 3,
            Self::Moderate => 2,
            Self::Low => 1,
        }
    }

    /// Complexity range that fits this level best.
    pub fn optimal_complexity(self) -> (u8, u8) {
        match self {
            Self::Peak => (4, 5),
            Self::High => (3, 4),
            Self::Moderate => (2, 3),
            Self::Low => (1, 2),
        }
    }

    pub fn is_optimal_for(self, complexity: u8) -> bool {
        let (lo, hi) = self.optimal_complexity();
        (lo..=hi).contains(&complexity)
    }
}

impl std::fmt::Display for ProductivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Peak => "peak",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        };
        f.write_str(label)
    }
}

/// `[start_hour, end_hour)` in local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub level: ProductivityLevel,
}

impl ProductivityWindow {
    pub fn new(start_hour: u32, end_hour: u32, level: ProductivityLevel) -> Self {
        Self {
            start_hour,
            end_hour,
            level,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

/// Hour-of-day to productivity level lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityTable {
    /// Level for hours not covered by any window
    pub default_level: ProductivityLevel,
    pub windows: Vec<ProductivityWindow>,
}

impl Default for ProductivityTable {
    fn default() -> Self {
        Self {
            default_level: ProductivityLevel::Low,
            windows: vec![
                ProductivityWindow::new(9, 12, ProductivityLevel::Peak),
                ProductivityWindow::new(12, 13, ProductivityLevel::Low),
                ProductivityWindow::new(13, 15, ProductivityLevel::Moderate),
                ProductivityWindow::new(15, 17, ProductivityLevel::High),
            ],
        }
    }
}

impl ProductivityTable {
    /// First matching window wins.
    pub fn level_at(&self, hour: u32) -> ProductivityLevel {
        self.windows
            .iter()
            .find(|w| w.contains(hour))
            .map(|w| w.level)
            .unwrap_or(self.default_level)
    }
}

/// Multiplier for doing work of `complexity` at `level`.
pub fn cognitive_match(level: ProductivityLevel, complexity: u8, config: &ScoringConfig) -> f64 {
    if level.is_optimal_for(complexity) {
        return config.optimal_match_bonus;
    }
    let distance = (level.value() - i32::from(complexity)).abs();
    (1.0 - config.mismatch_step * f64::from(distance)).max(config.min_cognitive_match)
}

/// Demanding work (complexity 4-5) landing in a low-productivity slot.
pub fn is_mismatch(level: ProductivityLevel, complexity: u8) -> bool {
    complexity >= 4 && level == ProductivityLevel::Low
}
