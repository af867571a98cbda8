//! History window occupancy for display

use serde::Serialize;
use std::fmt;

/// How much of the history window is in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    /// Turns currently held in the window
    pub used: usize,
    /// Window size
    pub capacity: usize,
}

impl WindowUsage {
    /// Calculate usage percentage
    pub fn usage_percent(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.used as f32 / self.capacity as f32) * 100.0
    }

    /// Whether the next turn will evict the oldest one
    pub fn is_full(&self) -> bool {
        self.used >= self.capacity
    }
}

impl fmt::Display for WindowUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} turns used", self.used, self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_display() {
        let usage = WindowUsage { used: 3, capacity: 5 };
        assert_eq!(usage.to_string(), "3/5 turns used");
        assert!(!usage.is_full());
        assert!((usage.usage_percent() - 60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_usage_empty_capacity() {
        let usage = WindowUsage::default();
        assert_eq!(usage.usage_percent(), 0.0);
        assert!(usage.is_full());
    }
}
