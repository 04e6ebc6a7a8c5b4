//! Scenario selection -- validate a requested scenario or draw a weighted one.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::incident::Severity;

/// A named category of simulated failure fed to the analysis worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Timeout,
    Auth,
    Throttle,
    Mixed,
}

/// Weighted draw table: `mixed` three times, every other scenario once.
const WEIGHTED: [Scenario; 6] = [
    Scenario::Mixed,
    Scenario::Mixed,
    Scenario::Mixed,
    Scenario::Timeout,
    Scenario::Auth,
    Scenario::Throttle,
];

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Timeout,
        Scenario::Auth,
        Scenario::Throttle,
        Scenario::Mixed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Timeout => "timeout",
            Scenario::Auth => "auth",
            Scenario::Throttle => "throttle",
            Scenario::Mixed => "mixed",
        }
    }

    /// Case-insensitive lookup. Returns `None` for anything outside the set.
    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == lowered)
    }

    /// Severity recorded for an incident raised under this scenario.
    pub fn severity(&self) -> Severity {
        match self {
            Scenario::Mixed => Severity::Sev2,
            _ => Severity::Sev3,
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Pick the scenario for a simulation run.
///
/// A recognised name (any casing) is returned as-is. Missing or unknown
/// names fall back to a weighted random draw; this never fails.
pub fn select<R: Rng + ?Sized>(requested: Option<&str>, rng: &mut R) -> Scenario {
    if let Some(scenario) = requested.and_then(Scenario::parse) {
        return scenario;
    }
    if let Some(name) = requested {
        tracing::debug!(requested = %name, "unknown scenario, drawing a weighted one");
    }
    WEIGHTED[rng.gen_range(0..WEIGHTED.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_known_scenarios_are_case_insensitive() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(select(Some("TIMEOUT"), &mut rng), Scenario::Timeout);
        assert_eq!(select(Some("Auth"), &mut rng), Scenario::Auth);
        assert_eq!(select(Some("throttle"), &mut rng), Scenario::Throttle);
        assert_eq!(select(Some("mIxEd"), &mut rng), Scenario::Mixed);
    }

    #[test]
    fn test_unknown_scenario_falls_back_to_draw() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let s = select(Some("bogus"), &mut rng);
            assert!(Scenario::ALL.contains(&s));
        }
        let s = select(None, &mut rng);
        assert!(Scenario::ALL.contains(&s));
    }

    #[test]
    fn test_weighted_draw_favours_mixed() {
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 12_000;
        let mixed = (0..draws)
            .filter(|_| select(None, &mut rng) == Scenario::Mixed)
            .count();
        let share = mixed as f64 / draws as f64;
        // Expected 0.5
        assert!(share > 0.45 && share < 0.55, "mixed share was {share}");
    }

    #[test]
    fn test_severity_derivation() {
        assert_eq!(Scenario::Mixed.severity(), Severity::Sev2);
        assert_eq!(Scenario::Timeout.severity(), Severity::Sev3);
        assert_eq!(Scenario::Auth.severity(), Severity::Sev3);
        assert_eq!(Scenario::Throttle.severity(), Severity::Sev3);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&Scenario::Throttle).unwrap();
        assert_eq!(json, "\"throttle\"");
    }
}
