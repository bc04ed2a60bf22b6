//! Routing strategies.
//!
//! Every strategy works on the same scored candidate list. It first fills in
//! each candidate's `selection_score`, then picks the eligible candidate with
//! the highest selection score. Ties break by raw score, then by worker type
//! name so the outcome never depends on registration order.

use crate::scoring::CandidateScore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use switchyard_core::{CoreError, Priority};

const ADAPTIVE_SCORE_WEIGHT: f64 = 0.4;
const ADAPTIVE_LOAD_WEIGHT: f64 = 0.25;
const ADAPTIVE_SUCCESS_WEIGHT: f64 = 0.25;
const ADAPTIVE_RESPONSE_WEIGHT: f64 = 0.1;
const SPECIALIZATION_BONUS: f64 = 1.2;

/// Worker selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    /// Highest score
    Simple,
    /// Least loaded for urgent tasks, highest score otherwise
    Priority,
    /// Score discounted by load
    LoadBalanced,
    /// Weighted blend of score, load, success rate and responsiveness
    #[default]
    Adaptive,
}

impl RoutingStrategy {
    /// All strategies
    pub const ALL: [Self; 4] = [Self::Simple, Self::Priority, Self::LoadBalanced, Self::Adaptive];

    /// Strategy name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Priority => "priority",
            Self::LoadBalanced => "load-balanced",
            Self::Adaptive => "adaptive",
        }
    }

    /// Compute selection scores and return the index of the chosen candidate
    ///
    /// Returns `None` when no candidate has a positive score.
    pub fn select(self, candidates: &mut [CandidateScore], priority: Priority) -> Option<usize> {
        let max_score = candidates.iter().map(|c| c.score).fold(0.0_f64, f64::max);

        for candidate in candidates.iter_mut() {
            candidate.selection_score = match self {
                Self::Simple => candidate.score,
                Self::Priority if priority.is_urgent() => 1.0 - candidate.load_ratio,
                Self::Priority => candidate.score,
                Self::LoadBalanced => candidate.score * (1.0 - candidate.load_ratio.min(1.0)),
                Self::Adaptive => adaptive_score(candidate, max_score, priority),
            };
        }

        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_eligible())
            .max_by(|(_, a), (_, b)| compare(a, b))
            .map(|(index, _)| index)
    }
}

fn adaptive_score(candidate: &CandidateScore, max_score: f64, priority: Priority) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    let response_bonus = if !priority.is_urgent() {
        0.0
    } else if candidate.average_response_ms > 0.0 {
        (candidate.nominal_ms / candidate.average_response_ms).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let blended = ADAPTIVE_SCORE_WEIGHT * candidate.score / max_score
        + ADAPTIVE_LOAD_WEIGHT * (1.0 - candidate.load_ratio)
        + ADAPTIVE_SUCCESS_WEIGHT * candidate.success_rate
        + ADAPTIVE_RESPONSE_WEIGHT * response_bonus;

    if candidate.specialized {
        blended * SPECIALIZATION_BONUS
    } else {
        blended
    }
}

/// Order candidates so that the preferred one compares greatest
fn compare(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    a.selection_score
        .partial_cmp(&b.selection_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
        .then_with(|| b.worker_type.cmp(&a.worker_type))
}

impl std::fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RoutingStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| CoreError::validation("routing.strategy", format!("unknown strategy '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, score: f64, load_ratio: f64) -> CandidateScore {
        CandidateScore {
            worker_type: name.to_string(),
            score,
            selection_score: score,
            load_ratio,
            success_rate: 1.0,
            average_response_ms: 0.0,
            nominal_ms: 1000.0,
            specialized: false,
        }
    }

    fn pick(strategy: RoutingStrategy, mut candidates: Vec<CandidateScore>, priority: Priority) -> Option<String> {
        strategy
            .select(&mut candidates, priority)
            .map(|i| candidates[i].worker_type.clone())
    }

    #[test]
    fn test_simple_picks_max_score() {
        let candidates = vec![candidate("a", 30.0, 0.0), candidate("b", 50.0, 0.9)];
        assert_eq!(pick(RoutingStrategy::Simple, candidates, Priority::Medium).as_deref(), Some("b"));
    }

    #[test]
    fn test_priority_urgent_prefers_least_loaded() {
        let candidates = vec![candidate("a", 30.0, 0.0), candidate("b", 50.0, 0.5)];
        assert_eq!(
            pick(RoutingStrategy::Priority, candidates.clone(), Priority::Critical).as_deref(),
            Some("a")
        );
        assert_eq!(pick(RoutingStrategy::Priority, candidates, Priority::Low).as_deref(), Some("b"));
    }

    #[test]
    fn test_priority_ties_break_by_score() {
        let candidates = vec![candidate("a", 30.0, 0.0), candidate("b", 50.0, 0.0)];
        assert_eq!(pick(RoutingStrategy::Priority, candidates, Priority::High).as_deref(), Some("b"));
    }

    #[test]
    fn test_load_balanced_discounts_load() {
        let candidates = vec![candidate("a", 30.0, 0.0), candidate("b", 50.0, 0.5)];
        assert_eq!(
            pick(RoutingStrategy::LoadBalanced, candidates, Priority::Medium).as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_adaptive_specialization_bonus() {
        let mut specialist = candidate("specialist", 40.0, 0.0);
        specialist.specialized = true;
        let candidates = vec![candidate("generalist", 50.0, 0.0), specialist];
        assert_eq!(
            pick(RoutingStrategy::Adaptive, candidates, Priority::Medium).as_deref(),
            Some("specialist")
        );
    }

    #[test]
    fn test_adaptive_response_bonus_only_for_urgent() {
        let mut slow = candidate("slow", 50.0, 0.0);
        slow.average_response_ms = 10_000.0;
        let mut fast = candidate("fast", 50.0, 0.0);
        fast.average_response_ms = 500.0;

        let mut candidates = vec![slow.clone(), fast.clone()];
        RoutingStrategy::Adaptive.select(&mut candidates, Priority::Medium);
        assert_eq!(candidates[0].selection_score, candidates[1].selection_score);

        let mut candidates = vec![slow, fast];
        let chosen = RoutingStrategy::Adaptive.select(&mut candidates, Priority::Critical);
        assert_eq!(chosen, Some(1));
        assert!((candidates[1].selection_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_score_never_selected() {
        for strategy in RoutingStrategy::ALL {
            let candidates = vec![candidate("idle", 0.0, 0.0)];
            assert_eq!(pick(strategy, candidates, Priority::Critical), None);
        }
    }

    #[test]
    fn test_full_tie_breaks_by_name() {
        let candidates = vec![candidate("zeta", 40.0, 0.0), candidate("alpha", 40.0, 0.0)];
        for strategy in RoutingStrategy::ALL {
            assert_eq!(
                pick(strategy, candidates.clone(), Priority::Medium).as_deref(),
                Some("alpha")
            );
        }
    }

    #[test]
    fn test_name_round_trip() {
        for strategy in RoutingStrategy::ALL {
            assert_eq!(strategy.name().parse::<RoutingStrategy>().unwrap(), strategy);
        }
        assert!("fastest".parse::<RoutingStrategy>().is_err());
        assert_eq!(
            serde_json::to_string(&RoutingStrategy::LoadBalanced).unwrap(),
            r#""load-balanced""#
        );
    }
}
