//! Percentage-based remapping of deck category scores onto the rubric.
//!
//! Each source [`DeckCategory`] maps onto a list of `(RubricCategory,
//! percentage)` pairs. Contributions from several sources onto one target are
//! summed, never averaged: use [`MappedScore::normalized_score`] when an
//! average is wanted.

use std::collections::{BTreeMap, BTreeSet};

use deckscope_state::{DeckCategory, RubricCategory, ScoreCategory, ScoreRecord};
use serde::{Deserialize, Serialize};

use crate::calculator::{clamp_score, clamp_weight};
use crate::domain::ConfigError;

/// `source_agent` of rubric records produced by the mapper.
pub const MAPPER_SOURCE: &str = "category_mapper";

/// One leg of a source category's split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappingTarget {
    pub target: RubricCategory,
    pub percentage: f64,
}

impl MappingTarget {
    pub fn new(target: RubricCategory, percentage: f64) -> Self {
        Self { target, percentage }
    }
}

/// Accumulated contribution to one rubric category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedScore {
    pub score: f64,
    pub weight: f64,
}

impl MappedScore {
    /// Summed score divided by summed weight, or `None` with no weight.
    pub fn normalized_score(&self) -> Option<f64> {
        if self.weight == 0.0 {
            None
        } else {
            Some(self.score / self.weight)
        }
    }

    fn add(&mut self, other: MappedScore) {
        self.score += other.score;
        self.weight += other.weight;
    }
}

/// Static deck -> rubric mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMapper {
    table: BTreeMap<DeckCategory, Vec<MappingTarget>>,
}

impl CategoryMapper {
    /// Build from an explicit table. Percentages must lie in `[0, 1]`.
    pub fn new(table: BTreeMap<DeckCategory, Vec<MappingTarget>>) -> Result<Self, ConfigError> {
        for (source, targets) in &table {
            for t in targets {
                if !(0.0..=1.0).contains(&t.percentage) {
                    return Err(ConfigError::Invalid(format!(
                        "mapping {source} -> {} has percentage {} outside [0, 1]",
                        t.target, t.percentage
                    )));
                }
            }
        }
        Ok(Self { table })
    }

    /// Targets of one source category (empty when unmapped).
    pub fn targets(&self, source: DeckCategory) -> &[MappingTarget] {
        self.table.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Split one source score across its targets.
    pub fn map_one(
        &self,
        source: DeckCategory,
        score: f64,
        weight: f64,
    ) -> BTreeMap<RubricCategory, MappedScore> {
        let mut out = BTreeMap::new();
        for t in self.targets(source) {
            out.entry(t.target)
                .or_insert_with(MappedScore::default)
                .add(MappedScore {
                    score: score * t.percentage,
                    weight: weight * t.percentage,
                });
        }
        out
    }

    /// Map every `(source, score, weight)` and sum per target.
    pub fn map_all(
        &self,
        scores: impl IntoIterator<Item = (DeckCategory, f64, f64)>,
    ) -> BTreeMap<RubricCategory, MappedScore> {
        let mut totals: BTreeMap<RubricCategory, MappedScore> = BTreeMap::new();
        for (source, score, weight) in scores {
            for (target, contribution) in self.map_one(source, score, weight) {
                totals.entry(target).or_default().add(contribution);
            }
        }
        totals
    }

    /// One rubric record per mapped target with non-zero weight.
    ///
    /// Deck scores enter [`map_all`](Self::map_all) pre-multiplied by their
    /// weight, so each record's score is the weighted average of its
    /// sources. Rubric inputs are ignored.
    pub fn rubric_records(&self, deck_scores: &[ScoreRecord]) -> Vec<ScoreRecord> {
        let mapped = self.map_all(deck_scores.iter().filter_map(|s| match s.category {
            ScoreCategory::Deck(c) => Some((c, s.score * s.weight, s.weight)),
            ScoreCategory::Rubric(_) => None,
        }));
        mapped
            .into_iter()
            .filter_map(|(target, m)| {
                let normalized = m.normalized_score()?;
                Some(ScoreRecord {
                    category: ScoreCategory::Rubric(target),
                    score: clamp_score(normalized),
                    weight: clamp_weight(m.weight),
                    justification: format!(
                        "weighted mapping of deck scores (total weight {:.2})",
                        m.weight
                    ),
                    source_agent: MAPPER_SOURCE.to_string(),
                })
            })
            .collect()
    }

    /// Whether any source feeds `target`.
    pub fn is_mapped(&self, target: RubricCategory) -> bool {
        self.table
            .values()
            .flatten()
            .any(|t| t.target == target)
    }

    /// Rubric categories no source feeds. They keep their default value
    /// downstream rather than receiving a fabricated score.
    pub fn unmapped_targets(&self) -> Vec<RubricCategory> {
        let mapped: BTreeSet<RubricCategory> =
            self.table.values().flatten().map(|t| t.target).collect();
        RubricCategory::ALL
            .into_iter()
            .filter(|c| !mapped.contains(c))
            .collect()
    }
}

impl Default for CategoryMapper {
    fn default() -> Self {
        use DeckCategory as D;
        use RubricCategory as R;

        let t = MappingTarget::new;
        let table = BTreeMap::from([
            (D::Problem, vec![t(R::MarketOpportunity, 0.6), t(R::ProductTechnology, 0.4)]),
            (D::Solution, vec![t(R::ProductTechnology, 0.7), t(R::CompetitivePosition, 0.3)]),
            (D::Market, vec![t(R::MarketOpportunity, 1.0)]),
            (D::Product, vec![t(R::ProductTechnology, 1.0)]),
            (D::Traction, vec![t(R::BusinessTraction, 0.8), t(R::FinancialHealth, 0.2)]),
            (D::BusinessModel, vec![t(R::BusinessTraction, 0.5), t(R::FinancialHealth, 0.5)]),
            (D::Team, vec![t(R::TeamExecution, 1.0)]),
            (D::Competition, vec![t(R::CompetitivePosition, 1.0)]),
            (D::Financials, vec![t(R::FinancialHealth, 1.0)]),
            (
                D::GoToMarket,
                vec![
                    t(R::BusinessTraction, 0.5),
                    t(R::MarketOpportunity, 0.3),
                    t(R::TeamExecution, 0.2),
                ],
            ),
        ]);
        Self { table }
    }
}
