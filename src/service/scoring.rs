// service/scoring.rs
use serde::{Deserialize, Serialize};

use crate::{
    models::{criteriamodel::MatchCriteria, listingmodel::CandidateItem},
    service::error::ServiceError,
};

/// Score returned when a request constrains nothing.
pub const BASELINE_SCORE: i32 = 50;
/// Share of the price weight granted when the listing price can't be resolved.
pub const UNRESOLVED_PRICE_CREDIT: f64 = 0.3;
/// Relative overage beyond which a price earns nothing.
pub const PRICE_TOLERANCE: f64 = 0.5;
/// Share of the year weight lost per year outside the requested range.
pub const YEAR_STEP_PENALTY: f64 = 0.2;
pub const MAX_YEARS_OUTSIDE: i32 = 5;
/// Flat credit for condition: there's no per-listing condition signal to compare yet.
pub const CONDITION_CREDIT: f64 = 0.5;

/// Relative importance of each scored dimension. Must sum to 100; dimensions
/// the request leaves unset are dropped and the rest renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTable {
    pub brand: u32,
    pub model: u32,
    pub price: u32,
    pub year: u32,
    pub city: u32,
    pub condition: u32,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            brand: 25,
            model: 20,
            price: 20,
            year: 15,
            city: 10,
            condition: 10,
        }
    }
}

impl WeightTable {
    pub fn new(
        brand: u32,
        model: u32,
        price: u32,
        year: u32,
        city: u32,
        condition: u32,
    ) -> Result<Self, ServiceError> {
        let table = Self { brand, model, price, year, city, condition };
        let total = table.total();
        if total != 100 {
            return Err(ServiceError::Validation(format!(
                "Match weights must sum to 100, got {}",
                total
            )));
        }
        Ok(table)
    }

    pub fn total(&self) -> u32 {
        self.brand + self.model + self.price + self.year + self.city + self.condition
    }
}

/// Pure, deterministic scorer: same request and listing, same score.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: WeightTable,
}

impl Scorer {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Match confidence in `[0, 100]`.
    pub fn score(&self, criteria: &MatchCriteria, candidate: &CandidateItem) -> i32 {
        let w = &self.weights;
        let mut applicable = 0.0_f64;
        let mut earned = 0.0_f64;

        let mut apply = |weight: u32, fraction: f64| {
            applicable += weight as f64;
            earned += weight as f64 * fraction;
        };

        if let Some(brand_id) = criteria.brand_id {
            apply(w.brand, exact(candidate.brand_id == Some(brand_id)));
        }

        if let Some(model_id) = criteria.model_id {
            apply(w.model, exact(candidate.model_id == Some(model_id)));
        }

        if criteria.has_price_range() {
            let fraction = match candidate.resolve_price() {
                Some(price) => price_fraction(criteria.min_price, criteria.max_price, price),
                None => UNRESOLVED_PRICE_CREDIT,
            };
            apply(w.price, fraction);
        }

        if criteria.has_year_range() {
            apply(w.year, year_fraction(criteria.min_year, criteria.max_year, candidate.year));
        }

        if let Some(city_id) = criteria.city_id {
            apply(w.city, exact(candidate.city_id == Some(city_id)));
        }

        // TODO: compare against the listing's inspected condition once listings expose it
        if criteria.has_condition() {
            apply(w.condition, CONDITION_CREDIT);
        }

        if applicable <= 0.0 {
            return BASELINE_SCORE;
        }

        ((earned / applicable) * 100.0).round().clamp(0.0, 100.0) as i32
    }
}

fn exact(matches: bool) -> f64 {
    if matches {
        1.0
    } else {
        0.0
    }
}

/// Full credit inside `[min, max]`, linear decay up to 50% past the violated bound.
pub fn price_fraction(min: Option<i64>, max: Option<i64>, price: i64) -> f64 {
    let outside = |diff: i64, bound: i64| -> f64 {
        if bound <= 0 {
            return 0.0;
        }
        let overage = diff as f64 / bound as f64;
        if overage <= PRICE_TOLERANCE {
            1.0 - overage
        } else {
            0.0
        }
    };

    match (min, max) {
        (Some(min), _) if price < min => outside(min.saturating_sub(price), min),
        (_, Some(max)) if price > max => outside(price.saturating_sub(max), max),
        _ => 1.0,
    }
}

/// Full credit inside `[min, max]`, minus 20% per year outside, nothing past 5 years.
pub fn year_fraction(min: Option<i32>, max: Option<i32>, year: Option<i32>) -> f64 {
    let Some(year) = year else {
        return 0.0;
    };

    let years_outside = match (min, max) {
        (Some(min), _) if year < min => min.saturating_sub(year),
        (_, Some(max)) if year > max => year.saturating_sub(max),
        _ => 0,
    };

    if years_outside > MAX_YEARS_OUTSIDE {
        return 0.0;
    }
    (1.0 - YEAR_STEP_PENALTY * years_outside as f64).max(0.0)
}
