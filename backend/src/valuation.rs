use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{NewValuationReport, Property};

pub const MARKET_INSIGHTS: &str = "Based on recent market analysis, this property shows strong potential for appreciation. Location factors and recent comparable sales support the current valuation range.";

/// Stand-in for an analytics pipeline: perturbs the listed valuation and
/// attaches a random confidence score and trend.
pub struct ValuationModel {
    rng: Mutex<StdRng>,
}

impl ValuationModel {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Builds a report for `property`. Nothing is stored.
    ///
    /// - valuation: base ± up to 50 000 (upper bound exclusive)
    /// - confidence: 80..=99
    /// - trend: one decimal in -5.0..5.0
    pub fn appraise(&self, property: &Property) -> NewValuationReport {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let adjustment: i64 = rng.gen_range(-50_000..50_000);
        let trend: f64 = rng.gen_range(-5.0..5.0);
        NewValuationReport {
            property_id: property.id.clone(),
            valuation: property.valuation + adjustment,
            confidence: rng.gen_range(80..100),
            trend: format!("{:.1}", trend),
            insights: MARKET_INSIGHTS.to_string(),
        }
    }
}

impl Default for ValuationModel {
    fn default() -> Self {
        Self::new()
    }
}
