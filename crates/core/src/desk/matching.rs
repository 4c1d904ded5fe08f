use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::desk::catalog::LoadCatalog;
use crate::domain::load::{EquipmentType, Load};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub origin_weight: f64,
    pub destination_weight: f64,
    pub equipment_weight: f64,
    pub date_weight: f64,
    pub min_score: f64,
    /// Subtracted, as a negative factor score, when equipment differs.
    pub equipment_mismatch_penalty: f64,
    /// Days outside the pickup window after which the date score reaches 0.
    pub date_horizon_days: u32,
    pub max_results: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            origin_weight: 0.3,
            destination_weight: 0.3,
            equipment_weight: 0.3,
            date_weight: 0.1,
            min_score: 0.3,
            equipment_mismatch_penalty: 2.0,
            date_horizon_days: 7,
            max_results: 3,
        }
    }
}

/// Inclusive pickup window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::InvalidInput(
                "pickup window ends before it starts".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Covers one whole calendar day in UTC.
    pub fn on_day(day: NaiveDate) -> Self {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        Self { start, end: start + Duration::days(1) - Duration::seconds(1) }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    fn days_outside(&self, at: DateTime<Utc>) -> f64 {
        let gap = if at < self.start {
            self.start - at
        } else if at > self.end {
            at - self.end
        } else {
            return 0.0;
        };
        gap.num_seconds() as f64 / 86_400.0
    }
}

/// Search criteria from the carrier; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadRequirements {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub equipment_type: Option<EquipmentType>,
    #[serde(default)]
    pub pickup_window: Option<DateWindow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredLoad {
    #[serde(flatten)]
    pub load: Load,
    pub match_score: f64,
}

pub trait MatchingEngine: Send + Sync {
    /// Every load clearing the minimum score, best first.
    fn rank(&self, catalog: &LoadCatalog, requirements: &LoadRequirements) -> Vec<ScoredLoad>;

    fn max_results(&self) -> usize;

    fn search(
        &self,
        catalog: &LoadCatalog,
        requirements: &LoadRequirements,
        limit: Option<usize>,
    ) -> Vec<ScoredLoad> {
        let mut ranked = self.rank(catalog, requirements);
        ranked.truncate(limit.unwrap_or_else(|| self.max_results()));
        ranked
    }
}

#[derive(Clone, Debug, Default)]
pub struct WeightedLoadMatcher {
    config: MatchingConfig,
}

impl WeightedLoadMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn score(&self, load: &Load, requirements: &LoadRequirements) -> f64 {
        let config = &self.config;
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        if let Some(origin) = present(&requirements.origin) {
            weighted += config.origin_weight * location_score(origin, &load.origin);
            total_weight += config.origin_weight;
        }
        if let Some(destination) = present(&requirements.destination) {
            weighted += config.destination_weight * location_score(destination, &load.destination);
            total_weight += config.destination_weight;
        }
        if let Some(equipment) = requirements.equipment_type {
            let factor = if equipment == load.equipment_type {
                1.0
            } else {
                -config.equipment_mismatch_penalty
            };
            weighted += config.equipment_weight * factor;
            total_weight += config.equipment_weight;
        }
        if let Some(window) = &requirements.pickup_window {
            weighted += config.date_weight * self.date_score(window, load.pickup_datetime);
            total_weight += config.date_weight;
        }

        if total_weight <= 0.0 {
            return 1.0;
        }

        round_score((weighted / total_weight).clamp(0.0, 1.0))
    }

    fn date_score(&self, window: &DateWindow, pickup: DateTime<Utc>) -> f64 {
        if window.contains(pickup) {
            return 1.0;
        }
        let horizon = f64::from(self.config.date_horizon_days.max(1));
        (1.0 - window.days_outside(pickup) / horizon).max(0.0)
    }
}

impl MatchingEngine for WeightedLoadMatcher {
    fn rank(&self, catalog: &LoadCatalog, requirements: &LoadRequirements) -> Vec<ScoredLoad> {
        let mut scored: Vec<ScoredLoad> = catalog
            .iter()
            .map(|load| ScoredLoad { match_score: self.score(load, requirements), load: load.clone() })
            .filter(|candidate| candidate.match_score >= self.config.min_score)
            .collect();

        scored.sort_by(compare_candidates);
        scored
    }

    fn max_results(&self) -> usize {
        self.config.max_results
    }
}

fn compare_candidates(left: &ScoredLoad, right: &ScoredLoad) -> Ordering {
    right
        .match_score
        .total_cmp(&left.match_score)
        .then_with(|| left.load.loadboard_rate.cmp(&right.load.loadboard_rate))
        .then_with(|| left.load.load_id.cmp(&right.load.load_id))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

fn normalize_location(value: &str) -> String {
    value
        .to_lowercase()
        .replace([',', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fuzzy "City, ST" comparison.
pub fn location_score(search: &str, candidate: &str) -> f64 {
    let search = normalize_location(search);
    let candidate = normalize_location(candidate);
    if search.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if search == candidate {
        return 1.0;
    }
    if candidate.contains(&search) || search.contains(&candidate) {
        return 0.8;
    }

    let search_words: Vec<&str> = search.split(' ').collect();
    let candidate_words: Vec<&str> = candidate.split(' ').collect();

    if search_words.len() >= 2 && candidate_words.len() >= 2 {
        if search_words.last() == candidate_words.last() {
            return 0.5;
        }
        let search_city = &search_words[..search_words.len() - 1];
        let candidate_city = &candidate_words[..candidate_words.len() - 1];
        let partial = search_city.iter().filter(|word| word.len() > 3).any(|word| {
            candidate_city.iter().any(|candidate_word| candidate_word.contains(*word))
        });
        if partial {
            return 0.4;
        }
    }

    0.0
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        location_score, DateWindow, LoadRequirements, MatchingConfig, MatchingEngine,
        WeightedLoadMatcher,
    };
    use crate::desk::catalog::LoadCatalog;
    use crate::domain::load::{EquipmentType, Load, LoadId};

    fn load(id: &str, origin: &str, destination: &str, equipment: EquipmentType, rate: i64) -> Load {
        Load {
            load_id: LoadId(id.to_string()),
            origin: origin.to_string(),
            destination: destination.to_string(),
            pickup_datetime: Utc.with_ymd_and_hms(2025, 11, 10, 8, 0, 0).unwrap(),
            delivery_datetime: Utc.with_ymd_and_hms(2025, 11, 12, 17, 0, 0).unwrap(),
            equipment_type: equipment,
            loadboard_rate: Decimal::new(rate, 0),
            weight: 40_000,
            commodity_type: "General freight".to_string(),
            notes: String::new(),
            miles: 1_000,
        }
    }

    fn catalog() -> LoadCatalog {
        LoadCatalog::new(vec![
            load("LD001", "Los Angeles, CA", "Houston, TX", EquipmentType::DryVan, 2500),
            load("LD002", "Chicago, IL", "Atlanta, GA", EquipmentType::Reefer, 2200),
            load("LD003", "Dallas, TX", "Phoenix, AZ", EquipmentType::Flatbed, 1800),
            load("LD004", "San Diego, CA", "Houston, TX", EquipmentType::DryVan, 2300),
        ])
        .expect("catalog")
    }

    fn requirements(origin: &str, destination: &str, equipment: EquipmentType) -> LoadRequirements {
        LoadRequirements {
            origin: Some(origin.to_string()),
            destination: Some(destination.to_string()),
            equipment_type: Some(equipment),
            pickup_window: None,
        }
    }

    #[test]
    fn location_score_ladder() {
        assert_eq!(location_score("Los Angeles, CA", "los angeles ca"), 1.0);
        assert_eq!(location_score("Los Angeles", "Los Angeles, CA"), 0.8);
        assert_eq!(location_score("San Diego, CA", "Los Angeles, CA"), 0.5);
        assert_eq!(location_score("Kansas City, MO", "Kansas City North, KS"), 0.4);
        assert_eq!(location_score("Miami, FL", "Seattle, WA"), 0.0);
    }

    #[test]
    fn exact_match_ranks_first_with_full_score() {
        let matcher = WeightedLoadMatcher::default();
        let results = matcher.search(
            &catalog(),
            &requirements("Los Angeles, CA", "Houston, TX", EquipmentType::DryVan),
            None,
        );

        assert_eq!(results[0].load.load_id.as_str(), "LD001");
        assert_eq!(results[0].match_score, 1.0);
        assert!(results.iter().all(|result| result.match_score >= 0.3));
        assert!(results.windows(2).all(|pair| pair[0].match_score >= pair[1].match_score));
    }

    #[test]
    fn equipment_mismatch_drops_a_load_below_threshold() {
        let matcher = WeightedLoadMatcher::default();
        let results =
            matcher.rank(&catalog(), &requirements("Chicago, IL", "Atlanta, GA", EquipmentType::DryVan));

        assert!(results.iter().all(|result| result.load.load_id.as_str() != "LD002"));
    }

    #[test]
    fn empty_requirements_score_every_load_equally() {
        let matcher = WeightedLoadMatcher::default();
        let results = matcher.rank(&catalog(), &LoadRequirements::default());

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|result| result.match_score == 1.0));
        let ids: Vec<_> = results.iter().map(|result| result.load.load_id.as_str()).collect();
        assert_eq!(ids, vec!["LD003", "LD002", "LD004", "LD001"], "ties break on rate");
    }

    #[test]
    fn no_candidate_above_threshold_yields_empty_result() {
        let matcher = WeightedLoadMatcher::default();
        let results =
            matcher.rank(&catalog(), &requirements("Miami, FL", "Seattle, WA", EquipmentType::Tanker));
        assert!(results.is_empty());
    }

    #[test]
    fn load_scoring_exactly_min_score_is_kept() {
        let origin_only =
            LoadRequirements { origin: Some("San Diego, CA".to_string()), ..LoadRequirements::default() };
        let ids = |min_score: f64| {
            WeightedLoadMatcher::new(MatchingConfig { min_score, ..MatchingConfig::default() })
                .rank(&catalog(), &origin_only)
                .into_iter()
                .map(|result| result.load.load_id.0)
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(0.5), vec!["LD004", "LD001"]);
        assert_eq!(ids(0.51), vec!["LD004"]);
    }

    #[test]
    fn date_score_decays_outside_the_window() {
        let matcher = WeightedLoadMatcher::new(MatchingConfig::default());
        let pickup_only = |day: u32| LoadRequirements {
            pickup_window: Some(DateWindow::on_day(
                NaiveDate::from_ymd_opt(2025, 11, day).expect("date"),
            )),
            ..LoadRequirements::default()
        };
        let subject = load("LD001", "Los Angeles, CA", "Houston, TX", EquipmentType::DryVan, 2500);

        assert_eq!(matcher.score(&subject, &pickup_only(10)), 1.0);
        let near = matcher.score(&subject, &pickup_only(12));
        let far = matcher.score(&subject, &pickup_only(30));
        assert!(near > 0.0 && near < 1.0);
        assert_eq!(far, 0.0);
    }

    #[test]
    fn limit_caps_results() {
        let matcher = WeightedLoadMatcher::default();
        let results = matcher.search(&catalog(), &LoadRequirements::default(), Some(2));
        assert_eq!(results.len(), 2);
        assert_eq!(matcher.search(&catalog(), &LoadRequirements::default(), None).len(), 3);
    }

    #[test]
    fn invalid_window_is_rejected() {
        let start = Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0).unwrap();
        assert!(DateWindow::new(start, start - chrono::Duration::hours(1)).is_err());
    }
}
