use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::call::{CallOutcome, CallRecord, Sentiment};

/// Averages over calls that carry both a loadboard and an agreed rate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallAverages {
    pub loadboard_rate: Option<Decimal>,
    pub agreed_rate: Option<Decimal>,
    pub negotiation_rounds: Option<f64>,
    pub call_duration_seconds: Option<f64>,
}

/// Discount given off the loadboard rate, over calls that carry both rates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginAnalysis {
    pub calls_with_agreement: u64,
    pub avg_discount: Option<Decimal>,
    pub min_agreed_rate: Option<Decimal>,
    pub max_agreed_rate: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStats {
    pub total_calls: u64,
    pub outcomes: BTreeMap<CallOutcome, u64>,
    pub sentiments: BTreeMap<Sentiment, u64>,
    pub averages: CallAverages,
    pub margin: MarginAnalysis,
}

impl CallStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CallRecord>,
    {
        let mut stats = Self::default();
        let mut loadboard = Vec::new();
        let mut agreed = Vec::new();
        let mut discounts = Vec::new();
        let mut rounds_total = 0_u64;
        let mut duration_total = 0_u64;

        for record in records {
            stats.total_calls += 1;
            *stats.outcomes.entry(record.outcome).or_default() += 1;
            *stats.sentiments.entry(record.sentiment).or_default() += 1;

            let (Some(baseline), Some(rate)) = (record.loadboard_rate, record.agreed_rate) else {
                continue;
            };
            loadboard.push(baseline);
            agreed.push(rate);
            discounts.push(baseline - rate);
            rounds_total += u64::from(record.negotiation_rounds);
            duration_total += u64::from(record.call_duration_seconds);
        }

        if !agreed.is_empty() {
            let paired = agreed.len() as f64;
            stats.averages.negotiation_rounds = Some(round2(rounds_total as f64 / paired));
            stats.averages.call_duration_seconds = Some(round2(duration_total as f64 / paired));
        }
        stats.averages.loadboard_rate = mean(&loadboard);
        stats.averages.agreed_rate = mean(&agreed);

        stats.margin = MarginAnalysis {
            calls_with_agreement: agreed.len() as u64,
            avg_discount: mean(&discounts),
            min_agreed_rate: agreed.iter().min().copied(),
            max_agreed_rate: agreed.iter().max().copied(),
        };

        stats
    }

    pub fn outcome_count(&self, outcome: CallOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn sentiment_count(&self, sentiment: Sentiment) -> u64 {
        self.sentiments.get(&sentiment).copied().unwrap_or(0)
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    Some((sum / Decimal::from(values.len() as u64)).round_dp(2))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
