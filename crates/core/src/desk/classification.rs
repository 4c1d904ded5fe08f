use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::desk::extraction::{compile, normalize_transcript, PartialCallFields, OFFER_PHRASE_PATTERN};
use crate::desk::negotiation::Decision;
use crate::domain::call::{CallOutcome, Sentiment};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Rejection,
    NoMatch,
    Booking,
    Offer,
    Negative,
    Positive,
}

/// Ordered `(pattern, signal, priority)` table. Text matched by a rule is
/// consumed before lower-priority rules run, so `no deal` never counts as
/// a booking and `not happy` never counts as positive.
pub const CLASSIFICATION_RULES: &[(&str, Signal, u8)] = &[
    (
        r"(?i)\b(?:no\s+thanks|no\s+thank\s+you|not\s+interested|pass|can't\s+do\s+(?:it|that)|cannot\s+do\s+(?:it|that)|won't\s+work|no\s+deal|declined?|too\s+(?:low|high|far))\b",
        Signal::Rejection,
        0,
    ),
    (
        r"(?i)\b(?:no\s+loads?\s+(?:available|match\w*)|nothing\s+(?:available|that\s+matches)|don't\s+have\s+anything)\b",
        Signal::NoMatch,
        1,
    ),
    (
        r"(?i)\b(?:deal|book\s+it|booked|i'll\s+take\s+it|let's\s+do\s+it|sounds\s+good|works\s+for\s+me|confirmed|agreed|you\s+got\s+it|count\s+me\s+in)\b",
        Signal::Booking,
        2,
    ),
    (OFFER_PHRASE_PATTERN, Signal::Offer, 3),
    (
        r"(?i)\b(?:not\s+happy|frustrated|upset|angry|disappointed|terrible|awful|horrible|waste|problem|issue|difficult|complicated|unhappy|dissatisfied|ridiculous)\b",
        Signal::Negative,
        4,
    ),
    (
        r"(?i)\b(?:great|excellent|perfect|wonderful|fantastic|happy|pleased|excited|appreciate|thank\s+you|thanks|love|easy|smooth)\b",
        Signal::Positive,
        5,
    ),
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Net positive keywords must exceed this for `positive`.
    pub positive_threshold: u32,
    /// Net negative keywords must exceed this for `negative`.
    pub negative_threshold: u32,
    pub confidence_scale: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self { positive_threshold: 0, negative_threshold: 0, confidence_scale: 10.0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCounts {
    pub rejection: u32,
    pub no_match: u32,
    pub booking: u32,
    pub offer: u32,
    pub negative: u32,
    pub positive: u32,
}

impl SignalCounts {
    fn add(&mut self, signal: Signal, hits: u32) {
        let slot = match signal {
            Signal::Rejection => &mut self.rejection,
            Signal::NoMatch => &mut self.no_match,
            Signal::Booking => &mut self.booking,
            Signal::Offer => &mut self.offer,
            Signal::Negative => &mut self.negative,
            Signal::Positive => &mut self.positive,
        };
        *slot += hits;
    }

    pub fn total(&self) -> u32 {
        self.rejection + self.no_match + self.booking + self.offer + self.negative + self.positive
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Negotiation,
    Declared,
    Keywords,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallClassification {
    pub outcome: CallOutcome,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub outcome_source: OutcomeSource,
    pub signals: SignalCounts,
}

impl SignalCounts {
    /// Whether the transcript carries any keyword evidence for `outcome`.
    pub fn supports(&self, outcome: CallOutcome) -> bool {
        match outcome {
            CallOutcome::Booked => self.booking > 0,
            CallOutcome::Negotiated => self.offer > 0,
            CallOutcome::Rejected => self.rejection > 0,
            CallOutcome::NoMatch => self.no_match > 0,
            CallOutcome::Unknown => false,
        }
    }
}

impl CallClassification {
    /// Adopts a caller-declared outcome when the transcript backs it up.
    /// Outcomes taken from a terminal negotiation decision are kept.
    pub fn reconcile_declared(mut self, declared: CallOutcome) -> Self {
        if self.outcome_source == OutcomeSource::Keywords && self.signals.supports(declared) {
            self.outcome = declared;
            self.outcome_source = OutcomeSource::Declared;
        }
        self
    }
}

pub trait ClassificationEngine: Send + Sync {
    fn classify(
        &self,
        transcript: &str,
        fields: &PartialCallFields,
        decision: Option<&Decision>,
    ) -> CallClassification;
}

#[derive(Clone, Debug)]
pub struct RuleBasedClassifier {
    config: ClassificationConfig,
    rules: Vec<(Regex, Signal)>,
}

impl RuleBasedClassifier {
    pub fn new(config: ClassificationConfig) -> Result<Self, DomainError> {
        let mut ordered: Vec<_> = CLASSIFICATION_RULES.iter().collect();
        ordered.sort_by_key(|(_, _, priority)| *priority);
        let rules = ordered
            .into_iter()
            .map(|(pattern, signal, _)| Ok((compile(pattern)?, *signal)))
            .collect::<Result<Vec<_>, DomainError>>()?;
        Ok(Self { config, rules })
    }

    pub fn count_signals(&self, transcript: &str) -> SignalCounts {
        let mut counts = SignalCounts::default();
        let mut remaining = normalize_transcript(transcript);
        for (pattern, signal) in &self.rules {
            let hits = pattern.find_iter(&remaining).count() as u32;
            if hits > 0 {
                counts.add(*signal, hits);
                remaining = pattern.replace_all(&remaining, " ").into_owned();
            }
        }
        counts
    }

    fn outcome_from_keywords(counts: &SignalCounts, fields: &PartialCallFields) -> CallOutcome {
        if counts.no_match > 0 && counts.booking == 0 && fields.load_id.is_none() {
            return CallOutcome::NoMatch;
        }
        if counts.booking > counts.rejection {
            return CallOutcome::Booked;
        }
        if counts.rejection > counts.booking {
            return CallOutcome::Rejected;
        }
        if counts.offer >= 2 {
            return CallOutcome::Negotiated;
        }
        CallOutcome::Unknown
    }

    fn sentiment(&self, counts: &SignalCounts) -> Sentiment {
        let net = i64::from(counts.positive) - i64::from(counts.negative);
        if net > i64::from(self.config.positive_threshold) {
            Sentiment::Positive
        } else if net < -i64::from(self.config.negative_threshold) {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    fn confidence(&self, transcript: &str, counts: &SignalCounts, fields: &PartialCallFields) -> f64 {
        let words = transcript.split_whitespace().count();
        if words == 0 {
            return 0.0;
        }
        let evidence = f64::from(counts.total()) + fields.populated_fields() as f64;
        let raw = evidence * self.config.confidence_scale / words as f64;
        (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }
}

impl ClassificationEngine for RuleBasedClassifier {
    fn classify(
        &self,
        transcript: &str,
        fields: &PartialCallFields,
        decision: Option<&Decision>,
    ) -> CallClassification {
        let counts = self.count_signals(transcript);
        let from_decision = decision.and_then(Decision::outcome);

        let (outcome, outcome_source) = match from_decision {
            Some(outcome) => (outcome, OutcomeSource::Negotiation),
            None if transcript.trim().is_empty() => (CallOutcome::Unknown, OutcomeSource::Keywords),
            None => (Self::outcome_from_keywords(&counts, fields), OutcomeSource::Keywords),
        };

        CallClassification {
            outcome,
            sentiment: self.sentiment(&counts),
            confidence: self.confidence(transcript, &counts, fields),
            outcome_source,
            signals: counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        ClassificationConfig, ClassificationEngine, OutcomeSource, RuleBasedClassifier,
    };
    use crate::desk::extraction::PartialCallFields;
    use crate::desk::negotiation::{Decision, RejectReason};
    use crate::domain::call::{CallOutcome, Sentiment};
    use crate::domain::load::LoadId;

    fn classifier() -> RuleBasedClassifier {
        RuleBasedClassifier::new(ClassificationConfig::default()).expect("rules compile")
    }

    fn classify(transcript: &str) -> super::CallClassification {
        classifier().classify(transcript, &PartialCallFields::default(), None)
    }

    #[test]
    fn booking_language_is_booked() {
        let result = classify("Sounds good, book it. Thanks, that was easy.");
        assert_eq!(result.outcome, CallOutcome::Booked);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.outcome_source, OutcomeSource::Keywords);
    }

    #[test]
    fn rejection_phrases_beat_embedded_booking_words() {
        let result = classify("No deal, that rate is too low. Not interested.");
        assert_eq!(result.outcome, CallOutcome::Rejected);
        assert_eq!(result.signals.booking, 0);
    }

    #[test]
    fn repeated_offers_without_resolution_are_negotiated() {
        let result = classify("How about 2000? What about 2100 then? Let me check with dispatch.");
        assert_eq!(result.outcome, CallOutcome::Negotiated);
    }

    #[test]
    fn no_loads_available_is_no_match() {
        let result = classify("Sorry, there are no loads available on that lane today.");
        assert_eq!(result.outcome, CallOutcome::NoMatch);
    }

    #[test]
    fn negated_positive_counts_as_negative() {
        let result = classify("I'm not happy with this, it's a waste of my time.");
        assert_eq!(result.sentiment, Sentiment::Negative);
        assert_eq!(result.signals.positive, 0);
    }

    #[test]
    fn balanced_keywords_are_neutral() {
        assert_eq!(classify("Thanks, but the pickup is a problem.").sentiment, Sentiment::Neutral);
    }

    #[test]
    fn sentiment_thresholds_are_exclusive() {
        let strict = RuleBasedClassifier::new(ClassificationConfig {
            positive_threshold: 2,
            negative_threshold: 1,
            ..ClassificationConfig::default()
        })
        .expect("rules compile");
        let sentiment =
            |text: &str| strict.classify(text, &PartialCallFields::default(), None).sentiment;

        assert_eq!(sentiment("Great. Perfect."), Sentiment::Neutral);
        assert_eq!(sentiment("Great. Perfect. Excellent."), Sentiment::Positive);
        assert_eq!(sentiment("Terrible."), Sentiment::Neutral);
        assert_eq!(sentiment("Terrible, awful."), Sentiment::Negative);
    }

    #[test]
    fn terminal_decision_overrides_keywords() {
        let decision = Decision::Reject { reason: RejectReason::FinalOfferDeclined };
        let result = classifier().classify(
            "Sounds good, book it!",
            &PartialCallFields::default(),
            Some(&decision),
        );
        assert_eq!(result.outcome, CallOutcome::Rejected);
        assert_eq!(result.outcome_source, OutcomeSource::Negotiation);

        let counter = Decision::Counter { rate: Decimal::from(2200) };
        let result =
            classifier().classify("Sounds good, book it!", &PartialCallFields::default(), Some(&counter));
        assert_eq!(result.outcome, CallOutcome::Booked);
    }

    #[test]
    fn declared_outcome_needs_transcript_support() {
        let haggled = classify("How about 2000? Deal, book it.");
        assert_eq!(haggled.outcome, CallOutcome::Booked);

        let reconciled = haggled.clone().reconcile_declared(CallOutcome::Negotiated);
        assert_eq!(reconciled.outcome, CallOutcome::Negotiated);
        assert_eq!(reconciled.outcome_source, OutcomeSource::Declared);

        let unsupported = haggled.reconcile_declared(CallOutcome::NoMatch);
        assert_eq!(unsupported.outcome, CallOutcome::Booked);
        assert_eq!(unsupported.outcome_source, OutcomeSource::Keywords);
    }

    #[test]
    fn empty_transcript_is_unknown_with_zero_confidence() {
        let result = classify("");
        assert_eq!(result.outcome, CallOutcome::Unknown);
        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn confidence_grows_with_evidence() {
        let classifier = classifier();
        let fields = PartialCallFields {
            load_id: Some(LoadId("LD001".to_string())),
            proposed_rate: Some(Decimal::from(2400)),
            ..PartialCallFields::default()
        };
        let filler = "we talked about the weather and the traffic on the interstate for a while ".repeat(3);
        let sparse = classifier.classify(&filler, &PartialCallFields::default(), None);
        let rich = classifier.classify(&format!("{filler} deal, thanks"), &fields, None);

        assert!(rich.confidence > sparse.confidence);
        assert!((0.0..=1.0).contains(&rich.confidence));
    }
}
