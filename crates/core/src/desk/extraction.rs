use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::carrier::McNumber;
use crate::domain::load::LoadId;
use crate::errors::DomainError;

/// Offer and counter-offer phrasing; shared with the classifier.
pub const OFFER_PHRASE_PATTERN: &str = r"(?i)\b(?:what\s+about|how\s+about|can\s+you\s+do|could\s+you\s+do|counter(?:[\s-]?offer)?|best\s+(?:price|rate)|meet\s+(?:me\s+)?in\s+the\s+middle)\b";

const AGREEMENT_PHRASE_PATTERN: &str =
    r"(?i)\b(?:deal|i'll\s+take\s+it|sounds\s+good|works\s+for\s+me|agreed|book\s+it)\b";

const RATE_CONTEXT_PATTERN: &str =
    r"(?i)\b(?:rate|offer|offering|pay|paying|do|counter|at|for)\b";

/// Characters between a rate keyword and the amount it introduces.
const RATE_CONTEXT_WINDOW: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedField {
    LoadId,
    Amount,
    McNumber,
    OfferPhrase,
    AgreementPhrase,
    StatedDuration,
}

/// Ordered `(pattern, field, priority)` table; lower priority wins per field.
pub const EXTRACTION_RULES: &[(&str, ExtractedField, u8)] = &[
    (r"(?i)\bLD[-\s]?(\d{3,4})\b", ExtractedField::LoadId, 0),
    (r"(?i)\bload\s+(?:id|number|#)?\s*:?\s*#?(\d{3,4})\b", ExtractedField::LoadId, 1),
    (r"\$\s*(\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)", ExtractedField::Amount, 0),
    (
        r"(?i)\b(\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)\s*dollars?\b",
        ExtractedField::Amount,
        1,
    ),
    (r"(?i)\bMC[-\s]?(\d{5,7})\b", ExtractedField::McNumber, 0),
    (
        r"(?i)\bmotor\s+carrier\s+(?:number|no\.?|#)\s*(?:is\s+)?:?\s*(\d{5,7})\b",
        ExtractedField::McNumber,
        1,
    ),
    (OFFER_PHRASE_PATTERN, ExtractedField::OfferPhrase, 0),
    (AGREEMENT_PHRASE_PATTERN, ExtractedField::AgreementPhrase, 0),
    (
        r"(?i)\b(?:duration|call\s+lasted|lasted)\s*(?:of|was|:)?\s*(\d{1,4})\s*(seconds?|secs?|minutes?|mins?)\b",
        ExtractedField::StatedDuration,
        0,
    ),
];

/// Ordered phrase rules; every matching rule contributes its note.
const NOTE_RULES: &[(&str, &str)] = &[
    (r"(?i)(?:\bi'll\s+take\s+it\b|\bagree|\bdeal\b|\bsounds\s+good\b|\bworks\s+for\s+me\b)", "Carrier agreed."),
    (r"(?i)\b(?:not\s+interested|no\s+thanks|pass|can't\s+do\s+it)\b", "Carrier declined."),
    (r"(?i)\b(?:let\s+me\s+(?:think|check)|call\s+back)\b", "Carrier needs time to decide."),
    (r"(?i)\b(?:need\s+by|deadline|must\s+deliver)\b", "Has specific delivery requirements."),
    (r"(?i)\b(?:equipment|truck|trailer)", "Discussed equipment needs."),
    (r"(?i)\btoo\s+(?:low|high|far|heavy)\b", "Had concerns about load details."),
    (r"(?i)\b(?:detours?|dead\s*head|return\s+load)\b", "Concerned about backhaul/deadhead."),
];

/// First double-quoted utterance; used when no note rule matched.
const QUOTED_UTTERANCE_PATTERN: &str = r#""([^"]+)""#;

/// Characters of a quoted utterance kept in the fallback note.
const QUOTED_NOTE_CHARS: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub words_per_minute: u32,
    pub min_duration_secs: u32,
    pub max_duration_secs: u32,
    pub min_plausible_amount: Decimal,
    pub max_plausible_amount: Decimal,
    pub max_notes_len: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 150,
            min_duration_secs: 60,
            max_duration_secs: 1_800,
            min_plausible_amount: Decimal::from(200),
            max_plausible_amount: Decimal::from(10_000),
            max_notes_len: 500,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    Stated,
    Estimated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDuration {
    pub seconds: u32,
    pub source: DurationSource,
}

/// Best-effort fields pulled from a transcript; anything not found stays empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialCallFields {
    pub load_id: Option<LoadId>,
    pub mc_number: Option<McNumber>,
    pub proposed_rate: Option<Decimal>,
    pub agreed_rate: Option<Decimal>,
    pub amounts: Vec<Decimal>,
    pub negotiation_rounds: Option<u32>,
    pub call_duration: Option<CallDuration>,
    pub carrier_notes: Option<String>,
}

impl PartialCallFields {
    /// Identifying fields found; used as classifier evidence.
    pub fn populated_fields(&self) -> usize {
        [
            self.load_id.is_some(),
            self.mc_number.is_some(),
            self.proposed_rate.is_some(),
            self.agreed_rate.is_some(),
        ]
        .into_iter()
        .filter(|found| *found)
        .count()
    }
}

pub trait ExtractionEngine: Send + Sync {
    fn extract(&self, transcript: &str) -> PartialCallFields;
}

#[derive(Clone, Debug)]
struct CompiledRule {
    field: ExtractedField,
    priority: u8,
    pattern: Regex,
}

#[derive(Clone, Debug)]
pub struct RuleBasedExtractor {
    config: ExtractionConfig,
    max_rounds: u32,
    rules: Vec<CompiledRule>,
    notes: Vec<(Regex, &'static str)>,
    quoted: Regex,
    rate_context: Regex,
}

impl RuleBasedExtractor {
    pub fn new(config: ExtractionConfig, max_rounds: u32) -> Result<Self, DomainError> {
        let mut rules = EXTRACTION_RULES
            .iter()
            .map(|(pattern, field, priority)| {
                Ok(CompiledRule { field: *field, priority: *priority, pattern: compile(pattern)? })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        rules.sort_by_key(|rule| rule.priority);

        let notes = NOTE_RULES
            .iter()
            .map(|(pattern, note)| Ok((compile(pattern)?, *note)))
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Self {
            config,
            max_rounds,
            rules,
            notes,
            quoted: compile(QUOTED_UTTERANCE_PATTERN)?,
            rate_context: compile(RATE_CONTEXT_PATTERN)?,
        })
    }

    fn rules_for(&self, field: ExtractedField) -> impl Iterator<Item = &Regex> + '_ {
        self.rules.iter().filter(move |rule| rule.field == field).map(|rule| &rule.pattern)
    }

    fn first_capture(&self, field: ExtractedField, text: &str) -> Option<String> {
        self.rules_for(field).find_map(|pattern| {
            pattern.captures(text).and_then(|captures| captures.get(1)).map(|m| m.as_str().to_string())
        })
    }

    fn count(&self, field: ExtractedField, text: &str) -> usize {
        self.rules_for(field).map(|pattern| pattern.find_iter(text).count()).sum()
    }

    /// Plausible amounts with their byte offsets, in transcript order.
    fn amounts(&self, text: &str) -> Vec<(usize, Decimal)> {
        let mut found: Vec<(usize, Decimal)> = self
            .rules_for(ExtractedField::Amount)
            .flat_map(|pattern| pattern.captures_iter(text))
            .filter_map(|captures| captures.get(1))
            .filter_map(|m| parse_amount(m.as_str()).map(|amount| (m.start(), amount)))
            .filter(|(_, amount)| {
                *amount >= self.config.min_plausible_amount
                    && *amount <= self.config.max_plausible_amount
            })
            .collect();
        found.sort_by_key(|(offset, _)| *offset);
        found.dedup_by_key(|(offset, _)| *offset);
        found
    }

    fn proposed_rate(&self, text: &str, amounts: &[(usize, Decimal)]) -> Option<Decimal> {
        let keyword_ends: Vec<usize> =
            self.rate_context.find_iter(text).map(|keyword| keyword.end()).collect();
        amounts
            .iter()
            .find(|(offset, _)| {
                keyword_ends
                    .iter()
                    .any(|end| *end <= *offset && *offset - *end <= RATE_CONTEXT_WINDOW)
            })
            .or_else(|| amounts.first())
            .map(|(_, amount)| *amount)
    }

    fn duration(&self, text: &str) -> Option<CallDuration> {
        let stated = self.rules_for(ExtractedField::StatedDuration).find_map(|pattern| {
            let captures = pattern.captures(text)?;
            let value: u32 = captures.get(1)?.as_str().parse().ok()?;
            let unit = captures.get(2)?.as_str().to_ascii_lowercase();
            Some(if unit.starts_with("min") { value.saturating_mul(60) } else { value })
        });
        if let Some(seconds) = stated {
            return Some(CallDuration { seconds, source: DurationSource::Stated });
        }

        let words = text.split_whitespace().count() as u64;
        if words == 0 {
            return None;
        }
        let per_minute = u64::from(self.config.words_per_minute.max(1));
        let estimate = (words * 60 / per_minute) as u32;
        let seconds = estimate.clamp(self.config.min_duration_secs, self.config.max_duration_secs);
        Some(CallDuration { seconds, source: DurationSource::Estimated })
    }

    fn notes(&self, text: &str) -> Option<String> {
        let sentences: Vec<String> = self
            .notes
            .iter()
            .filter(|(pattern, _)| pattern.is_match(text))
            .map(|(_, note)| (*note).to_string())
            .collect();
        let sentences = if sentences.is_empty() {
            let quote = self.quoted.captures(text).and_then(|captures| captures.get(1))?;
            let said: String = quote.as_str().chars().take(QUOTED_NOTE_CHARS).collect();
            vec![format!("Carrier said: {said}")]
        } else {
            sentences
        };

        let joined = sentences.join(" ");
        let limit = self.config.max_notes_len;
        if joined.chars().count() <= limit {
            return Some(joined);
        }
        let kept: String = joined.chars().take(limit.saturating_sub(3)).collect();
        Some(format!("{kept}..."))
    }
}

impl ExtractionEngine for RuleBasedExtractor {
    fn extract(&self, transcript: &str) -> PartialCallFields {
        let text = normalize_transcript(transcript);
        if text.trim().is_empty() {
            return PartialCallFields::default();
        }

        let load_id = self.first_capture(ExtractedField::LoadId, &text).map(|n| LoadId::from_number(&n));
        let mc_number = self
            .first_capture(ExtractedField::McNumber, &text)
            .and_then(|digits| McNumber::parse(&digits).ok());

        let amounts = self.amounts(&text);
        let proposed_rate = self.proposed_rate(&text, &amounts);
        let agreed_rate = if amounts.len() > 1 || self.count(ExtractedField::AgreementPhrase, &text) > 0
        {
            amounts.last().map(|(_, amount)| *amount)
        } else {
            None
        };

        let offers = self.count(ExtractedField::OfferPhrase, &text) as u32;
        let negotiation_rounds = (offers > 0).then(|| offers.min(self.max_rounds));

        PartialCallFields {
            load_id,
            mc_number,
            proposed_rate,
            agreed_rate,
            amounts: amounts.into_iter().map(|(_, amount)| amount).collect(),
            negotiation_rounds,
            call_duration: self.duration(&text),
            carrier_notes: self.notes(&text),
        }
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, DomainError> {
    Regex::new(pattern).map_err(|error| DomainError::RuleCompilation(error.to_string()))
}

/// Folds typographic quotes so `I’ll` matches `I'll` and `“...”` reads as a quote.
pub(crate) fn normalize_transcript(transcript: &str) -> String {
    transcript.replace(['\u{2019}', '\u{2018}'], "'").replace(['\u{201C}', '\u{201D}'], "\"")
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(&raw.replace(',', "")).ok()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        DurationSource, ExtractionConfig, ExtractionEngine, PartialCallFields, RuleBasedExtractor,
    };

    fn extractor() -> RuleBasedExtractor {
        RuleBasedExtractor::new(ExtractionConfig::default(), 3).expect("rules compile")
    }

    #[test]
    fn pulls_mc_load_and_amount_from_short_request() {
        let fields = extractor().extract("MC123456 wants LD001 for $2500");

        assert_eq!(fields.mc_number.map(|mc| mc.to_string()), Some("MC123456".to_string()));
        assert_eq!(fields.load_id.map(|id| id.0), Some("LD001".to_string()));
        assert_eq!(fields.proposed_rate, Some(Decimal::from(2500)));
        assert_eq!(fields.amounts, vec![Decimal::from(2500)]);
        assert_eq!(fields.agreed_rate, None);
    }

    #[test]
    fn normalizes_spoken_load_references() {
        let extractor = extractor();
        assert_eq!(extractor.extract("calling about load number 7 and load 12").load_id, None);
        assert_eq!(
            extractor.extract("I'm calling about load 042").load_id.map(|id| id.0),
            Some("LD042".to_string())
        );
        assert_eq!(
            extractor.extract("ld-1234 please").load_id.map(|id| id.0),
            Some("LD1234".to_string())
        );
    }

    #[test]
    fn recognizes_spoken_motor_carrier_numbers() {
        let fields = extractor().extract("my motor carrier number is 234567");
        assert_eq!(fields.mc_number.map(|mc| mc.to_string()), Some("MC234567".to_string()));
    }

    #[test]
    fn tracks_negotiation_amounts_in_order() {
        let transcript = "Agent: The rate is $2,500. Carrier: How about $2,200? \
                          Agent: I can do 2350 dollars. Carrier: Deal, $2,350 works.";
        let fields = extractor().extract(transcript);

        assert_eq!(
            fields.amounts,
            vec![Decimal::from(2500), Decimal::from(2200), Decimal::from(2350), Decimal::from(2350)]
        );
        assert_eq!(fields.proposed_rate, Some(Decimal::from(2500)));
        assert_eq!(fields.agreed_rate, Some(Decimal::from(2350)));
        assert_eq!(fields.negotiation_rounds, Some(1));
    }

    #[test]
    fn ignores_implausible_amounts() {
        let fields = extractor().extract("That's $50 for tolls and $25,000 for the truck");
        assert!(fields.amounts.is_empty());
        assert_eq!(fields.proposed_rate, None);
    }

    #[test]
    fn caps_rounds_at_the_negotiation_limit() {
        let transcript = "how about 2000? what about 2100? can you do 2150? counter at 2200? \
                          best rate you have?";
        let fields = extractor().extract(transcript);
        assert_eq!(fields.negotiation_rounds, Some(3));
    }

    #[test]
    fn stated_duration_wins_over_estimate() {
        let extractor = extractor();
        let stated = extractor.extract("The call lasted 4 minutes. MC123456.").call_duration.expect("duration");
        assert_eq!(stated.seconds, 240);
        assert_eq!(stated.source, DurationSource::Stated);

        let estimated = extractor.extract("short call").call_duration.expect("duration");
        assert_eq!(estimated.seconds, 60);
        assert_eq!(estimated.source, DurationSource::Estimated);
    }

    #[test]
    fn notes_capture_carrier_concerns() {
        let fields = extractor().extract("That's too low for me, and the trailer must deliver by Friday.");
        assert_eq!(
            fields.carrier_notes.as_deref(),
            Some(
                "Has specific delivery requirements. Discussed equipment needs. \
                 Had concerns about load details."
            )
        );
    }

    #[test]
    fn notes_record_agreement_and_deadhead_concern() {
        let fields =
            extractor().extract("Deal, I'll take it. Worried about deadhead on the return load.");
        assert_eq!(
            fields.carrier_notes.as_deref(),
            Some("Carrier agreed. Concerned about backhaul/deadhead.")
        );
    }

    #[test]
    fn notes_record_decline_and_callback() {
        let fields = extractor().extract("No thanks, not interested. I'll call back next week.");
        assert_eq!(
            fields.carrier_notes.as_deref(),
            Some("Carrier declined. Carrier needs time to decide.")
        );
    }

    #[test]
    fn notes_fall_back_to_first_quoted_utterance() {
        let extractor = extractor();
        let fields = extractor.extract("Carrier: \"I only run the southeast lanes\" then hung up");
        assert_eq!(
            fields.carrier_notes.as_deref(),
            Some("Carrier said: I only run the southeast lanes")
        );

        let long = format!("\"{}\"", "x".repeat(150));
        let notes = extractor.extract(&long).carrier_notes.expect("notes");
        assert_eq!(notes, format!("Carrier said: {}", "x".repeat(100)));

        let curly = extractor.extract("He said \u{201C}Only Mondays\u{201D}.");
        assert_eq!(curly.carrier_notes.as_deref(), Some("Carrier said: Only Mondays"));
    }

    #[test]
    fn notes_absent_without_matching_phrases_or_quotes() {
        assert_eq!(extractor().extract("Checking on LD001 for MC123456").carrier_notes, None);
    }

    #[test]
    fn long_notes_are_truncated_with_ellipsis() {
        let config = ExtractionConfig { max_notes_len: 20, ..ExtractionConfig::default() };
        let extractor = RuleBasedExtractor::new(config, 3).expect("rules compile");
        let notes = extractor.extract("Deal. No thanks.").carrier_notes.expect("notes");
        assert_eq!(notes, "Carrier agreed. C...");
    }

    #[test]
    fn empty_transcript_yields_empty_fields() {
        assert_eq!(extractor().extract("   "), PartialCallFields::default());
    }

    #[test]
    fn curly_apostrophes_still_match_agreement() {
        let fields = extractor().extract("Okay I\u{2019}ll take it at $2400");
        assert_eq!(fields.agreed_rate, Some(Decimal::from(2400)));
    }
}
