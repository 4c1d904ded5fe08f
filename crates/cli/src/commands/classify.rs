use std::str::FromStr;

use freightdesk_core::desk::classification::{ClassificationEngine, RuleBasedClassifier};
use freightdesk_core::desk::extraction::{ExtractionEngine, RuleBasedExtractor};
use freightdesk_core::domain::call::CallOutcome;

use crate::commands::{load_config, CommandResult, TranscriptSource};

pub fn run(source: TranscriptSource, declared_outcome: Option<String>) -> CommandResult {
    let config = match load_config("classify") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let transcript = match source.read() {
        Ok(transcript) => transcript,
        Err(error) => {
            return CommandResult::failure("classify", "invalid_input", format!("{error:#}"), 2)
        }
    };
    let declared = match declared_outcome.as_deref().map(CallOutcome::from_str).transpose() {
        Ok(declared) => declared,
        Err(error) => return CommandResult::failure("classify", "invalid_input", error.to_string(), 2),
    };

    let extractor =
        RuleBasedExtractor::new(config.desk.extraction.clone(), config.desk.negotiation.max_rounds);
    let classifier = RuleBasedClassifier::new(config.desk.classification.clone());
    let (extractor, classifier) = match (extractor, classifier) {
        (Ok(extractor), Ok(classifier)) => (extractor, classifier),
        (Err(error), _) | (_, Err(error)) => {
            return CommandResult::failure("classify", "rule_compilation", error.to_string(), 4)
        }
    };

    let fields = extractor.extract(&transcript);
    let classification = classifier.classify(&transcript, &fields, None);
    let classification = match declared {
        Some(declared) => classification.reconcile_declared(declared),
        None => classification,
    };

    CommandResult::with_data(
        "classify",
        format!("{} ({} sentiment)", classification.outcome, classification.sentiment),
        &classification,
    )
}
