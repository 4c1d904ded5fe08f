use freightdesk_core::desk::extraction::{ExtractionEngine, RuleBasedExtractor};

use crate::commands::{load_config, CommandResult, TranscriptSource};

pub fn run(source: TranscriptSource) -> CommandResult {
    let config = match load_config("extract") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let transcript = match source.read() {
        Ok(transcript) => transcript,
        Err(error) => return CommandResult::failure("extract", "invalid_input", format!("{error:#}"), 2),
    };
    let extractor = match RuleBasedExtractor::new(
        config.desk.extraction.clone(),
        config.desk.negotiation.max_rounds,
    ) {
        Ok(extractor) => extractor,
        Err(error) => return CommandResult::failure("extract", "rule_compilation", error.to_string(), 4),
    };

    let fields = extractor.extract(&transcript);
    CommandResult::with_data(
        "extract",
        format!("{} identifying fields found", fields.populated_fields()),
        &fields,
    )
}
