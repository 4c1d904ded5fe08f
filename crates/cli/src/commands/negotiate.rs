use freightdesk_core::desk::negotiation::{Decision, NegotiationStrategy};
use freightdesk_core::desk::DeskRuntime;
use freightdesk_core::domain::call::RateBounds;
use freightdesk_core::domain::load::LoadId;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{build_desk, load_config, CommandResult};

#[derive(Clone, Debug)]
pub struct NegotiateArgs {
    pub load_id: String,
    /// Carrier offers in the order they were made, one per round.
    pub offers: Vec<Decimal>,
}

#[derive(Debug, Serialize)]
struct RoundTrace {
    round: u32,
    strategy: NegotiationStrategy,
    proposed_rate: Decimal,
    #[serde(flatten)]
    decision: Decision,
    message: String,
}

#[derive(Debug, Serialize)]
struct NegotiationTrace {
    load_id: LoadId,
    bounds: RateBounds,
    rounds: Vec<RoundTrace>,
    concluded: bool,
    agreed_rate: Option<Decimal>,
    /// Offers left unevaluated because the negotiation had already ended.
    ignored_offers: usize,
}

pub fn run(args: NegotiateArgs) -> CommandResult {
    let config = match load_config("negotiate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let desk = match build_desk(&config) {
        Ok(desk) => desk,
        Err(error) => {
            return CommandResult::failure("negotiate", "desk_init", format!("{error:#}"), 4)
        }
    };
    if args.offers.is_empty() {
        return CommandResult::failure("negotiate", "invalid_input", "at least one offer is required", 2);
    }

    let load_id = LoadId::canonical(&args.load_id);
    let mut session = match desk.open_negotiation(&load_id) {
        Ok(session) => session,
        Err(error) => return CommandResult::failure("negotiate", "invalid_input", error.to_string(), 2),
    };

    let mut rounds = Vec::new();
    for &offer in &args.offers {
        if session.is_concluded() {
            break;
        }
        let strategy = session.strategy();
        match desk.submit_offer(&mut session, offer) {
            Ok(decision) => rounds.push(RoundTrace {
                round: session.rounds(),
                strategy,
                proposed_rate: offer,
                message: decision.message(offer),
                decision,
            }),
            Err(error) => {
                return CommandResult::failure("negotiate", "invalid_input", error.to_string(), 2)
            }
        }
    }

    let trace = NegotiationTrace {
        load_id,
        bounds: *session.bounds(),
        ignored_offers: args.offers.len() - rounds.len(),
        rounds,
        concluded: session.is_concluded(),
        agreed_rate: session.agreed_rate(),
    };
    let message = match session.terminal_decision() {
        Some(decision) => format!("negotiation ended with {decision} after {} rounds", session.rounds()),
        None => format!("negotiation open after {} rounds", session.rounds()),
    };
    CommandResult::with_data("negotiate", message, &trace)
}
