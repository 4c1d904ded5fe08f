use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::call::{CallOutcome, Offer, OfferSide, RateBounds};
use crate::domain::load::Load;
use crate::errors::DomainError;

/// Share of the loadboard rate the desk may concede below it (10%).
pub const FLOOR_PERCENTAGE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Share of the loadboard rate the desk may go above it (5%).
pub const CEILING_PERCENTAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);
pub const MAX_ROUNDS: u32 = 3;

/// What happens when the final round's proposal is still out of bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastRoundPolicy {
    /// Walk away: terminal reject.
    #[default]
    Reject,
    /// Close at the bound nearest the proposal.
    AcceptAtBound,
}

impl FromStr for LastRoundPolicy {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reject" => Ok(Self::Reject),
            "accept_at_bound" => Ok(Self::AcceptAtBound),
            other => Err(DomainError::InvalidInput(format!(
                "unsupported last round policy `{other}` (expected reject|accept_at_bound)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationPolicy {
    pub floor_pct: Decimal,
    pub ceiling_pct: Decimal,
    pub max_rounds: u32,
    pub last_round_policy: LastRoundPolicy,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            floor_pct: FLOOR_PERCENTAGE,
            ceiling_pct: CEILING_PERCENTAGE,
            max_rounds: MAX_ROUNDS,
            last_round_policy: LastRoundPolicy::default(),
        }
    }
}

impl NegotiationPolicy {
    pub fn bounds(&self, baseline_rate: Decimal) -> RateBounds {
        RateBounds {
            floor: (baseline_rate * (Decimal::ONE - self.floor_pct)).round_dp(2),
            ceiling: (baseline_rate * (Decimal::ONE + self.ceiling_pct)).round_dp(2),
        }
    }

    /// Fraction of the remaining gap a counter closes in `round`.
    fn convergence(&self, round: u32) -> Decimal {
        Decimal::from(round) / Decimal::from(self.max_rounds)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    RoundLimitExceeded,
    FinalOfferDeclined,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Accept { rate: Decimal, outcome: CallOutcome },
    Counter { rate: Decimal },
    Reject { reason: RejectReason },
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Counter { .. })
    }

    pub fn rate(&self) -> Option<Decimal> {
        match self {
            Self::Accept { rate, .. } | Self::Counter { rate } => Some(*rate),
            Self::Reject { .. } => None,
        }
    }

    pub fn outcome(&self) -> Option<CallOutcome> {
        match self {
            Self::Accept { outcome, .. } => Some(*outcome),
            Self::Reject { .. } => Some(CallOutcome::Rejected),
            Self::Counter { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accept { .. } => "accept",
            Self::Counter { .. } => "counter",
            Self::Reject { .. } => "reject",
        }
    }

    /// Line the agent reads back to the carrier.
    pub fn message(&self, proposed_rate: Decimal) -> String {
        match self {
            Self::Accept { rate, outcome: CallOutcome::Booked } if *rate == proposed_rate => {
                format!("Perfect! We have a deal at ${rate:.2}.")
            }
            Self::Accept { rate, .. } if *rate == proposed_rate => {
                format!("We can meet you at ${rate:.2}. That works for us.")
            }
            Self::Accept { rate, .. } => {
                format!("We can't do ${proposed_rate:.2}, but we can close this out at ${rate:.2}.")
            }
            Self::Counter { rate } => format!(
                "I appreciate your offer of ${proposed_rate:.2}, but that's outside what we can do on this load. \
                 The best I can do is ${rate:.2}. Can we make that work?"
            ),
            Self::Reject { .. } => "We've gone back and forth a few times. Let me connect you with my manager \
                 to see if we can find a solution that works for both of us."
                .to_string(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStrategy {
    Flexible,
    Moderate,
    Firm,
}

impl NegotiationStrategy {
    pub fn for_round(round: u32) -> Self {
        match round {
            0 | 1 => Self::Flexible,
            2 => Self::Moderate,
            _ => Self::Firm,
        }
    }
}

pub trait NegotiationEngine: Send + Sync {
    fn policy(&self) -> &NegotiationPolicy;

    fn evaluate(
        &self,
        load: &Load,
        proposed_rate: Decimal,
        round: u32,
        prior_system_offer: Option<Decimal>,
    ) -> Result<Decision, DomainError>;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicNegotiationEngine {
    policy: NegotiationPolicy,
}

impl DeterministicNegotiationEngine {
    pub fn new(policy: NegotiationPolicy) -> Self {
        Self { policy }
    }
}

impl NegotiationEngine for DeterministicNegotiationEngine {
    fn policy(&self) -> &NegotiationPolicy {
        &self.policy
    }

    fn evaluate(
        &self,
        load: &Load,
        proposed_rate: Decimal,
        round: u32,
        prior_system_offer: Option<Decimal>,
    ) -> Result<Decision, DomainError> {
        let decision = evaluate_offer(&self.policy, load, proposed_rate, round, prior_system_offer)?;
        debug!(
            event_name = "negotiation.decision",
            load_id = %load.load_id,
            round,
            proposed_rate = %proposed_rate,
            decision = decision.label(),
            rate = ?decision.rate(),
            "offer evaluated"
        );
        Ok(decision)
    }
}

pub fn evaluate_offer(
    policy: &NegotiationPolicy,
    load: &Load,
    proposed_rate: Decimal,
    round: u32,
    prior_system_offer: Option<Decimal>,
) -> Result<Decision, DomainError> {
    if round > policy.max_rounds {
        return Ok(Decision::Reject { reason: RejectReason::RoundLimitExceeded });
    }
    if round == 0 {
        return Err(DomainError::InvalidInput("round numbering starts at 1".to_string()));
    }
    if proposed_rate <= Decimal::ZERO {
        return Err(DomainError::InvalidInput("proposed_rate must be positive".to_string()));
    }
    if load.loadboard_rate <= Decimal::ZERO {
        return Err(DomainError::InvalidInput(format!(
            "load {} has no usable loadboard rate",
            load.load_id
        )));
    }

    let bounds = policy.bounds(load.loadboard_rate);
    if bounds.contains(proposed_rate) {
        let outcome = if round == 1 { CallOutcome::Booked } else { CallOutcome::Negotiated };
        return Ok(Decision::Accept { rate: proposed_rate, outcome });
    }

    let below_floor = proposed_rate < bounds.floor;
    let bound = if below_floor { bounds.floor } else { bounds.ceiling };

    if round == policy.max_rounds {
        return Ok(match policy.last_round_policy {
            LastRoundPolicy::Reject => {
                Decision::Reject { reason: RejectReason::FinalOfferDeclined }
            }
            LastRoundPolicy::AcceptAtBound => {
                Decision::Accept { rate: bound, outcome: CallOutcome::Negotiated }
            }
        });
    }

    // A prior counter only anchors the next one when it sits between the
    // proposal and the bound; otherwise the proposal itself is the anchor.
    let anchor = match prior_system_offer {
        Some(prior) if strictly_between(prior, proposed_rate, bound) => prior,
        _ => proposed_rate,
    };

    let exact = anchor + (bound - anchor) * policy.convergence(round);
    let rounded = exact.round_dp(2);
    let rate = if strictly_between(rounded, anchor, bound) { rounded } else { exact };

    Ok(Decision::Counter { rate })
}

fn strictly_between(value: Decimal, a: Decimal, b: Decimal) -> bool {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    low < value && value < high
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationState {
    pub round: u32,
    pub current_offer: Option<Decimal>,
    pub bounds: RateBounds,
    pub offers: Vec<Offer>,
    pub decision: Option<Decision>,
}

/// One call's negotiation over a single load.
#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationSession {
    load: Load,
    state: NegotiationState,
}

impl NegotiationSession {
    pub fn new(load: Load, policy: &NegotiationPolicy) -> Self {
        let bounds = policy.bounds(load.loadboard_rate);
        Self {
            load,
            state: NegotiationState {
                round: 0,
                current_offer: None,
                bounds,
                offers: Vec::new(),
                decision: None,
            },
        }
    }

    pub fn submit<E>(&mut self, engine: &E, proposed_rate: Decimal) -> Result<Decision, DomainError>
    where
        E: NegotiationEngine + ?Sized,
    {
        if let Some(decision) = &self.state.decision {
            if decision.is_terminal() {
                return Err(DomainError::InvalidInput(format!(
                    "negotiation for {} already concluded with {decision}",
                    self.load.load_id
                )));
            }
        }

        let round = self.state.round + 1;
        let decision =
            engine.evaluate(&self.load, proposed_rate, round, self.state.current_offer)?;

        self.state.round = round;
        self.state.offers.push(Offer { round, side: OfferSide::Carrier, rate: proposed_rate });
        if let Decision::Counter { rate } = decision {
            self.state.offers.push(Offer { round, side: OfferSide::Broker, rate });
            self.state.current_offer = Some(rate);
        }
        self.state.decision = Some(decision.clone());

        Ok(decision)
    }

    pub fn load(&self) -> &Load {
        &self.load
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn bounds(&self) -> &RateBounds {
        &self.state.bounds
    }

    pub fn rounds(&self) -> u32 {
        self.state.round
    }

    pub fn is_concluded(&self) -> bool {
        self.state.decision.as_ref().is_some_and(Decision::is_terminal)
    }

    pub fn terminal_decision(&self) -> Option<&Decision> {
        self.state.decision.as_ref().filter(|decision| decision.is_terminal())
    }

    pub fn agreed_rate(&self) -> Option<Decimal> {
        match self.terminal_decision() {
            Some(Decision::Accept { rate, .. }) => Some(*rate),
            _ => None,
        }
    }

    pub fn strategy(&self) -> NegotiationStrategy {
        NegotiationStrategy::for_round(self.state.round + 1)
    }
}
