#![allow(dead_code)]
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{OrderKind, Side, Symbol};

/// Closed enumeration of everything that can reject or annotate a tick.
/// Stringification happens only at the persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // Strategy-stage rejections
    InsufficientCandles { timeframe: String, have: usize, need: usize },
    HtfSideways,
    NoM15Setup,
    PriceNotInZone,
    NoM1Confirmation,
    InvalidSl,
    InvalidTp,
    RiskTooSmall { distance: Decimal, min: Decimal },
    RiskTooLarge { distance: Decimal, cap: Decimal },
    // Analytics state shortfalls surfaced as NoSignal
    SwingUnderflow,
    BufferEmpty,
    BiasAnchorMissing,
    // Execution filter gates
    SymbolDisabled,
    DirectionNotAllowed,
    HtfTrendNotAllowed,
    MissingBosConfirm,
    MissingSweep,
    MissingDisplacement,
    WrongPdZone,
    FvgMissing,
    OutsideSession,
    SpreadExceeded { observed: Decimal, max: Decimal },
    TooCloseToDailyExtreme,
    DailyTradeCapReached { count: u32, cap: u32 },
    DailyLossCapReached { loss: Decimal, cap: Decimal },
    CooldownActive { minutes_remaining: i64 },
    ConcurrencySymbolCap,
    ConcurrencyDirectionCap,
    ConcurrencyGlobalCap,
    ExposureSymbolCap { risk: Decimal, cap: Decimal },
    ExposureGlobalCap { risk: Decimal, cap: Decimal },
    ConfluenceTooLow { score: u8, min: u8 },
    // External collaborators
    GuardrailBlocked,
    GuardrailReduced,
    BrokerDown,
    // Positive annotations carried on proposals
    HtfAligned,
    PdZoneCorrect,
    ItfAligned,
    DisplacementPresent,
    SweepPresent,
    FvgPresent,
    ObPresent,
    M1Refined,
    SessionValid,
    SpreadOk,
    VolumeImbalanceAligned,
}

impl ReasonCode {
    /// Stable tag used in logs and reports.
    pub fn tag(&self) -> &'static str {
        match self {
            ReasonCode::InsufficientCandles { .. } => "INSUFFICIENT_CANDLES",
            ReasonCode::HtfSideways => "HTF_SIDEWAYS",
            ReasonCode::NoM15Setup => "NO_M15_SETUP",
            ReasonCode::PriceNotInZone => "PRICE_NOT_IN_ZONE",
            ReasonCode::NoM1Confirmation => "NO_M1_CONFIRMATION",
            ReasonCode::InvalidSl => "INVALID_SL",
            ReasonCode::InvalidTp => "INVALID_TP",
            ReasonCode::RiskTooSmall { .. } => "RISK_TOO_SMALL",
            ReasonCode::RiskTooLarge { .. } => "RISK_TOO_LARGE",
            ReasonCode::SwingUnderflow => "SWING_UNDERFLOW",
            ReasonCode::BufferEmpty => "BUFFER_EMPTY",
            ReasonCode::BiasAnchorMissing => "BIAS_ANCHOR_MISSING",
            ReasonCode::SymbolDisabled => "SYMBOL_DISABLED",
            ReasonCode::DirectionNotAllowed => "DIRECTION_NOT_ALLOWED",
            ReasonCode::HtfTrendNotAllowed => "HTF_TREND_NOT_ALLOWED",
            ReasonCode::MissingBosConfirm => "MISSING_BOS_CONFIRM",
            ReasonCode::MissingSweep => "MISSING_SWEEP",
            ReasonCode::MissingDisplacement => "MISSING_DISPLACEMENT",
            ReasonCode::WrongPdZone => "WRONG_PD_ZONE",
            ReasonCode::FvgMissing => "FVG_MISSING",
            ReasonCode::OutsideSession => "OUTSIDE_SESSION",
            ReasonCode::SpreadExceeded { .. } => "SPREAD_EXCEEDED",
            ReasonCode::TooCloseToDailyExtreme => "TOO_CLOSE_TO_DAILY_EXTREME",
            ReasonCode::DailyTradeCapReached { .. } => "DAILY_TRADE_CAP_REACHED",
            ReasonCode::DailyLossCapReached { .. } => "DAILY_LOSS_CAP_REACHED",
            ReasonCode::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            ReasonCode::ConcurrencySymbolCap => "CONCURRENCY_SYMBOL_CAP",
            ReasonCode::ConcurrencyDirectionCap => "CONCURRENCY_DIRECTION_CAP",
            ReasonCode::ConcurrencyGlobalCap => "CONCURRENCY_GLOBAL_CAP",
            ReasonCode::ExposureSymbolCap { .. } => "EXPOSURE_SYMBOL_CAP",
            ReasonCode::ExposureGlobalCap { .. } => "EXPOSURE_GLOBAL_CAP",
            ReasonCode::ConfluenceTooLow { .. } => "CONFLUENCE_TOO_LOW",
            ReasonCode::GuardrailBlocked => "GUARDRAIL_BLOCKED",
            ReasonCode::GuardrailReduced => "GUARDRAIL_REDUCED",
            ReasonCode::BrokerDown => "BROKER_DOWN",
            ReasonCode::HtfAligned => "HTF_ALIGNED",
            ReasonCode::PdZoneCorrect => "PD_ZONE_CORRECT",
            ReasonCode::ItfAligned => "ITF_ALIGNED",
            ReasonCode::DisplacementPresent => "DISPLACEMENT_PRESENT",
            ReasonCode::SweepPresent => "SWEEP_PRESENT",
            ReasonCode::FvgPresent => "FVG_PRESENT",
            ReasonCode::ObPresent => "OB_PRESENT",
            ReasonCode::M1Refined => "M1_REFINED",
            ReasonCode::SessionValid => "SESSION_VALID",
            ReasonCode::SpreadOk => "SPREAD_OK",
            ReasonCode::VolumeImbalanceAligned => "VOLUME_IMBALANCE_ALIGNED",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonCode::SpreadExceeded { observed, max } => {
                write!(f, "SPREAD_EXCEEDED(observed={observed}, max={max})")
            }
            ReasonCode::ConfluenceTooLow { score, min } => {
                write!(f, "CONFLUENCE_TOO_LOW(score={score}, min={min})")
            }
            ReasonCode::CooldownActive { minutes_remaining } => {
                write!(f, "COOLDOWN_ACTIVE({minutes_remaining}m remaining)")
            }
            other => write!(f, "{}", other.tag()),
        }
    }
}

/// Immutable trade intent produced by a strategy. The execution filter never
/// mutates a proposal; it wraps it into a new `Decision`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub symbol: Symbol,
    pub side: Side,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub order_kind: OrderKind,
    pub confluence_score: u8,
    pub reason_codes: Vec<ReasonCode>,
}

impl TradeProposal {
    pub fn risk_distance(&self) -> Decimal {
        (self.entry - self.stop_loss).abs()
    }

    pub fn reward_distance(&self) -> Decimal {
        (self.take_profit - self.entry).abs()
    }

    /// SL on the risk side, TP on the reward side, both strictly.
    pub fn is_correctly_sided(&self) -> bool {
        match self.side {
            Side::Buy => self.stop_loss < self.entry && self.entry < self.take_profit,
            Side::Sell => self.take_profit < self.entry && self.entry < self.stop_loss,
        }
    }

    /// Reward distance divided by risk distance.
    pub fn reward_multiple(&self) -> Option<Decimal> {
        let risk = self.risk_distance();
        if risk.is_zero() {
            None
        } else {
            Some(self.reward_distance() / risk)
        }
    }
}

/// Exactly one of these is produced per evaluation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    Trade { proposal: TradeProposal },
    Skip { reasons: Vec<ReasonCode> },
    NoSignal { reason: ReasonCode },
}

impl Decision {
    pub fn trade(proposal: TradeProposal) -> Self {
        Decision::Trade { proposal }
    }

    pub fn skip(reasons: Vec<ReasonCode>) -> Self {
        Decision::Skip { reasons }
    }

    pub fn no_signal(reason: ReasonCode) -> Self {
        Decision::NoSignal { reason }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, Decision::Trade { .. })
    }

    pub fn proposal(&self) -> Option<&TradeProposal> {
        match self {
            Decision::Trade { proposal } => Some(proposal),
            _ => None,
        }
    }
}
