#![allow(dead_code)]
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::analytics::{
    ContextBuilder, StructureParams, SwingParams, TimeframeParams, TrendParams, ZoneParams,
};
use crate::errors::EngineError;
use crate::execution::session::SessionWindow;
use crate::types::{Side, Symbol, Trend};

/// Immutable per-run configuration. Loaded once (file, then environment
/// overrides), validated, then passed by reference through the call graph.
/// Nothing mutates it during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub symbols: BTreeMap<Symbol, SymbolRule>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            scheduler: SchedulerSettings::default(),
            strategy: StrategySettings::default(),
            analytics: AnalyticsSettings::default(),
            risk: RiskSettings::default(),
            symbols: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: RunConfig = toml::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.apply_env();
        Ok(config)
    }

    /// Recognized environment-style toggles, applied once at load time.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_bool("USE_STRICT_CLOSE") {
            self.strategy.use_strict_close = v;
        }
        if let Some(v) = env_bool("AVOID_HTF_SIDEWAYS") {
            self.strategy.avoid_htf_sideways = v;
        }
        if let Some(v) = env_bool("RELAXED_FILTERS") {
            self.strategy.relaxed_filters = v;
        }
        if let Some(v) = env_bool("REQUIRE_ICT_PIPELINE") {
            self.strategy.require_ict_pipeline = v;
        }
        if let Some(v) = env_decimal("REWARD_MULTIPLE") {
            self.strategy.reward_multiple = v;
        }
        if let Some(v) = env_usize("MIN_HTF_CANDLES") {
            self.strategy.min_htf_candles = v;
        }
        if let Some(v) = env_usize("MIN_ITF_CANDLES") {
            self.strategy.min_itf_candles = v;
        }
        if let Some(v) = env_usize("MIN_LTF_CANDLES") {
            self.strategy.min_ltf_candles = v;
        }
    }

    /// Collects every problem rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.general.symbols.is_empty() {
            errors.push("general.symbols must name at least one symbol".to_string());
        }
        if self.scheduler.initial_balance <= Decimal::ZERO {
            errors.push("scheduler.initial_balance must be > 0".to_string());
        }
        if self.strategy.reward_multiple < Decimal::ONE {
            errors.push("strategy.reward_multiple must be >= 1".to_string());
        }
        if self.strategy.zone_buffer_fraction < Decimal::ZERO {
            errors.push("strategy.zone_buffer_fraction must be >= 0".to_string());
        }
        if self.strategy.max_risk_fraction <= Decimal::ZERO
            || self.strategy.max_risk_fraction > dec!(0.10)
        {
            errors.push("strategy.max_risk_fraction must be in (0, 0.10]".to_string());
        }
        if self.risk.risk_per_trade_pct <= Decimal::ZERO || self.risk.risk_per_trade_pct > dec!(10)
        {
            errors.push("risk.risk_per_trade_pct must be between 0 and 10".to_string());
        }
        if self.risk.max_open_global == 0 {
            errors.push("risk.max_open_global must be > 0".to_string());
        }
        if self.risk.min_confluence > 100 {
            errors.push("risk.min_confluence must be <= 100".to_string());
        }
        if self.analytics.htf_pivot_width == 0
            || self.analytics.itf_pivot_width == 0
            || self.analytics.ltf_pivot_width == 0
        {
            errors.push("analytics pivot widths must be > 0".to_string());
        }
        for (symbol, rule) in &self.symbols {
            for name in &rule.sessions {
                if SessionWindow::parse(name).is_none() {
                    errors.push(format!("symbols.{symbol}: unknown session '{name}'"));
                }
            }
            if rule.max_spread <= Decimal::ZERO {
                errors.push(format!("symbols.{symbol}: max_spread must be > 0"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective rule for a symbol: the configured entry, or defaults scaled
    /// to the symbol.
    pub fn rule(&self, symbol: Symbol) -> SymbolRule {
        self.symbols
            .get(&symbol)
            .cloned()
            .unwrap_or_else(|| SymbolRule::for_symbol(symbol))
    }

    /// Analytic parameter bundle for one symbol.
    pub fn context_builder(&self, symbol: Symbol) -> ContextBuilder {
        let rule = self.rule(symbol);
        let a = &self.analytics;
        let zone = |atr_mult: Decimal| ZoneParams {
            ob_wick_ratio: rule.ob_wick_ratio,
            fvg_min_size: rule.fvg_min_size,
            displacement_body_mult: a.displacement_body_mult,
            displacement_atr_mult: atr_mult,
            atr_period: a.atr_period,
            sweep_tolerance: symbol.sweep_tolerance(),
        };
        let tf = |pivot_width: usize, zones: ZoneParams| TimeframeParams {
            window: a.window,
            swings: SwingParams {
                pivot_width,
                rolling_lookback: a.rolling_lookback,
                min_pivot_swings: a.min_pivot_swings,
            },
            structure: StructureParams {
                strict_close: self.strategy.use_strict_close,
            },
            trend: TrendParams::default(),
            zones,
        };

        ContextBuilder {
            htf: tf(a.htf_pivot_width, zone(rule.displacement_atr_mult)),
            itf: tf(a.itf_pivot_width, zone(rule.displacement_atr_mult)),
            ltf: tf(a.ltf_pivot_width, zone(rule.displacement_atr_mult)),
        }
    }

    pub fn session_windows(&self, symbol: Symbol) -> Vec<SessionWindow> {
        self.rule(symbol)
            .sessions
            .iter()
            .filter_map(|s| SessionWindow::parse(s))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub symbols: Vec<Symbol>,
    /// Strategy label recorded in the decision log.
    pub strategy_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            symbols: vec![Symbol::XAUUSD],
            strategy_name: "ict".to_string(),
        }
    }
}

/// How simulated fills treat the spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillModel {
    /// Fills pay half the spread on the fill side.
    #[default]
    Pessimistic,
    /// Fills at the raw candle price; useful to isolate strategy PnL.
    MidPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub initial_balance: Decimal,
    /// Fixed spread per symbol, in price units. Symbols without an entry use
    /// half the configured max spread.
    pub spread: BTreeMap<Symbol, Decimal>,
    /// Commission charged per lot per side.
    pub commission_per_lot: Decimal,
    /// Swap charged per lot per night held.
    pub swap_per_lot_per_night: Decimal,
    pub fill_model: FillModel,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            spread: BTreeMap::new(),
            commission_per_lot: dec!(3.5),
            swap_per_lot_per_night: dec!(0.8),
            fill_model: FillModel::Pessimistic,
        }
    }
}

impl SchedulerSettings {
    pub fn spread_for(&self, symbol: Symbol) -> Decimal {
        self.spread
            .get(&symbol)
            .copied()
            .unwrap_or_else(|| symbol.default_max_spread() / Decimal::TWO)
    }

    /// Spread charged per fill, shaped by the configured fill model.
    pub fn fill_half_spread(&self, symbol: Symbol) -> Decimal {
        match self.fill_model {
            FillModel::Pessimistic => self.spread_for(symbol) / Decimal::TWO,
            FillModel::MidPrice => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// H4 -> M15 -> M1 pipeline when true; legacy confluence strategy
    /// otherwise.
    pub require_ict_pipeline: bool,
    /// Strict: a break needs the close beyond the swing.
    pub use_strict_close: bool,
    pub avoid_htf_sideways: bool,
    /// Disables the optional structural gates, for replay debugging.
    pub relaxed_filters: bool,
    pub reward_multiple: Decimal,
    pub min_htf_candles: usize,
    pub min_itf_candles: usize,
    pub min_ltf_candles: usize,
    /// ITF candles searched backwards for the setup event.
    pub setup_window_itf: usize,
    /// LTF candles searched backwards for the entry confirmation.
    pub refinement_window_ltf: usize,
    /// Zone expansion for the return-to-zone gate, as a fraction of zone
    /// size per side.
    pub zone_buffer_fraction: Decimal,
    /// Entry-vs-market threshold for order kind selection, as a fraction of
    /// price.
    pub order_kind_epsilon_fraction: Decimal,
    /// Hard cap on risk distance relative to entry.
    pub max_risk_fraction: Decimal,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            require_ict_pipeline: true,
            use_strict_close: true,
            avoid_htf_sideways: true,
            relaxed_filters: false,
            reward_multiple: dec!(3.0),
            min_htf_candles: 30,
            min_itf_candles: 50,
            min_ltf_candles: 30,
            setup_window_itf: 20,
            refinement_window_ltf: 10,
            zone_buffer_fraction: dec!(0.10),
            order_kind_epsilon_fraction: dec!(0.0005),
            max_risk_fraction: dec!(0.02),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub window: usize,
    pub htf_pivot_width: usize,
    pub itf_pivot_width: usize,
    pub ltf_pivot_width: usize,
    pub min_pivot_swings: usize,
    pub rolling_lookback: usize,
    pub atr_period: usize,
    pub displacement_body_mult: Decimal,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            window: 200,
            htf_pivot_width: 5,
            itf_pivot_width: 3,
            ltf_pivot_width: 2,
            min_pivot_swings: 4,
            rolling_lookback: 10,
            atr_period: 14,
            displacement_body_mult: dec!(1.5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    /// Percent of balance risked per trade.
    pub risk_per_trade_pct: Decimal,
    /// Daily realized-loss cap as percent of balance; 0 disables.
    pub daily_loss_cap_pct: Decimal,
    pub max_trades_per_day: u32,
    pub cooldown_minutes: i64,
    pub max_open_per_symbol: usize,
    pub max_open_per_direction: usize,
    pub max_open_global: usize,
    /// Estimated open risk caps in account currency; 0 disables.
    pub max_risk_per_symbol: Decimal,
    pub max_risk_global: Decimal,
    pub min_confluence: u8,
    /// Minimum distance from today's high/low, as a fraction of price; 0
    /// disables.
    pub daily_extreme_buffer_fraction: Decimal,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: dec!(1.0),
            daily_loss_cap_pct: dec!(5),
            max_trades_per_day: 3,
            cooldown_minutes: 30,
            max_open_per_symbol: 1,
            max_open_per_direction: 1,
            max_open_global: 3,
            max_risk_per_symbol: Decimal::ZERO,
            max_risk_global: Decimal::ZERO,
            min_confluence: 50,
            daily_extreme_buffer_fraction: Decimal::ZERO,
        }
    }
}

/// Per-symbol trading rules consumed by the strategy and execution filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolRule {
    pub enabled: bool,
    pub allow_buys: bool,
    pub allow_sells: bool,
    /// HTF trends a proposal may trade with; empty disables the gate.
    pub htf_trends_allowed: Vec<Trend>,
    pub require_bos: bool,
    pub require_sweep: bool,
    pub require_displacement: bool,
    pub require_fvg: bool,
    pub enforce_premium_discount: bool,
    pub sessions: Vec<String>,
    pub max_spread: Decimal,
    pub fvg_min_size: Decimal,
    pub ob_wick_ratio: Decimal,
    pub displacement_atr_mult: Decimal,
    pub sl_buffer: Decimal,
    pub min_risk_distance: Decimal,
}

impl Default for SymbolRule {
    fn default() -> Self {
        Self::for_symbol(Symbol::XAUUSD)
    }
}

impl SymbolRule {
    pub fn for_symbol(symbol: Symbol) -> Self {
        Self {
            enabled: true,
            allow_buys: true,
            allow_sells: true,
            htf_trends_allowed: Vec::new(),
            require_bos: true,
            require_sweep: false,
            require_displacement: true,
            require_fvg: true,
            enforce_premium_discount: true,
            sessions: vec!["london".to_string(), "newyork".to_string()],
            max_spread: symbol.default_max_spread(),
            fvg_min_size: symbol.min_fvg_size(),
            ob_wick_ratio: dec!(0.3),
            displacement_atr_mult: symbol.displacement_atr_multiple(),
            sl_buffer: symbol.sl_buffer(),
            min_risk_distance: symbol.min_risk_distance(),
        }
    }

    pub fn allows_side(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.allow_buys,
            Side::Sell => self.allow_sells,
        }
    }
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn env_decimal(key: &str) -> Option<Decimal> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
