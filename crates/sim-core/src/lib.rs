#![deny(warnings)]

//! Core domain models and invariants for Startup Tycoon.
//!
//! This crate defines the serializable game state, per-quarter decisions and
//! settlement records, together with validation helpers and the outcome
//! classifier used on every read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Store-assigned identifier of a game row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game#{}", self.0)
    }
}

/// Mutable state of one player's company. Only the turn engine produces new
/// values of this type; readers get copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Cash balance in USD. May go negative; bankruptcy is detected, not prevented.
    pub cash: Decimal,
    /// Quarter about to be played (>= 1).
    pub current_quarter: u32,
    /// Engineers on payroll.
    pub engineers: u32,
    /// Sales staff on payroll.
    pub sales_staff: u32,
}

impl GameState {
    /// Combined headcount occupying desks.
    pub fn headcount(&self) -> u32 {
        self.engineers.saturating_add(self.sales_staff)
    }
}

/// Decisions submitted for a single quarter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDecisions {
    /// Unit price in USD (> 0).
    pub unit_price: Decimal,
    /// Engineers hired this quarter.
    pub new_engineers: u32,
    /// Sales staff hired this quarter.
    pub new_sales: u32,
    /// Salary as a percentage of the industry baseline (> 0).
    pub salary_pct: Decimal,
}

impl TurnDecisions {
    pub fn new_hires(&self) -> u32 {
        self.new_engineers.saturating_add(self.new_sales)
    }
}

/// Visibility of a settlement in history reads. Records are never removed;
/// a reset hides them instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Deleted,
}

/// Immutable financial outcome of one resolved quarter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Quarter number after the turn advanced.
    pub quarter: u32,
    pub revenue: Decimal,
    pub net_income: Decimal,
    /// Cash snapshot at the end of the turn.
    pub cash: Decimal,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Derived classification of a game. Never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    Ongoing,
    Bankrupt,
    Victory,
}

impl GameOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameOutcome::Ongoing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameOutcome::Ongoing => "ongoing",
            GameOutcome::Bankrupt => "bankrupt",
            GameOutcome::Victory => "victory",
        }
    }
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coefficients of the quarterly revenue/cost model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Price at which each salesperson generates `demand_per_sales` units.
    pub reference_price: Decimal,
    /// Constant price elasticity of demand (< 0).
    pub price_elasticity: f64,
    /// Units demanded per salesperson per quarter at the reference price.
    pub demand_per_sales: u64,
    /// Units one engineer can produce per quarter.
    pub units_per_engineer: u64,
    /// Industry-average salary per head per quarter (USD).
    pub baseline_salary: Decimal,
    /// Fixed costs per quarter (USD).
    pub fixed_overhead: Decimal,
    /// Productivity lost per unit of underpayment, in [0, 1].
    pub underpay_penalty: f64,
    /// Multiplicative demand noise amplitude, in [0, 1). Zero disables noise.
    pub demand_noise_frac: f64,
    /// Seed mixed with the quarter number when noise is enabled.
    pub rng_seed: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            reference_price: Decimal::new(100, 0),
            price_elasticity: -1.5,
            demand_per_sales: 500,
            units_per_engineer: 400,
            baseline_salary: Decimal::new(15_000, 0),
            fixed_overhead: Decimal::new(5_000, 0),
            underpay_penalty: 0.5,
            demand_noise_frac: 0.0,
            rng_seed: 42,
        }
    }
}

/// Game rules and starting conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Maximum combined headcount (desks in the office).
    pub desk_capacity: u32,
    /// A game with positive cash past this quarter is won.
    pub victory_quarter: u32,
    pub starting_cash: Decimal,
    pub starting_engineers: u32,
    pub starting_sales: u32,
    /// Number of settlements shown on the dashboard.
    pub history_window: u32,
    pub economy: EconomyConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            desk_capacity: 24,
            victory_quarter: 40,
            starting_cash: Decimal::new(100_000, 0),
            starting_engineers: 2,
            starting_sales: 2,
            history_window: 4,
            economy: EconomyConfig::default(),
        }
    }
}

/// Validation errors for domain invariants and turn inputs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unit price must be strictly positive.
    #[error("unit price must be > 0")]
    NonPositivePrice,
    /// Salary percentage must be strictly positive.
    #[error("salary percentage must be > 0")]
    NonPositiveSalary,
    /// Hire counts cannot be negative.
    #[error("hires must be >= 0 (got {0})")]
    NegativeHires(i64),
    /// Not enough free desks for the requested hires.
    #[error("You only have {available} desks available!")]
    CapacityExceeded { available: u32, requested: u32 },
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Monetary result too large to keep as whole cents.
    #[error("amount {0} is out of range")]
    AmountOutOfRange(Decimal),
    /// Configuration value out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Classify a game state. `cash <= 0` dominates the victory check.
pub fn classify_outcome(state: &GameState, victory_quarter: u32) -> GameOutcome {
    if state.cash <= Decimal::ZERO {
        GameOutcome::Bankrupt
    } else if state.current_quarter > victory_quarter {
        GameOutcome::Victory
    } else {
        GameOutcome::Ongoing
    }
}

/// Whether an amount can be held as signed 64-bit cents.
pub fn fits_in_cents(v: Decimal) -> bool {
    v.checked_mul(Decimal::ONE_HUNDRED)
        .map_or(false, |c| c.round().abs() <= Decimal::from(i64::MAX))
}

/// Reject amounts that cannot be held as signed 64-bit cents.
pub fn validate_amount(v: Decimal) -> Result<Decimal, ValidationError> {
    if fits_in_cents(v) {
        Ok(v)
    } else {
        Err(ValidationError::AmountOutOfRange(v))
    }
}

/// Free desks left for a state under the given capacity.
pub fn available_desks(state: &GameState, desk_capacity: u32) -> u32 {
    desk_capacity.saturating_sub(state.headcount())
}

/// Validate the shape of a quarter's decisions.
pub fn validate_decisions(d: &TurnDecisions) -> Result<(), ValidationError> {
    if d.unit_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice);
    }
    if d.salary_pct <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveSalary);
    }
    Ok(())
}

/// Check that the hires fit in the office.
pub fn validate_capacity(
    state: &GameState,
    d: &TurnDecisions,
    desk_capacity: u32,
) -> Result<(), ValidationError> {
    let total = u64::from(state.headcount()) + u64::from(d.new_hires());
    if total > u64::from(desk_capacity) {
        return Err(ValidationError::CapacityExceeded {
            available: available_desks(state, desk_capacity),
            requested: d.new_hires(),
        });
    }
    Ok(())
}

/// Validate the economy coefficients.
pub fn validate_economy(e: &EconomyConfig) -> Result<(), ValidationError> {
    if !(e.price_elasticity.is_finite()
        && e.underpay_penalty.is_finite()
        && e.demand_noise_frac.is_finite())
    {
        return Err(ValidationError::NonFinite);
    }
    if e.price_elasticity >= 0.0 {
        return Err(ValidationError::InvalidConfig("price_elasticity must be < 0"));
    }
    if e.reference_price <= Decimal::ZERO {
        return Err(ValidationError::InvalidConfig("reference_price must be > 0"));
    }
    if e.baseline_salary <= Decimal::ZERO {
        return Err(ValidationError::InvalidConfig("baseline_salary must be > 0"));
    }
    if e.fixed_overhead < Decimal::ZERO {
        return Err(ValidationError::InvalidConfig("fixed_overhead must be >= 0"));
    }
    if !(0.0..=1.0).contains(&e.underpay_penalty) {
        return Err(ValidationError::InvalidConfig("underpay_penalty must be within [0,1]"));
    }
    if !(0.0..1.0).contains(&e.demand_noise_frac) {
        return Err(ValidationError::InvalidConfig("demand_noise_frac must be within [0,1)"));
    }
    Ok(())
}

/// Validate game rules, including the starting state against them.
pub fn validate_config(c: &GameConfig) -> Result<(), ValidationError> {
    validate_economy(&c.economy)?;
    if c.desk_capacity == 0 {
        return Err(ValidationError::InvalidConfig("desk_capacity must be > 0"));
    }
    if c.victory_quarter == 0 {
        return Err(ValidationError::InvalidConfig("victory_quarter must be > 0"));
    }
    if c.starting_cash <= Decimal::ZERO {
        return Err(ValidationError::InvalidConfig("starting_cash must be > 0"));
    }
    let start = u64::from(c.starting_engineers) + u64::from(c.starting_sales);
    if start > u64::from(c.desk_capacity) {
        return Err(ValidationError::InvalidConfig(
            "starting headcount exceeds desk_capacity",
        ));
    }
    Ok(())
}

/// Human-readable quarter, e.g. quarter 5 is "Year 2 Q1".
pub fn quarter_label(quarter: u32) -> String {
    let q = quarter.max(1);
    let year = (q - 1) / 4 + 1;
    let in_year = (q - 1) % 4 + 1;
    format!("Year {year} Q{in_year}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(cash: i64, quarter: u32) -> GameState {
        GameState {
            cash: Decimal::new(cash, 0),
            current_quarter: quarter,
            engineers: 2,
            sales_staff: 2,
        }
    }

    fn decisions(eng: u32, sales: u32) -> TurnDecisions {
        TurnDecisions {
            unit_price: Decimal::new(100, 0),
            new_engineers: eng,
            new_sales: sales,
            salary_pct: Decimal::new(100, 0),
        }
    }

    #[test]
    fn outcome_thresholds() {
        assert_eq!(classify_outcome(&state(500, 1), 40), GameOutcome::Ongoing);
        assert_eq!(classify_outcome(&state(0, 10), 40), GameOutcome::Bankrupt);
        assert_eq!(classify_outcome(&state(-50, 10), 40), GameOutcome::Bankrupt);
        assert_eq!(classify_outcome(&state(1000, 40), 40), GameOutcome::Ongoing);
        assert_eq!(classify_outcome(&state(1000, 41), 40), GameOutcome::Victory);
        // Bankruptcy wins over the quarter threshold.
        assert_eq!(classify_outcome(&state(0, 41), 40), GameOutcome::Bankrupt);
    }

    #[test]
    fn capacity_reports_available_desks() {
        let s = state(500, 1);
        assert!(validate_capacity(&s, &decisions(10, 10), 24).is_ok());
        let err = validate_capacity(&s, &decisions(21, 0), 24).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CapacityExceeded {
                available: 20,
                requested: 21
            }
        );
        assert_eq!(err.to_string(), "You only have 20 desks available!");
    }

    #[test]
    fn decisions_reject_non_positive_values() {
        let mut d = decisions(0, 0);
        d.unit_price = Decimal::ZERO;
        assert_eq!(validate_decisions(&d), Err(ValidationError::NonPositivePrice));
        let mut d = decisions(0, 0);
        d.salary_pct = Decimal::new(-5, 0);
        assert_eq!(validate_decisions(&d), Err(ValidationError::NonPositiveSalary));
    }

    #[test]
    fn default_config_is_valid() {
        validate_config(&GameConfig::default()).unwrap();
    }

    #[test]
    fn config_rejects_bad_values() {
        let mut c = GameConfig::default();
        c.starting_engineers = 30;
        assert!(validate_config(&c).is_err());
        let mut c = GameConfig::default();
        c.economy.price_elasticity = 0.5;
        assert!(validate_config(&c).is_err());
        let mut c = GameConfig::default();
        c.economy.underpay_penalty = f64::NAN;
        assert_eq!(validate_config(&c), Err(ValidationError::NonFinite));
    }

    #[test]
    fn cents_bound() {
        assert!(fits_in_cents(Decimal::new(-599_999, 0)));
        assert!(fits_in_cents(Decimal::from(i64::MAX / 100)));
        assert!(!fits_in_cents(Decimal::from(i64::MAX)));
        assert!(!fits_in_cents(Decimal::MAX));
        let huge = Decimal::from(i64::MIN);
        assert_eq!(validate_amount(huge), Err(ValidationError::AmountOutOfRange(huge)));
    }

    #[test]
    fn quarter_labels() {
        assert_eq!(quarter_label(1), "Year 1 Q1");
        assert_eq!(quarter_label(4), "Year 1 Q4");
        assert_eq!(quarter_label(5), "Year 2 Q1");
        assert_eq!(quarter_label(41), "Year 11 Q1");
        assert_eq!(quarter_label(0), "Year 1 Q1");
    }

    #[test]
    fn settlement_serde_defaults_to_visible() {
        let json = r#"{"quarter":2,"revenue":"80000","net_income":"15000","cash":"15500"}"#;
        let rec: SettlementRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.visibility, Visibility::Visible);
        assert_eq!(rec.cash, Decimal::new(15_500, 0));
    }

    proptest! {
        #[test]
        fn classifier_never_wins_without_cash(cash in -1_000_000i64..1_000_000, q in 1u32..200) {
            let s = state(cash, q);
            let o = classify_outcome(&s, 40);
            match o {
                GameOutcome::Bankrupt => prop_assert!(cash <= 0),
                GameOutcome::Victory => prop_assert!(cash > 0 && q > 40),
                GameOutcome::Ongoing => prop_assert!(cash > 0 && q <= 40),
            }
        }

        #[test]
        fn capacity_check_matches_headcount(e in 0u32..30, s in 0u32..30) {
            let st = state(100, 1);
            let ok = validate_capacity(&st, &decisions(e, s), 24).is_ok();
            prop_assert_eq!(ok, 4 + e + s <= 24);
        }
    }
}
