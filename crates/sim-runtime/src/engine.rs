//! Quarterly turn resolution.
//!
//! [`resolve_turn`] is a pure function of `(state, decisions, config)`: it
//! never touches the clock, the store, or unseeded randomness, and it either
//! returns a complete next state plus settlement or an error with no effect.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    classify_outcome, validate_amount, validate_capacity, validate_decisions, GameConfig,
    GameOutcome, GameState, SettlementRecord, TurnDecisions, ValidationError, Visibility,
};
use sim_econ::EconError;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TurnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The game is already bankrupt or won; it must be reset first.
    #[error("game is over ({0}); reset to play again")]
    TerminalState(GameOutcome),
}

fn econ(e: EconError) -> TurnError {
    let v = match e {
        EconError::InvalidElasticity(_) => {
            ValidationError::InvalidConfig("price_elasticity must be < 0")
        }
        EconError::InvalidPrice => ValidationError::NonPositivePrice,
        EconError::NonFinite => ValidationError::NonFinite,
    };
    TurnError::Validation(v)
}

/// Full breakdown of a resolved quarter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnReport {
    pub next: GameState,
    pub settlement: SettlementRecord,
    pub productivity: f64,
    pub demand_units: u64,
    pub capacity_units: u64,
    pub units_sold: u64,
    pub payroll: Decimal,
    pub overhead: Decimal,
}

/// The state a new or reset game starts from.
pub fn starting_state(config: &GameConfig) -> GameState {
    GameState {
        cash: config.starting_cash,
        current_quarter: 1,
        engineers: config.starting_engineers,
        sales_staff: config.starting_sales,
    }
}

/// Resolve one quarter, returning the next state and its settlement.
pub fn resolve_turn(
    state: &GameState,
    decisions: &TurnDecisions,
    config: &GameConfig,
) -> Result<(GameState, SettlementRecord), TurnError> {
    let report = resolve_turn_detailed(state, decisions, config)?;
    Ok((report.next, report.settlement))
}

/// Same as [`resolve_turn`] but keeps the intermediate figures.
pub fn resolve_turn_detailed(
    state: &GameState,
    decisions: &TurnDecisions,
    config: &GameConfig,
) -> Result<TurnReport, TurnError> {
    let outcome = classify_outcome(state, config.victory_quarter);
    if outcome.is_terminal() {
        warn!(quarter = state.current_quarter, %outcome, "turn rejected on finished game");
        return Err(TurnError::TerminalState(outcome));
    }
    validate_decisions(decisions)?;
    validate_capacity(state, decisions, config.desk_capacity)?;

    let eco = &config.economy;

    // New hires are productive in the quarter they join.
    let engineers = state
        .engineers
        .checked_add(decisions.new_engineers)
        .ok_or(ValidationError::NonFinite)?;
    let sales_staff = state
        .sales_staff
        .checked_add(decisions.new_sales)
        .ok_or(ValidationError::NonFinite)?;

    let productivity =
        sim_econ::productivity_factor(decisions.salary_pct, eco.underpay_penalty).map_err(econ)?;
    let base_demand = f64::from(sales_staff) * eco.demand_per_sales as f64 * productivity;
    let demand_units = sim_econ::demand_with_noise(
        base_demand,
        decisions.unit_price,
        eco.reference_price,
        eco.price_elasticity,
        eco.demand_noise_frac,
        sim_econ::quarter_seed(eco.rng_seed, state.current_quarter),
    )
    .map_err(econ)?;
    let capacity_units = sim_econ::capacity_units(engineers, eco.units_per_engineer, productivity);
    let units_sold = sim_econ::units_sold(demand_units, capacity_units);

    let revenue = sim_econ::revenue(units_sold, decisions.unit_price).map_err(econ)?;
    let payroll = sim_econ::payroll(
        engineers.saturating_add(sales_staff),
        eco.baseline_salary,
        decisions.salary_pct,
    )
    .map_err(econ)?;
    let overhead = eco.fixed_overhead;
    let net_income = revenue
        .checked_sub(payroll)
        .and_then(|v| v.checked_sub(overhead))
        .ok_or(ValidationError::NonFinite)?;
    let cash = state
        .cash
        .checked_add(net_income)
        .ok_or(ValidationError::NonFinite)?;
    // Every amount must survive being stored as cents.
    for amount in [revenue, payroll, net_income, cash] {
        validate_amount(amount)?;
    }
    let quarter = state
        .current_quarter
        .checked_add(1)
        .ok_or(ValidationError::NonFinite)?;

    let next = GameState {
        cash,
        current_quarter: quarter,
        engineers,
        sales_staff,
    };
    let settlement = SettlementRecord {
        quarter,
        revenue,
        net_income,
        cash,
        visibility: Visibility::Visible,
    };
    debug!(
        quarter,
        demand_units,
        capacity_units,
        units_sold,
        %revenue,
        %payroll,
        %net_income,
        %cash,
        "quarter resolved"
    );
    Ok(TurnReport {
        next,
        settlement,
        productivity,
        demand_units,
        capacity_units,
        units_sold,
        payroll,
        overhead,
    })
}

/// Play up to `max_quarters` with the same decisions from the starting
/// state, stopping early once the game ends. Hires apply to the first
/// quarter only.
pub fn run_quarters(
    config: &GameConfig,
    decisions: &TurnDecisions,
    max_quarters: u32,
) -> Result<(GameState, Vec<SettlementRecord>), TurnError> {
    let mut state = starting_state(config);
    let mut history = Vec::new();
    let mut d = decisions.clone();
    for _ in 0..max_quarters {
        if classify_outcome(&state, config.victory_quarter).is_terminal() {
            break;
        }
        let (next, rec) = resolve_turn(&state, &d, config)?;
        state = next;
        history.push(rec);
        d.new_engineers = 0;
        d.new_sales = 0;
    }
    Ok((state, history))
}
