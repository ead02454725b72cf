//! Request and response shapes exchanged with the presentation layer.

use data_pipeline::{staff_split, StaffSplit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    quarter_label, GameConfig, GameId, GameOutcome, GameState, SettlementRecord, TurnDecisions,
    ValidationError,
};

fn default_max_capacity() -> u32 {
    24
}

/// Advance-turn call as submitted by a client. Hire counts are signed so a
/// negative value is reported as a validation error instead of a decode error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvanceTurnRequest {
    pub unit_price: Decimal,
    pub new_engineers: i64,
    pub new_sales: i64,
    pub salary_pct: Decimal,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
}

impl AdvanceTurnRequest {
    pub fn to_decisions(&self) -> Result<TurnDecisions, ValidationError> {
        let hires = |n: i64| u32::try_from(n).map_err(|_| ValidationError::NegativeHires(n));
        let d = TurnDecisions {
            unit_price: self.unit_price,
            new_engineers: hires(self.new_engineers)?,
            new_sales: hires(self.new_sales)?,
            salary_pct: self.salary_pct,
        };
        sim_core::validate_decisions(&d)?;
        Ok(d)
    }

    /// Clients may shrink the office but never enlarge it past the configured size.
    pub fn effective_capacity(&self, config: &GameConfig) -> u32 {
        self.max_capacity.min(config.desk_capacity)
    }
}

/// Reply to an advance-turn call. Prefer these numbers over a concurrent
/// re-read, which may predate the commit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvanceTurnResult {
    pub is_win: bool,
    pub cumulative_profit: Decimal,
    pub new_cash: Decimal,
    pub outcome: GameOutcome,
    pub state: GameState,
    pub settlement: SettlementRecord,
}

/// Desk usage in the office.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub filled: u32,
    pub capacity: u32,
    pub available: u32,
}

impl Occupancy {
    pub fn of(state: &GameState, capacity: u32) -> Self {
        Occupancy {
            filled: state.headcount(),
            capacity,
            available: sim_core::available_desks(state, capacity),
        }
    }
}

/// Everything the dashboard shows for one player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub game_id: GameId,
    pub state: GameState,
    pub outcome: GameOutcome,
    pub quarter_label: String,
    pub occupancy: Occupancy,
    pub staff: StaffSplit,
    /// Most recent visible settlements, newest first.
    pub history: Vec<SettlementRecord>,
}

impl Dashboard {
    pub fn new(
        game_id: GameId,
        state: GameState,
        config: &GameConfig,
        history: Vec<SettlementRecord>,
    ) -> Self {
        Dashboard {
            game_id,
            outcome: sim_core::classify_outcome(&state, config.victory_quarter),
            quarter_label: quarter_label(state.current_quarter),
            occupancy: Occupancy::of(&state, config.desk_capacity),
            staff: staff_split(&state),
            state,
            history,
        }
    }
}
