//! Game service: identity-keyed operations over the engine and the store.
//!
//! Every call takes the owner identity explicitly; there is no ambient
//! "current game". Turn commits are compare-and-swap on the quarter that was
//! read, so two concurrent submissions for one game cannot both succeed.

use crate::engine::{resolve_turn_detailed, starting_state, TurnError, TurnReport};
use crate::rpc::{AdvanceTurnRequest, AdvanceTurnResult, Dashboard};
use persistence::{PersistenceError, StoredGame};
use sim_core::{
    validate_config, GameConfig, GameOutcome, GameState, SettlementRecord, ValidationError,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GameError {
    /// Bad input; fix it and resubmit.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The game has ended; reset instead of retrying.
    #[error("game is over ({0}); reset to play again")]
    TerminalState(GameOutcome),
    /// Store failure. The operation was atomic, so it can be retried after
    /// re-reading the game.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("no game found for {0}")]
    NotFound(String),
}

impl GameError {
    /// Only transient store failures are worth another attempt, and only
    /// after re-reading the game.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::Persistence(e) if e.is_transient())
    }
}

impl From<TurnError> for GameError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Validation(v) => GameError::Validation(v),
            TurnError::TerminalState(o) => GameError::TerminalState(o),
        }
    }
}

/// A quarter resolved against a game as it was read, not yet written.
#[derive(Clone, Debug)]
pub struct PreparedTurn {
    game: StoredGame,
    report: TurnReport,
}

impl PreparedTurn {
    pub fn report(&self) -> &TurnReport {
        &self.report
    }
}

pub struct GameService {
    pool: SqlitePool,
    config: GameConfig,
}

impl GameService {
    pub fn new(pool: SqlitePool, config: GameConfig) -> Result<Self, GameError> {
        validate_config(&config)?;
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn require_game(&self, owner: &str) -> Result<StoredGame, GameError> {
        persistence::load_game(&self.pool, owner)
            .await?
            .ok_or_else(|| GameError::NotFound(owner.to_string()))
    }

    /// Create the owner's game if it does not exist yet.
    pub async fn start_game(&self, owner: &str) -> Result<Dashboard, GameError> {
        let game =
            persistence::create_game(&self.pool, owner, &starting_state(&self.config)).await?;
        self.dashboard_for(game).await
    }

    /// Current state plus the most recent settlements.
    pub async fn dashboard(&self, owner: &str) -> Result<Dashboard, GameError> {
        let game = self.require_game(owner).await?;
        self.dashboard_for(game).await
    }

    async fn dashboard_for(&self, game: StoredGame) -> Result<Dashboard, GameError> {
        let history =
            persistence::recent_history(&self.pool, game.id, self.config.history_window).await?;
        Ok(Dashboard::new(game.id, game.state, &self.config, history))
    }

    /// All visible settlements, oldest first.
    pub async fn history(&self, owner: &str) -> Result<Vec<SettlementRecord>, GameError> {
        let game = self.require_game(owner).await?;
        Ok(persistence::all_history(&self.pool, game.id).await?)
    }

    /// Resolve one quarter for the owner's game and commit it.
    pub async fn advance_turn(
        &self,
        owner: &str,
        req: &AdvanceTurnRequest,
    ) -> Result<AdvanceTurnResult, GameError> {
        let prepared = self.prepare_turn(owner, req).await?;
        self.commit_turn(prepared).await
    }

    /// Read the owner's game and resolve a quarter against it without
    /// writing anything.
    pub async fn prepare_turn(
        &self,
        owner: &str,
        req: &AdvanceTurnRequest,
    ) -> Result<PreparedTurn, GameError> {
        let decisions = req.to_decisions()?;
        let game = self.require_game(owner).await?;

        let mut rules = self.config.clone();
        rules.desk_capacity = req.effective_capacity(&self.config);
        match resolve_turn_detailed(&game.state, &decisions, &rules) {
            Ok(report) => Ok(PreparedTurn { game, report }),
            Err(e) => {
                warn!(owner, game_id = %game.id, error = %e, "turn rejected");
                Err(e.into())
            }
        }
    }

    /// Commit a prepared turn. Fails with a retryable
    /// `PersistenceError::StaleState` if the game moved since it was read.
    pub async fn commit_turn(&self, prepared: PreparedTurn) -> Result<AdvanceTurnResult, GameError> {
        let PreparedTurn { game, report } = prepared;
        let cumulative_profit = persistence::commit_turn(
            &self.pool,
            game.id,
            game.state.current_quarter,
            &report.next,
            &report.settlement,
        )
        .await?;
        let outcome = sim_core::classify_outcome(&report.next, self.config.victory_quarter);
        info!(
            owner = %game.owner,
            game_id = %game.id,
            quarter = report.next.current_quarter,
            cash = %report.next.cash,
            %outcome,
            "turn advanced"
        );
        Ok(AdvanceTurnResult {
            is_win: outcome == GameOutcome::Victory,
            cumulative_profit,
            new_cash: report.next.cash,
            outcome,
            state: report.next,
            settlement: report.settlement,
        })
    }

    /// Restart the owner's game from the configured starting state, hiding
    /// earlier settlements. Creates the game if needed.
    pub async fn reset_game(&self, owner: &str) -> Result<GameState, GameError> {
        let game =
            persistence::reset_game(&self.pool, owner, &starting_state(&self.config)).await?;
        Ok(game.state)
    }
}
