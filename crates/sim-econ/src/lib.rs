#![deny(warnings)]

//! Economic models: demand, productivity and payroll helpers for Startup Tycoon.
//!
//! This module provides validated utilities for:
//! - Demand curve evaluation with optional seeded noise
//! - Salary-driven productivity and payroll
//! - Revenue bounded by production capacity

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Elasticity must be finite and strictly negative.
    #[error("invalid elasticity: {0}")]
    InvalidElasticity(f64),
    /// Prices must be > 0; salaries and percentages must be non-negative.
    #[error("invalid price or cost value")]
    InvalidPrice,
    /// Numeric conversion to floating point failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

/// Demand under constant elasticity with respect to a reference price.
///
/// Q = base * (price / ref_price)^{elasticity}. Requires:
/// - price > 0, ref_price > 0, elasticity < 0
/// - Returns non-negative integer quantity (floored), saturating at u64::MAX.
///
/// Example:
/// let q = demand(1000.0, Decimal::new(100,2), Decimal::new(100,2), -1.5).unwrap();
/// assert_eq!(q, 1000);
pub fn demand(
    base: f64,
    price: Decimal,
    ref_price: Decimal,
    elasticity: f64,
) -> Result<u64, EconError> {
    if !elasticity.is_finite() || elasticity >= 0.0 {
        return Err(EconError::InvalidElasticity(elasticity));
    }
    if price <= Decimal::ZERO || ref_price <= Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    if !base.is_finite() {
        return Err(EconError::NonFinite);
    }
    let p = price.to_f64().ok_or(EconError::NonFinite)?;
    let p0 = ref_price.to_f64().ok_or(EconError::NonFinite)?;
    let ratio = p / p0;
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(EconError::NonFinite);
    }
    Ok(floor_units(base * ratio.powf(elasticity)))
}

/// Demand with multiplicative uniform noise factor in [1-noise_frac, 1+noise_frac].
///
/// Noise is seeded for reproducibility. `noise_frac` must be in [0, 1).
pub fn demand_with_noise(
    base: f64,
    price: Decimal,
    ref_price: Decimal,
    elasticity: f64,
    noise_frac: f64,
    seed: u64,
) -> Result<u64, EconError> {
    if !noise_frac.is_finite() || !(0.0..1.0).contains(&noise_frac) {
        return Err(EconError::NonFinite);
    }
    let q = demand(base, price, ref_price, elasticity)?;
    if noise_frac == 0.0 {
        return Ok(q);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u: f64 = rng.gen_range(-noise_frac..=noise_frac);
    Ok(floor_units((q as f64) * (1.0 + u)))
}

/// Seed for a quarter's noise draw, so each quarter sees a different but
/// reproducible perturbation.
pub fn quarter_seed(base_seed: u64, quarter: u32) -> u64 {
    base_seed ^ u64::from(quarter).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Productivity multiplier from the salary level.
///
/// Paying below the baseline (100 %) loses `penalty` productivity per unit of
/// shortfall; paying above it gives no bonus. Result is clamped to [0, 1].
///
/// Example:
/// let f = productivity_factor(Decimal::new(80, 0), 0.5).unwrap();
/// assert!((f - 0.9).abs() < 1e-9);
pub fn productivity_factor(salary_pct: Decimal, penalty: f64) -> Result<f64, EconError> {
    if salary_pct <= Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    if !penalty.is_finite() {
        return Err(EconError::NonFinite);
    }
    let pct = salary_pct.to_f64().ok_or(EconError::NonFinite)?;
    let shortfall = (1.0 - pct / 100.0).max(0.0);
    Ok((1.0 - penalty * shortfall).clamp(0.0, 1.0))
}

/// Production capacity in units: `engineers * units_per_engineer * productivity`.
pub fn capacity_units(engineers: u32, units_per_engineer: u64, productivity: f64) -> u64 {
    floor_units(f64::from(engineers) * units_per_engineer as f64 * productivity)
}

/// Quarterly payroll: `headcount * baseline * salary_pct / 100`.
///
/// Example:
/// let p = payroll(4, Decimal::new(15_000, 0), Decimal::new(100, 0)).unwrap();
/// assert_eq!(p, Decimal::new(60_000, 0));
pub fn payroll(headcount: u32, baseline: Decimal, salary_pct: Decimal) -> Result<Decimal, EconError> {
    if baseline < Decimal::ZERO || salary_pct < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    let total = Decimal::from(headcount)
        .checked_mul(baseline)
        .and_then(|v| v.checked_mul(salary_pct))
        .ok_or(EconError::NonFinite)?;
    Ok((total / Decimal::ONE_HUNDRED).round_dp(2))
}

/// Units actually sold: demand capped by what engineering can produce.
pub fn units_sold(demand_units: u64, capacity_units: u64) -> u64 {
    demand_units.min(capacity_units)
}

/// Revenue for a number of units at a unit price, rounded to cents.
pub fn revenue(units: u64, price: Decimal) -> Result<Decimal, EconError> {
    if price < Decimal::ZERO {
        return Err(EconError::InvalidPrice);
    }
    Decimal::from(units)
        .checked_mul(price)
        .map(|v| v.round_dp(2))
        .ok_or(EconError::NonFinite)
}

fn floor_units(q: f64) -> u64 {
    if !q.is_finite() || q <= 0.0 {
        return 0;
    }
    let qi = q.floor();
    if qi > (u64::MAX as f64) {
        return u64::MAX;
    }
    qi as u64
}
