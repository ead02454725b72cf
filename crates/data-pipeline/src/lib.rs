#![deny(warnings)]

//! Analytics over settlement history: chart series, staff split and export.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{quarter_label, GameState, SettlementRecord, Visibility};
use std::io::Write;
use tracing::debug;

/// One chart point per settled quarter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub quarter: u32,
    pub label: String,
    pub cash: Decimal,
    pub net_income: Decimal,
    pub revenue: Decimal,
}

/// Chronological series from history in any order. Hidden records are skipped.
pub fn chart_series(history: &[SettlementRecord]) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = history
        .iter()
        .filter(|r| r.visibility == Visibility::Visible)
        .map(|r| SeriesPoint {
            quarter: r.quarter,
            label: quarter_label(r.quarter),
            cash: r.cash,
            net_income: r.net_income,
            revenue: r.revenue,
        })
        .collect();
    points.sort_by_key(|p| p.quarter);
    points
}

/// Engineers versus sales staff, as counts and shares.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaffSplit {
    pub engineers: u32,
    pub sales_staff: u32,
    pub engineer_share: f64,
}

pub fn staff_split(state: &GameState) -> StaffSplit {
    let total = state.headcount();
    let engineer_share = if total == 0 {
        0.0
    } else {
        f64::from(state.engineers) / f64::from(total)
    };
    StaffSplit {
        engineers: state.engineers,
        sales_staff: state.sales_staff,
        engineer_share,
    }
}

/// Sum of net income over visible records.
pub fn cumulative_profit(history: &[SettlementRecord]) -> Decimal {
    history
        .iter()
        .filter(|r| r.visibility == Visibility::Visible)
        .map(|r| r.net_income)
        .sum()
}

/// Best and worst quarter by net income.
pub fn extremes(history: &[SettlementRecord]) -> Option<(SeriesPoint, SeriesPoint)> {
    let series = chart_series(history);
    let best = series.iter().max_by_key(|p| p.net_income)?.clone();
    let worst = series.iter().min_by_key(|p| p.net_income)?.clone();
    Some((best, worst))
}

/// Write the chronological series as JSON lines.
pub fn export_jsonl<W: Write>(history: &[SettlementRecord], mut out: W) -> Result<usize> {
    let series = chart_series(history);
    for p in &series {
        serde_json::to_writer(&mut out, p).context("serializing series point")?;
        out.write_all(b"\n").context("writing export")?;
    }
    out.flush().context("flushing export")?;
    debug!(rows = series.len(), "exported history");
    Ok(series.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(quarter: u32, net: i64, cash: i64) -> SettlementRecord {
        SettlementRecord {
            quarter,
            revenue: Decimal::new(80_000, 0),
            net_income: Decimal::new(net, 0),
            cash: Decimal::new(cash, 0),
            visibility: Visibility::Visible,
        }
    }

    #[test]
    fn series_is_chronological_and_skips_hidden() {
        let mut hidden = rec(3, 1, 1);
        hidden.visibility = Visibility::Deleted;
        let newest_first = vec![rec(5, 10, 130), rec(4, -5, 120), hidden, rec(2, 20, 125)];
        let s = chart_series(&newest_first);
        let qs: Vec<u32> = s.iter().map(|p| p.quarter).collect();
        assert_eq!(qs, vec![2, 4, 5]);
        assert_eq!(s[0].label, "Year 1 Q2");
        assert_eq!(cumulative_profit(&newest_first), Decimal::new(25, 0));
    }

    #[test]
    fn split_handles_empty_office() {
        let empty = GameState {
            cash: Decimal::ONE,
            current_quarter: 1,
            engineers: 0,
            sales_staff: 0,
        };
        assert_eq!(staff_split(&empty).engineer_share, 0.0);
        let s = staff_split(&GameState {
            engineers: 3,
            sales_staff: 1,
            ..empty
        });
        assert_eq!(s.engineer_share, 0.75);
    }

    #[test]
    fn extremes_pick_best_and_worst() {
        let h = vec![rec(2, 10, 0), rec(3, -40, 0), rec(4, 25, 0)];
        let (best, worst) = extremes(&h).unwrap();
        assert_eq!(best.quarter, 4);
        assert_eq!(worst.quarter, 3);
        assert!(extremes(&[]).is_none());
    }

    #[test]
    fn export_writes_one_line_per_quarter() {
        let mut buf = Vec::new();
        let n = export_jsonl(&[rec(3, 5, 10), rec(2, 5, 5)], &mut buf).unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["quarter"], 2);
        assert_eq!(first["label"], "Year 1 Q2");
    }

    proptest! {
        #[test]
        fn series_keeps_every_visible_record(qs in proptest::collection::vec(1u32..100, 0..20)) {
            let h: Vec<SettlementRecord> = qs.iter().map(|&q| rec(q, 1, 1)).collect();
            let s = chart_series(&h);
            prop_assert_eq!(s.len(), h.len());
            prop_assert!(s.windows(2).all(|w| w[0].quarter <= w[1].quarter));
        }
    }
}
