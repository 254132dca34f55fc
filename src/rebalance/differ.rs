//! Allocation diffing between target fractions and live account state.
//!
//! The canonical diff is the DOLLAR diff: `target fraction × basis −
//! current market value`, which is directly the amount to buy (positive)
//! or sell (negative). The fraction-of-equity drift only gates whether a
//! run adjusts at all; it never sizes orders.

use crate::broker::AccountSnapshot;
use crate::config::TargetAllocation;
use crate::utils::decimal::safe_div;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Dollar-space diff for one target symbol.
#[derive(Debug, Clone)]
pub struct SymbolDiff {
    pub symbol: String,
    /// Target fraction × basis
    pub raw_allocation: Decimal,
    /// Market value currently held (0 when the position is absent)
    pub current_value: Decimal,
    /// Amount to buy (positive) or sell (negative)
    pub diff: Decimal,
}

/// Computes per-symbol dollar diffs for a target allocation.
pub struct AllocationDiffer<'a> {
    targets: &'a TargetAllocation,
}

impl<'a> AllocationDiffer<'a> {
    pub fn new(targets: &'a TargetAllocation) -> Self {
        Self { targets }
    }

    /// Dollar basis the target fractions apply to.
    ///
    /// Negative cash means margin is drawn; shrinking the basis by the
    /// drawn amount avoids allocating borrowed money.
    pub fn basis(account: &AccountSnapshot) -> Decimal {
        if account.cash < Decimal::ZERO {
            account.portfolio_value + account.cash
        } else {
            account.portfolio_value
        }
    }

    /// Dollar diff for every target symbol, in target order.
    ///
    /// `current_values` maps symbol → held market value; a missing entry
    /// is an expected never-held symbol and diffs to a full buy.
    pub fn diff_against(
        &self,
        account: &AccountSnapshot,
        current_values: &HashMap<String, Decimal>,
    ) -> Vec<SymbolDiff> {
        let basis = Self::basis(account);
        self.targets
            .iter()
            .map(|target| {
                let current_value = current_values
                    .get(&target.symbol)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let raw_allocation = target.weight * basis;
                SymbolDiff {
                    symbol: target.symbol.clone(),
                    raw_allocation,
                    current_value,
                    diff: raw_allocation - current_value,
                }
            })
            .collect()
    }

    /// Fraction-drift gate: true when some target's share of equity is at
    /// least `trigger` away from its weight. A trigger of 0 always passes.
    pub fn drift_exceeds(
        &self,
        account: &AccountSnapshot,
        current_values: &HashMap<String, Decimal>,
        trigger: Decimal,
    ) -> bool {
        self.targets.iter().any(|target| {
            let held = current_values
                .get(&target.symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let current_fraction = safe_div(held, account.equity);
            (target.weight - current_fraction).abs() >= trigger
        })
    }
}
