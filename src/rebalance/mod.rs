//! Rebalancing pipeline.
//!
//! One run is a linear pass: cancel stale orders, close positions not in
//! the target set, diff target fractions against live state, size orders
//! under brokerage constraints, submit, audit, and wait for settlement.

mod closer;
mod differ;
mod engine;
mod sizer;
mod submitter;

pub use closer::{ClosedPosition, UnlistedPositionCloser};
pub use differ::{AllocationDiffer, SymbolDiff};
pub use engine::{Adjustment, Rebalancer, RunReport};
pub use sizer::{OrderIntent, OrderSizer, OrderSizing};
pub use submitter::{OrderSubmitter, SubmissionOutcome};
