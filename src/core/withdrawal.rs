//! Tax-tiered shortfall solver: brokerage, then tax-deferred, then Roth.

use super::tax::{marginal_capital_gains_rate, marginal_ordinary_rate};
use super::types::FilingStatus;

/// Balances the allocator may draw from, already net of this year's planned
/// outflows.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailableBalances {
    pub brokerage: f64,
    pub trad_ira: f64,
    pub trad_401k: f64,
    pub roth_ira: f64,
    pub roth_401k: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest {
    /// After-tax cash still needed this year.
    pub gap: f64,
    pub available: AvailableBalances,
    /// Taxable income already stacked this year (ordinary after deduction plus
    /// taxable gains).
    pub position: f64,
    pub filing_status: FilingStatus,
    pub state_rate: f64,
    pub gains_taxable_portion: f64,
    /// Replaces the bracket lookup for tier 2 when taxes run in flat mode.
    pub flat_ordinary_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Allocation {
    pub brokerage: f64,
    pub trad_ira: f64,
    pub trad_401k: f64,
    pub roth_ira: f64,
    pub roth_401k: f64,
    /// After-tax cash the draws are expected to yield.
    pub net_yield: f64,
    /// Part of the gap no tier could cover.
    pub unfunded: f64,
}

impl Allocation {
    pub fn tax_deferred(&self) -> f64 {
        self.trad_ira + self.trad_401k
    }

    pub fn roth(&self) -> f64 {
        self.roth_ira + self.roth_401k
    }

    pub fn gross_total(&self) -> f64 {
        self.brokerage + self.tax_deferred() + self.roth()
    }
}

/// Gross draw from one taxed tier and the after-tax amount it yields.
fn gross_up(gap: f64, rate: f64, balance: f64) -> (f64, f64) {
    if gap <= 0.0 || balance <= 0.0 {
        return (0.0, 0.0);
    }
    let keep = 1.0 - rate;
    let gross = if keep > 0.0 { (gap / keep).min(balance) } else { balance };
    (gross, gross * keep.max(0.0))
}

/// Takes from `first` before `second`; returns the two draws.
fn split_draw(amount: f64, first: f64, second: f64) -> (f64, f64) {
    let from_first = amount.min(first.max(0.0));
    let from_second = (amount - from_first).min(second.max(0.0)).max(0.0);
    (from_first, from_second)
}

pub fn allocate(request: &AllocationRequest) -> Allocation {
    let mut allocation = Allocation::default();
    let mut gap = request.gap.max(0.0);
    if gap <= 0.0 {
        return allocation;
    }
    let available = request.available;

    let gains_marginal = marginal_capital_gains_rate(request.position, request.filing_status);
    let gains_rate = request.gains_taxable_portion * (request.state_rate + gains_marginal);
    let (brokerage, brokerage_net) = gross_up(gap, gains_rate, available.brokerage);
    allocation.brokerage = brokerage;
    allocation.net_yield += brokerage_net;
    gap = (gap - brokerage_net).max(0.0);

    let position = request.position + brokerage * request.gains_taxable_portion;
    let ordinary_rate = request.state_rate
        + request
            .flat_ordinary_rate
            .unwrap_or_else(|| marginal_ordinary_rate(position, request.filing_status));
    let deferred_balance = available.trad_ira.max(0.0) + available.trad_401k.max(0.0);
    let (deferred, deferred_net) = gross_up(gap, ordinary_rate, deferred_balance);
    (allocation.trad_ira, allocation.trad_401k) =
        split_draw(deferred, available.trad_ira, available.trad_401k);
    allocation.net_yield += deferred_net;
    gap = (gap - deferred_net).max(0.0);

    let roth_balance = available.roth_ira.max(0.0) + available.roth_401k.max(0.0);
    let roth = gap.min(roth_balance);
    (allocation.roth_ira, allocation.roth_401k) =
        split_draw(roth, available.roth_ira, available.roth_401k);
    allocation.net_yield += roth;
    allocation.unfunded = (gap - roth).max(0.0);

    allocation
}
