use serde::Serialize;
use tracing::debug;

use super::ledger::{annual_deferral, effective_deferral_percent, employer_match};
use super::moves::MoveId;
use super::types::{AccountKind, Balances, Plan};

const CATCH_UP_AGE: u32 = 50;
const DEFERRAL_CATCH_UP: f64 = 7_500.0;
const IRA_CATCH_UP: f64 = 1_000.0;

const ACHIEVABLE_RATE: f64 = 0.15;
const MODERATE_RATE: f64 = 0.25;
const AGGRESSIVE_RATE: f64 = 0.40;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    OnTrack,
    Achievable,
    Moderate,
    Aggressive,
    VeryAggressive,
}

/// Where the required annual savings should go, in priority order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsAllocation {
    pub tax_deferred: f64,
    pub roth: f64,
    pub taxable: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolverResult {
    pub years_to_retirement: u32,
    pub target_net_worth: f64,
    pub projected_balances: Balances,
    pub projected_existing: f64,
    pub projected_employer_match: f64,
    pub projected_net_worth: f64,
    pub gap: f64,
    pub average_growth_rate: f64,
    pub required_annual_savings: f64,
    pub required_monthly_savings: f64,
    /// Required savings over current salary; absent when there is no salary.
    pub savings_rate: Option<f64>,
    pub feasibility: Feasibility,
    pub allocation: SavingsAllocation,
    pub message: String,
}

/// Compound growth of a lump sum over `years`.
pub fn future_value(present: f64, rate: f64, years: u32) -> f64 {
    present * (1.0 + rate).powi(years as i32)
}

/// Future value of `payment` deposited at the end of each year.
pub fn annuity_future_value(payment: f64, rate: f64, years: u32) -> f64 {
    if years == 0 {
        return 0.0;
    }
    if rate.abs() < 1e-12 {
        return payment * years as f64;
    }
    payment * ((1.0 + rate).powi(years as i32) - 1.0) / rate
}

/// Level annual deposit that grows to `target` over `years`.
pub fn annuity_payment(target: f64, rate: f64, years: u32) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    if years == 0 {
        return target;
    }
    if rate.abs() < 1e-12 {
        return target / years as f64;
    }
    target * rate / ((1.0 + rate).powi(years as i32) - 1.0)
}

pub fn classify(savings_rate: Option<f64>, gap: f64) -> Feasibility {
    if gap <= 0.0 {
        return Feasibility::OnTrack;
    }
    match savings_rate {
        Some(rate) if rate <= ACHIEVABLE_RATE => Feasibility::Achievable,
        Some(rate) if rate <= MODERATE_RATE => Feasibility::Moderate,
        Some(rate) if rate <= AGGRESSIVE_RATE => Feasibility::Aggressive,
        _ => Feasibility::VeryAggressive,
    }
}

/// Fills the tax-deferred bucket to the deferral limit, then Roth to the IRA
/// limit, and leaves the remainder in a taxable account.
pub fn allocate_savings(required: f64, plan: &Plan) -> SavingsAllocation {
    let catching_up = plan.personal.current_age >= CATCH_UP_AGE;
    let deferred_limit = plan.income.irs_deferral_limit.max(0.0)
        + if catching_up { DEFERRAL_CATCH_UP } else { 0.0 };
    let roth_limit =
        plan.income.ira_contribution_limit.max(0.0) + if catching_up { IRA_CATCH_UP } else { 0.0 };

    let mut remaining = required.max(0.0);
    let tax_deferred = remaining.min(deferred_limit);
    remaining -= tax_deferred;
    let roth = remaining.min(roth_limit);
    remaining -= roth;

    SavingsAllocation {
        tax_deferred,
        roth,
        taxable: remaining,
    }
}

pub fn solve_goal(plan: &Plan) -> GoalSolverResult {
    let years = plan
        .personal
        .retirement_age
        .saturating_sub(plan.personal.current_age);
    let growth = &plan.growth;

    let projected_balances = Balances {
        trad_401k: future_value(plan.balances.trad_401k, growth.trad_401k, years),
        roth_401k: future_value(plan.balances.roth_401k, growth.roth_401k, years),
        trad_ira: future_value(plan.balances.trad_ira, growth.trad_ira, years),
        roth_ira: future_value(plan.balances.roth_ira, growth.roth_ira, years),
        brokerage: future_value(plan.balances.brokerage, growth.brokerage, years),
        education_529: future_value(plan.balances.education_529, growth.education_529, years),
        foreign_pension: future_value(
            plan.balances.foreign_pension,
            growth.foreign_pension,
            years,
        ),
    };
    let projected_existing = projected_balances.total();

    let salary = plan.income.salary.max(0.0);
    let matches = plan
        .moves
        .iter()
        .any(|m| m.id == MoveId::EmployerMatch && m.enabled);
    let annual_match = if matches {
        let deferral = annual_deferral(&plan.income, salary);
        employer_match(
            salary,
            effective_deferral_percent(deferral, salary),
            &plan.income.match_tiers,
        )
    } else {
        0.0
    };
    let projected_employer_match =
        annuity_future_value(annual_match, growth.get(AccountKind::Trad401k), years);

    let projected_net_worth = projected_existing + projected_employer_match;
    let target_net_worth = plan.goal.target_net_worth;
    let gap = (target_net_worth - projected_net_worth).max(0.0);

    let average_growth_rate = growth.average();
    let required_annual_savings = annuity_payment(gap, average_growth_rate, years);
    let savings_rate = (salary > 0.0).then(|| required_annual_savings / salary);
    let feasibility = classify(savings_rate, gap);
    let allocation = allocate_savings(required_annual_savings, plan);

    let message = match feasibility {
        Feasibility::OnTrack => "Current balances reach the target without new savings.",
        Feasibility::Achievable => "Target is reachable with a modest savings rate.",
        Feasibility::Moderate => "Target needs a moderate savings rate.",
        Feasibility::Aggressive => "Target needs an aggressive savings rate.",
        Feasibility::VeryAggressive => "Target needs savings beyond 40% of salary.",
    }
    .to_string();

    debug!(
        years,
        gap,
        required_annual_savings,
        feasibility = ?feasibility,
        "goal solved"
    );

    GoalSolverResult {
        years_to_retirement: years,
        target_net_worth,
        projected_balances,
        projected_existing,
        projected_employer_match,
        projected_net_worth,
        gap,
        average_growth_rate,
        required_annual_savings,
        required_monthly_savings: required_annual_savings / 12.0,
        savings_rate,
        feasibility,
        allocation,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GrowthRates;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn flat_plan(rate: f64) -> Plan {
        let mut plan = Plan::default();
        plan.growth = GrowthRates::uniform(rate);
        plan.personal.current_age = 40;
        plan.personal.retirement_age = 60;
        plan
    }

    #[test]
    fn annuity_closed_forms_are_consistent() {
        let payment = annuity_payment(1_000_000.0, 0.06, 20);
        assert_close(annuity_future_value(payment, 0.06, 20), 1_000_000.0, 1e-6);
        assert_close(annuity_payment(100_000.0, 0.0, 10), 10_000.0, 1e-9);
        assert_close(annuity_payment(100_000.0, 0.05, 0), 100_000.0, 1e-9);
        assert_eq!(annuity_payment(0.0, 0.05, 10), 0.0);
    }

    #[test]
    fn existing_balances_compound_at_their_own_rates() {
        let plan = Plan::default();
        let result = solve_goal(&plan);
        assert_eq!(result.years_to_retirement, 15);
        assert_close(
            result.projected_balances.brokerage,
            150_000.0 * 1.06_f64.powi(15),
            1e-6,
        );
        assert_close(
            result.projected_balances.foreign_pension,
            25_000.0 * 1.04_f64.powi(15),
            1e-6,
        );
    }

    #[test]
    fn employer_match_projects_as_annuity_at_401k_rate() {
        let plan = flat_plan(0.0);
        let result = solve_goal(&plan);
        assert_close(result.projected_employer_match, 7_200.0 * 20.0, 1e-6);

        let mut no_match = flat_plan(0.0);
        if let Some(mv) = no_match.move_mut(MoveId::EmployerMatch) {
            mv.enabled = false;
        }
        assert_eq!(solve_goal(&no_match).projected_employer_match, 0.0);
    }

    #[test]
    fn gap_and_required_savings_at_zero_growth() {
        let mut plan = flat_plan(0.0);
        plan.goal.target_net_worth = plan.balances.total() + 7_200.0 * 20.0 + 400_000.0;
        let result = solve_goal(&plan);
        assert_close(result.gap, 400_000.0, 1e-6);
        assert_close(result.required_annual_savings, 20_000.0, 1e-6);
        assert_close(result.required_monthly_savings, 20_000.0 / 12.0, 1e-9);
        assert_eq!(result.feasibility, Feasibility::Achievable);
        assert_eq!(
            result.allocation,
            SavingsAllocation {
                tax_deferred: 20_000.0,
                roth: 0.0,
                taxable: 0.0,
            }
        );
    }

    #[test]
    fn target_already_reached_is_on_track() {
        let mut plan = Plan::default();
        plan.goal.target_net_worth = 100_000.0;
        let result = solve_goal(&plan);
        assert_eq!(result.gap, 0.0);
        assert_eq!(result.required_annual_savings, 0.0);
        assert_eq!(result.feasibility, Feasibility::OnTrack);
    }

    #[test]
    fn feasibility_tiers_follow_savings_rate() {
        assert_eq!(classify(Some(0.10), 1.0), Feasibility::Achievable);
        assert_eq!(classify(Some(0.15), 1.0), Feasibility::Achievable);
        assert_eq!(classify(Some(0.20), 1.0), Feasibility::Moderate);
        assert_eq!(classify(Some(0.40), 1.0), Feasibility::Aggressive);
        assert_eq!(classify(Some(0.41), 1.0), Feasibility::VeryAggressive);
        assert_eq!(classify(None, 1.0), Feasibility::VeryAggressive);
        assert_eq!(classify(None, 0.0), Feasibility::OnTrack);
    }

    #[test]
    fn allocation_cascades_through_limits_with_catch_up() {
        let mut plan = Plan::default();
        plan.personal.current_age = 45;
        let young = allocate_savings(40_000.0, &plan);
        assert_close(young.tax_deferred, 23_500.0, 1e-9);
        assert_close(young.roth, 7_000.0, 1e-9);
        assert_close(young.taxable, 9_500.0, 1e-9);

        plan.personal.current_age = 52;
        let older = allocate_savings(40_000.0, &plan);
        assert_close(older.tax_deferred, 31_000.0, 1e-9);
        assert_close(older.roth, 8_000.0, 1e-9);
        assert_close(older.taxable, 1_000.0, 1e-9);
    }

    #[test]
    fn retiring_now_requires_the_whole_gap_this_year() {
        let mut plan = flat_plan(0.05);
        plan.personal.retirement_age = 40;
        plan.goal.target_net_worth = plan.balances.total() + 50_000.0;
        let result = solve_goal(&plan);
        assert_eq!(result.years_to_retirement, 0);
        assert_close(result.required_annual_savings, 50_000.0, 1e-6);
    }

    proptest! {
        #[test]
        fn allocation_always_sums_to_requirement(required in 0.0f64..500_000.0, age in 20u32..70) {
            let mut plan = Plan::default();
            plan.personal.current_age = age;
            let allocation = allocate_savings(required, &plan);
            let total = allocation.tax_deferred + allocation.roth + allocation.taxable;
            prop_assert!((total - required).abs() <= 1e-6);
            prop_assert!(allocation.tax_deferred >= 0.0);
            prop_assert!(allocation.roth >= 0.0);
            prop_assert!(allocation.taxable >= 0.0);
        }
    }
}
