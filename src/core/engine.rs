use tracing::debug;

use super::ledger::{
    BrokerageFlows, Education529Flows, ForeignPensionFlows, Roth401kFlows, RothIraFlows,
    Trad401kFlows, TradIraFlows, annual_deferral, brokerage_balance, education_529_balance,
    effective_deferral_percent, employer_match, foreign_pension_balance, projected_balance,
    roth_401k_balance, roth_ira_balance, trad_401k_balance, trad_ira_balance,
};
use super::moves::{MoveId, MoveTable, OneShotTriggers};
use super::sensitivity::{outcome, project_branch};
use super::tax::{
    PENALTY_FREE_AGE, RMD_START_AGE, capital_gains_tax, federal_tax, flat_federal_tax,
    gains_thresholds, rmd_divisor, social_security_benefit, state_tax,
};
use super::types::{
    Balances, ContributionBreakdown, ConversionBreakdown, ExpenseBreakdown, GrowthRates,
    HousingParams, IncomeBreakdown, Plan, SimulationOutput, SimulationSummary,
    TaxBreakdown, TaxMode, WithdrawalBreakdown, YearResult, YearStatus,
};
use super::withdrawal::{Allocation, AllocationRequest, AvailableBalances, allocate};

const DOWNSIZED_HOUSING_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct GrowthFactors {
    inflation: f64,
    healthcare: f64,
    salary: f64,
}

impl GrowthFactors {
    fn start() -> Self {
        Self {
            inflation: 1.0,
            healthcare: 1.0,
            salary: 1.0,
        }
    }

    fn advance(&mut self, plan: &Plan) {
        self.inflation *= 1.0 + plan.expenses.inflation_rate;
        self.healthcare *= 1.0 + plan.expenses.healthcare_inflation_rate;
        self.salary *= 1.0 + plan.income.salary_growth_rate;
    }
}

#[derive(Debug, Clone, Copy)]
struct HousingState {
    home_value: f64,
    mortgage_balance: f64,
    /// Share of the scheduled payment still owed after downsizing.
    payment_scale: f64,
    payment_this_year: f64,
}

impl HousingState {
    fn new(params: &HousingParams) -> Self {
        Self {
            home_value: params.home_value.max(0.0),
            mortgage_balance: params.mortgage_balance.max(0.0),
            payment_scale: 1.0,
            payment_this_year: 0.0,
        }
    }

    fn advance(&mut self, params: &HousingParams) {
        self.home_value *= 1.0 + params.home_appreciation;
        if self.mortgage_balance <= 0.0 {
            self.payment_this_year = 0.0;
            return;
        }
        let interest = self.mortgage_balance * params.mortgage_rate;
        let payment = (params.mortgage_payment * self.payment_scale)
            .min(self.mortgage_balance + interest)
            .max(0.0);
        self.mortgage_balance = (self.mortgage_balance + interest - payment).max(0.0);
        self.payment_this_year = payment;
    }

    fn equity(&self) -> f64 {
        (self.home_value - self.mortgage_balance).max(0.0)
    }
}

struct SimulationState {
    balances: Balances,
    triggers: OneShotTriggers,
    factors: GrowthFactors,
    housing: HousingState,
}

impl SimulationState {
    fn new(plan: &Plan) -> Self {
        Self {
            balances: plan.balances,
            triggers: OneShotTriggers::default(),
            factors: GrowthFactors::start(),
            housing: HousingState::new(&plan.housing),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LedgerFlows {
    trad_401k: Trad401kFlows,
    roth_401k: Roth401kFlows,
    trad_ira: TradIraFlows,
    roth_ira: RothIraFlows,
    brokerage: BrokerageFlows,
    education_529: Education529Flows,
    foreign_pension: ForeignPensionFlows,
}

impl LedgerFlows {
    fn from_contributions(contributions: &ContributionBreakdown) -> Self {
        Self {
            trad_401k: Trad401kFlows {
                contribution: contributions.trad_401k,
                catch_up: contributions.catch_up,
                employer_match: contributions.employer_match,
                ..Trad401kFlows::default()
            },
            roth_401k: Roth401kFlows {
                contribution: contributions.roth_401k,
                mega_backdoor: contributions.mega_backdoor,
                ..Roth401kFlows::default()
            },
            trad_ira: TradIraFlows {
                contribution: contributions.trad_ira,
                ..TradIraFlows::default()
            },
            roth_ira: RothIraFlows {
                contribution: contributions.roth_ira,
                backdoor: contributions.backdoor_roth,
                ..RothIraFlows::default()
            },
            brokerage: BrokerageFlows {
                contribution: contributions.brokerage,
                ..BrokerageFlows::default()
            },
            education_529: Education529Flows {
                contribution: contributions.education_529,
                ..Education529Flows::default()
            },
            foreign_pension: ForeignPensionFlows {
                contribution: contributions.foreign_pension,
            },
        }
    }
}

/// Income that feeds the tax calculation for one year.
#[derive(Debug, Clone, Copy, Default)]
struct TaxableIncome {
    ordinary: f64,
    gains: f64,
    taxable_social_security: f64,
    /// Distributions subject to the early-withdrawal penalty.
    penalized: f64,
}

/// Runs the year-by-year projection for `plan` from the current age through
/// the terminal age, inclusive.
pub fn simulate(plan: &Plan) -> SimulationOutput {
    let moves = MoveTable::build(&plan.moves);
    let mut state = SimulationState::new(plan);
    let ages: Vec<u32> = (plan.personal.current_age..=plan.personal.terminal_age).collect();

    let mut years = Vec::with_capacity(ages.len());
    for (t, &age) in ages.iter().enumerate() {
        if t > 0 {
            state.factors.advance(plan);
        }
        years.push(step_year(plan, &moves, &mut state, age));
    }

    let base: Vec<f64> = years.iter().map(|y| y.total_net_worth).collect();
    let retired: Vec<bool> = years.iter().map(|y| y.is_retired).collect();
    let avg_growth = plan.growth.average();
    let bear = project_branch(&base, &retired, avg_growth, plan.sensitivity.bear_delta);
    let bull = project_branch(&base, &retired, avg_growth, plan.sensitivity.bull_delta);

    for (year, (bear_year, bull_year)) in years.iter_mut().zip(bear.iter().zip(&bull)) {
        year.bear_net_worth = bear_year.net_worth;
        year.bear_status = bear_year.status;
        year.bull_net_worth = bull_year.net_worth;
        year.bull_status = bull_year.status;
    }

    let mut summary = summarize(plan, &years);
    summary.bear = outcome(&bear, &ages);
    summary.bull = outcome(&bull, &ages);

    debug!(
        years = years.len(),
        first_failure_age = ?summary.first_failure_age,
        terminal_net_worth = summary.net_worth.terminal,
        bear_survives = summary.bear.survives,
        bull_survives = summary.bull.survives,
        "simulation complete"
    );

    SimulationOutput { years, summary }
}

fn step_year(
    plan: &Plan,
    moves: &MoveTable<'_>,
    state: &mut SimulationState,
    age: u32,
) -> YearResult {
    let retired = age >= plan.personal.retirement_age;

    let mut income = assemble_income(plan, moves, &state.factors, age, retired);
    let contributions = if retired {
        ContributionBreakdown::default()
    } else {
        compute_contributions(plan, moves, income.w2, age)
    };

    let prior = state.balances;
    let mut flows = LedgerFlows::from_contributions(&contributions);
    let mut conversions =
        plan_conversions(plan, moves, &mut state.triggers, &prior, &mut flows, age);
    let mut withdrawals = plan_recurring_withdrawals(moves, &prior, &plan.growth, &mut flows, age);

    state.balances = apply_recurrences(&prior, &flows, &plan.growth);
    state.housing.advance(&plan.housing);

    let one_time = apply_lifestyle_events(moves, state, &mut conversions, age);
    income.portfolio_withdrawals = withdrawals.recurring_total();

    let expenses = compute_expenses(plan, moves, state, withdrawals.education, one_time, age);

    let mut taxable = taxable_income(
        plan,
        moves,
        &income,
        &contributions,
        &conversions,
        &withdrawals,
        age,
        retired,
    );
    let mut taxes = compute_taxes(plan, moves, &taxable, age);

    if retired && moves.is_active(MoveId::AutoWithdraw, age) {
        let cash_in = income_before_auto(&income);
        let outgoings = expenses.total + contributions.employee_total();
        let drawn = fund_shortfall(
            plan,
            moves,
            &mut state.balances,
            cash_in,
            outgoings,
            &mut taxable,
            &mut taxes,
            age,
        );
        withdrawals.auto_brokerage = drawn.brokerage;
        withdrawals.auto_tax_deferred = drawn.tax_deferred();
        withdrawals.auto_roth = drawn.roth();
    }
    income.auto_withdrawals = withdrawals.auto_total();
    income.total = income_before_auto(&income) + income.auto_withdrawals;

    let cash_flow = income.total - taxes.total - expenses.total - contributions.employee_total();
    let status = if retired && cash_flow < 0.0 {
        YearStatus::Fail
    } else {
        YearStatus::Ok
    };

    let harvest_capacity = if moves.is_active(MoveId::CapitalGainsHarvest, age) {
        let portion = plan.tax.capital_gains_taxable_portion;
        let zero_ceiling = gains_thresholds(plan.personal.filing_status).zero_ceiling;
        let stacked = taxes.taxable_ordinary_income + taxable.gains * portion;
        let room = (zero_ceiling - stacked).max(0.0);
        (state.balances.brokerage * portion).max(0.0).min(room)
    } else {
        0.0
    };

    let total_net_worth = state.balances.total();
    YearResult {
        age,
        is_retired: retired,
        income,
        contributions,
        conversions,
        withdrawals,
        taxes,
        expenses,
        cash_flow,
        balances: state.balances,
        total_net_worth,
        bear_net_worth: total_net_worth,
        bull_net_worth: total_net_worth,
        bear_status: status,
        bull_status: status,
        home_equity: state.housing.equity(),
        harvest_capacity,
        active_moves: moves.active_ids(age),
        status,
    }
}

fn income_before_auto(income: &IncomeBreakdown) -> f64 {
    income.w2
        + income.social_security
        + income.spousal_benefit
        + income.part_time
        + income.rental
        + income.portfolio_withdrawals
}

fn assemble_income(
    plan: &Plan,
    moves: &MoveTable<'_>,
    factors: &GrowthFactors,
    age: u32,
    retired: bool,
) -> IncomeBreakdown {
    let mut income = IncomeBreakdown::default();
    if !retired {
        income.w2 = (plan.income.salary * factors.salary).max(0.0);
    }

    let ss = &plan.social_security;
    if let Some(claim) = moves.active(MoveId::ClaimSocialSecurity, age) {
        let years_claimed = age.saturating_sub(claim.start_age) as i32;
        income.social_security =
            social_security_benefit(ss.monthly_benefit_at_fra, claim.start_age, ss.quarters_earned)
                * (1.0 + ss.cola).powi(years_claimed);

        if let Some(spousal) = moves.active(MoveId::SpousalBenefit, age) {
            let years_spousal = age.saturating_sub(spousal.start_age) as i32;
            income.spousal_benefit = (ss.monthly_benefit_at_fra * 12.0 * spousal.amount).max(0.0)
                * (1.0 + ss.cola).powi(years_spousal);
        }
    }

    if let Some(part_time) = moves.active(MoveId::PartTimeWork, age) {
        income.part_time = part_time.resolve_amount(0.0) * factors.inflation;
    }
    if let Some(rental) = moves.active(MoveId::RentalIncome, age) {
        income.rental = rental.resolve_amount(0.0) * factors.inflation;
    }
    income
}

fn compute_contributions(
    plan: &Plan,
    moves: &MoveTable<'_>,
    salary: f64,
    age: u32,
) -> ContributionBreakdown {
    let mut contributions = ContributionBreakdown::default();
    let deferral = annual_deferral(&plan.income, salary);
    let ira_limit = plan.income.ira_contribution_limit.max(0.0);

    if moves.is_active(MoveId::Trad401kContribution, age) {
        contributions.trad_401k = deferral;
    }
    if moves.is_active(MoveId::Roth401kContribution, age) {
        contributions.roth_401k = deferral;
    }
    if moves.is_active(MoveId::EmployerMatch, age) {
        let elected = contributions.trad_401k.max(contributions.roth_401k);
        contributions.employer_match = employer_match(
            salary,
            effective_deferral_percent(elected, salary),
            &plan.income.match_tiers,
        );
    }
    if let Some(mv) = moves.active(MoveId::CatchUpContribution, age) {
        contributions.catch_up = mv.resolve_amount(salary);
    }
    if let Some(mv) = moves.active(MoveId::MegaBackdoorRoth, age) {
        contributions.mega_backdoor = mv.resolve_amount(salary);
    }
    if let Some(mv) = moves.active(MoveId::TradIraContribution, age) {
        contributions.trad_ira = mv.resolve_amount(salary).min(ira_limit);
    }
    if let Some(mv) = moves.active(MoveId::RothIraContribution, age) {
        contributions.roth_ira = mv.resolve_amount(salary).min(ira_limit);
    }
    if let Some(mv) = moves.active(MoveId::BackdoorRoth, age) {
        contributions.backdoor_roth = mv.resolve_amount(salary).min(ira_limit);
    }
    if let Some(mv) = moves.active(MoveId::BrokerageContribution, age) {
        contributions.brokerage = mv.resolve_amount(salary);
    }
    if let Some(mv) = moves.active(MoveId::Education529Contribution, age) {
        contributions.education_529 = mv.resolve_amount(salary);
    }
    if let Some(mv) = moves.active(MoveId::ForeignPensionContribution, age) {
        contributions.foreign_pension = mv.resolve_amount(salary);
    }
    contributions
}

/// Rollovers fire first so the conversions that follow see the consolidated
/// IRA. Amounts are capped by the pre-growth balance and leave the source at
/// its growth rate, so the converted money grows once, in the destination.
fn plan_conversions(
    plan: &Plan,
    moves: &MoveTable<'_>,
    triggers: &mut OneShotTriggers,
    prior: &Balances,
    flows: &mut LedgerFlows,
    age: u32,
) -> ConversionBreakdown {
    let growth = &plan.growth;
    let mut conversions = ConversionBreakdown::default();

    if let Some(mv) = moves.get(MoveId::Rollover401kToIra) {
        if triggers.fire(mv, age) {
            let rolled = prior.trad_401k.max(0.0);
            conversions.rollover_401k = rolled;
            flows.trad_401k.rollover_out = rolled * (1.0 + growth.trad_401k);
            flows.trad_ira.rollover_in = rolled;
        }
    }
    if let Some(mv) = moves.get(MoveId::RolloverRoth401kToRothIra) {
        if triggers.fire(mv, age) {
            let rolled = prior.roth_401k.max(0.0);
            conversions.rollover_roth_401k = rolled;
            flows.roth_401k.rollover_out = rolled * (1.0 + growth.roth_401k);
            flows.roth_ira.rollover_in = rolled;
        }
    }

    let mut ira_available = prior.trad_ira.max(0.0) + flows.trad_ira.rollover_in;
    let mut plan_401k_available = (prior.trad_401k - conversions.rollover_401k).max(0.0);

    if let Some(ladder) = moves.active(MoveId::RothLadder, age) {
        let requested = ladder.resolve_amount(ira_available + plan_401k_available);
        let from_ira = requested.min(ira_available);
        let from_401k = (requested - from_ira).min(plan_401k_available).max(0.0);
        ira_available -= from_ira;
        plan_401k_available -= from_401k;
        conversions.roth_ladder = from_ira + from_401k;
        flows.trad_ira.roth_conversion += from_ira * (1.0 + growth.trad_ira);
        flows.trad_401k.roth_conversion += from_401k * (1.0 + growth.trad_401k);
    }
    if let Some(partial) = moves.active(MoveId::IraPartialConversion, age) {
        let amount = partial.resolve_amount(ira_available).min(ira_available);
        conversions.ira_partial = amount;
        flows.trad_ira.roth_conversion += amount * (1.0 + growth.trad_ira);
    }

    flows.roth_ira.conversion_in += conversions.roth_conversions();
    conversions
}

/// Sizes the recurring withdrawal moves against the balances projected for
/// this year, after contributions, growth and conversions.
fn plan_recurring_withdrawals(
    moves: &MoveTable<'_>,
    prior: &Balances,
    growth: &GrowthRates,
    flows: &mut LedgerFlows,
    age: u32,
) -> WithdrawalBreakdown {
    let mut withdrawals = WithdrawalBreakdown::default();

    let t401k = &flows.trad_401k;
    let available_401k = (projected_balance(
        prior.trad_401k,
        t401k.contribution + t401k.catch_up + t401k.employer_match,
        growth.trad_401k,
    ) - t401k.roth_conversion
        - t401k.rollover_out)
        .max(0.0);
    let ira = &flows.trad_ira;
    let mut available_ira = (projected_balance(
        prior.trad_ira,
        ira.contribution + ira.rollover_in,
        growth.trad_ira,
    ) - ira.roth_conversion)
        .max(0.0);
    let roth = &flows.roth_ira;
    let available_roth = projected_balance(
        prior.roth_ira,
        roth.contribution + roth.backdoor + roth.conversion_in + roth.rollover_in,
        growth.roth_ira,
    );
    let available_brokerage = projected_balance(
        prior.brokerage,
        flows.brokerage.contribution,
        growth.brokerage,
    );
    let available_529 = projected_balance(
        prior.education_529,
        flows.education_529.contribution,
        growth.education_529,
    );

    if let Some(mv) = moves.active(MoveId::TradIraWithdrawal, age) {
        withdrawals.trad_ira = mv.resolve_amount(available_ira).min(available_ira);
        available_ira -= withdrawals.trad_ira;
    }
    if let Some(mv) = moves.active(MoveId::Sepp72t, age) {
        withdrawals.sepp = mv.resolve_amount(available_ira).min(available_ira);
        available_ira -= withdrawals.sepp;
    }
    if age >= RMD_START_AGE && moves.is_active(MoveId::RequiredMinimumDistribution, age) {
        if let Some(divisor) = rmd_divisor(age) {
            let ira_base = prior.trad_ira.max(0.0) + flows.trad_ira.rollover_in;
            let plan_base = (prior.trad_401k - flows.trad_ira.rollover_in).max(0.0);
            let ira_required = ira_base / divisor;
            let ira_extra = (ira_required - withdrawals.trad_ira - withdrawals.sepp)
                .max(0.0)
                .min(available_ira);
            let plan_required = (plan_base / divisor).min(available_401k);
            withdrawals.rmd = ira_extra + plan_required;
            flows.trad_401k.withdrawal += plan_required;
            flows.trad_ira.withdrawal += ira_extra;
        }
    }
    flows.trad_ira.withdrawal += withdrawals.trad_ira + withdrawals.sepp;

    if let Some(mv) = moves.active(MoveId::BrokerageWithdrawal, age) {
        withdrawals.brokerage = mv.resolve_amount(available_brokerage).min(available_brokerage);
        flows.brokerage.withdrawal = withdrawals.brokerage;
    }
    if let Some(mv) = moves.active(MoveId::RothIraWithdrawal, age) {
        withdrawals.roth_ira = mv.resolve_amount(available_roth).min(available_roth);
        flows.roth_ira.withdrawal = withdrawals.roth_ira;
    }
    if let Some(mv) = moves.active(MoveId::EducationWithdrawal, age) {
        withdrawals.education = mv.resolve_amount(available_529).min(available_529);
        flows.education_529.qualified_withdrawal = withdrawals.education;
    }

    withdrawals
}

fn apply_recurrences(prior: &Balances, flows: &LedgerFlows, growth: &GrowthRates) -> Balances {
    Balances {
        trad_401k: trad_401k_balance(prior.trad_401k, &flows.trad_401k, growth.trad_401k),
        roth_401k: roth_401k_balance(prior.roth_401k, &flows.roth_401k, growth.roth_401k),
        trad_ira: trad_ira_balance(prior.trad_ira, &flows.trad_ira, growth.trad_ira),
        roth_ira: roth_ira_balance(prior.roth_ira, &flows.roth_ira, growth.roth_ira),
        brokerage: brokerage_balance(prior.brokerage, &flows.brokerage, growth.brokerage),
        education_529: education_529_balance(
            prior.education_529,
            &flows.education_529,
            growth.education_529,
        ),
        foreign_pension: foreign_pension_balance(
            prior.foreign_pension,
            &flows.foreign_pension,
            growth.foreign_pension,
        ),
    }
}

/// Fires the one-shot lifestyle and liquidation moves due this year. Returns
/// the one-time cost they add to expenses.
///
/// Runs after amortization: this year's mortgage payment is already out of
/// the balance and stays in this year's housing expense.
fn apply_lifestyle_events(
    moves: &MoveTable<'_>,
    state: &mut SimulationState,
    conversions: &mut ConversionBreakdown,
    age: u32,
) -> f64 {
    const EVENTS: [MoveId; 6] = [
        MoveId::SellHouse,
        MoveId::PayOffMortgage,
        MoveId::Relocate,
        MoveId::Downsize,
        MoveId::LiquidateForeignPension,
        MoveId::IraLumpSum,
    ];

    let mut one_time = 0.0;
    for id in EVENTS {
        let Some(mv) = moves.get(id) else {
            continue;
        };
        if !state.triggers.fire(mv, age) {
            continue;
        }

        let balances = &mut state.balances;
        let housing = &mut state.housing;
        match id {
            MoveId::SellHouse => {
                balances.brokerage += housing.equity();
                housing.home_value = 0.0;
                housing.mortgage_balance = 0.0;
            }
            MoveId::PayOffMortgage => {
                balances.brokerage = (balances.brokerage - housing.mortgage_balance).max(0.0);
                housing.mortgage_balance = 0.0;
            }
            MoveId::Relocate => {
                one_time += mv.resolve_amount(0.0) * state.factors.inflation;
            }
            MoveId::Downsize => {
                let share = mv.amount.clamp(0.0, 1.0);
                balances.brokerage += housing.equity() * share;
                housing.home_value *= 1.0 - share;
                housing.mortgage_balance *= 1.0 - share;
                housing.payment_scale *= 1.0 - share;
            }
            MoveId::LiquidateForeignPension => {
                conversions.pension_liquidation = balances.foreign_pension;
                balances.brokerage += balances.foreign_pension;
                balances.foreign_pension = 0.0;
            }
            MoveId::IraLumpSum => {
                conversions.ira_lump_sum = balances.trad_ira;
                balances.brokerage += balances.trad_ira;
                balances.trad_ira = 0.0;
            }
            _ => {}
        }
    }
    one_time
}

fn compute_expenses(
    plan: &Plan,
    moves: &MoveTable<'_>,
    state: &SimulationState,
    education_withdrawal: f64,
    one_time: f64,
    age: u32,
) -> ExpenseBreakdown {
    let params = &plan.expenses;
    let factors = &state.factors;
    let triggers = &state.triggers;
    let relocation = if triggers.is_triggered(MoveId::Relocate) {
        params.relocation_scale
    } else {
        1.0
    };

    let non_mortgage = if triggers.is_triggered(MoveId::SellHouse) {
        0.0
    } else if triggers.is_triggered(MoveId::Downsize) {
        plan.housing.non_mortgage_cost() * DOWNSIZED_HOUSING_SHARE
    } else {
        plan.housing.non_mortgage_cost()
    };
    let housing = state.housing.payment_this_year + non_mortgage * factors.inflation * relocation;

    let medicare = if moves.is_active(MoveId::MedicareTransition, age) {
        1.0 - params.medicare_reduction
    } else {
        1.0
    };

    let mut expenses = ExpenseBreakdown {
        living: params.living * factors.inflation * relocation,
        housing,
        healthcare: params.healthcare * factors.healthcare * medicare,
        travel: moves
            .active(MoveId::TravelBudget, age)
            .map(|mv| mv.resolve_amount(0.0) * factors.inflation * relocation)
            .unwrap_or(0.0),
        long_term_care: moves
            .active(MoveId::LongTermCare, age)
            .map(|mv| mv.resolve_amount(0.0) * factors.healthcare)
            .unwrap_or(0.0),
        education: education_withdrawal,
        one_time,
        total: 0.0,
    };
    expenses.total = expenses.living
        + expenses.housing
        + expenses.healthcare
        + expenses.travel
        + expenses.long_term_care
        + expenses.education
        + expenses.one_time;
    expenses
}

/// Working years deduct pre-tax deferrals and leave Social Security out;
/// retired years add the taxable share of benefits.
#[allow(clippy::too_many_arguments)]
fn taxable_income(
    plan: &Plan,
    moves: &MoveTable<'_>,
    income: &IncomeBreakdown,
    contributions: &ContributionBreakdown,
    conversions: &ConversionBreakdown,
    withdrawals: &WithdrawalBreakdown,
    age: u32,
    retired: bool,
) -> TaxableIncome {
    let distributions = withdrawals.trad_ira
        + withdrawals.sepp
        + withdrawals.rmd
        + conversions.ira_lump_sum
        + conversions.pension_liquidation;
    let shared = conversions.roth_conversions() + income.part_time + income.rental + distributions;

    let (ordinary, taxable_social_security) = if retired {
        let taxable_ss = if moves.is_active(MoveId::SocialSecurityTaxation, age) {
            (income.social_security + income.spousal_benefit)
                * plan.tax.social_security_taxable_portion
        } else {
            0.0
        };
        (taxable_ss + shared, taxable_ss)
    } else {
        (income.w2 - contributions.pre_tax() + shared, 0.0)
    };

    TaxableIncome {
        ordinary: ordinary.max(0.0),
        gains: withdrawals.brokerage,
        taxable_social_security,
        penalized: withdrawals.trad_ira
            + conversions.ira_lump_sum
            + conversions.pension_liquidation,
    }
}

fn compute_taxes(
    plan: &Plan,
    moves: &MoveTable<'_>,
    taxable: &TaxableIncome,
    age: u32,
) -> TaxBreakdown {
    let config = &plan.tax;
    let status = plan.personal.filing_status;
    let deduction = config.standard_deduction;
    let portion = config.capital_gains_taxable_portion;

    let federal = match config.mode {
        TaxMode::Brackets => federal_tax(taxable.ordinary, status, deduction),
        TaxMode::Flat => flat_federal_tax(taxable.ordinary, deduction, config.flat_rate),
    };
    let taxable_ordinary_income = (taxable.ordinary - deduction).max(0.0);
    let capital_gains = capital_gains_tax(taxable.gains, taxable_ordinary_income, status, portion);
    let state = state_tax(taxable_ordinary_income, taxable.gains, portion, config.state_rate);
    let penalty_applies =
        moves.is_active(MoveId::EarlyWithdrawalPenalty, age) && (age as f64) < PENALTY_FREE_AGE;
    let early_withdrawal_penalty = if penalty_applies {
        taxable.penalized.max(0.0) * config.early_withdrawal_penalty_rate
    } else {
        0.0
    };

    TaxBreakdown {
        ordinary_income: taxable.ordinary,
        taxable_ordinary_income,
        capital_gains: taxable.gains,
        taxable_social_security: taxable.taxable_social_security,
        federal,
        capital_gains_tax: capital_gains,
        state,
        early_withdrawal_penalty,
        total: federal + capital_gains + state + early_withdrawal_penalty,
    }
}

/// Draws the retirement shortfall from the portfolio in one allocator pass,
/// then re-taxes the year with the draws included. Whatever the single
/// marginal-rate gross-up misses shows up as negative cash flow.
#[allow(clippy::too_many_arguments)]
fn fund_shortfall(
    plan: &Plan,
    moves: &MoveTable<'_>,
    balances: &mut Balances,
    cash_in: f64,
    outgoings: f64,
    taxable: &mut TaxableIncome,
    taxes: &mut TaxBreakdown,
    age: u32,
) -> Allocation {
    let gap = outgoings + taxes.total - cash_in;
    if gap <= 0.0 {
        return Allocation::default();
    }

    let portion = plan.tax.capital_gains_taxable_portion;
    let request = AllocationRequest {
        gap,
        available: AvailableBalances {
            brokerage: balances.brokerage.max(0.0),
            trad_ira: balances.trad_ira.max(0.0),
            trad_401k: balances.trad_401k.max(0.0),
            roth_ira: balances.roth_ira.max(0.0),
            roth_401k: balances.roth_401k.max(0.0),
        },
        position: taxes.taxable_ordinary_income + taxable.gains * portion,
        filing_status: plan.personal.filing_status,
        state_rate: plan.tax.state_rate,
        gains_taxable_portion: portion,
        flat_ordinary_rate: match plan.tax.mode {
            TaxMode::Flat => Some(plan.tax.flat_rate),
            TaxMode::Brackets => None,
        },
    };
    let drawn = allocate(&request);
    if drawn.gross_total() <= 0.0 {
        return drawn;
    }

    taxable.gains += drawn.brokerage;
    taxable.ordinary += drawn.tax_deferred();
    taxable.penalized += drawn.tax_deferred();
    *taxes = compute_taxes(plan, moves, taxable, age);

    balances.brokerage = (balances.brokerage - drawn.brokerage).max(0.0);
    balances.trad_ira = (balances.trad_ira - drawn.trad_ira).max(0.0);
    balances.trad_401k = (balances.trad_401k - drawn.trad_401k).max(0.0);
    balances.roth_ira = (balances.roth_ira - drawn.roth_ira).max(0.0);
    balances.roth_401k = (balances.roth_401k - drawn.roth_401k).max(0.0);
    drawn
}

fn summarize(plan: &Plan, years: &[YearResult]) -> SimulationSummary {
    let mut summary = SimulationSummary {
        survives: true,
        ..SimulationSummary::default()
    };
    summary.net_worth.start = plan.balances.total();

    let mut working_cash_flow = 0.0;
    let mut working_years = 0_u32;
    let mut retirement_cash_flow = 0.0;
    let mut retirement_years = 0_u32;
    let mut peak: Option<(f64, u32)> = None;

    for year in years {
        match year.status {
            YearStatus::Ok => summary.years_ok += 1,
            YearStatus::Fail => {
                summary.years_failed += 1;
                summary.first_failure_age.get_or_insert(year.age);
            }
        }

        summary.total_income += year.income.total;
        summary.total_taxes += year.taxes.total;
        summary.total_federal_tax += year.taxes.federal;
        summary.total_capital_gains_tax += year.taxes.capital_gains_tax;
        summary.total_state_tax += year.taxes.state;
        summary.total_penalties += year.taxes.early_withdrawal_penalty;
        summary.total_expenses += year.expenses.total;
        summary.total_contributions += year.contributions.employee_total();
        summary.total_employer_match += year.contributions.employer_match;
        summary.total_conversions += year.conversions.roth_conversions();
        summary.total_withdrawals +=
            year.withdrawals.recurring_total() + year.withdrawals.auto_total();
        summary.harvest_capacity += year.harvest_capacity;

        if year.is_retired {
            retirement_cash_flow += year.cash_flow;
            retirement_years += 1;
        } else {
            working_cash_flow += year.cash_flow;
            working_years += 1;
        }

        let net_worth = year.total_net_worth;
        if year.age == plan.personal.retirement_age {
            summary.net_worth.retirement = Some(net_worth);
        }
        if year.age == 65 {
            summary.net_worth.age_65 = Some(net_worth);
        }
        if year.age == 73 {
            summary.net_worth.age_73 = Some(net_worth);
        }
        if peak.is_none_or(|(best, _)| net_worth > best) {
            peak = Some((net_worth, year.age));
        }
    }

    summary.survives = summary.first_failure_age.is_none();
    summary.net_worth.terminal = years.last().map(|y| y.total_net_worth).unwrap_or(0.0);
    if let Some((value, age)) = peak {
        summary.net_worth.peak = value;
        summary.net_worth.peak_age = age;
    }
    summary.effective_tax_rate = if summary.total_income > 0.0 {
        summary.total_taxes / summary.total_income
    } else {
        0.0
    };
    let runway_end = summary
        .first_failure_age
        .unwrap_or(plan.personal.terminal_age + 1);
    summary.runway_years = runway_end.saturating_sub(plan.personal.retirement_age);
    summary.avg_working_cash_flow = average(working_cash_flow, working_years);
    summary.avg_retirement_cash_flow = average(retirement_cash_flow, retirement_years);

    summary
}

fn average(total: f64, count: u32) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}
