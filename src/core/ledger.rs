use super::types::{DeferralMode, IncomeParams, MatchTier};

/// Shared shape of every account update: inflows land before growth, outflows
/// leave after it, and the result never goes negative.
pub fn apply_recurrence(prior: f64, inflows: f64, growth_rate: f64, outflows: f64) -> f64 {
    ((prior + inflows) * (1.0 + growth_rate) - outflows).max(0.0)
}

/// Balance available for outflows this year before anything is taken out.
pub fn projected_balance(prior: f64, inflows: f64, growth_rate: f64) -> f64 {
    ((prior + inflows) * (1.0 + growth_rate)).max(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Trad401kFlows {
    pub contribution: f64,
    pub catch_up: f64,
    pub employer_match: f64,
    pub roth_conversion: f64,
    pub withdrawal: f64,
    pub rollover_out: f64,
}

pub fn trad_401k_balance(prior: f64, flows: &Trad401kFlows, growth_rate: f64) -> f64 {
    apply_recurrence(
        prior,
        flows.contribution + flows.catch_up + flows.employer_match,
        growth_rate,
        flows.roth_conversion + flows.withdrawal + flows.rollover_out,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Roth401kFlows {
    pub contribution: f64,
    pub mega_backdoor: f64,
    pub rollover_out: f64,
}

pub fn roth_401k_balance(prior: f64, flows: &Roth401kFlows, growth_rate: f64) -> f64 {
    apply_recurrence(
        prior,
        flows.contribution + flows.mega_backdoor,
        growth_rate,
        flows.rollover_out,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TradIraFlows {
    pub contribution: f64,
    pub rollover_in: f64,
    pub roth_conversion: f64,
    pub withdrawal: f64,
}

pub fn trad_ira_balance(prior: f64, flows: &TradIraFlows, growth_rate: f64) -> f64 {
    apply_recurrence(
        prior,
        flows.contribution + flows.rollover_in,
        growth_rate,
        flows.roth_conversion + flows.withdrawal,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RothIraFlows {
    pub contribution: f64,
    pub backdoor: f64,
    pub conversion_in: f64,
    pub rollover_in: f64,
    pub withdrawal: f64,
}

pub fn roth_ira_balance(prior: f64, flows: &RothIraFlows, growth_rate: f64) -> f64 {
    apply_recurrence(
        prior,
        flows.contribution + flows.backdoor + flows.conversion_in + flows.rollover_in,
        growth_rate,
        flows.withdrawal,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerageFlows {
    pub contribution: f64,
    pub withdrawal: f64,
}

pub fn brokerage_balance(prior: f64, flows: &BrokerageFlows, growth_rate: f64) -> f64 {
    apply_recurrence(prior, flows.contribution, growth_rate, flows.withdrawal)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Education529Flows {
    pub contribution: f64,
    pub qualified_withdrawal: f64,
}

pub fn education_529_balance(prior: f64, flows: &Education529Flows, growth_rate: f64) -> f64 {
    apply_recurrence(
        prior,
        flows.contribution,
        growth_rate,
        flows.qualified_withdrawal,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignPensionFlows {
    pub contribution: f64,
}

pub fn foreign_pension_balance(prior: f64, flows: &ForeignPensionFlows, growth_rate: f64) -> f64 {
    apply_recurrence(prior, flows.contribution, growth_rate, 0.0)
}

/// Employee elective deferral for the year.
///
/// Dollar mode annualizes the per-paycheck amount; percent mode applies the
/// rate to salary. The employer's max-deferral percent and dollar cap bind
/// before the statutory limit.
pub fn annual_deferral(income: &IncomeParams, salary: f64) -> f64 {
    let mode_amount = match income.deferral_mode {
        DeferralMode::Percent => salary * income.deferral_percent,
        DeferralMode::Dollar => income.deferral_per_paycheck * income.pay_periods_per_year as f64,
    };

    let mut capped = mode_amount.max(0.0);
    if let Some(max_percent) = income.employer_max_deferral_percent {
        capped = capped.min((salary * max_percent).max(0.0));
    }
    if let Some(cap) = income.employer_deferral_cap {
        capped = capped.min(cap.max(0.0));
    }
    capped.min(income.irs_deferral_limit.max(0.0))
}

pub fn effective_deferral_percent(deferral: f64, salary: f64) -> f64 {
    if salary <= 0.0 {
        return 0.0;
    }
    (deferral / salary).max(0.0)
}

/// Tiers are consumed in order; each matches the slice of the deferral percent
/// it covers, and nothing past the last tier is matched.
pub fn employer_match(salary: f64, deferral_percent: f64, tiers: &[MatchTier]) -> f64 {
    let mut remaining = deferral_percent.max(0.0);
    let mut matched = 0.0;

    for tier in tiers {
        if remaining <= 0.0 {
            break;
        }
        let covered = remaining.min(tier.covered_percent.max(0.0));
        matched += covered * tier.match_rate.max(0.0) * salary.max(0.0);
        remaining -= covered;
    }

    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn two_tier() -> Vec<MatchTier> {
        vec![
            MatchTier {
                match_rate: 1.0,
                covered_percent: 0.03,
            },
            MatchTier {
                match_rate: 0.5,
                covered_percent: 0.02,
            },
        ]
    }

    #[test]
    fn employer_match_consumes_tiers_in_order() {
        assert_approx(employer_match(180_000.0, 0.10, &two_tier()), 7_200.0);
    }

    #[test]
    fn employer_match_stops_when_deferral_runs_out() {
        assert_approx(employer_match(100_000.0, 0.02, &two_tier()), 2_000.0);
        assert_approx(employer_match(100_000.0, 0.04, &two_tier()), 3_500.0);
        assert_approx(employer_match(100_000.0, 0.0, &two_tier()), 0.0);
        assert_approx(employer_match(100_000.0, 0.10, &[]), 0.0);
    }

    #[test]
    fn percent_deferral_is_capped_by_statutory_limit() {
        let income = IncomeParams {
            deferral_percent: 0.20,
            ..IncomeParams::default()
        };
        assert_approx(annual_deferral(&income, 180_000.0), 23_500.0);
    }

    #[test]
    fn dollar_deferral_annualizes_then_applies_employer_percent_cap() {
        let income = IncomeParams {
            deferral_mode: DeferralMode::Dollar,
            deferral_per_paycheck: 500.0,
            pay_periods_per_year: 26,
            employer_max_deferral_percent: Some(0.10),
            ..IncomeParams::default()
        };
        assert_approx(annual_deferral(&income, 200_000.0), 13_000.0);
        assert_approx(annual_deferral(&income, 100_000.0), 10_000.0);
    }

    #[test]
    fn employer_dollar_cap_binds_before_statutory_limit() {
        let income = IncomeParams {
            deferral_percent: 0.15,
            employer_deferral_cap: Some(15_000.0),
            ..IncomeParams::default()
        };
        assert_approx(annual_deferral(&income, 180_000.0), 15_000.0);
    }

    #[test]
    fn contributions_grow_but_withdrawals_do_not() {
        let flows = BrokerageFlows {
            contribution: 1_000.0,
            withdrawal: 500.0,
        };
        assert_approx(brokerage_balance(10_000.0, &flows, 0.10), 11_600.0);
    }

    #[test]
    fn recurrence_clamps_at_zero() {
        let flows = TradIraFlows {
            withdrawal: 50_000.0,
            ..TradIraFlows::default()
        };
        assert_eq!(trad_ira_balance(10_000.0, &flows, 0.05), 0.0);
    }

    #[test]
    fn trad_401k_counts_match_and_catch_up_as_inflows() {
        let flows = Trad401kFlows {
            contribution: 10_000.0,
            catch_up: 5_000.0,
            employer_match: 5_000.0,
            roth_conversion: 2_000.0,
            withdrawal: 1_000.0,
            rollover_out: 0.0,
        };
        assert_approx(trad_401k_balance(80_000.0, &flows, 0.0), 97_000.0);
    }
}
