//! Bear/bull projections derived from a completed base trajectory.
//!
//! Each branch keeps the base run's non-growth flows (contributions,
//! withdrawals, taxes, one-shot events) and only swaps the growth rate.

use super::types::{SensitivityOutcome, YearStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchYear {
    pub net_worth: f64,
    pub status: YearStatus,
}

pub fn branch_status(net_worth: f64, is_retired: bool) -> YearStatus {
    if is_retired && net_worth <= 0.0 {
        YearStatus::Fail
    } else {
        YearStatus::Ok
    }
}

/// Re-projects `base` net worth with `avg_growth + delta`. `retired[t]` marks
/// retirement years; both slices are indexed by simulation year.
pub fn project_branch(
    base: &[f64],
    retired: &[bool],
    avg_growth: f64,
    delta: f64,
) -> Vec<BranchYear> {
    let mut branch: Vec<BranchYear> = Vec::with_capacity(base.len());

    for (t, &base_now) in base.iter().enumerate() {
        let is_retired = retired.get(t).copied().unwrap_or(false);
        let net_worth = match (t, branch.last()) {
            (0, _) | (_, None) => base_now,
            (_, Some(previous)) => {
                let base_prev = base[t - 1];
                let non_growth = base_now - base_prev - base_prev * avg_growth;
                (previous.net_worth * (1.0 + avg_growth + delta) + non_growth).max(0.0)
            }
        };
        branch.push(BranchYear {
            net_worth,
            status: branch_status(net_worth, is_retired),
        });
    }

    branch
}

pub fn outcome(branch: &[BranchYear], ages: &[u32]) -> SensitivityOutcome {
    let first_failure_age = branch
        .iter()
        .zip(ages)
        .find(|(year, _)| year.status == YearStatus::Fail)
        .map(|(_, age)| *age);
    SensitivityOutcome {
        first_failure_age,
        terminal_net_worth: branch.last().map(|y| y.net_worth).unwrap_or(0.0),
        survives: first_failure_age.is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn first_year_matches_base() {
        let branch = project_branch(&[100.0, 110.0], &[false, false], 0.1, -0.05);
        assert_approx(branch[0].net_worth, 100.0);
    }

    #[test]
    fn branch_keeps_non_growth_flows_and_swaps_growth() {
        // Base grows 10% and adds 5 of contributions in year one.
        let base = [100.0, 115.0];
        let branch = project_branch(&base, &[false, false], 0.10, -0.04);
        assert_approx(branch[1].net_worth, 100.0 * 1.06 + 5.0);
    }

    #[test]
    fn zero_delta_reproduces_base() {
        let base = [100.0, 120.0, 90.0, 95.0];
        let branch = project_branch(&base, &[false; 4], 0.07, 0.0);
        for (b, expected) in branch.iter().zip(base) {
            assert_approx(b.net_worth, expected);
        }
    }

    #[test]
    fn depleted_retired_branch_year_fails() {
        let base = [100.0, 10.0, 0.0];
        let branch = project_branch(&base, &[false, true, true], 0.05, -0.5);
        assert_eq!(branch[0].status, YearStatus::Ok);
        assert_eq!(branch[2].net_worth, 0.0);
        assert_eq!(branch[2].status, YearStatus::Fail);

        let result = outcome(&branch, &[60, 61, 62]);
        assert!(!result.survives);
        assert!(result.first_failure_age.is_some_and(|age| age <= 62));
    }

    #[test]
    fn working_years_never_fail() {
        assert_eq!(branch_status(0.0, false), YearStatus::Ok);
        assert_eq!(branch_status(0.0, true), YearStatus::Fail);
        assert_eq!(branch_status(1.0, true), YearStatus::Ok);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn bear_stays_below_base_and_bull_above(
            start in 0.0f64..2_000_000.0,
            flows in prop::collection::vec(-80_000.0f64..80_000.0, 1..40),
            avg in 0.0f64..0.10,
            bear_delta in -0.08f64..0.0,
            bull_delta in 0.0f64..0.08,
        ) {
            let mut base = vec![start];
            for flow in flows {
                let prev = *base.last().unwrap_or(&0.0);
                base.push((prev * (1.0 + avg) + flow).max(0.0));
            }
            let retired = vec![true; base.len()];
            let bear = project_branch(&base, &retired, avg, bear_delta);
            let bull = project_branch(&base, &retired, avg, bull_delta);

            for t in 0..base.len() {
                prop_assert!(bear[t].net_worth <= base[t] + 1e-3);
                prop_assert!(base[t] <= bull[t].net_worth + 1e-3);
            }
        }
    }
}
