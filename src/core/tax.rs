//! 2025 US federal tax tables and the pure tax functions the engine composes.

use super::types::FilingStatus;

pub const FULL_RETIREMENT_AGE: u32 = 67;
pub const EARLY_REDUCTION_PER_YEAR: f64 = 0.0667;
pub const DELAYED_CREDIT_PER_YEAR: f64 = 0.08;
pub const FULL_COVERAGE_QUARTERS: f64 = 40.0;

pub const CAPITAL_GAINS_MID_RATE: f64 = 0.15;
pub const CAPITAL_GAINS_TOP_RATE: f64 = 0.20;

/// Penalty-free distribution age for tax-deferred accounts.
pub const PENALTY_FREE_AGE: f64 = 59.5;

#[derive(Debug, Clone, Copy)]
struct Bracket {
    floor: f64,
    rate: f64,
}

const fn table(floors: [f64; 7]) -> [Bracket; 7] {
    const RATES: [f64; 7] = [0.10, 0.12, 0.22, 0.24, 0.32, 0.35, 0.37];
    [
        Bracket {
            floor: floors[0],
            rate: RATES[0],
        },
        Bracket {
            floor: floors[1],
            rate: RATES[1],
        },
        Bracket {
            floor: floors[2],
            rate: RATES[2],
        },
        Bracket {
            floor: floors[3],
            rate: RATES[3],
        },
        Bracket {
            floor: floors[4],
            rate: RATES[4],
        },
        Bracket {
            floor: floors[5],
            rate: RATES[5],
        },
        Bracket {
            floor: floors[6],
            rate: RATES[6],
        },
    ]
}

const SINGLE_BRACKETS: [Bracket; 7] = table([
    0.0, 11_925.0, 48_475.0, 103_350.0, 197_300.0, 250_525.0, 626_350.0,
]);
const MFJ_BRACKETS: [Bracket; 7] = table([
    0.0, 23_850.0, 96_950.0, 206_700.0, 394_600.0, 501_050.0, 751_600.0,
]);
const MFS_BRACKETS: [Bracket; 7] = table([
    0.0, 11_925.0, 48_475.0, 103_350.0, 197_300.0, 250_525.0, 375_800.0,
]);
const HOH_BRACKETS: [Bracket; 7] = table([
    0.0, 17_000.0, 64_850.0, 103_350.0, 197_300.0, 250_500.0, 626_350.0,
]);

fn ordinary_brackets(status: FilingStatus) -> &'static [Bracket; 7] {
    match status {
        FilingStatus::Single => &SINGLE_BRACKETS,
        FilingStatus::MarriedFilingJointly => &MFJ_BRACKETS,
        FilingStatus::MarriedFilingSeparately => &MFS_BRACKETS,
        FilingStatus::HeadOfHousehold => &HOH_BRACKETS,
    }
}

/// Upper bounds of the 0% and 15% long-term gains bands. Separate filers share
/// the single-filer pair.
#[derive(Debug, Clone, Copy)]
pub struct GainsThresholds {
    pub zero_ceiling: f64,
    pub fifteen_ceiling: f64,
}

pub fn gains_thresholds(status: FilingStatus) -> GainsThresholds {
    match status {
        FilingStatus::Single | FilingStatus::MarriedFilingSeparately => GainsThresholds {
            zero_ceiling: 48_350.0,
            fifteen_ceiling: 533_400.0,
        },
        FilingStatus::MarriedFilingJointly => GainsThresholds {
            zero_ceiling: 96_700.0,
            fifteen_ceiling: 600_050.0,
        },
        FilingStatus::HeadOfHousehold => GainsThresholds {
            zero_ceiling: 64_750.0,
            fifteen_ceiling: 566_700.0,
        },
    }
}

pub fn standard_deduction(status: FilingStatus) -> f64 {
    match status {
        FilingStatus::Single | FilingStatus::MarriedFilingSeparately => 15_000.0,
        FilingStatus::MarriedFilingJointly => 30_000.0,
        FilingStatus::HeadOfHousehold => 22_500.0,
    }
}

pub fn federal_tax(ordinary_income: f64, status: FilingStatus, standard_deduction: f64) -> f64 {
    let taxable = (ordinary_income - standard_deduction).max(0.0);
    let brackets = ordinary_brackets(status);

    let mut tax = 0.0;
    for (idx, bracket) in brackets.iter().enumerate() {
        let ceiling = brackets
            .get(idx + 1)
            .map(|next| next.floor)
            .unwrap_or(f64::INFINITY);
        tax += (taxable.clamp(bracket.floor, ceiling) - bracket.floor) * bracket.rate;
    }
    tax.max(0.0)
}

pub fn flat_federal_tax(ordinary_income: f64, standard_deduction: f64, flat_rate: f64) -> f64 {
    (ordinary_income - standard_deduction).max(0.0) * flat_rate.max(0.0)
}

/// Tax on the taxable portion of `gross_gains`, stacked on top of ordinary
/// taxable income (already net of the deduction).
pub fn capital_gains_tax(
    gross_gains: f64,
    ordinary_after_deduction: f64,
    status: FilingStatus,
    taxable_portion: f64,
) -> f64 {
    let gains = (gross_gains * taxable_portion).max(0.0);
    if gains <= 0.0 {
        return 0.0;
    }

    let thresholds = gains_thresholds(status);
    let ordinary = ordinary_after_deduction.max(0.0);

    let zero_room = (thresholds.zero_ceiling - ordinary).max(0.0);
    let at_zero = gains.min(zero_room);
    let fifteen_floor = ordinary.max(thresholds.zero_ceiling);
    let fifteen_room = (thresholds.fifteen_ceiling - fifteen_floor).max(0.0);
    let at_fifteen = (gains - at_zero).min(fifteen_room).max(0.0);
    let at_twenty = (gains - at_zero - at_fifteen).max(0.0);

    at_fifteen * CAPITAL_GAINS_MID_RATE + at_twenty * CAPITAL_GAINS_TOP_RATE
}

/// Gains rate that would apply to the next dollar given the stacked position.
pub fn marginal_capital_gains_rate(position: f64, status: FilingStatus) -> f64 {
    let thresholds = gains_thresholds(status);
    if position < thresholds.zero_ceiling {
        0.0
    } else if position < thresholds.fifteen_ceiling {
        CAPITAL_GAINS_MID_RATE
    } else {
        CAPITAL_GAINS_TOP_RATE
    }
}

/// Ordinary rate that would apply to the next dollar of taxable income.
pub fn marginal_ordinary_rate(position: f64, status: FilingStatus) -> f64 {
    let brackets = ordinary_brackets(status);
    brackets
        .iter()
        .rev()
        .find(|b| position >= b.floor)
        .map(|b| b.rate)
        .unwrap_or(brackets[0].rate)
}

/// Annual benefit for a claim at `claiming_age`.
pub fn social_security_benefit(
    monthly_at_full_retirement_age: f64,
    claiming_age: u32,
    quarters_earned: u32,
) -> f64 {
    let fra = FULL_RETIREMENT_AGE as f64;
    let age = claiming_age as f64;
    let adjustment = if age < fra {
        1.0 - (fra - age) * EARLY_REDUCTION_PER_YEAR
    } else {
        1.0 + (age - fra) * DELAYED_CREDIT_PER_YEAR
    };
    let coverage = (quarters_earned as f64 / FULL_COVERAGE_QUARTERS).min(1.0);

    (monthly_at_full_retirement_age * 12.0 * adjustment * coverage).max(0.0)
}

pub fn state_tax(
    taxable_ordinary_income: f64,
    portfolio_gains: f64,
    gains_taxable_portion: f64,
    state_rate: f64,
) -> f64 {
    let taxable_gains = (portfolio_gains * gains_taxable_portion).max(0.0);
    let base = taxable_ordinary_income.max(0.0) + taxable_gains;
    base * state_rate.max(0.0)
}

pub const RMD_START_AGE: u32 = 73;

// IRS Uniform Lifetime Table (2022 revision), ages 72..=100.
const UNIFORM_LIFETIME: [f64; 29] = [
    27.4, 26.5, 25.5, 24.6, 23.7, 22.9, 22.0, 21.1, 20.2, 19.4, 18.5, 17.7, 16.8, 16.0, 15.2,
    14.4, 13.7, 12.9, 12.2, 11.5, 10.8, 10.1, 9.5, 8.9, 8.4, 7.8, 7.3, 6.8, 6.4,
];

pub fn rmd_divisor(age: u32) -> Option<f64> {
    if age < 72 {
        return None;
    }
    let idx = ((age - 72) as usize).min(UNIFORM_LIFETIME.len() - 1);
    Some(UNIFORM_LIFETIME[idx])
}
