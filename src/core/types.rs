use serde::{Deserialize, Serialize};

use super::moves::{Move, MoveId, RawMove, default_moves};
use super::tax::standard_deduction;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    #[serde(rename = "mfj", alias = "married_filing_jointly")]
    MarriedFilingJointly,
    #[serde(rename = "mfs", alias = "married_filing_separately")]
    MarriedFilingSeparately,
    #[serde(rename = "hoh", alias = "head_of_household")]
    HeadOfHousehold,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferralMode {
    Percent,
    Dollar,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    Brackets,
    Flat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Trad401k,
    Roth401k,
    TradIra,
    RothIra,
    Brokerage,
    Education529,
    ForeignPension,
}

impl AccountKind {
    pub const ALL: [AccountKind; 7] = [
        AccountKind::Trad401k,
        AccountKind::Roth401k,
        AccountKind::TradIra,
        AccountKind::RothIra,
        AccountKind::Brokerage,
        AccountKind::Education529,
        AccountKind::ForeignPension,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonalInfo {
    pub current_age: u32,
    pub retirement_age: u32,
    pub terminal_age: u32,
    pub filing_status: FilingStatus,
    pub state: String,
}

impl Default for PersonalInfo {
    fn default() -> Self {
        Self {
            current_age: 45,
            retirement_age: 60,
            terminal_age: 80,
            filing_status: FilingStatus::MarriedFilingJointly,
            state: "CO".to_string(),
        }
    }
}

/// One employer match tier. Both fields are fractions: a 100% match on the
/// first 3% of salary is `{ match_rate: 1.0, covered_percent: 0.03 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTier {
    pub match_rate: f64,
    pub covered_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IncomeParams {
    pub salary: f64,
    pub salary_growth_rate: f64,
    pub deferral_mode: DeferralMode,
    pub deferral_percent: f64,
    pub deferral_per_paycheck: f64,
    pub pay_periods_per_year: u32,
    pub employer_max_deferral_percent: Option<f64>,
    pub employer_deferral_cap: Option<f64>,
    pub irs_deferral_limit: f64,
    pub ira_contribution_limit: f64,
    pub match_tiers: Vec<MatchTier>,
}

impl Default for IncomeParams {
    fn default() -> Self {
        Self {
            salary: 180_000.0,
            salary_growth_rate: 0.03,
            deferral_mode: DeferralMode::Percent,
            deferral_percent: 0.10,
            deferral_per_paycheck: 700.0,
            pay_periods_per_year: 26,
            employer_max_deferral_percent: None,
            employer_deferral_cap: None,
            irs_deferral_limit: 23_500.0,
            ira_contribution_limit: 7_000.0,
            match_tiers: vec![
                MatchTier {
                    match_rate: 1.0,
                    covered_percent: 0.03,
                },
                MatchTier {
                    match_rate: 0.5,
                    covered_percent: 0.02,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialSecurityParams {
    pub monthly_benefit_at_fra: f64,
    pub quarters_earned: u32,
    pub cola: f64,
}

impl Default for SocialSecurityParams {
    fn default() -> Self {
        Self {
            monthly_benefit_at_fra: 3_200.0,
            quarters_earned: 40,
            cola: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Balances {
    pub trad_401k: f64,
    pub roth_401k: f64,
    pub trad_ira: f64,
    pub roth_ira: f64,
    pub brokerage: f64,
    pub education_529: f64,
    pub foreign_pension: f64,
}

impl Balances {
    pub fn total(&self) -> f64 {
        self.trad_401k
            + self.roth_401k
            + self.trad_ira
            + self.roth_ira
            + self.brokerage
            + self.education_529
            + self.foreign_pension
    }

    pub fn get(&self, kind: AccountKind) -> f64 {
        match kind {
            AccountKind::Trad401k => self.trad_401k,
            AccountKind::Roth401k => self.roth_401k,
            AccountKind::TradIra => self.trad_ira,
            AccountKind::RothIra => self.roth_ira,
            AccountKind::Brokerage => self.brokerage,
            AccountKind::Education529 => self.education_529,
            AccountKind::ForeignPension => self.foreign_pension,
        }
    }

    pub fn tax_deferred(&self) -> f64 {
        self.trad_401k + self.trad_ira
    }

    pub fn tax_free(&self) -> f64 {
        self.roth_401k + self.roth_ira
    }

    pub fn empty() -> Self {
        Self {
            trad_401k: 0.0,
            roth_401k: 0.0,
            trad_ira: 0.0,
            roth_ira: 0.0,
            brokerage: 0.0,
            education_529: 0.0,
            foreign_pension: 0.0,
        }
    }
}

impl Default for Balances {
    fn default() -> Self {
        Self {
            trad_401k: 420_000.0,
            roth_401k: 40_000.0,
            trad_ira: 60_000.0,
            roth_ira: 55_000.0,
            brokerage: 150_000.0,
            education_529: 30_000.0,
            foreign_pension: 25_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrowthRates {
    pub trad_401k: f64,
    pub roth_401k: f64,
    pub trad_ira: f64,
    pub roth_ira: f64,
    pub brokerage: f64,
    pub education_529: f64,
    pub foreign_pension: f64,
}

impl GrowthRates {
    pub fn get(&self, kind: AccountKind) -> f64 {
        match kind {
            AccountKind::Trad401k => self.trad_401k,
            AccountKind::Roth401k => self.roth_401k,
            AccountKind::TradIra => self.trad_ira,
            AccountKind::RothIra => self.roth_ira,
            AccountKind::Brokerage => self.brokerage,
            AccountKind::Education529 => self.education_529,
            AccountKind::ForeignPension => self.foreign_pension,
        }
    }

    /// Unweighted mean across the seven account kinds.
    pub fn average(&self) -> f64 {
        AccountKind::ALL.iter().map(|k| self.get(*k)).sum::<f64>() / AccountKind::ALL.len() as f64
    }

    pub fn uniform(rate: f64) -> Self {
        Self {
            trad_401k: rate,
            roth_401k: rate,
            trad_ira: rate,
            roth_ira: rate,
            brokerage: rate,
            education_529: rate,
            foreign_pension: rate,
        }
    }
}

impl Default for GrowthRates {
    fn default() -> Self {
        Self {
            trad_401k: 0.07,
            roth_401k: 0.07,
            trad_ira: 0.07,
            roth_ira: 0.07,
            brokerage: 0.06,
            education_529: 0.05,
            foreign_pension: 0.04,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HousingParams {
    pub home_value: f64,
    pub home_appreciation: f64,
    pub mortgage_balance: f64,
    pub mortgage_rate: f64,
    /// Annual principal + interest.
    pub mortgage_payment: f64,
    pub property_tax: f64,
    pub insurance: f64,
    pub maintenance: f64,
}

impl HousingParams {
    pub fn non_mortgage_cost(&self) -> f64 {
        self.property_tax + self.insurance + self.maintenance
    }
}

impl Default for HousingParams {
    fn default() -> Self {
        Self {
            home_value: 700_000.0,
            home_appreciation: 0.03,
            mortgage_balance: 250_000.0,
            mortgage_rate: 0.035,
            mortgage_payment: 24_000.0,
            property_tax: 7_000.0,
            insurance: 2_000.0,
            maintenance: 5_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpenseParams {
    pub living: f64,
    pub healthcare: f64,
    pub inflation_rate: f64,
    pub healthcare_inflation_rate: f64,
    pub medicare_reduction: f64,
    pub relocation_scale: f64,
}

impl Default for ExpenseParams {
    fn default() -> Self {
        Self {
            living: 60_000.0,
            healthcare: 12_000.0,
            inflation_rate: 0.025,
            healthcare_inflation_rate: 0.05,
            medicare_reduction: 0.30,
            relocation_scale: 0.80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxConfig {
    pub mode: TaxMode,
    pub flat_rate: f64,
    pub standard_deduction: f64,
    pub capital_gains_taxable_portion: f64,
    pub state_rate: f64,
    pub social_security_taxable_portion: f64,
    pub early_withdrawal_penalty_rate: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            mode: TaxMode::Brackets,
            flat_rate: 0.20,
            standard_deduction: standard_deduction(FilingStatus::MarriedFilingJointly),
            capital_gains_taxable_portion: 0.50,
            state_rate: 0.044,
            social_security_taxable_portion: 0.85,
            early_withdrawal_penalty_rate: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensitivityConfig {
    pub bear_delta: f64,
    pub bull_delta: f64,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            bear_delta: -0.04,
            bull_delta: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalParams {
    pub target_net_worth: f64,
}

impl Default for GoalParams {
    fn default() -> Self {
        Self {
            target_net_worth: 3_000_000.0,
        }
    }
}

/// Complete household plan. Read-only for the duration of a run.
///
/// Every section implements `Default`, so a partial JSON document overlays the
/// default household.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PlanDocument", rename_all = "camelCase")]
pub struct Plan {
    pub personal: PersonalInfo,
    pub income: IncomeParams,
    pub social_security: SocialSecurityParams,
    pub balances: Balances,
    pub housing: HousingParams,
    pub expenses: ExpenseParams,
    pub growth: GrowthRates,
    pub tax: TaxConfig,
    pub sensitivity: SensitivityConfig,
    pub goal: GoalParams,
    pub moves: Vec<Move>,
}

impl Default for Plan {
    fn default() -> Self {
        let personal = PersonalInfo::default();
        let moves = default_moves(&personal);
        Self {
            personal,
            income: IncomeParams::default(),
            social_security: SocialSecurityParams::default(),
            balances: Balances::default(),
            housing: HousingParams::default(),
            expenses: ExpenseParams::default(),
            growth: GrowthRates::default(),
            tax: TaxConfig::default(),
            sensitivity: SensitivityConfig::default(),
            goal: GoalParams::default(),
            moves,
        }
    }
}

/// Wire form of a plan. Moves are resolved against the document's own
/// personal info; a document without moves gets the full catalog.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanDocument {
    personal: PersonalInfo,
    income: IncomeParams,
    social_security: SocialSecurityParams,
    balances: Balances,
    housing: HousingParams,
    expenses: ExpenseParams,
    growth: GrowthRates,
    tax: TaxConfig,
    sensitivity: SensitivityConfig,
    goal: GoalParams,
    moves: Option<Vec<RawMove>>,
}

impl From<PlanDocument> for Plan {
    fn from(doc: PlanDocument) -> Self {
        let moves = match doc.moves {
            Some(raw) => raw.into_iter().map(|mv| mv.resolve(&doc.personal)).collect(),
            None => default_moves(&doc.personal),
        };
        Self {
            personal: doc.personal,
            income: doc.income,
            social_security: doc.social_security,
            balances: doc.balances,
            housing: doc.housing,
            expenses: doc.expenses,
            growth: doc.growth,
            tax: doc.tax,
            sensitivity: doc.sensitivity,
            goal: doc.goal,
            moves,
        }
    }
}

impl Plan {
    pub fn move_mut(&mut self, id: MoveId) -> Option<&mut Move> {
        self.moves.iter_mut().find(|m| m.id == id)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearStatus {
    Ok,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeBreakdown {
    pub w2: f64,
    pub social_security: f64,
    pub spousal_benefit: f64,
    pub part_time: f64,
    pub rental: f64,
    /// Recurring withdrawal moves, including RMDs, that land as spendable cash.
    pub portfolio_withdrawals: f64,
    pub auto_withdrawals: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionBreakdown {
    pub trad_401k: f64,
    pub roth_401k: f64,
    pub catch_up: f64,
    pub employer_match: f64,
    pub mega_backdoor: f64,
    pub trad_ira: f64,
    pub roth_ira: f64,
    pub backdoor_roth: f64,
    pub brokerage: f64,
    pub education_529: f64,
    pub foreign_pension: f64,
}

impl ContributionBreakdown {
    /// Contributions paid out of the household's own cash (excludes employer match).
    pub fn employee_total(&self) -> f64 {
        self.trad_401k
            + self.roth_401k
            + self.catch_up
            + self.mega_backdoor
            + self.trad_ira
            + self.roth_ira
            + self.backdoor_roth
            + self.brokerage
            + self.education_529
            + self.foreign_pension
    }

    pub fn pre_tax(&self) -> f64 {
        self.trad_401k + self.catch_up + self.trad_ira
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionBreakdown {
    pub roth_ladder: f64,
    pub ira_partial: f64,
    pub rollover_401k: f64,
    pub rollover_roth_401k: f64,
    pub ira_lump_sum: f64,
    pub pension_liquidation: f64,
}

impl ConversionBreakdown {
    pub fn roth_conversions(&self) -> f64 {
        self.roth_ladder + self.ira_partial
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalBreakdown {
    pub brokerage: f64,
    pub trad_ira: f64,
    pub roth_ira: f64,
    pub sepp: f64,
    pub education: f64,
    pub rmd: f64,
    pub auto_brokerage: f64,
    pub auto_tax_deferred: f64,
    pub auto_roth: f64,
}

impl WithdrawalBreakdown {
    pub fn recurring_total(&self) -> f64 {
        self.brokerage + self.trad_ira + self.roth_ira + self.sepp + self.education + self.rmd
    }

    pub fn auto_total(&self) -> f64 {
        self.auto_brokerage + self.auto_tax_deferred + self.auto_roth
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub ordinary_income: f64,
    pub taxable_ordinary_income: f64,
    pub capital_gains: f64,
    pub taxable_social_security: f64,
    pub federal: f64,
    pub capital_gains_tax: f64,
    pub state: f64,
    pub early_withdrawal_penalty: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBreakdown {
    pub living: f64,
    pub housing: f64,
    pub healthcare: f64,
    pub travel: f64,
    pub long_term_care: f64,
    pub education: f64,
    pub one_time: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearResult {
    pub age: u32,
    pub is_retired: bool,
    pub income: IncomeBreakdown,
    pub contributions: ContributionBreakdown,
    pub conversions: ConversionBreakdown,
    pub withdrawals: WithdrawalBreakdown,
    pub taxes: TaxBreakdown,
    pub expenses: ExpenseBreakdown,
    pub cash_flow: f64,
    pub balances: Balances,
    pub total_net_worth: f64,
    pub bear_net_worth: f64,
    pub bull_net_worth: f64,
    pub bear_status: YearStatus,
    pub bull_status: YearStatus,
    pub home_equity: f64,
    pub harvest_capacity: f64,
    pub active_moves: Vec<MoveId>,
    pub status: YearStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAgeNetWorth {
    pub start: f64,
    pub retirement: Option<f64>,
    pub age_65: Option<f64>,
    pub age_73: Option<f64>,
    pub terminal: f64,
    pub peak: f64,
    pub peak_age: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityOutcome {
    pub first_failure_age: Option<u32>,
    pub terminal_net_worth: f64,
    pub survives: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub first_failure_age: Option<u32>,
    pub survives: bool,
    pub years_ok: u32,
    pub years_failed: u32,
    pub total_income: f64,
    pub total_taxes: f64,
    pub total_federal_tax: f64,
    pub total_capital_gains_tax: f64,
    pub total_state_tax: f64,
    pub total_penalties: f64,
    pub total_expenses: f64,
    pub total_contributions: f64,
    pub total_employer_match: f64,
    pub total_conversions: f64,
    pub total_withdrawals: f64,
    pub effective_tax_rate: f64,
    pub net_worth: KeyAgeNetWorth,
    /// Retirement years funded before the first failure.
    pub runway_years: u32,
    pub harvest_capacity: f64,
    pub avg_working_cash_flow: f64,
    pub avg_retirement_cash_flow: f64,
    pub bear: SensitivityOutcome,
    pub bull: SensitivityOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutput {
    pub years: Vec<YearResult>,
    pub summary: SimulationSummary,
}
