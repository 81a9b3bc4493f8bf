//! The catalog of financial moves, the per-run lookup table and one-shot
//! trigger bookkeeping.

use serde::{Deserialize, Serialize};

use super::types::PersonalInfo;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveCategory {
    Contribution,
    Conversion,
    Withdrawal,
    Income,
    SocialSecurity,
    Lifestyle,
    Rule,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveUnit {
    Fixed,
    PercentOfBalance,
    Auto,
    FullBalanceOnce,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveId {
    #[serde(rename = "trad_401k_contribution")]
    Trad401kContribution,
    #[serde(rename = "roth_401k_contribution")]
    Roth401kContribution,
    CatchUpContribution,
    EmployerMatch,
    MegaBackdoorRoth,
    TradIraContribution,
    RothIraContribution,
    BackdoorRoth,
    BrokerageContribution,
    #[serde(rename = "education_529_contribution")]
    Education529Contribution,
    ForeignPensionContribution,
    #[serde(rename = "rollover_401k_to_ira")]
    Rollover401kToIra,
    #[serde(rename = "rollover_roth_401k_to_roth_ira")]
    RolloverRoth401kToRothIra,
    RothLadder,
    IraPartialConversion,
    AutoWithdraw,
    BrokerageWithdrawal,
    TradIraWithdrawal,
    RothIraWithdrawal,
    #[serde(rename = "sepp_72t")]
    Sepp72t,
    EducationWithdrawal,
    IraLumpSum,
    PartTimeWork,
    RentalIncome,
    ClaimSocialSecurity,
    SpousalBenefit,
    SellHouse,
    PayOffMortgage,
    Relocate,
    Downsize,
    LiquidateForeignPension,
    TravelBudget,
    LongTermCare,
    RequiredMinimumDistribution,
    CapitalGainsHarvest,
    EarlyWithdrawalPenalty,
    MedicareTransition,
    SocialSecurityTaxation,
}

impl MoveId {
    pub const COUNT: usize = 38;

    pub const ALL: [MoveId; MoveId::COUNT] = [
        MoveId::Trad401kContribution,
        MoveId::Roth401kContribution,
        MoveId::CatchUpContribution,
        MoveId::EmployerMatch,
        MoveId::MegaBackdoorRoth,
        MoveId::TradIraContribution,
        MoveId::RothIraContribution,
        MoveId::BackdoorRoth,
        MoveId::BrokerageContribution,
        MoveId::Education529Contribution,
        MoveId::ForeignPensionContribution,
        MoveId::Rollover401kToIra,
        MoveId::RolloverRoth401kToRothIra,
        MoveId::RothLadder,
        MoveId::IraPartialConversion,
        MoveId::AutoWithdraw,
        MoveId::BrokerageWithdrawal,
        MoveId::TradIraWithdrawal,
        MoveId::RothIraWithdrawal,
        MoveId::Sepp72t,
        MoveId::EducationWithdrawal,
        MoveId::IraLumpSum,
        MoveId::PartTimeWork,
        MoveId::RentalIncome,
        MoveId::ClaimSocialSecurity,
        MoveId::SpousalBenefit,
        MoveId::SellHouse,
        MoveId::PayOffMortgage,
        MoveId::Relocate,
        MoveId::Downsize,
        MoveId::LiquidateForeignPension,
        MoveId::TravelBudget,
        MoveId::LongTermCare,
        MoveId::RequiredMinimumDistribution,
        MoveId::CapitalGainsHarvest,
        MoveId::EarlyWithdrawalPenalty,
        MoveId::MedicareTransition,
        MoveId::SocialSecurityTaxation,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn template(self) -> &'static MoveTemplate {
        &CATALOG[self.index()]
    }

    pub fn category(self) -> MoveCategory {
        self.template().category
    }

    /// Moves that execute once, in the year their start age is reached.
    pub fn is_one_shot(self) -> bool {
        matches!(
            self,
            MoveId::Rollover401kToIra
                | MoveId::RolloverRoth401kToRothIra
                | MoveId::IraLumpSum
                | MoveId::SellHouse
                | MoveId::PayOffMortgage
                | MoveId::Relocate
                | MoveId::Downsize
                | MoveId::LiquidateForeignPension
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DefaultStart {
    Current,
    Retirement,
    Age(u32),
}

impl DefaultStart {
    fn resolve(self, personal: &PersonalInfo) -> u32 {
        match self {
            DefaultStart::Current => personal.current_age,
            DefaultStart::Retirement => personal.retirement_age,
            DefaultStart::Age(age) => age,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MoveTemplate {
    pub id: MoveId,
    pub name: &'static str,
    pub category: MoveCategory,
    pub start: DefaultStart,
    pub amount: f64,
    pub unit: MoveUnit,
    pub enabled: bool,
}

const fn template(
    id: MoveId,
    name: &'static str,
    category: MoveCategory,
    start: DefaultStart,
    amount: f64,
    unit: MoveUnit,
    enabled: bool,
) -> MoveTemplate {
    MoveTemplate {
        id,
        name,
        category,
        start,
        amount,
        unit,
        enabled,
    }
}

use DefaultStart::{Age, Current, Retirement};
use MoveCategory as C;
use MoveUnit as U;

/// Read-only template, in `MoveId` order. Plans receive copies.
#[rustfmt::skip]
pub static CATALOG: [MoveTemplate; MoveId::COUNT] = [
    template(MoveId::Trad401kContribution, "Traditional 401(k) contributions", C::Contribution, Current, 0.0, U::Auto, true),
    template(MoveId::Roth401kContribution, "Roth 401(k) contributions", C::Contribution, Current, 0.0, U::Auto, false),
    template(MoveId::CatchUpContribution, "401(k) catch-up contributions", C::Contribution, Age(50), 7_500.0, U::Fixed, true),
    template(MoveId::EmployerMatch, "Employer match", C::Contribution, Current, 0.0, U::Auto, true),
    template(MoveId::MegaBackdoorRoth, "Mega backdoor Roth", C::Contribution, Current, 15_000.0, U::Fixed, false),
    template(MoveId::TradIraContribution, "Traditional IRA contributions", C::Contribution, Current, 7_000.0, U::Fixed, false),
    template(MoveId::RothIraContribution, "Roth IRA contributions", C::Contribution, Current, 7_000.0, U::Fixed, false),
    template(MoveId::BackdoorRoth, "Backdoor Roth IRA", C::Contribution, Current, 7_000.0, U::Fixed, true),
    template(MoveId::BrokerageContribution, "Brokerage savings", C::Contribution, Current, 12_000.0, U::Fixed, true),
    template(MoveId::Education529Contribution, "529 plan contributions", C::Contribution, Current, 5_000.0, U::Fixed, true),
    template(MoveId::ForeignPensionContribution, "Foreign pension contributions", C::Contribution, Current, 3_000.0, U::Fixed, false),
    template(MoveId::Rollover401kToIra, "Roll 401(k) into IRA", C::Conversion, Retirement, 0.0, U::FullBalanceOnce, true),
    template(MoveId::RolloverRoth401kToRothIra, "Roll Roth 401(k) into Roth IRA", C::Conversion, Retirement, 0.0, U::FullBalanceOnce, true),
    template(MoveId::RothLadder, "Roth conversion ladder", C::Conversion, Retirement, 40_000.0, U::Fixed, true),
    template(MoveId::IraPartialConversion, "Partial IRA conversion", C::Conversion, Retirement, 0.05, U::PercentOfBalance, false),
    template(MoveId::AutoWithdraw, "Automatic retirement withdrawals", C::Withdrawal, Retirement, 0.0, U::Auto, true),
    template(MoveId::BrokerageWithdrawal, "Fixed brokerage withdrawals", C::Withdrawal, Retirement, 20_000.0, U::Fixed, false),
    template(MoveId::TradIraWithdrawal, "Fixed IRA withdrawals", C::Withdrawal, Retirement, 20_000.0, U::Fixed, false),
    template(MoveId::RothIraWithdrawal, "Fixed Roth IRA withdrawals", C::Withdrawal, Retirement, 10_000.0, U::Fixed, false),
    template(MoveId::Sepp72t, "72(t) equal periodic payments", C::Withdrawal, Retirement, 24_000.0, U::Fixed, false),
    template(MoveId::EducationWithdrawal, "529 tuition withdrawals", C::Withdrawal, Age(50), 25_000.0, U::Fixed, true),
    template(MoveId::IraLumpSum, "IRA lump-sum distribution", C::Withdrawal, Retirement, 0.0, U::FullBalanceOnce, false),
    template(MoveId::PartTimeWork, "Part-time work", C::Income, Retirement, 30_000.0, U::Fixed, false),
    template(MoveId::RentalIncome, "Rental income", C::Income, Current, 18_000.0, U::Fixed, false),
    template(MoveId::ClaimSocialSecurity, "Claim Social Security", C::SocialSecurity, Age(67), 0.0, U::Auto, true),
    template(MoveId::SpousalBenefit, "Spousal benefit", C::SocialSecurity, Age(67), 0.5, U::Auto, false),
    template(MoveId::SellHouse, "Sell the house", C::Lifestyle, Age(70), 0.0, U::FullBalanceOnce, false),
    template(MoveId::PayOffMortgage, "Pay off mortgage", C::Lifestyle, Retirement, 0.0, U::FullBalanceOnce, false),
    template(MoveId::Relocate, "Relocate", C::Lifestyle, Retirement, 15_000.0, U::Fixed, false),
    template(MoveId::Downsize, "Downsize home", C::Lifestyle, Age(70), 0.5, U::PercentOfBalance, false),
    template(MoveId::LiquidateForeignPension, "Cash out foreign pension", C::Lifestyle, Age(65), 0.0, U::FullBalanceOnce, true),
    template(MoveId::TravelBudget, "Travel budget", C::Lifestyle, Retirement, 10_000.0, U::Fixed, true),
    template(MoveId::LongTermCare, "Long-term care", C::Lifestyle, Age(78), 40_000.0, U::Fixed, false),
    template(MoveId::RequiredMinimumDistribution, "Required minimum distributions", C::Rule, Age(73), 0.0, U::Auto, true),
    template(MoveId::CapitalGainsHarvest, "Capital-gains harvesting", C::Rule, Retirement, 0.0, U::Auto, true),
    template(MoveId::EarlyWithdrawalPenalty, "Early-withdrawal penalty", C::Rule, Current, 0.0, U::Auto, true),
    template(MoveId::MedicareTransition, "Medicare transition", C::Rule, Age(65), 0.0, U::Auto, true),
    template(MoveId::SocialSecurityTaxation, "Social Security taxation", C::Rule, Current, 0.0, U::Auto, true),
];

/// Advisory pairs. Both sides may be enabled; the engine applies both.
pub const CONFLICT_PAIRS: [(MoveId, MoveId); 8] = [
    (MoveId::Trad401kContribution, MoveId::Roth401kContribution),
    (MoveId::TradIraContribution, MoveId::BackdoorRoth),
    (MoveId::RothIraContribution, MoveId::BackdoorRoth),
    (MoveId::TradIraWithdrawal, MoveId::Sepp72t),
    (MoveId::Sepp72t, MoveId::IraLumpSum),
    (MoveId::SellHouse, MoveId::Downsize),
    (MoveId::SellHouse, MoveId::PayOffMortgage),
    (MoveId::ForeignPensionContribution, MoveId::LiquidateForeignPension),
];

/// `(move, prerequisite)`. Satisfied by the order of the yearly pipeline.
pub const DEPENDENCIES: [(MoveId, MoveId); 3] = [
    (MoveId::CatchUpContribution, MoveId::Trad401kContribution),
    (MoveId::IraPartialConversion, MoveId::Rollover401kToIra),
    (MoveId::SpousalBenefit, MoveId::ClaimSocialSecurity),
];

pub fn conflicts_of(id: MoveId) -> Vec<MoveId> {
    CONFLICT_PAIRS
        .iter()
        .filter_map(|&(a, b)| {
            if a == id {
                Some(b)
            } else if b == id {
                Some(a)
            } else {
                None
            }
        })
        .collect()
}

pub fn dependencies_of(id: MoveId) -> Vec<MoveId> {
    DEPENDENCIES
        .iter()
        .filter(|(dependent, _)| *dependent == id)
        .map(|(_, prerequisite)| *prerequisite)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMove", rename_all = "camelCase")]
pub struct Move {
    pub id: MoveId,
    pub name: String,
    pub category: MoveCategory,
    pub enabled: bool,
    pub start_age: u32,
    pub amount: f64,
    pub unit: MoveUnit,
    pub conflicts: Vec<MoveId>,
    pub depends_on: Vec<MoveId>,
}

impl Move {
    pub fn from_template(template: &MoveTemplate, start_age: u32) -> Self {
        Self {
            id: template.id,
            name: template.name.to_string(),
            category: template.category,
            enabled: template.enabled,
            start_age,
            amount: template.amount,
            unit: template.unit,
            conflicts: conflicts_of(template.id),
            depends_on: dependencies_of(template.id),
        }
    }

    pub fn is_active(&self, age: u32) -> bool {
        self.enabled && age >= self.start_age
    }

    /// Amount this move moves out of (or into) an account holding `balance`.
    /// `Auto` moves are sized by the engine and resolve to zero here.
    pub fn resolve_amount(&self, balance: f64) -> f64 {
        let amount = match self.unit {
            MoveUnit::Fixed => self.amount,
            MoveUnit::PercentOfBalance => self.amount * balance,
            MoveUnit::Auto => 0.0,
            MoveUnit::FullBalanceOnce => balance,
        };
        amount.max(0.0)
    }
}

/// Wire form of a move; anything omitted falls back to the catalog template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMove {
    id: MoveId,
    name: Option<String>,
    category: Option<MoveCategory>,
    enabled: Option<bool>,
    start_age: Option<u32>,
    amount: Option<f64>,
    unit: Option<MoveUnit>,
    conflicts: Option<Vec<MoveId>>,
    depends_on: Option<Vec<MoveId>>,
}

impl RawMove {
    /// Fills omitted fields from the template. A missing start age follows
    /// the template's default start for `personal`.
    pub fn resolve(self, personal: &PersonalInfo) -> Move {
        let template = self.id.template();
        let base = Move::from_template(template, template.start.resolve(personal));
        Move {
            id: self.id,
            name: self.name.unwrap_or(base.name),
            category: self.category.unwrap_or(base.category),
            enabled: self.enabled.unwrap_or(base.enabled),
            start_age: self.start_age.unwrap_or(base.start_age),
            amount: self.amount.unwrap_or(base.amount),
            unit: self.unit.unwrap_or(base.unit),
            conflicts: self.conflicts.unwrap_or(base.conflicts),
            depends_on: self.depends_on.unwrap_or(base.depends_on),
        }
    }
}

/// A move parsed on its own resolves against the default household.
impl From<RawMove> for Move {
    fn from(raw: RawMove) -> Self {
        raw.resolve(&PersonalInfo::default())
    }
}

/// Fresh copy of the catalog with start ages resolved against `personal`.
pub fn default_moves(personal: &PersonalInfo) -> Vec<Move> {
    CATALOG
        .iter()
        .map(|t| Move::from_template(t, t.start.resolve(personal)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictWarning {
    pub move_id: MoveId,
    pub conflicts_with: Vec<MoveId>,
}

pub fn detect_conflicts(moves: &[Move]) -> Vec<ConflictWarning> {
    let mut enabled = [false; MoveId::COUNT];
    for mv in moves.iter().filter(|m| m.enabled) {
        enabled[mv.id.index()] = true;
    }

    let mut reported = [false; MoveId::COUNT];
    let mut warnings = Vec::new();
    for mv in moves.iter().filter(|m| m.enabled) {
        if reported[mv.id.index()] {
            continue;
        }
        reported[mv.id.index()] = true;

        let conflicts_with: Vec<MoveId> = conflicts_of(mv.id)
            .into_iter()
            .filter(|other| enabled[other.index()])
            .collect();
        if !conflicts_with.is_empty() {
            warnings.push(ConflictWarning {
                move_id: mv.id,
                conflicts_with,
            });
        }
    }
    warnings
}

/// Per-run index over a plan's moves. The first entry for an id wins.
pub struct MoveTable<'a> {
    slots: [Option<&'a Move>; MoveId::COUNT],
    ordered: &'a [Move],
}

impl<'a> MoveTable<'a> {
    pub fn build(moves: &'a [Move]) -> Self {
        let mut slots: [Option<&'a Move>; MoveId::COUNT] = [None; MoveId::COUNT];
        for mv in moves {
            let slot = &mut slots[mv.id.index()];
            if slot.is_none() {
                *slot = Some(mv);
            }
        }
        Self {
            slots,
            ordered: moves,
        }
    }

    pub fn get(&self, id: MoveId) -> Option<&'a Move> {
        self.slots[id.index()]
    }

    pub fn active(&self, id: MoveId, age: u32) -> Option<&'a Move> {
        self.get(id).filter(|m| m.is_active(age))
    }

    pub fn is_active(&self, id: MoveId, age: u32) -> bool {
        self.active(id, age).is_some()
    }

    /// Active move ids in plan order.
    pub fn active_ids(&self, age: u32) -> Vec<MoveId> {
        self.ordered
            .iter()
            .filter(|m| {
                self.get(m.id).is_some_and(|indexed| std::ptr::eq(indexed, *m)) && m.is_active(age)
            })
            .map(|m| m.id)
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Trigger {
    #[default]
    NotTriggered,
    Triggered,
}

/// Execution state of every one-shot move for a single run.
#[derive(Debug, Clone)]
pub struct OneShotTriggers {
    states: [Trigger; MoveId::COUNT],
}

impl Default for OneShotTriggers {
    fn default() -> Self {
        Self {
            states: [Trigger::NotTriggered; MoveId::COUNT],
        }
    }
}

impl OneShotTriggers {
    /// Fires `mv` if this is the year its start age is reached and it has not
    /// fired before. Returns whether it fired.
    pub fn fire(&mut self, mv: &Move, age: u32) -> bool {
        if !mv.id.is_one_shot() || !mv.is_active(age) || age != mv.start_age {
            return false;
        }
        let state = &mut self.states[mv.id.index()];
        match *state {
            Trigger::Triggered => false,
            Trigger::NotTriggered => {
                *state = Trigger::Triggered;
                true
            }
        }
    }

    pub fn is_triggered(&self, id: MoveId) -> bool {
        self.states[id.index()] == Trigger::Triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personal() -> PersonalInfo {
        PersonalInfo {
            current_age: 40,
            retirement_age: 58,
            ..PersonalInfo::default()
        }
    }

    fn with_enabled(mut moves: Vec<Move>, ids: &[MoveId]) -> Vec<Move> {
        for mv in &mut moves {
            mv.enabled = ids.contains(&mv.id);
        }
        moves
    }

    #[test]
    fn catalog_is_in_id_order_and_complete() {
        assert_eq!(CATALOG.len(), MoveId::COUNT);
        for (idx, template) in CATALOG.iter().enumerate() {
            assert_eq!(template.id, MoveId::ALL[idx]);
            assert_eq!(template.id.index(), idx);
        }
    }

    #[test]
    fn default_moves_resolve_start_ages_against_personal_info() {
        let moves = default_moves(&personal());
        let table = MoveTable::build(&moves);
        assert_eq!(table.get(MoveId::Trad401kContribution).map(|m| m.start_age), Some(40));
        assert_eq!(table.get(MoveId::AutoWithdraw).map(|m| m.start_age), Some(58));
        assert_eq!(table.get(MoveId::ClaimSocialSecurity).map(|m| m.start_age), Some(67));
    }

    #[test]
    fn default_moves_are_independent_copies() {
        let mut first = default_moves(&personal());
        first[0].amount = 123.0;
        first[0].enabled = false;
        let second = default_moves(&personal());
        assert_eq!(second[0].amount, CATALOG[0].amount);
        assert!(second[0].enabled);
    }

    #[test]
    fn move_is_active_from_start_age_onwards() {
        let moves = default_moves(&personal());
        let table = MoveTable::build(&moves);
        assert!(!table.is_active(MoveId::AutoWithdraw, 57));
        assert!(table.is_active(MoveId::AutoWithdraw, 58));
        assert!(table.is_active(MoveId::AutoWithdraw, 79));
    }

    #[test]
    fn disabled_move_is_never_active() {
        let moves = with_enabled(default_moves(&personal()), &[]);
        let table = MoveTable::build(&moves);
        assert!(MoveId::ALL.iter().all(|id| !table.is_active(*id, 90)));
        assert!(table.active_ids(90).is_empty());
    }

    #[test]
    fn active_ids_preserve_plan_order() {
        let mut moves = with_enabled(
            default_moves(&personal()),
            &[MoveId::TravelBudget, MoveId::BrokerageContribution],
        );
        moves.reverse();
        let table = MoveTable::build(&moves);
        assert_eq!(
            table.active_ids(70),
            vec![MoveId::TravelBudget, MoveId::BrokerageContribution]
        );
    }

    #[test]
    fn first_duplicate_wins_in_table() {
        let mut moves = default_moves(&personal());
        let mut duplicate = moves[0].clone();
        duplicate.amount = 999.0;
        moves.push(duplicate);
        let table = MoveTable::build(&moves);
        assert_eq!(table.get(moves[0].id).map(|m| m.amount), Some(moves[0].amount));
        assert_eq!(
            table
                .active_ids(41)
                .iter()
                .filter(|id| **id == moves[0].id)
                .count(),
            1
        );
    }

    #[test]
    fn one_shot_fires_exactly_once_at_start_age() {
        let moves = with_enabled(default_moves(&personal()), &[MoveId::SellHouse]);
        let table = MoveTable::build(&moves);
        let sell = table.get(MoveId::SellHouse).expect("catalog move");
        let mut triggers = OneShotTriggers::default();

        assert!(!triggers.fire(sell, 69));
        assert!(triggers.fire(sell, 70));
        assert!(!triggers.fire(sell, 70));
        assert!(!triggers.fire(sell, 71));
        assert!(triggers.is_triggered(MoveId::SellHouse));
    }

    #[test]
    fn recurring_moves_never_fire_as_one_shots() {
        let moves = default_moves(&personal());
        let table = MoveTable::build(&moves);
        let travel = table.get(MoveId::TravelBudget).expect("catalog move");
        let mut triggers = OneShotTriggers::default();
        assert!(!triggers.fire(travel, travel.start_age));
    }

    #[test]
    fn resolve_amount_follows_unit() {
        let mut mv = Move::from_template(MoveId::RothLadder.template(), 60);
        assert_eq!(mv.resolve_amount(1_000_000.0), 40_000.0);
        mv.unit = MoveUnit::PercentOfBalance;
        mv.amount = 0.1;
        assert_eq!(mv.resolve_amount(50_000.0), 5_000.0);
        mv.unit = MoveUnit::FullBalanceOnce;
        assert_eq!(mv.resolve_amount(50_000.0), 50_000.0);
        mv.unit = MoveUnit::Auto;
        assert_eq!(mv.resolve_amount(50_000.0), 0.0);
    }

    #[test]
    fn detect_conflicts_reports_both_sides_of_enabled_pairs() {
        let moves = with_enabled(
            default_moves(&personal()),
            &[
                MoveId::Trad401kContribution,
                MoveId::Roth401kContribution,
                MoveId::SellHouse,
            ],
        );
        let warnings = detect_conflicts(&moves);
        assert_eq!(
            warnings,
            vec![
                ConflictWarning {
                    move_id: MoveId::Trad401kContribution,
                    conflicts_with: vec![MoveId::Roth401kContribution],
                },
                ConflictWarning {
                    move_id: MoveId::Roth401kContribution,
                    conflicts_with: vec![MoveId::Trad401kContribution],
                },
            ]
        );
    }

    #[test]
    fn detect_conflicts_lists_every_enabled_partner() {
        let moves = with_enabled(
            default_moves(&personal()),
            &[MoveId::SellHouse, MoveId::Downsize, MoveId::PayOffMortgage],
        );
        let warnings = detect_conflicts(&moves);
        let sell = warnings
            .iter()
            .find(|w| w.move_id == MoveId::SellHouse)
            .expect("sell conflicts");
        assert_eq!(
            sell.conflicts_with,
            vec![MoveId::Downsize, MoveId::PayOffMortgage]
        );
    }

    #[test]
    fn default_catalog_has_no_conflicts() {
        assert!(detect_conflicts(&default_moves(&personal())).is_empty());
    }

    #[test]
    fn move_json_falls_back_to_catalog_template() {
        let mv: Move = serde_json::from_str(r#"{"id": "roth_ladder", "startAge": 62}"#)
            .expect("move should parse");
        assert_eq!(mv.start_age, 62);
        assert_eq!(mv.amount, 40_000.0);
        assert_eq!(mv.category, MoveCategory::Conversion);
        assert!(mv.enabled);

        let partial: Move = serde_json::from_str(r#"{"id": "sepp_72t", "enabled": true}"#)
            .expect("move should parse");
        assert!(partial.enabled);
        assert_eq!(partial.conflicts, vec![MoveId::TradIraWithdrawal, MoveId::IraLumpSum]);
    }

    #[test]
    fn omitted_start_age_follows_the_households_ages() {
        let household = PersonalInfo {
            current_age: 38,
            retirement_age: 55,
            ..personal()
        };
        let raw = |json: &str| serde_json::from_str::<RawMove>(json).expect("move should parse");

        assert_eq!(raw(r#"{"id": "auto_withdraw"}"#).resolve(&household).start_age, 55);
        assert_eq!(raw(r#"{"id": "brokerage_contribution"}"#).resolve(&household).start_age, 38);
        assert_eq!(raw(r#"{"id": "long_term_care"}"#).resolve(&household).start_age, 78);
        assert_eq!(
            raw(r#"{"id": "auto_withdraw", "startAge": 58}"#).resolve(&household).start_age,
            58
        );
    }
}
