mod engine;
mod ledger;
mod moves;
mod sensitivity;
mod solver;
mod tax;
mod types;
mod withdrawal;

pub use engine::simulate;
pub use ledger::{annual_deferral, employer_match};
pub use moves::{
    CATALOG, ConflictWarning, Move, MoveCategory, MoveId, MoveUnit, default_moves,
    detect_conflicts,
};
pub use solver::{Feasibility, GoalSolverResult, SavingsAllocation, solve_goal};
pub use tax::{
    capital_gains_tax, federal_tax, social_security_benefit, standard_deduction, state_tax,
};
pub use types::{
    AccountKind, Balances, DeferralMode, FilingStatus, GrowthRates, Plan, SimulationOutput,
    SimulationSummary, TaxMode, YearResult, YearStatus,
};
