use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    ConflictWarning, GoalSolverResult, Move, Plan, SimulationSummary, YearResult, detect_conflicts,
    simulate, solve_goal, standard_deduction,
};

/// Failures at the service edge. The engine itself never errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid plan JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Could not read plan file {path}: {source}")]
    PlanFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{field} must be >= {bound}")]
    AgeOrder {
        field: &'static str,
        bound: &'static str,
    },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status(), &self.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub years: Vec<YearResult>,
    pub summary: SimulationSummary,
    pub warnings: Vec<ConflictWarning>,
}

#[derive(Debug, Serialize)]
struct ConflictsResponse {
    warnings: Vec<ConflictWarning>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/api/plan/default", get(default_plan_handler))
        .route("/api/moves", get(moves_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/goal", post(goal_handler))
        .route("/api/conflicts", post(conflicts_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("runway HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/plan/default");

    axum::serve(listener, router()).await
}

async fn default_plan_handler() -> Response {
    json_response(StatusCode::OK, Plan::default())
}

async fn moves_handler() -> Response {
    json_response(StatusCode::OK, Plan::default().moves)
}

async fn simulate_handler(body: String) -> Response {
    respond(simulate_from_json(&body))
}

async fn goal_handler(body: String) -> Response {
    respond(plan_from_json(&body).map(|plan| solve_goal(&plan)))
}

async fn conflicts_handler(body: String) -> Response {
    respond(conflicts_from_json(&body).map(|warnings| ConflictsResponse { warnings }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            warn!(error = %err, "rejected request");
            err.into_response()
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, axum::Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

/// Overlays a (possibly partial) JSON plan on the default household.
///
/// The standard deduction follows the supplied filing status unless the
/// document sets it explicitly.
pub fn plan_from_json(json: &str) -> Result<Plan, ApiError> {
    let value: serde_json::Value = if json.trim().is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(json)?
    };
    let has_deduction = value.pointer("/tax/standardDeduction").is_some();

    let mut plan: Plan = serde_json::from_value(value)?;
    if !has_deduction {
        plan.tax.standard_deduction = standard_deduction(plan.personal.filing_status);
    }
    validate_plan(&plan)?;
    Ok(plan)
}

pub fn load_plan(path: Option<&Path>) -> Result<Plan, ApiError> {
    let Some(path) = path else {
        return Ok(Plan::default());
    };
    let json = fs::read_to_string(path).map_err(|source| ApiError::PlanFile {
        path: path.display().to_string(),
        source,
    })?;
    plan_from_json(&json)
}

fn validate_plan(plan: &Plan) -> Result<(), ApiError> {
    let personal = &plan.personal;
    if personal.retirement_age < personal.current_age {
        return Err(ApiError::AgeOrder {
            field: "personal.retirementAge",
            bound: "personal.currentAge",
        });
    }
    if personal.terminal_age < personal.retirement_age {
        return Err(ApiError::AgeOrder {
            field: "personal.terminalAge",
            bound: "personal.retirementAge",
        });
    }
    Ok(())
}

pub fn simulate_plan(plan: &Plan) -> SimulateResponse {
    let warnings = detect_conflicts(&plan.moves);
    if !warnings.is_empty() {
        info!(count = warnings.len(), "plan enables conflicting moves");
    }
    let output = simulate(plan);
    SimulateResponse {
        years: output.years,
        summary: output.summary,
        warnings,
    }
}

fn simulate_from_json(json: &str) -> Result<SimulateResponse, ApiError> {
    plan_from_json(json).map(|plan| simulate_plan(&plan))
}

pub fn goal_from_plan(plan: &Plan) -> GoalSolverResult {
    solve_goal(plan)
}

fn conflicts_from_json(json: &str) -> Result<Vec<ConflictWarning>, ApiError> {
    #[derive(serde::Deserialize)]
    struct MovesOnly {
        moves: Option<Vec<Move>>,
    }

    let parsed: MovesOnly = serde_json::from_str(json)?;
    Ok(match parsed.moves {
        Some(moves) => detect_conflicts(&moves),
        None => detect_conflicts(&Plan::default().moves),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FilingStatus, MoveId, YearStatus};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_body_yields_default_household() {
        let plan = plan_from_json("").expect("empty body is the default plan");
        assert_eq!(plan.personal.current_age, 45);
        assert_eq!(plan.moves.len(), MoveId::ALL.len());
        assert_approx(plan.balances.total(), Plan::default().balances.total());
    }

    #[test]
    fn partial_json_overlays_defaults_and_reseeds_moves() {
        let json = r#"{
            "personal": { "currentAge": 40, "retirementAge": 55, "filingStatus": "single" },
            "balances": { "brokerage": 1000000 }
        }"#;
        let plan = plan_from_json(json).expect("valid plan");

        assert_eq!(plan.personal.current_age, 40);
        assert_eq!(plan.personal.terminal_age, 80);
        assert_eq!(plan.personal.filing_status, FilingStatus::Single);
        assert_approx(plan.balances.brokerage, 1_000_000.0);
        assert_approx(plan.balances.trad_401k, Plan::default().balances.trad_401k);
        assert_approx(plan.tax.standard_deduction, 15_000.0);

        let auto = plan
            .moves
            .iter()
            .find(|m| m.id == MoveId::AutoWithdraw)
            .expect("catalog move");
        assert_eq!(auto.start_age, 55);
    }

    #[test]
    fn explicit_moves_and_deduction_are_kept() {
        let json = r#"{
            "tax": { "standardDeduction": 12345 },
            "moves": [{ "id": "sell_house", "enabled": true, "startAge": 66 }]
        }"#;
        let plan = plan_from_json(json).expect("valid plan");
        assert_approx(plan.tax.standard_deduction, 12_345.0);
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].id, MoveId::SellHouse);
        assert_eq!(plan.moves[0].start_age, 66);
    }

    #[test]
    fn moves_without_start_ages_follow_the_plans_own_ages() {
        let json = r#"{
            "personal": { "currentAge": 40, "retirementAge": 55 },
            "moves": [{ "id": "auto_withdraw" }, { "id": "brokerage_contribution" }]
        }"#;
        let plan = plan_from_json(json).expect("valid plan");
        assert_eq!(plan.moves[0].start_age, 55);
        assert_eq!(plan.moves[1].start_age, 40);

        let response = simulate_plan(&plan);
        let at_55 = response
            .years
            .iter()
            .find(|y| y.age == 55)
            .expect("age inside horizon");
        assert!(at_55.withdrawals.auto_total() > 0.0);
        assert!(at_55.active_moves.contains(&MoveId::AutoWithdraw));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = plan_from_json("{ not json").expect_err("must reject");
        assert!(matches!(err, ApiError::InvalidJson(_)));
        assert!(err.to_string().starts_with("Invalid plan JSON"));
    }

    #[test]
    fn rejects_unknown_move_id() {
        let err = plan_from_json(r#"{"moves": [{"id": "buy_yacht"}]}"#).expect_err("must reject");
        assert!(matches!(err, ApiError::InvalidJson(_)));
    }

    #[test]
    fn rejects_retirement_before_current_age() {
        let err = plan_from_json(r#"{"personal": {"currentAge": 50, "retirementAge": 45}}"#)
            .expect_err("must reject");
        assert_eq!(
            err.to_string(),
            "personal.retirementAge must be >= personal.currentAge"
        );
    }

    #[test]
    fn rejects_terminal_before_retirement() {
        let err =
            plan_from_json(r#"{"personal": {"retirementAge": 85}}"#).expect_err("must reject");
        assert!(err.to_string().contains("personal.terminalAge"));
    }

    #[test]
    fn missing_plan_file_is_reported_with_path() {
        let err = load_plan(Some(Path::new("/nonexistent/runway-plan.json")))
            .expect_err("must fail");
        assert!(err.to_string().contains("/nonexistent/runway-plan.json"));
    }

    #[test]
    fn errors_map_to_bad_request() {
        let err = plan_from_json("[").expect_err("must reject");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
    }

    #[test]
    fn simulate_response_carries_conflict_warnings() {
        let json = r#"{
            "moves": [
                { "id": "trad_401k_contribution", "enabled": true, "startAge": 45 },
                { "id": "roth_401k_contribution", "enabled": true, "startAge": 45 }
            ]
        }"#;
        let response = simulate_from_json(json).expect("valid plan");
        assert_eq!(response.warnings.len(), 2);
        assert_eq!(response.years.len(), 36);
        assert!(response.years[0].contributions.trad_401k > 0.0);
        assert!(response.years[0].contributions.roth_401k > 0.0);
    }

    #[test]
    fn simulate_response_serializes_camel_case() {
        let response = simulate_from_json("{}").expect("default plan");
        let json = serde_json::to_value(&response).expect("serializes");
        let first = &json["years"][0];
        assert!(first.get("totalNetWorth").is_some());
        assert!(first.get("bearNetWorth").is_some());
        assert!(first["activeMoves"].is_array());
        assert!(json["summary"].get("firstFailureAge").is_some());
        assert_eq!(first["status"], serde_json::json!("ok"));
        assert_eq!(response.years[0].status, YearStatus::Ok);
    }

    #[test]
    fn goal_uses_the_same_plan_shape() {
        let plan = plan_from_json(r#"{"goal": {"targetNetWorth": 100}}"#).expect("valid plan");
        let result = goal_from_plan(&plan);
        assert_eq!(result.gap, 0.0);
        let json = serde_json::to_value(&result).expect("serializes");
        assert_eq!(json["feasibility"], serde_json::json!("on_track"));
    }

    #[test]
    fn conflicts_default_to_catalog_when_moves_absent() {
        assert!(conflicts_from_json("{}").expect("valid").is_empty());
        let warnings = conflicts_from_json(
            r#"{"moves": [
                {"id": "sell_house", "enabled": true},
                {"id": "downsize", "enabled": true}
            ]}"#,
        )
        .expect("valid");
        assert_eq!(warnings.len(), 2);
    }
}
