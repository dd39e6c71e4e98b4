use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::core::{
    DEFAULT_MONTHS, FeeRates, FixedCosts, GapAnalysis, ModelError, MonthlyRecord,
    ProjectionSummary, SimulationInputs, UnitCosts, analyze_projection, run_projection,
};

mod report;

pub use report::render_report;

const MAX_MONTHS: u32 = 600;

const DEFAULT_UNIT_PRICE: f64 = 5_000.0;
const DEFAULT_AD_BUDGET: f64 = 1_000_000.0;
const DEFAULT_CPA: f64 = 2_000.0;
const DEFAULT_ORGANIC_BASELINE: u64 = 50;
const DEFAULT_ORGANIC_GROWTH_PCT: f64 = 105.0;
const DEFAULT_GOODS_COST: f64 = 1_000.0;
const DEFAULT_SHIPPING_COST: f64 = 600.0;
const DEFAULT_INFRASTRUCTURE_COST: f64 = 50.0;
const DEFAULT_PAYMENT_FEE_PCT: f64 = 3.6;
const DEFAULT_PLATFORM_FEE_PCT: f64 = 0.0;
const DEFAULT_SALARY: f64 = 2_500_000.0;
const DEFAULT_INSURANCE: f64 = 400_000.0;
const DEFAULT_OUTSOURCING: f64 = 300_000.0;
const DEFAULT_RENT: f64 = 150_000.0;
const DEFAULT_SYSTEMS: f64 = 50_000.0;
const DEFAULT_MISC: f64 = 100_000.0;
const DEFAULT_TARGET_MARGIN_PCT: f64 = 20.0;

#[derive(Args, Debug, Clone)]
pub struct ProjectionArgs {
    #[arg(long, default_value_t = DEFAULT_UNIT_PRICE, help = "Average selling price per unit")]
    unit_price: f64,
    #[arg(long, default_value_t = DEFAULT_AD_BUDGET, help = "Monthly advertising budget")]
    ad_budget: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_CPA,
        help = "Cost per paid acquisition; 0 disables the paid channel"
    )]
    cpa: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ORGANIC_BASELINE,
        help = "Organic acquisitions in the first month"
    )]
    organic_baseline: u64,
    #[arg(
        long,
        default_value_t = DEFAULT_ORGANIC_GROWTH_PCT,
        help = "Organic month-over-month growth in percent, e.g. 105 for +5% a month"
    )]
    organic_growth: f64,
    #[arg(long, default_value_t = DEFAULT_GOODS_COST, help = "Cost of goods per unit")]
    goods_cost: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_SHIPPING_COST,
        help = "Shipping and packaging per unit"
    )]
    shipping_cost: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_INFRASTRUCTURE_COST,
        help = "Per-unit server or system cost"
    )]
    infrastructure_cost: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_PAYMENT_FEE_PCT,
        help = "Payment processing fee in percent of sales"
    )]
    payment_fee: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_PLATFORM_FEE_PCT,
        help = "Marketplace or royalty fee in percent of sales"
    )]
    platform_fee: f64,
    #[arg(long, default_value_t = DEFAULT_SALARY, help = "Monthly salaries")]
    salary: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_INSURANCE,
        help = "Monthly statutory insurance and benefits"
    )]
    insurance: f64,
    #[arg(long, default_value_t = DEFAULT_OUTSOURCING, help = "Monthly outsourcing")]
    outsourcing: f64,
    #[arg(long, default_value_t = DEFAULT_RENT, help = "Monthly rent")]
    rent: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_SYSTEMS,
        help = "Monthly subscriptions and system fees"
    )]
    systems: f64,
    #[arg(long, default_value_t = DEFAULT_MISC, help = "Other monthly fixed costs")]
    misc: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_TARGET_MARGIN_PCT,
        help = "Target operating margin in percent"
    )]
    target_margin: f64,
    #[arg(long, default_value_t = DEFAULT_MONTHS, help = "Number of months to project")]
    months: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    unit_price: Option<f64>,
    ad_budget: Option<f64>,
    cpa: Option<f64>,
    organic_baseline: Option<u64>,
    organic_growth: Option<f64>,

    goods_cost: Option<f64>,
    shipping_cost: Option<f64>,
    infrastructure_cost: Option<f64>,
    payment_fee: Option<f64>,
    platform_fee: Option<f64>,

    salary: Option<f64>,
    insurance: Option<f64>,
    outsourcing: Option<f64>,
    rent: Option<f64>,
    systems: Option<f64>,
    misc: Option<f64>,

    target_margin: Option<f64>,
    months: Option<u32>,
}

#[derive(Debug)]
struct ProjectionRequest {
    inputs: SimulationInputs,
    months: u32,
    target_margin: f64,
}

/// The document returned by the HTTP API and by `project --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResponse {
    pub months: u32,
    pub target_margin: f64,
    pub inputs: SimulationInputs,
    pub summary: ProjectionSummary,
    pub gap: GapAnalysis,
    pub records: Vec<MonthlyRecord>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(args: &ProjectionArgs) -> Result<ProjectionRequest, String> {
    if args.months == 0 || args.months > MAX_MONTHS {
        return Err(format!("--months must be between 1 and {MAX_MONTHS}"));
    }

    if !(args.target_margin > 0.0 && args.target_margin <= 100.0) {
        return Err("--target-margin must be > 0 and <= 100".to_string());
    }

    if !args.organic_growth.is_finite() || args.organic_growth <= 0.0 {
        return Err("--organic-growth must be > 0".to_string());
    }

    for (name, rate) in [
        ("--payment-fee", args.payment_fee),
        ("--platform-fee", args.platform_fee),
    ] {
        if !(0.0..100.0).contains(&rate) {
            return Err(format!("{name} must be >= 0 and < 100"));
        }
    }

    let inputs = SimulationInputs {
        unit_price: args.unit_price,
        ad_budget: args.ad_budget,
        cpa: args.cpa,
        organic_baseline: args.organic_baseline,
        organic_growth: args.organic_growth / 100.0,
        unit_costs: UnitCosts {
            goods: args.goods_cost,
            shipping: args.shipping_cost,
            infrastructure: args.infrastructure_cost,
        },
        fee_rates: FeeRates {
            payment: args.payment_fee / 100.0,
            platform: args.platform_fee / 100.0,
        },
        fixed_costs: FixedCosts {
            salary: args.salary,
            insurance: args.insurance,
            outsourcing: args.outsourcing,
            rent: args.rent,
            systems: args.systems,
            misc: args.misc,
        },
    };
    inputs.validate().map_err(describe_input_error)?;
    inputs
        .validate_horizon(args.months)
        .map_err(describe_input_error)?;

    Ok(ProjectionRequest {
        inputs,
        months: args.months,
        target_margin: args.target_margin / 100.0,
    })
}

fn describe_input_error(err: ModelError) -> String {
    match err {
        ModelError::InvalidInput {
            field, requirement, ..
        } => format!("--{} must be {requirement}", field.replace('_', "-")),
        other => other.to_string(),
    }
}

fn build_projection_response(request: ProjectionRequest) -> Result<ProjectionResponse, ModelError> {
    let projection = run_projection(&request.inputs, request.months)?;
    let gap = analyze_projection(&projection, &request.inputs, request.target_margin)?;
    let summary = projection.summary();

    Ok(ProjectionResponse {
        months: request.months,
        target_margin: request.target_margin,
        inputs: request.inputs,
        summary,
        gap,
        records: projection.into_records(),
    })
}

/// Validates CLI arguments and runs the projection plus gap analysis.
pub fn project_from_args(args: &ProjectionArgs) -> Result<ProjectionResponse, String> {
    let request = build_inputs(args)?;
    build_projection_response(request).map_err(|e| e.to_string())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "projection HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected projection request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    debug!(
        months = request.months,
        target_margin = request.target_margin,
        "running projection"
    );
    match build_projection_response(request) {
        Ok(response) => {
            debug!(
                final_operating_profit = response.summary.final_operating_profit,
                target_met = response.gap.target_met(),
                "projection complete"
            );
            json_response(StatusCode::OK, response)
        }
        Err(err) => projection_failure(&err),
    }
}

/// Inputs that passed `build_inputs` should always project; anything else is ours.
fn projection_failure(err: &ModelError) -> Response {
    error!(error = %err, "projection failed on validated inputs");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
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

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ProjectionRequest, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: ProjectPayload) -> Result<ProjectionRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.unit_price {
        args.unit_price = v;
    }
    if let Some(v) = payload.ad_budget {
        args.ad_budget = v;
    }
    if let Some(v) = payload.cpa {
        args.cpa = v;
    }
    if let Some(v) = payload.organic_baseline {
        args.organic_baseline = v;
    }
    if let Some(v) = payload.organic_growth {
        args.organic_growth = v;
    }

    if let Some(v) = payload.goods_cost {
        args.goods_cost = v;
    }
    if let Some(v) = payload.shipping_cost {
        args.shipping_cost = v;
    }
    if let Some(v) = payload.infrastructure_cost {
        args.infrastructure_cost = v;
    }
    if let Some(v) = payload.payment_fee {
        args.payment_fee = v;
    }
    if let Some(v) = payload.platform_fee {
        args.platform_fee = v;
    }

    if let Some(v) = payload.salary {
        args.salary = v;
    }
    if let Some(v) = payload.insurance {
        args.insurance = v;
    }
    if let Some(v) = payload.outsourcing {
        args.outsourcing = v;
    }
    if let Some(v) = payload.rent {
        args.rent = v;
    }
    if let Some(v) = payload.systems {
        args.systems = v;
    }
    if let Some(v) = payload.misc {
        args.misc = v;
    }

    if let Some(v) = payload.target_margin {
        args.target_margin = v;
    }
    if let Some(v) = payload.months {
        args.months = v;
    }

    build_inputs(&args)
}

fn default_args_for_api() -> ProjectionArgs {
    ProjectionArgs {
        unit_price: DEFAULT_UNIT_PRICE,
        ad_budget: DEFAULT_AD_BUDGET,
        cpa: DEFAULT_CPA,
        organic_baseline: DEFAULT_ORGANIC_BASELINE,
        organic_growth: DEFAULT_ORGANIC_GROWTH_PCT,
        goods_cost: DEFAULT_GOODS_COST,
        shipping_cost: DEFAULT_SHIPPING_COST,
        infrastructure_cost: DEFAULT_INFRASTRUCTURE_COST,
        payment_fee: DEFAULT_PAYMENT_FEE_PCT,
        platform_fee: DEFAULT_PLATFORM_FEE_PCT,
        salary: DEFAULT_SALARY,
        insurance: DEFAULT_INSURANCE,
        outsourcing: DEFAULT_OUTSOURCING,
        rent: DEFAULT_RENT,
        systems: DEFAULT_SYSTEMS,
        misc: DEFAULT_MISC,
        target_margin: DEFAULT_TARGET_MARGIN_PCT,
        months: DEFAULT_MONTHS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_args() -> ProjectionArgs {
        default_args_for_api()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn build_inputs_converts_percent_flags_to_ratios() {
        let request = build_inputs(&sample_args()).expect("valid inputs");

        assert_approx(request.inputs.organic_growth, 1.05);
        assert_approx(request.inputs.fee_rates.payment, 0.036);
        assert_approx(request.inputs.fee_rates.platform, 0.0);
        assert_approx(request.target_margin, 0.20);
        assert_eq!(request.months, 36);
        assert_approx(request.inputs.fixed_costs.total(), 3_500_000.0);
    }

    #[test]
    fn build_inputs_rejects_negative_cpa() {
        let mut args = sample_args();
        args.cpa = -1.0;

        let err = build_inputs(&args).expect_err("must reject negative cpa");
        assert!(err.contains("--cpa"));
    }

    #[test]
    fn build_inputs_rejects_negative_fixed_cost_component() {
        let mut args = sample_args();
        args.rent = -10.0;

        let err = build_inputs(&args).expect_err("must reject negative rent");
        assert_eq!(err, "--rent must be >= 0");
    }

    #[test]
    fn build_inputs_rejects_non_finite_price() {
        let mut args = sample_args();
        args.unit_price = f64::INFINITY;

        let err = build_inputs(&args).expect_err("must reject infinite price");
        assert!(err.contains("--unit-price"));
    }

    #[test]
    fn build_inputs_rejects_out_of_range_months() {
        for months in [0, MAX_MONTHS + 1] {
            let mut args = sample_args();
            args.months = months;
            let err = build_inputs(&args).expect_err("must reject month count");
            assert!(err.contains("--months"));
        }
    }

    #[test]
    fn build_inputs_rejects_target_margin_outside_range() {
        for target in [0.0, -5.0, 100.5, f64::NAN] {
            let mut args = sample_args();
            args.target_margin = target;
            let err = build_inputs(&args).expect_err("must reject target margin");
            assert!(err.contains("--target-margin"));
        }
    }

    #[test]
    fn build_inputs_rejects_full_fee_rate() {
        let mut args = sample_args();
        args.platform_fee = 100.0;

        let err = build_inputs(&args).expect_err("must reject 100% fee");
        assert!(err.contains("--platform-fee"));
    }

    #[test]
    fn build_inputs_rejects_non_positive_growth() {
        let mut args = sample_args();
        args.organic_growth = 0.0;

        let err = build_inputs(&args).expect_err("must reject zero growth");
        assert!(err.contains("--organic-growth"));
    }

    #[test]
    fn build_inputs_accepts_declining_growth_and_free_acquisition() {
        let mut args = sample_args();
        args.organic_growth = 95.0;
        args.cpa = 0.0;

        let request = build_inputs(&args).expect("valid inputs");
        assert_approx(request.inputs.organic_growth, 0.95);
        assert_approx(request.inputs.cpa, 0.0);
    }

    #[test]
    fn build_inputs_rejects_runaway_organic_volume() {
        let mut args = sample_args();
        args.months = MAX_MONTHS;
        args.organic_growth = 120.0;

        let err = build_inputs(&args).expect_err("must reject exploding growth");
        assert!(err.starts_with("month 600 would acquire"), "{err}");
    }

    #[test]
    fn build_inputs_rejects_runaway_paid_volume() {
        let mut args = sample_args();
        args.ad_budget = 1e20;
        args.cpa = 1.0;

        let err = build_inputs(&args).expect_err("must reject exploding paid volume");
        assert!(err.contains("above the limit"), "{err}");
    }

    #[test]
    fn full_horizon_at_moderate_growth_projects() {
        let mut args = sample_args();
        args.months = MAX_MONTHS;
        args.organic_growth = 103.0;

        let response = project_from_args(&args).expect("volume stays bounded");
        assert_eq!(response.records.len(), MAX_MONTHS as usize);
        let last = &response.records[response.records.len() - 1];
        assert_eq!(last.units, last.paid_units + last.organic_units);
        assert!(last.units < 1_000_000_000_000);
    }

    #[test]
    fn projection_failure_is_a_server_error() {
        let response = projection_failure(&ModelError::EmptyHorizon);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "unitPrice": 7000,
          "adBudget": 500000,
          "cpa": 2500,
          "organicBaseline": 120,
          "organicGrowth": 102.5,
          "goodsCost": 1500,
          "shippingCost": 400,
          "infrastructureCost": 20,
          "paymentFee": 3.25,
          "platformFee": 10,
          "salary": 1800000,
          "insurance": 270000,
          "outsourcing": 0,
          "rent": 200000,
          "systems": 30000,
          "misc": 50000,
          "targetMargin": 15,
          "months": 24
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let inputs = &request.inputs;

        assert_approx(inputs.unit_price, 7_000.0);
        assert_approx(inputs.ad_budget, 500_000.0);
        assert_approx(inputs.cpa, 2_500.0);
        assert_eq!(inputs.organic_baseline, 120);
        assert_approx(inputs.organic_growth, 1.025);
        assert_approx(inputs.unit_costs.per_unit_total(), 1_920.0);
        assert_approx(inputs.fee_rates.payment, 0.0325);
        assert_approx(inputs.fee_rates.platform, 0.10);
        assert_approx(inputs.fixed_costs.total(), 2_350_000.0);
        assert_approx(request.target_margin, 0.15);
        assert_eq!(request.months, 24);
    }

    #[test]
    fn api_request_from_json_keeps_defaults_for_missing_keys() {
        let request = api_request_from_json(r#"{ "months": 12 }"#).expect("json should parse");

        assert_eq!(request.months, 12);
        assert_approx(request.inputs.unit_price, DEFAULT_UNIT_PRICE);
        assert_approx(request.inputs.cpa, DEFAULT_CPA);
        assert_approx(request.target_margin, 0.20);
    }

    #[test]
    fn api_request_from_json_reports_malformed_payload() {
        let err = api_request_from_json(r#"{ "unitPrice": "cheap" }"#)
            .expect_err("must reject non-numeric price");
        assert!(err.starts_with("Invalid API JSON payload"));
    }

    #[test]
    fn projection_response_serialization_contains_expected_fields() {
        let request = build_inputs(&sample_args()).expect("valid inputs");
        let response = build_projection_response(request).expect("projection runs");
        assert_eq!(response.records.len(), 36);

        let json = serde_json::to_string(&response).expect("response should serialize");
        for key in [
            "\"records\"",
            "\"summary\"",
            "\"gap\"",
            "\"label\"",
            "\"sales\"",
            "\"grossProfit\"",
            "\"operatingProfit\"",
            "\"cumulativeProfit\"",
            "\"units\"",
            "\"variableCost\"",
            "\"adSpend\"",
            "\"fixedCost\"",
            "\"breakEvenSales\"",
            "\"totalCost\"",
            "\"gapProfit\"",
            "\"achievedMargin\"",
        ] {
            assert!(json.contains(key), "missing {key}");
        }
    }

    #[tokio::test]
    async fn project_handler_returns_default_projection() {
        let response = project_handler_impl(ProjectPayload::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );

        let json = body_json(response).await;
        let records = json["records"].as_array().expect("records array");
        assert_eq!(records.len(), 36);
        assert_eq!(records[0]["label"], "Month 1");
        assert_eq!(records[35]["units"], 775);
        assert_eq!(json["gap"]["outcome"]["status"], "below-target");
    }

    #[tokio::test]
    async fn project_handler_reports_undefined_break_even_as_null() {
        let payload = ProjectPayload {
            cpa: Some(0.0),
            organic_baseline: Some(0),
            months: Some(2),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json["records"][0]["breakEvenSales"].is_null());
        assert!(json["gap"]["achievedMargin"].is_null());
        assert_eq!(
            json["gap"]["outcome"]["strategies"]["priceIncrease"]["detail"]["reason"],
            "no-units-sold"
        );
    }

    #[tokio::test]
    async fn project_handler_rejects_invalid_payload() {
        let payload = ProjectPayload {
            ad_budget: Some(-5.0),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "--ad-budget must be >= 0");
    }

    #[tokio::test]
    async fn project_handler_rejects_runaway_growth() {
        let payload = ProjectPayload {
            months: Some(MAX_MONTHS),
            organic_growth: Some(120.0),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        let message = json["error"].as_str().expect("error message");
        assert!(message.contains("above the limit"), "{message}");
    }

    #[tokio::test]
    async fn unknown_routes_return_json_not_found() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Not found");
    }
}
