use crate::commands::{build_report, AllocationResponse};
use crate::infra::{scenario_catalog, AppState, ScenarioCatalogEntry};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::Utc;
use mansion_tax::allocation::Band;
use mansion_tax::config::ModelParameters;
use mansion_tax::error::AppError;
use mansion_tax::sources::DatasetImporter;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{error, info};

/// Source tables posted inline as CSV text.
#[derive(Debug, Deserialize)]
pub(crate) struct InlineTables {
    pub(crate) constituencies_csv: String,
    #[serde(default)]
    pub(crate) concentration_csv: Option<String>,
    pub(crate) transactions_csv: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AllocationRequest {
    /// Falls back to the server's configured dataset when omitted.
    #[serde(default)]
    pub(crate) tables: Option<InlineTables>,
    /// Falls back to the server's model parameters when omitted.
    #[serde(default)]
    pub(crate) model: Option<ModelParameters>,
    #[serde(default)]
    pub(crate) scenario: Option<String>,
    #[serde(default)]
    pub(crate) top: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScenarioListResponse {
    pub(crate) total_stock: u64,
    pub(crate) bands: Vec<Band>,
    pub(crate) scenarios: Vec<ScenarioCatalogEntry>,
}

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/scenarios", axum::routing::get(scenarios_endpoint))
        .route(
            "/api/v1/allocation",
            axum::routing::post(allocation_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        serde_json::json!({ "status": "ready" })
    } else {
        serde_json::json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn scenarios_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<ScenarioListResponse> {
    Json(ScenarioListResponse {
        total_stock: state.model.national.total_stock,
        bands: state.model.national.bands.clone(),
        scenarios: scenario_catalog(&state.model),
    })
}

pub(crate) async fn allocation_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<AllocationRequest>,
) -> Result<Json<AllocationResponse>, AppError> {
    let AllocationRequest {
        tables,
        model,
        scenario,
        top,
    } = payload;

    let (tables, data_source) = match tables {
        Some(inline) => {
            let concentration = inline.concentration_csv.unwrap_or_default();
            let tables = DatasetImporter::from_readers(
                Cursor::new(inline.constituencies_csv.into_bytes()),
                Cursor::new(concentration.into_bytes()),
                Cursor::new(inline.transactions_csv.into_bytes()),
            )?;
            (tables, "inline".to_string())
        }
        None => (
            DatasetImporter::from_dir(state.data_dir.as_path())?,
            state.data_dir.display().to_string(),
        ),
    };
    let params = match model {
        Some(params) => params,
        None => ModelParameters::clone(&state.model),
    };

    let report = build_report(&tables, &params, scenario.as_deref(), top).map_err(|err| {
        error!(error = %err, "allocation request rejected");
        err
    })?;
    let summary = report.summary();
    info!(
        data_source = %data_source,
        status = summary.status_label,
        constituencies = summary.allocations.len(),
        "allocation request served"
    );

    Ok(Json(AllocationResponse {
        generated_at: Utc::now(),
        data_source,
        report: summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use mansion_tax::allocation::report::views::RunStatus;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    const CONSTITUENCIES: &str = "constituency_code,constituency_name,council_code,population\n\
S1,Edinburgh Central,EDN,60\n\
S2,Edinburgh Western,EDN,40\n\
S3,Aberdeen Central,ABD,50\n";
    const TRANSACTIONS: &str = "council_code,transaction_count\nEDN,30\nABD,10\n";

    fn state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            model: Arc::new(ModelParameters::scotland_default()),
            data_dir: Arc::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/sample")),
        }
    }

    fn inline_request() -> AllocationRequest {
        AllocationRequest {
            tables: Some(InlineTables {
                constituencies_csv: CONSTITUENCIES.to_string(),
                concentration_csv: None,
                transactions_csv: TRANSACTIONS.to_string(),
            }),
            ..AllocationRequest::default()
        }
    }

    #[tokio::test]
    async fn allocation_endpoint_uses_inline_tables() {
        let Json(body) = allocation_endpoint(Extension(state(true)), Json(inline_request()))
            .await
            .expect("allocation succeeds");

        assert_eq!(body.data_source, "inline");
        let report = body.report;
        assert_eq!(report.allocations.len(), 3);
        let s1 = &report.allocations[0];
        assert_eq!(s1.constituency_code, "S3");
        assert!((s1.share - 0.25).abs() < 1e-12);
        let total: f64 = report.allocations.iter().map(|a| a.allocated_stock).sum();
        assert!((total - 11_481.0).abs() < 1e-6);
        assert_eq!(report.status, RunStatus::WithCaveats);
    }

    #[tokio::test]
    async fn allocation_endpoint_defaults_to_configured_dataset() {
        let request = AllocationRequest {
            scenario: Some("conservative".to_string()),
            top: Some(3),
            ..AllocationRequest::default()
        };

        let Json(body) = allocation_endpoint(Extension(state(true)), Json(request))
            .await
            .expect("allocation succeeds");

        assert!(body.data_source.ends_with("sample"));
        assert_eq!(body.report.reference_scenario.as_deref(), Some("conservative"));
        assert_eq!(body.report.top_constituencies.len(), 3);
        assert!((body.report.national.scenarios[0].average_rate - 777.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn allocation_endpoint_rejects_disjoint_tables() {
        let request = AllocationRequest {
            tables: Some(InlineTables {
                constituencies_csv: CONSTITUENCIES.to_string(),
                concentration_csv: None,
                transactions_csv: "council_code,transaction_count\nGLA,10\n".to_string(),
            }),
            ..AllocationRequest::default()
        };

        let err = allocation_endpoint(Extension(state(true)), Json(request))
            .await
            .expect_err("nothing to allocate");

        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn scenarios_endpoint_lists_default_scenarios() {
        let Json(body) = scenarios_endpoint(Extension(state(true))).await;

        assert_eq!(body.total_stock, 11_481);
        assert_eq!(body.bands.len(), 2);
        let names: Vec<&str> = body.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["benchmark", "moderate", "cautious", "conservative"]);
    }

    #[tokio::test]
    async fn router_serves_allocation_over_http() {
        let app = router().layer(Extension(state(true)));
        let body = serde_json::json!({
            "tables": {
                "constituencies_csv": CONSTITUENCIES,
                "transactions_csv": TRANSACTIONS
            },
            "scenario": "benchmark"
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/allocation")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize request")))
            .expect("request");

        let response = app.oneshot(request).await.expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["report"]["reference_scenario"], "benchmark");
        assert_eq!(payload["report"]["invariant"]["passed"], true);
    }

    #[tokio::test]
    async fn router_maps_rejection_to_unprocessable_entity() {
        let app = router().layer(Extension(state(true)));
        let body = serde_json::json!({
            "tables": {
                "constituencies_csv": CONSTITUENCIES,
                "transactions_csv": "council_code,transaction_count\nEDN,0\nABD,0\n"
            }
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/allocation")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize request")))
            .expect("request");

        let response = app.oneshot(request).await.expect("router dispatch");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["invariant"], "council_transactions_nonzero");
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let app = router().layer(Extension(state(false)));
        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("router dispatch");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
