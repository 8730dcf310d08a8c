use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::{AppError, ErrorResponse};
use crate::estimator::{self, DeploymentStepEstimate};
use crate::networks::{self, FeeSchedule, NetworkProfile};
use crate::plan::{Chain, DeploymentPlan, Network, TokenStandard};
use crate::rpc_provider::{ProviderHealth, ProviderRegistry};

#[derive(Clone, Default)]
pub struct AppState {
    registries: Arc<HashMap<Network, Arc<ProviderRegistry>>>,
}

impl AppState {
    pub fn new(registries: HashMap<Network, Arc<ProviderRegistry>>) -> Self {
        Self {
            registries: Arc::new(registries),
        }
    }

    async fn status(&self, profile: NetworkProfile) -> NetworkStatus {
        let providers = match self.registries.get(&profile.network) {
            Some(registry) => registry.provider_health().await,
            None => Vec::new(),
        };
        NetworkStatus { profile, providers }
    }
}

#[derive(Serialize, ToSchema)]
pub struct NetworkStatus {
    pub profile: NetworkProfile,
    pub providers: Vec<ProviderHealth>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanValidation {
    pub valid: bool,
    pub chain: Chain,
    pub network: Network,
    #[schema(example = 2)]
    pub step_count: usize,
}

/// Parse a plan body, mapping shape errors to 400 and rule violations to 422.
fn parse_plan(body: serde_json::Value) -> Result<DeploymentPlan, AppError> {
    let plan: DeploymentPlan = serde_json::from_value(body)?;
    plan.validate()?;
    Ok(plan)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String)),
    tag = "Service"
)]
async fn health_check() -> &'static str {
    "OK"
}

#[utoipa::path(
    get,
    path = "/networks",
    responses((status = 200, description = "Network presets with provider health", body = [NetworkStatus])),
    tag = "Networks"
)]
async fn list_networks(State(state): State<AppState>) -> Json<Vec<NetworkStatus>> {
    let mut statuses = Vec::new();
    for profile in networks::all_profiles() {
        statuses.push(state.status(profile).await);
    }
    Json(statuses)
}

#[utoipa::path(
    get,
    path = "/networks/{name}",
    params(("name" = String, Path, description = "Preset name, e.g. `amoy` or `testnet`")),
    responses(
        (status = 200, description = "Network preset", body = NetworkStatus),
        (status = 404, description = "Unknown preset", body = ErrorResponse)
    ),
    tag = "Networks"
)]
async fn get_network(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NetworkStatus>, AppError> {
    let profile = networks::resolve_preset(&name)
        .ok_or_else(|| AppError::NotFound(format!("network preset `{name}`")))?;
    Ok(Json(state.status(profile).await))
}

#[utoipa::path(
    post,
    path = "/plans/validate",
    request_body = DeploymentPlan,
    responses(
        (status = 200, description = "Plan is valid", body = PlanValidation),
        (status = 400, description = "Malformed plan", body = ErrorResponse),
        (status = 422, description = "Plan violates a rule", body = ErrorResponse)
    ),
    tag = "Plans"
)]
async fn validate_plan(Json(body): Json<serde_json::Value>) -> Result<Json<PlanValidation>, AppError> {
    let plan = parse_plan(body)?;
    tracing::debug!(chain = %plan.chain, network = %plan.network, "Plan validated");
    Ok(Json(PlanValidation {
        valid: true,
        chain: plan.chain,
        network: plan.network,
        step_count: estimator::plan_steps(&plan).len(),
    }))
}

#[utoipa::path(
    post,
    path = "/plans/estimate",
    request_body = DeploymentPlan,
    responses(
        (status = 200, description = "Ordered steps and fee hint", body = DeploymentStepEstimate),
        (status = 400, description = "Malformed plan", body = ErrorResponse),
        (status = 422, description = "Plan violates a rule", body = ErrorResponse)
    ),
    tag = "Plans"
)]
async fn estimate_plan(
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DeploymentStepEstimate>, AppError> {
    let plan = parse_plan(body)?;
    Ok(Json(estimator::estimate(&plan)))
}

#[derive(OpenApi)]
#[openapi(
    paths(health_check, list_networks, get_network, validate_plan, estimate_plan),
    components(schemas(
        NetworkStatus, NetworkProfile, FeeSchedule, ProviderHealth, Network, Chain, TokenStandard,
        DeploymentPlan, DeploymentStepEstimate, PlanValidation, ErrorResponse
    )),
    tags(
        (name = "Service", description = "Liveness"),
        (name = "Networks", description = "Supported networks and RPC provider health"),
        (name = "Plans", description = "Deployment plan validation and estimation")
    ),
    info(
        title = "TokenEasy API",
        version = "0.1.0",
        description = "Plan, estimate and inspect multi-chain asset deployments"
    )
)]
pub struct ApiDoc;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_check))
        .route("/networks", get(list_networks))
        .route("/networks/:name", get(get_network))
        .route("/plans/validate", post(validate_plan))
        .route("/plans/estimate", post(estimate_plan))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
