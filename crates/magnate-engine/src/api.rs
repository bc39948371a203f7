//! HTTP API for the Magnate node.

use crate::auth::{AdminUser, AuthUser};
use crate::engine::UpgradeQuery;
use crate::error::{Error, Result};
use crate::ledger::ResourceHolding;
use crate::models::{PurchasedUpgrade, Resource, Upgrade, User};
use crate::node::AppState;
use crate::stats;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health))
        // Accounts
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login))
        .route("/api/v1/users", get(list_users))
        // Resource catalog (static segments before :id)
        .route("/api/v1/resources", get(list_resources))
        .route("/api/v1/resources", post(create_resource))
        .route("/api/v1/resources/stats", get(resource_stats))
        .route("/api/v1/resources/user", get(user_resources))
        .route("/api/v1/resources/init", post(init_resources))
        .route("/api/v1/resources/:id", get(get_resource))
        .route("/api/v1/resources/:id", put(update_resource))
        .route("/api/v1/resources/:id", patch(update_resource_price))
        .route("/api/v1/resources/:id", delete(delete_resource))
        // Per-user resource amounts
        .route("/api/v1/resources/:id/amount", get(get_amount))
        .route("/api/v1/resources/:id/amount", post(create_amount_link))
        .route("/api/v1/resources/:id/amount", patch(set_amount))
        // Upgrades
        .route("/api/v1/upgrades", get(list_upgrades))
        .route("/api/v1/upgrades", post(create_upgrade))
        .route("/api/v1/upgrades/next", get(next_upgrades))
        .route("/api/v1/upgrades/init", post(init_upgrades))
        .route("/api/v1/upgrades/:id", get(get_upgrade))
        .route("/api/v1/upgrades/:id", delete(delete_upgrade))
        .route("/api/v1/upgrades/:id/buy", post(buy_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Success envelope used by the resource listing endpoints.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    status: &'static str,
    data: T,
}

impl<T> Envelope<T> {
    fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

// --- Health ---

async fn health() -> &'static str {
    "OK"
}

// --- Account endpoints ---

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    state.gate.register(&req.username, &req.password)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "User registered successfully" })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Json<serde_json::Value>> {
    let token = state.gate.login(&req.username, &req.password)?;
    Ok(Json(serde_json::json!({ "token": token })))
}

async fn list_users(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<Vec<User>>> {
    let users = state
        .storage
        .list_users()?
        .iter()
        .map(|u| u.public())
        .collect();
    Ok(Json(users))
}

// --- Resource catalog endpoints ---

async fn list_resources(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Envelope<Vec<Resource>>>> {
    let resources = state.storage.list_resources()?;
    Ok(Json(Envelope::success(resources)))
}

#[derive(Debug, Deserialize)]
struct CreateResourceRequest {
    name: String,
    price: f64,
}

async fn create_resource(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Envelope<Resource>>)> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("Name is required".into()));
    }
    if req.price < 0.0 {
        return Err(Error::Validation("Price cannot be negative".into()));
    }
    let resource = state.storage.create_resource(&req.name, req.price)?;
    Ok((StatusCode::CREATED, Json(Envelope::success(resource))))
}

async fn get_resource(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Resource>> {
    let resource = state
        .storage
        .get_resource(id)?
        .ok_or_else(|| Error::NotFound("Resource not found".into()))?;
    Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct UpdateResourceRequest {
    name: Option<String>,
    price: Option<f64>,
}

async fn update_resource(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<u64>,
    Json(req): Json<UpdateResourceRequest>,
) -> Result<Json<Resource>> {
    if let Some(price) = req.price {
        if price < 0.0 {
            return Err(Error::Validation("Price cannot be negative".into()));
        }
    }
    let resource = state
        .storage
        .update_resource(id, req.name.as_deref(), req.price)?;
    Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct UpdatePriceRequest {
    price: Option<f64>,
}

async fn update_resource_price(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<u64>,
    Json(req): Json<UpdatePriceRequest>,
) -> Result<Json<Resource>> {
    let price = req
        .price
        .ok_or_else(|| Error::Validation("Price is required".into()))?;
    if price < 0.0 {
        return Err(Error::Validation("Price cannot be negative".into()));
    }
    let resource = state.storage.update_resource(id, None, Some(price))?;
    Ok(Json(resource))
}

async fn delete_resource(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    state.storage.delete_resource(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resource_stats(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<stats::UserResourceStats>>> {
    Ok(Json(stats::user_resource_stats(&state.storage)?))
}

async fn user_resources(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Envelope<Vec<ResourceHolding>>>> {
    let holdings = state.ledger.holdings(user.id)?;
    Ok(Json(Envelope::success(holdings)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitResourcesResponse {
    user_id: u64,
    resources: Vec<ResourceHolding>,
}

async fn init_resources(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<(StatusCode, Json<InitResourcesResponse>)> {
    let resources = state.ledger.init_resources(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(InitResourcesResponse {
            user_id: user.id,
            resources,
        }),
    ))
}

// --- Per-user amount endpoints ---

async fn get_amount(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<u64>,
) -> Result<Response> {
    match state.ledger.holding(user.id, id)? {
        Some(holding) => Ok(Json(holding).into_response()),
        // Absence is the zero state: a not-found signal that still carries
        // the default amount as a convenience.
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "message": "Resource not found for this user",
                "amount": 0
            })),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize, Default)]
struct AmountRequest {
    amount: Option<f64>,
}

async fn create_amount_link(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<u64>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<ResourceHolding>)> {
    let holding = state
        .ledger
        .create_resource_link(user.id, id, req.amount.unwrap_or(0.0))?;
    Ok((StatusCode::CREATED, Json(holding)))
}

async fn set_amount(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<u64>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<ResourceHolding>> {
    let amount = req
        .amount
        .ok_or_else(|| Error::Validation("Amount is required".into()))?;
    let holding = state.ledger.set_resource_amount(user.id, id, amount)?;
    Ok(Json(holding))
}

// --- Upgrade endpoints ---

async fn list_upgrades(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<UpgradeQuery>,
) -> Result<Json<crate::engine::UpgradePage>> {
    Ok(Json(state.engine.list_upgrades(user.id, &query)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUpgradeRequest {
    id: Option<u64>,
    name: String,
    production: f64,
    price: f64,
    prerequisite_id: Option<u64>,
}

async fn create_upgrade(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateUpgradeRequest>,
) -> Result<(StatusCode, Json<Upgrade>)> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("Name is required".into()));
    }
    if req.production <= 0.0 {
        return Err(Error::Validation("Production must be positive".into()));
    }
    if req.price < 0.0 {
        return Err(Error::Validation("Price cannot be negative".into()));
    }
    let upgrade = state.storage.create_upgrade(
        req.id,
        &req.name,
        req.production,
        req.price,
        req.prerequisite_id,
    )?;
    Ok((StatusCode::CREATED, Json(upgrade)))
}

async fn next_upgrades(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<crate::engine::NextUpgrades>> {
    Ok(Json(state.engine.next_upgrades(user.id)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitUpgradesResponse {
    user_id: u64,
    upgrade_ids: Vec<u64>,
}

async fn init_upgrades(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<(StatusCode, Json<InitUpgradesResponse>)> {
    let upgrade_ids = state.ledger.init_upgrades(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(InitUpgradesResponse {
            user_id: user.id,
            upgrade_ids,
        }),
    ))
}

async fn get_upgrade(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Upgrade>> {
    let upgrade = state
        .storage
        .get_upgrade(id)?
        .ok_or_else(|| Error::NotFound("Upgrade not found".into()))?;
    Ok(Json(upgrade))
}

async fn delete_upgrade(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    state.storage.delete_upgrade(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn buy_upgrade(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<PurchasedUpgrade>)> {
    let receipt = state.engine.buy_upgrade(user.id, id)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
