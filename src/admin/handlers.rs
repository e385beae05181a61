use std::net::IpAddr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::server::AppState;
use crate::persist::BlacklistEntry;
use crate::pipeline::incident::{IncidentStatus, SecurityIncident};
use crate::store::reputation::IpBlockEntry;

#[derive(Serialize)]
pub struct EngineStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub emergency_mode: bool,
    pub open_incidents: usize,
    pub active_blocks: usize,
    pub blacklist_size: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<EngineStatus> {
    let engine = &state.engine;
    let open_incidents = engine
        .activity()
        .incidents()
        .map(|incidents| {
            incidents
                .iter()
                .filter(|i| i.status == IncidentStatus::Open)
                .count()
        })
        .unwrap_or(0);
    let active_blocks = engine
        .reputation()
        .active_blocks()
        .map(|b| b.len())
        .unwrap_or(0);
    let blacklist_size = engine
        .reputation()
        .blacklist_entries()
        .map(|b| b.len())
        .unwrap_or(0);

    Json(EngineStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        emergency_mode: engine.emergency_active(),
        open_incidents,
        active_blocks,
        blacklist_size,
    })
}

pub async fn list_incidents(
    State(state): State<AppState>,
) -> Result<Json<Vec<SecurityIncident>>, StatusCode> {
    state
        .engine
        .activity()
        .incidents()
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: IncidentStatus,
}

pub async fn update_incident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> StatusCode {
    match state
        .engine
        .activity()
        .update_incident_status(id, update.status)
    {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn list_blocks(
    State(state): State<AppState>,
) -> Result<Json<Vec<IpBlockEntry>>, StatusCode> {
    state
        .engine
        .reputation()
        .active_blocks()
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Lift both the transient block and any blacklist entry for an IP.
pub async fn unblock_ip(State(state): State<AppState>, Path(ip): Path<IpAddr>) -> StatusCode {
    match state.engine.reputation().unblock(ip) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn list_blacklist(
    State(state): State<AppState>,
) -> Result<Json<Vec<BlacklistEntry>>, StatusCode> {
    state
        .engine
        .reputation()
        .blacklist_entries()
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Deserialize)]
pub struct BlacklistRequest {
    pub ip: IpAddr,
    pub reason: String,
}

pub async fn add_blacklist(
    State(state): State<AppState>,
    Json(request): Json<BlacklistRequest>,
) -> StatusCode {
    match state
        .engine
        .reputation()
        .blacklist(request.ip, &request.reason)
    {
        Ok(()) => StatusCode::CREATED,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
