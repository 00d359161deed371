use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use rumon_db::queries::{self, Changes, events::NewEventType};
use rumon_db::Database;
use rumon_types::api::{CreateEventTypeRequest, EventTypeResponse, UpdateEventTypeRequest};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::{self, Errors};

/// Longest scheduling window an event type may demand.
const MAX_MONTHS_IN_ADVANCE: u32 = 120;

fn months_in_range(months: u32) -> bool {
    months <= MAX_MONTHS_IN_ADVANCE
}

impl Validate for CreateEventTypeRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::not_blank(&self.name), "name must not be empty")
            .check_opt(self.color.as_deref(), validate::is_hex_color, "color must be a hex color")
            .check_opt(self.months_in_advance, months_in_range, "monthsInAdvance must be at most 120")
            .finish()
    }
}

impl Validate for UpdateEventTypeRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check_opt(self.name.as_deref(), validate::not_blank, "name must not be empty")
            .check_opt(self.color.as_deref(), validate::is_hex_color, "color must be a hex color")
            .check_opt(self.months_in_advance, months_in_range, "monthsInAdvance must be at most 120")
            .finish()
    }
}

// -- Services --

pub fn load_type(db: &Database, id: &str) -> Result<EventTypeResponse, ApiError> {
    db.with_conn(|conn| queries::events::find_type(conn, id))?
        .map(convert::event_type)
        .ok_or_else(|| ApiError::not_found("Event type"))
}

pub fn create_type(db: &Database, req: &CreateEventTypeRequest) -> Result<EventTypeResponse, ApiError> {
    let id = Uuid::new_v4().to_string();
    let new = NewEventType {
        name: req.name.trim(),
        description: req.description.as_deref(),
        color: req.color.as_deref(),
        one_per_day: req.one_per_day,
        months_in_advance: req.months_in_advance,
        requires_approval: req.requires_approval,
    };
    db.with_conn(|conn| queries::events::insert_type(conn, &id, &new))?;
    load_type(db, &id)
}

pub fn update_type(db: &Database, id: &str, req: UpdateEventTypeRequest) -> Result<EventTypeResponse, ApiError> {
    let mut changes = Changes::new();
    changes
        .set_opt("name", req.name.map(|n| n.trim().to_string()))
        .set_opt("description", req.description)
        .set_opt("color", req.color)
        .set_opt("one_per_day", req.one_per_day)
        .set_opt("months_in_advance", req.months_in_advance)
        .set_opt("requires_approval", req.requires_approval);

    let changed = db.with_conn(|conn| changes.apply(conn, "event_types", id))?;
    if changed == 0 {
        return Err(ApiError::not_found("Event type"));
    }
    load_type(db, id)
}

pub fn delete_type(db: &Database, id: &str) -> Result<(), ApiError> {
    let deleted = db.with_conn(|conn| queries::events::delete_type(conn, id))?;
    if deleted == 0 {
        return Err(ApiError::not_found("Event type"));
    }
    Ok(())
}

// -- Handlers --

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || Ok(state.db.with_conn(queries::events::list_types)?)).await?;
    let types: Vec<EventTypeResponse> = rows.into_iter().map(convert::event_type).collect();
    Ok(Json(types))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event_type = run_blocking(move || load_type(&state.db, &id.to_string())).await?;
    Ok(Json(event_type))
}

pub async fn create(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateEventTypeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event_type = run_blocking(move || create_type(&state.db, &req)).await?;
    info!("Created event type '{}'", event_type.name);
    Ok((StatusCode::CREATED, Json(event_type)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateEventTypeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event_type = run_blocking(move || update_type(&state.db, &id.to_string(), req)).await?;
    Ok(Json(event_type))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || delete_type(&state.db, &id.to_string())).await?;
    info!("Deleted event type {}", id);
    Ok(StatusCode::NO_CONTENT)
}
