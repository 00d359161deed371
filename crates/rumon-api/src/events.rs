use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use rumon_db::models::{EventRow, EventTypeRow};
use rumon_db::queries::{self, Changes, events::NewEvent};
use rumon_db::Database;
use rumon_types::api::{
    Claims, CreateEventRequest, EventResponse, EventSummary, UpdateEventRequest,
    UpdateEventStatusRequest, VisibleEventsQuery,
};
use rumon_types::models::EventStatus;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::{self, Errors};

const VISIBLE_YEARS: std::ops::RangeInclusive<i32> = 2020..=2030;

impl Validate for CreateEventRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::not_blank(&self.name), "name must not be empty")
            .check(validate::is_time(&self.event_time), "eventTime must be HH:MM")
            .check(validate::not_blank(&self.location), "location must not be empty")
            .check_opt(self.media_url.as_deref(), validate::is_http_url, "mediaUrl must be a valid URL")
            .finish()
    }
}

impl Validate for UpdateEventRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check_opt(self.name.as_deref(), validate::not_blank, "name must not be empty")
            .check_opt(self.event_time.as_deref(), validate::is_time, "eventTime must be HH:MM")
            .check_opt(self.location.as_deref(), validate::not_blank, "location must not be empty")
            .check_opt(self.media_url.as_deref(), validate::is_http_url, "mediaUrl must be a valid URL")
            .finish()
    }
}

impl Validate for UpdateEventStatusRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

/// Calendar months between `today` and `date`, ignoring the day of month.
pub fn months_ahead(today: NaiveDate, date: NaiveDate) -> i32 {
    (date.year() - today.year()) * 12 + (date.month() as i32 - today.month() as i32)
}

/// Enforce an event type's scheduling rules for `date`. `exclude_id` is the
/// event being edited, which never conflicts with itself.
fn check_scheduling(
    conn: &Connection,
    event_type: &EventTypeRow,
    date: NaiveDate,
    today: NaiveDate,
    exclude_id: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(required) = event_type.months_in_advance {
        if i64::from(months_ahead(today, date)) < i64::from(required) {
            return Err(ApiError::BadRequest(format!(
                "Events of type '{}' must be scheduled at least {} month(s) in advance",
                event_type.name, required
            )));
        }
    }

    let day = date.format("%Y-%m-%d").to_string();
    if event_type.one_per_day && queries::events::date_taken(conn, &event_type.id, &day, exclude_id)? {
        return Err(ApiError::BadRequest(format!(
            "An event of type '{}' already exists on {}",
            event_type.name, day
        )));
    }
    Ok(())
}

/// Keep the first occurrence of every id, in order.
pub(crate) fn dedupe(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Convert event rows, fetching every organizer in one query.
pub(crate) fn summarize(conn: &Connection, rows: Vec<EventRow>) -> anyhow::Result<Vec<EventSummary>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let organizers = queries::events::republics_for_events(conn, &ids)?;
    Ok(convert::event_summaries(rows, organizers))
}

fn list_with<F>(db: &Database, query: F) -> Result<Vec<EventSummary>, ApiError>
where
    F: FnOnce(&Connection) -> anyhow::Result<Vec<EventRow>>,
{
    db.with_conn(|conn| {
        let rows = query(conn)?;
        summarize(conn, rows)
    })
    .map_err(ApiError::from)
}

// -- Services --

pub fn load_event(db: &Database, id: &str) -> Result<EventResponse, ApiError> {
    db.with_conn(|conn| -> Result<_, ApiError> {
        let row = queries::events::find_by_id(conn, id)?
            .ok_or_else(|| ApiError::not_found("Event"))?;
        let event = summarize(conn, vec![row])?
            .pop()
            .ok_or_else(|| ApiError::not_found("Event"))?;
        let invites = queries::invites::for_event(conn, id)?;
        Ok(EventResponse {
            event,
            event_invites: invites.into_iter().map(convert::invite).collect(),
        })
    })
}

pub fn create_event(db: &Database, creator: Uuid, req: &CreateEventRequest) -> Result<EventResponse, ApiError> {
    create_event_on(db, creator, req, Utc::now().date_naive())
}

fn create_event_on(
    db: &Database,
    creator: Uuid,
    req: &CreateEventRequest,
    today: NaiveDate,
) -> Result<EventResponse, ApiError> {
    let id = Uuid::new_v4().to_string();
    let event_date = req.event_date.format("%Y-%m-%d").to_string();
    let creator = creator.to_string();
    let type_id = req.event_type_id.to_string();

    db.transaction(|conn| -> Result<_, ApiError> {
        let event_type = queries::events::find_type(conn, &type_id)?
            .ok_or_else(|| ApiError::not_found("Event type"))?;
        check_scheduling(conn, &event_type, req.event_date, today, None)?;

        let status = if event_type.requires_approval {
            EventStatus::Pending
        } else {
            EventStatus::Approved
        };

        queries::events::insert(
            conn,
            &NewEvent {
                id: &id,
                name: req.name.trim(),
                description: req.description.as_deref(),
                event_date: &event_date,
                event_time: req.event_time.trim(),
                location: req.location.trim(),
                media_url: req.media_url.as_deref(),
                visibility: req.visibility,
                status,
                created_by_id: &creator,
                event_type_id: &type_id,
            },
        )?;

        for republic_id in dedupe(req.republic_ids.iter().copied()) {
            queries::events::add_republic(conn, &id, &republic_id.to_string())?;
        }
        for user_id in dedupe(req.invited_user_ids.iter().copied()) {
            queries::invites::insert(conn, &Uuid::new_v4().to_string(), &id, &user_id.to_string())?;
        }
        Ok(())
    })?;

    load_event(db, &id)
}

pub fn update_event(db: &Database, id: &str, req: UpdateEventRequest) -> Result<EventResponse, ApiError> {
    update_event_on(db, id, req, Utc::now().date_naive())
}

fn update_event_on(
    db: &Database,
    id: &str,
    req: UpdateEventRequest,
    today: NaiveDate,
) -> Result<EventResponse, ApiError> {
    db.transaction(|conn| -> Result<_, ApiError> {
        let current = queries::events::find_by_id(conn, id)?
            .ok_or_else(|| ApiError::not_found("Event"))?;

        if req.event_date.is_some() || req.event_type_id.is_some() {
            let type_id = req
                .event_type_id
                .map(|t| t.to_string())
                .unwrap_or_else(|| current.event_type_id.clone());
            let event_type = queries::events::find_type(conn, &type_id)?
                .ok_or_else(|| ApiError::not_found("Event type"))?;
            let date = req.event_date.unwrap_or_else(|| convert::date(&current.event_date));
            check_scheduling(conn, &event_type, date, today, Some(id))?;
        }

        let mut changes = Changes::new();
        changes
            .set_opt("name", req.name.map(|n| n.trim().to_string()))
            .set_opt("description", req.description)
            .set_opt("event_date", req.event_date.map(|d| d.format("%Y-%m-%d").to_string()))
            .set_opt("event_time", req.event_time.map(|t| t.trim().to_string()))
            .set_opt("location", req.location.map(|l| l.trim().to_string()))
            .set_opt("media_url", req.media_url)
            .set_opt("visibility", req.visibility.map(|v| v.as_str().to_string()))
            .set_opt("event_type_id", req.event_type_id.map(|t| t.to_string()));
        changes.apply(conn, "events", id)?;
        Ok(())
    })?;

    load_event(db, id)
}

pub fn change_status(db: &Database, id: &str, req: UpdateEventStatusRequest) -> Result<EventResponse, ApiError> {
    let reason = req
        .rejection_reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    db.with_conn(|conn| -> Result<_, ApiError> {
        let current = queries::events::find_by_id(conn, id)?
            .ok_or_else(|| ApiError::not_found("Event"))?;

        if !current.status.can_transition_to(req.status) {
            return Err(ApiError::BadRequest(format!(
                "Cannot change event status from {} to {}",
                current.status, req.status
            )));
        }
        if req.status == EventStatus::Rejected && reason.is_none() {
            return Err(ApiError::BadRequest(
                "A rejection reason is required when rejecting an event".into(),
            ));
        }

        let reason = match req.status {
            EventStatus::Rejected => reason.as_deref(),
            _ => None,
        };
        queries::events::set_status(conn, id, req.status, reason)?;
        Ok(())
    })?;

    load_event(db, id)
}

pub fn delete_event(db: &Database, id: &str) -> Result<(), ApiError> {
    let deleted = db.with_conn(|conn| queries::events::delete(conn, id))?;
    if deleted == 0 {
        return Err(ApiError::not_found("Event"));
    }
    Ok(())
}

/// `[first day of month, first day of next month)` as stored date strings.
fn month_bounds(year: i32, month: u32) -> Result<(String, String), ApiError> {
    if !VISIBLE_YEARS.contains(&year) {
        return Err(ApiError::BadRequest(format!(
            "year must be between {} and {}",
            VISIBLE_YEARS.start(),
            VISIBLE_YEARS.end()
        )));
    }
    let invalid_month = || ApiError::BadRequest("month must be between 1 and 12".into());
    let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid_month)?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let until = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(invalid_month)?;
    Ok((
        from.format("%Y-%m-%d").to_string(),
        until.format("%Y-%m-%d").to_string(),
    ))
}

pub fn visible_in_month(db: &Database, user_id: Uuid, year: i32, month: u32) -> Result<Vec<EventSummary>, ApiError> {
    let (from, until) = month_bounds(year, month)?;
    let user_id = user_id.to_string();
    list_with(db, |conn| queries::events::list_visible(conn, &user_id, &from, &until))
}

// -- Handlers --

pub async fn list_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events = run_blocking(move || list_with(&state.db, queries::events::list_all)).await?;
    Ok(Json(events))
}

pub async fn list_public(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events = run_blocking(move || list_with(&state.db, queries::events::list_public)).await?;
    Ok(Json(events))
}

pub async fn list_by_republic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let events = run_blocking(move || {
        list_with(&state.db, |conn| queries::events::list_by_republic(conn, &id.to_string()))
    })
    .await?;
    Ok(Json(events))
}

pub async fn list_by_creator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let events = run_blocking(move || {
        list_with(&state.db, |conn| queries::events::list_by_creator(conn, &id.to_string()))
    })
    .await?;
    Ok(Json(events))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = run_blocking(move || load_event(&state.db, &id.to_string())).await?;
    Ok(Json(event))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = run_blocking(move || create_event(&state.db, claims.sub, &req)).await?;
    info!(
        "Event {} created by {} ({})",
        event.event.id, claims.sub, event.event.status
    );
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    debug!("Updating event {}", id);
    let event = run_blocking(move || update_event(&state.db, &id.to_string(), req)).await?;
    Ok(Json(event))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || delete_event(&state.db, &id.to_string())).await?;
    info!("Deleted event {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateEventStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = run_blocking(move || change_status(&state.db, &id.to_string(), req)).await?;
    info!("Event {} is now {}", id, event.event.status);
    Ok(Json(event))
}

pub async fn visible_by_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<VisibleEventsQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if query.user_id.is_some_and(|id| id != claims.sub) {
        return Err(ApiError::Forbidden(
            "You can only list events visible to yourself".into(),
        ));
    }
    let events = run_blocking(move || visible_in_month(&state.db, claims.sub, year, month)).await?;
    Ok(Json(events))
}
