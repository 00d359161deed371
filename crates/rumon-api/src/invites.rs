use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use rumon_db::constraint::{ConstraintViolation, classify};
use rumon_db::queries;
use rumon_db::Database;
use rumon_types::api::{
    BatchInviteResult, Claims, EventSummary, FailedInvite, InviteBatchRequest, InviteRepublicsRequest,
    InviteResponse, InviteUsersRequest, UpdateInviteStatusRequest, UserInviteResponse,
};
use rumon_types::models::InviteStatus;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::events::{dedupe, summarize};
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::Errors;

const ALREADY_INVITED: &str = "User already invited to this event";
const USER_NOT_FOUND: &str = "User not found";

impl Validate for InviteBatchRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        let has_users = self.user_ids.as_ref().is_some_and(|ids| !ids.is_empty());
        let has_republics = self.republic_ids.as_ref().is_some_and(|ids| !ids.is_empty());
        Errors::new()
            .check(has_users || has_republics, "user_ids or republic_ids must not be empty")
            .finish()
    }
}

impl Validate for InviteRepublicsRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(!self.republic_ids.is_empty(), "republic_ids must not be empty")
            .finish()
    }
}

impl Validate for InviteUsersRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(!self.user_ids.is_empty(), "user_ids must not be empty")
            .finish()
    }
}

impl Validate for UpdateInviteStatusRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

fn ensure_event(conn: &Connection, event_id: &str) -> Result<(), ApiError> {
    if queries::events::exists(conn, event_id)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Event"))
    }
}

/// One invite attempt. `Ok(Err(reason))` is a per-user failure the batch
/// reports; `Err` is a storage failure.
fn try_invite(conn: &Connection, event_id: &str, user_id: &str) -> anyhow::Result<Result<InviteResponse, &'static str>> {
    if !queries::users::exists(conn, user_id)? {
        return Ok(Err(USER_NOT_FOUND));
    }
    if queries::invites::find(conn, event_id, user_id)?.is_some() {
        return Ok(Err(ALREADY_INVITED));
    }

    let id = Uuid::new_v4().to_string();
    match queries::invites::insert(conn, &id, event_id, user_id) {
        Ok(()) => {}
        // Lost a race with a concurrent invite of the same user.
        Err(e) if matches!(classify(&e), Some(ConstraintViolation::Unique { .. })) => {
            return Ok(Err(ALREADY_INVITED));
        }
        Err(e) => return Err(e),
    }

    let row = queries::invites::find_by_id(conn, &id)?
        .ok_or_else(|| anyhow::anyhow!("invite {} vanished after insert", id))?;
    Ok(Ok(convert::invite(row)))
}

// -- Services --

pub fn invite_user(db: &Database, event_id: Uuid, user_id: Uuid) -> Result<InviteResponse, ApiError> {
    let (event_id, user_id) = (event_id.to_string(), user_id.to_string());
    db.with_conn(|conn| -> Result<_, ApiError> {
        ensure_event(conn, &event_id)?;
        match try_invite(conn, &event_id, &user_id)? {
            Ok(invite) => Ok(invite),
            Err(USER_NOT_FOUND) => Err(ApiError::not_found("User")),
            Err(reason) => Err(ApiError::BadRequest(reason.into())),
        }
    })
}

/// Invite explicit users plus every current member of the given repúblicas.
/// Explicit ids come first; each id is attempted once and committed on its
/// own, so one failure never undoes the others.
pub fn invite_batch(
    db: &Database,
    event_id: Uuid,
    user_ids: &[Uuid],
    republic_ids: &[Uuid],
) -> Result<BatchInviteResult, ApiError> {
    let event_id = event_id.to_string();
    db.with_conn(|conn| -> Result<_, ApiError> {
        ensure_event(conn, &event_id)?;

        let mut members = Vec::new();
        for republic_id in dedupe(republic_ids.iter().copied()) {
            let republic_id = republic_id.to_string();
            if !queries::republics::exists(conn, &republic_id)? {
                return Err(ApiError::not_found("Republic"));
            }
            members.extend(
                queries::republics::member_ids(conn, &republic_id)?
                    .iter()
                    .map(|id| convert::uuid(id, "member id")),
            );
        }

        let mut result = BatchInviteResult::default();
        for user_id in dedupe(user_ids.iter().copied().chain(members)) {
            match try_invite(conn, &event_id, &user_id.to_string()) {
                Ok(Ok(invite)) => result.success.push(invite),
                Ok(Err(reason)) => result.failed.push(FailedInvite {
                    user_id,
                    reason: reason.into(),
                }),
                Err(e) => {
                    warn!("Invite of {} to event {} failed: {:#}", user_id, event_id, e);
                    result.failed.push(FailedInvite {
                        user_id,
                        reason: "Could not create invite".into(),
                    });
                }
            }
        }
        Ok(result)
    })
}

pub fn respond_to_invite(
    db: &Database,
    event_id: Uuid,
    user_id: Uuid,
    status: InviteStatus,
) -> Result<InviteResponse, ApiError> {
    let (event_id, user_id) = (event_id.to_string(), user_id.to_string());
    db.with_conn(|conn| -> Result<_, ApiError> {
        if queries::invites::set_status(conn, &event_id, &user_id, status)? == 0 {
            return Err(ApiError::not_found("Invite"));
        }
        queries::invites::find(conn, &event_id, &user_id)?
            .map(convert::invite)
            .ok_or_else(|| ApiError::not_found("Invite"))
    })
}

pub fn invites_of_user(db: &Database, user_id: Uuid) -> Result<Vec<UserInviteResponse>, ApiError> {
    db.with_conn(|conn| -> Result<_, ApiError> {
        let invites = queries::invites::for_user(conn, &user_id.to_string())?;

        let mut rows = Vec::with_capacity(invites.len());
        for invite in &invites {
            if let Some(row) = queries::events::find_by_id(conn, &invite.event_id)? {
                rows.push(row);
            }
        }
        // one invite per (event, user), so each summary is taken once
        let mut events: HashMap<Uuid, EventSummary> = summarize(conn, rows)?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        Ok(invites
            .into_iter()
            .filter_map(|invite| {
                let event = events.remove(&convert::uuid(&invite.event_id, "event_id"))?;
                Some(UserInviteResponse {
                    id: convert::uuid(&invite.id, "invite id"),
                    status: invite.status,
                    event,
                    created_at: convert::timestamp(&invite.created_at),
                    updated_at: convert::timestamp(&invite.updated_at),
                })
            })
            .collect())
    })
}

// -- Handlers --

pub async fn invite_one(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let invite = run_blocking(move || invite_user(&state.db, id, user_id)).await?;
    info!("Invited {} to event {}", user_id, id);
    Ok((StatusCode::CREATED, Json(invite)))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<UpdateInviteStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.sub != user_id {
        return Err(ApiError::Forbidden(
            "Only the invited user can answer an invite".into(),
        ));
    }
    let invite = run_blocking(move || respond_to_invite(&state.db, id, user_id, req.status)).await?;
    Ok(Json(invite))
}

pub async fn for_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invites = run_blocking(move || invites_of_user(&state.db, id)).await?;
    Ok(Json(invites))
}

async fn run_batch(
    state: AppState,
    event_id: Uuid,
    user_ids: Vec<Uuid>,
    republic_ids: Vec<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = run_blocking(move || invite_batch(&state.db, event_id, &user_ids, &republic_ids)).await?;
    info!(
        "Batch invite for event {}: {} sent, {} failed",
        event_id,
        result.success.len(),
        result.failed.len()
    );
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<InviteBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_batch(
        state,
        id,
        req.user_ids.unwrap_or_default(),
        req.republic_ids.unwrap_or_default(),
    )
    .await
}

pub async fn republic(
    State(state): State<AppState>,
    Path((id, republic_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    run_batch(state, id, vec![], vec![republic_id]).await
}

pub async fn republics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<InviteRepublicsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_batch(state, id, vec![], req.republic_ids).await
}

pub async fn users(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<InviteUsersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_batch(state, id, req.user_ids, vec![]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumon_db::queries::events::NewEvent;
    use rumon_types::models::{EventStatus, EventVisibility};

    struct Fixture {
        db: Database,
        event: Uuid,
        republic: Uuid,
        /// [outsider, member_a, member_b]
        users: Vec<Uuid>,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let event = Uuid::new_v4();
        let republic = Uuid::new_v4();
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        db.with_conn(|conn| -> anyhow::Result<()> {
            for (i, id) in users.iter().enumerate() {
                queries::users::insert_pending(
                    conn,
                    &id.to_string(),
                    &format!("User {i}"),
                    &format!("u{i}@rep.com"),
                    &format!("3199999000{i}"),
                    &format!("tok-{i}"),
                )?;
            }
            queries::republics::insert(conn, &republic.to_string(), "Rep Beta", "Rua B", None)?;
            for member in &users[1..] {
                queries::users::set_republic(conn, &member.to_string(), Some(republic.to_string().as_str()))?;
            }
            queries::events::insert(
                conn,
                &NewEvent {
                    id: &event.to_string(),
                    name: "Sarau",
                    description: None,
                    event_date: "2024-12-10",
                    event_time: "20:00",
                    location: "Sala",
                    media_url: None,
                    visibility: EventVisibility::Closed,
                    status: EventStatus::Approved,
                    created_by_id: &users[0].to_string(),
                    event_type_id: "00000000-0000-0000-0000-000000000002",
                },
            )?;
            Ok(())
        })
        .unwrap();

        Fixture { db, event, republic, users }
    }

    #[test]
    fn second_single_invite_is_rejected() {
        let f = fixture();
        let invite = invite_user(&f.db, f.event, f.users[0]).unwrap();
        assert_eq!(invite.status, InviteStatus::Pending);

        match invite_user(&f.db, f.event, f.users[0]) {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, ALREADY_INVITED),
            other => panic!("expected already invited, got {:?}", other.map(|i| i.id)),
        }
    }

    #[test]
    fn single_invite_checks_event_and_user() {
        let f = fixture();
        assert!(matches!(invite_user(&f.db, Uuid::new_v4(), f.users[0]), Err(ApiError::NotFound(_))));
        assert!(matches!(invite_user(&f.db, f.event, Uuid::new_v4()), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn batch_expands_republic_and_dedupes_against_explicit_ids() {
        let f = fixture();
        let ghost = Uuid::new_v4();
        let result = invite_batch(&f.db, f.event, &[f.users[2], ghost], &[f.republic]).unwrap();

        let invited: Vec<Uuid> = result.success.iter().map(|i| i.user_id).collect();
        assert_eq!(invited, vec![f.users[2], f.users[1]]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].user_id, ghost);
        assert_eq!(result.failed[0].reason, USER_NOT_FOUND);
    }

    #[test]
    fn batch_reports_existing_invites_per_user() {
        let f = fixture();
        invite_user(&f.db, f.event, f.users[1]).unwrap();

        let result = invite_batch(&f.db, f.event, &[], &[f.republic]).unwrap();
        assert_eq!(result.success.len(), 1);
        assert_eq!(result.success[0].user_id, f.users[2]);
        assert_eq!(result.failed[0].user_id, f.users[1]);
        assert_eq!(result.failed[0].reason, ALREADY_INVITED);
    }

    #[test]
    fn unknown_republic_fails_before_any_invite() {
        let f = fixture();
        let err = invite_batch(&f.db, f.event, &[f.users[0]], &[Uuid::new_v4()]).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let invites = invites_of_user(&f.db, f.users[0]).unwrap();
        assert!(invites.is_empty());
    }

    #[test]
    fn answering_an_invite_and_listing_it() {
        let f = fixture();
        invite_user(&f.db, f.event, f.users[1]).unwrap();

        let answered = respond_to_invite(&f.db, f.event, f.users[1], InviteStatus::Accepted).unwrap();
        assert_eq!(answered.status, InviteStatus::Accepted);

        let listed = invites_of_user(&f.db, f.users[1]).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, InviteStatus::Accepted);
        assert_eq!(listed[0].event.id, f.event);

        assert!(matches!(
            respond_to_invite(&f.db, f.event, f.users[2], InviteStatus::Declined),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn batch_request_needs_a_non_empty_list() {
        let empty = InviteBatchRequest {
            user_ids: Some(vec![]),
            republic_ids: None,
        };
        assert!(empty.validate().is_err());
        assert!(InviteBatchRequest::default().validate().is_err());
    }
}
