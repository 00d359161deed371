use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use rumon_db::queries::{self, Changes, users::SocialMediaFields};
use rumon_db::Database;
use rumon_types::api::{
    Claims, MessageResponse, PreRegisterRequest, PreRegisterResponse, SetPasswordRequest,
    SetRepublicRequest, SocialMediaRequest, SocialMediaResponse, UpdateUserRequest, UserProfile,
};

use crate::auth::{AppState, hash_password};
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::{self, Errors};

impl Validate for PreRegisterRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::min_len(&self.name, 3), "name must be at least 3 characters")
            .check(validate::is_email(&self.email), "email must be a valid email address")
            .check(validate::is_br_phone(&self.phone), "phone must be a valid Brazilian phone number")
            .finish()
    }
}

impl Validate for SetPasswordRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(self.password.len() >= 6, "password must be at least 6 characters")
            .finish()
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check_opt(self.name.as_deref(), |n| validate::min_len(n, 3), "name must be at least 3 characters")
            .check_opt(self.email.as_deref(), validate::is_email, "email must be a valid email address")
            .check_opt(self.phone.as_deref(), validate::is_br_phone, "phone must be a valid Brazilian phone number")
            .check_opt(
                self.linkfoto_perfil.as_deref(),
                |url| url.is_empty() || validate::is_http_url(url),
                "linkfotoPerfil must be a valid URL",
            )
            .finish()
    }
}

impl Validate for SetRepublicRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

impl Validate for SocialMediaRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check_opt(self.telefone.as_deref(), validate::is_br_phone, "telefone must be a valid Brazilian phone number")
            .check_opt(self.whatsapp.as_deref(), validate::is_br_phone, "whatsapp must be a valid Brazilian phone number")
            .check_opt(
                self.linkedin.as_deref(),
                |url| url.is_empty() || validate::is_http_url(url),
                "linkedin must be a valid URL",
            )
            .finish()
    }
}

/// Outcome of a pre-registration. The activation token is delivered out of
/// band and never echoed in the HTTP response.
#[derive(Debug)]
pub struct PreRegistered {
    pub user_id: Uuid,
    pub activation_token: String,
}

// -- Services --

pub fn pre_register_user(db: &Database, req: &PreRegisterRequest) -> Result<PreRegistered, ApiError> {
    let user_id = Uuid::new_v4();
    let activation_token = hex::encode(rand::random::<[u8; 32]>());
    let email = req.email.trim().to_lowercase();
    let phone = validate::normalize_phone(&req.phone);

    // The unique indexes still catch a concurrent duplicate.
    db.transaction(|conn| -> Result<_, ApiError> {
        if queries::users::find_by_email(conn, &email)?.is_some() {
            return Err(ApiError::Conflict("This email is already registered".into()));
        }
        if queries::users::phone_exists(conn, &phone)? {
            return Err(ApiError::Conflict("This phone is already registered".into()));
        }
        queries::users::insert_pending(
            conn,
            &user_id.to_string(),
            req.name.trim(),
            &email,
            &phone,
            &activation_token,
        )?;
        Ok(())
    })?;

    Ok(PreRegistered {
        user_id,
        activation_token,
    })
}

pub fn activate_user(db: &Database, token: &str, password: &str) -> Result<Uuid, ApiError> {
    let password_hash = hash_password(password)?;

    db.transaction(|conn| -> Result<_, ApiError> {
        let id = queries::users::find_id_by_activation_token(conn, token)?
            .ok_or_else(|| ApiError::NotFound("Invalid activation token".into()))?;
        queries::users::activate(conn, &id, &password_hash)?;
        Ok(convert::uuid(&id, "user id"))
    })
}

pub fn load_profile(db: &Database, id: Uuid) -> Result<UserProfile, ApiError> {
    db.with_conn(|conn| queries::users::find_by_id(conn, &id.to_string()))?
        .map(convert::user_profile)
        .ok_or_else(|| ApiError::not_found("User"))
}

pub fn update_profile(db: &Database, id: Uuid, req: UpdateUserRequest) -> Result<UserProfile, ApiError> {
    let mut changes = Changes::new();
    changes
        .set_opt("name", req.name.map(|s| s.trim().to_string()))
        .set_opt("apelido", req.apelido)
        .set_opt("email", req.email.map(|s| s.trim().to_lowercase()))
        .set_opt("phone", req.phone.as_deref().map(validate::normalize_phone))
        .set_opt("periodo_ingresso", req.periodo_ingresso)
        .set_opt("origem", req.origem)
        .set_opt("faculdade", req.faculdade.map(|f| f.as_str().to_string()))
        .set_opt("curso", req.curso)
        .set_opt("hierarquia", req.hierarquia.map(|h| h.as_str().to_string()))
        .set_opt("descricao", req.descricao);
    if let Some(link) = req.linkfoto_perfil {
        // empty string clears the photo
        changes.set("linkfoto_perfil", Some(link).filter(|l| !l.is_empty()));
    }

    let id = id.to_string();
    db.with_conn(|conn| -> Result<_, ApiError> {
        if !changes.is_empty() {
            changes.apply(conn, "users", &id)?;
        }
        Ok(queries::users::find_by_id(conn, &id)?)
    })?
    .map(convert::user_profile)
    .ok_or_else(|| ApiError::not_found("User"))
}

pub fn set_membership(db: &Database, id: Uuid, republic_id: Option<Uuid>) -> Result<UserProfile, ApiError> {
    let id = id.to_string();
    let republic_id = republic_id.map(|r| r.to_string());

    db.transaction(|conn| -> Result<_, ApiError> {
        if let Some(rid) = &republic_id {
            if !queries::republics::exists(conn, rid)? {
                return Err(ApiError::not_found("Republic"));
            }
        }
        if queries::users::set_republic(conn, &id, republic_id.as_deref())? == 0 {
            return Err(ApiError::not_found("User"));
        }
        queries::users::find_by_id(conn, &id)?.ok_or_else(|| ApiError::not_found("User"))
    })
    .map(convert::user_profile)
}

pub fn save_social_media(
    db: &Database,
    user_id: Uuid,
    req: &SocialMediaRequest,
) -> Result<SocialMediaResponse, ApiError> {
    let fields = SocialMediaFields {
        telefone: req.telefone.as_deref(),
        whatsapp: req.whatsapp.as_deref(),
        instagram: req.instagram.as_deref(),
        linkedin: req.linkedin.as_deref(),
    };
    let row = db.with_conn(|conn| queries::users::upsert_social_media(conn, &user_id.to_string(), &fields))?;
    Ok(convert::social_media(row))
}

pub fn load_social_media(db: &Database, user_id: Uuid) -> Result<SocialMediaResponse, ApiError> {
    db.with_conn(|conn| queries::users::find_social_media(conn, &user_id.to_string()))?
        .map(convert::social_media)
        .ok_or_else(|| ApiError::not_found("Social media"))
}

fn ensure_self(claims: &Claims, id: Uuid) -> Result<(), ApiError> {
    if claims.sub == id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You can only modify your own account".into()))
    }
}

// -- Handlers --

pub async fn pre_register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<PreRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registered = run_blocking(move || pre_register_user(&state.db, &req)).await?;
    info!("Pre-registered user {}", registered.user_id);

    Ok((
        StatusCode::CREATED,
        Json(PreRegisterResponse {
            message: "Pre-registration successful".into(),
            user_id: registered.user_id,
        }),
    ))
}

pub async fn set_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidJson(req): ValidJson<SetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = run_blocking(move || activate_user(&state.db, &token, &req.password)).await?;
    info!("User {} activated", user_id);

    Ok(Json(MessageResponse {
        message: "Password set successfully".into(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(move || load_profile(&state.db, claims.sub)).await?;
    Ok(Json(profile))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(move || load_profile(&state.db, id)).await?;
    Ok(Json(profile))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&claims, id)?;
    let profile = run_blocking(move || update_profile(&state.db, id, req)).await?;
    Ok(Json(profile))
}

pub async fn set_republic(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<SetRepublicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&claims, id)?;
    let profile = run_blocking(move || set_membership(&state.db, id, req.republic_id)).await?;
    Ok(Json(profile))
}

pub async fn put_social_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<SocialMediaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&claims, id)?;
    let social = run_blocking(move || save_social_media(&state.db, id, &req)).await?;
    Ok(Json(social))
}

pub async fn get_social_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let social = run_blocking(move || load_social_media(&state.db, id)).await?;
    Ok(Json(social))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use rumon_types::models::UserHierarchy;

    fn pre_register_req(email: &str, phone: &str) -> PreRegisterRequest {
        PreRegisterRequest {
            name: "Ana Souza".into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    #[test]
    fn duplicate_email_or_phone_conflicts() {
        let db = Database::open_in_memory().unwrap();
        pre_register_user(&db, &pre_register_req("ana@rep.com", "31999990001")).unwrap();

        let err = pre_register_user(&db, &pre_register_req("ANA@rep.com", "31999990002"))
            .unwrap_err()
            .into_response();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = pre_register_user(&db, &pre_register_req("bia@rep.com", "31999990001"))
            .unwrap_err()
            .into_response();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn email_conflict_is_reported_before_phone() {
        let db = Database::open_in_memory().unwrap();
        pre_register_user(&db, &pre_register_req("ana@rep.com", "31999990001")).unwrap();

        let err = pre_register_user(&db, &pre_register_req("ana@rep.com", "31999990001")).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "This email is already registered"));

        let err = pre_register_user(&db, &pre_register_req("bia@rep.com", "31999990001")).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "This phone is already registered"));
    }

    #[test]
    fn formatted_phone_matches_plain_digits() {
        let db = Database::open_in_memory().unwrap();
        pre_register_user(&db, &pre_register_req("ana@rep.com", "(31) 99999-0001")).unwrap();

        let row = db
            .with_conn(|conn| queries::users::find_by_email(conn, "ana@rep.com"))
            .unwrap()
            .unwrap();
        assert_eq!(row.phone, "31999990001");

        let err = pre_register_user(&db, &pre_register_req("bia@rep.com", "+55 31999990001")).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn activation_sets_password_and_consumes_token() {
        let db = Database::open_in_memory().unwrap();
        let reg = pre_register_user(&db, &pre_register_req("ana@rep.com", "31999990001")).unwrap();
        assert_eq!(reg.activation_token.len(), 64);

        let id = activate_user(&db, &reg.activation_token, "segredo1").unwrap();
        assert_eq!(id, reg.user_id);

        let row = db
            .with_conn(|conn| queries::users::find_by_email(conn, "ana@rep.com"))
            .unwrap()
            .unwrap();
        assert!(row.is_active);
        assert!(verify_password("segredo1", row.password.as_deref().unwrap()).unwrap());

        assert!(matches!(
            activate_user(&db, &reg.activation_token, "outra123"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn partial_update_touches_only_sent_fields() {
        let db = Database::open_in_memory().unwrap();
        let reg = pre_register_user(&db, &pre_register_req("ana@rep.com", "31999990001")).unwrap();

        let profile = update_profile(
            &db,
            reg.user_id,
            UpdateUserRequest {
                apelido: Some("Aninha".into()),
                hierarquia: Some(UserHierarchy::Decano),
                linkfoto_perfil: Some("https://cdn.example.com/ana.png".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(profile.name, "Ana Souza");
        assert_eq!(profile.apelido.as_deref(), Some("Aninha"));
        assert_eq!(profile.hierarquia, Some(UserHierarchy::Decano));

        let cleared = update_profile(
            &db,
            reg.user_id,
            UpdateUserRequest {
                linkfoto_perfil: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cleared.linkfoto_perfil, None);
        assert_eq!(cleared.apelido.as_deref(), Some("Aninha"));
    }

    #[test]
    fn membership_requires_existing_republic() {
        let db = Database::open_in_memory().unwrap();
        let reg = pre_register_user(&db, &pre_register_req("ana@rep.com", "31999990001")).unwrap();

        assert!(matches!(
            set_membership(&db, reg.user_id, Some(Uuid::new_v4())),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn update_validation_reports_every_field() {
        let req = UpdateUserRequest {
            name: Some("Al".into()),
            email: Some("nope".into()),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap_err().len(), 2);
    }
}
