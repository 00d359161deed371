use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate};
use tracing::{debug, info};
use uuid::Uuid;

use rumon_db::queries::{self, Changes, republics::CasaFields};
use rumon_db::Database;
use rumon_types::api::{
    CasaRequest, CasaResponse, CreateRepublicRequest, MemberSummary, RepublicResponse,
    RepublicSummary, UpdateRepublicRequest,
};
use rumon_types::models::{RepublicStatus, RepublicTipo};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::{self, Errors};

impl Validate for CreateRepublicRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::not_blank(&self.name), "name must not be empty")
            .check(validate::not_blank(&self.address), "address must not be empty")
            .finish()
    }
}

/// Anything goes; unusable values are dropped field by field instead.
impl Validate for UpdateRepublicRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

impl Validate for CasaRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::not_blank(&self.cidade), "cidade must not be empty")
            .check(validate::is_uf(self.estado.trim()), "estado must be a two-letter state code")
            .check_opt(self.valor_aluguel, validate::is_money, "valorAluguel must be a positive amount with at most 2 decimals")
            .check_opt(self.valor_total, validate::is_money, "valorTotal must be a positive amount with at most 2 decimals")
            .check(self.quantidade_vagas > 0, "quantidadeVagas must be a positive integer")
            .finish()
    }
}

/// Trimmed, or `None` when blank.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_founding_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Turn a lenient PATCH body into column changes, skipping blank strings and
/// unknown enum values.
pub fn republic_changes(req: UpdateRepublicRequest) -> Changes {
    let mut changes = Changes::new();
    changes
        .set_opt("name", clean(req.name))
        .set_opt("address", clean(req.address))
        .set_opt("description", clean(req.description))
        .set_opt("link_foto", clean(req.link_foto))
        .set_opt("foto_capa", clean(req.foto_capa))
        .set_opt("instagram", clean(req.instagram))
        .set_opt("hino", clean(req.hino))
        .set_opt("link_estatuto_pdf", clean(req.link_estatuto_pdf))
        .set_opt("usuario_rumon_id", clean(req.usuario_rumon_id))
        .set_opt("casa_id", clean(req.casa_id));

    let tipo = clean(req.tipo).and_then(|t| t.to_lowercase().parse::<RepublicTipo>().ok());
    changes.set_opt("tipo", tipo.map(|t| t.as_str().to_string()));

    let status = clean(req.status).and_then(|s| s.to_lowercase().parse::<RepublicStatus>().ok());
    changes.set_opt("status", status.map(|s| s.as_str().to_string()));

    let fundada_em = clean(req.fundada_em).and_then(|d| parse_founding_date(&d));
    changes.set_opt("fundada_em", fundada_em.map(|d| d.format("%Y-%m-%d").to_string()));

    changes
}

// -- Services --

pub fn load_republic(db: &Database, id: &str) -> Result<RepublicResponse, ApiError> {
    db.with_conn(|conn| -> Result<_, ApiError> {
        let row = queries::republics::find_by_id(conn, id)?
            .ok_or_else(|| ApiError::not_found("Republic"))?;
        let rumon = match &row.usuario_rumon_id {
            Some(uid) => queries::users::find_by_id(conn, uid)?,
            None => None,
        };
        let casa = match &row.casa_id {
            Some(cid) => queries::republics::find_casa(conn, cid)?,
            None => None,
        };
        let members = queries::republics::members(conn, id)?;
        Ok(convert::republic(row, rumon, casa, members))
    })
}

pub fn create_republic(db: &Database, req: &CreateRepublicRequest) -> Result<RepublicResponse, ApiError> {
    let id = Uuid::new_v4().to_string();
    db.with_conn(|conn| {
        queries::republics::insert(
            conn,
            &id,
            req.name.trim(),
            req.address.trim(),
            req.description.as_deref(),
        )
    })?;
    load_republic(db, &id)
}

pub fn update_republic(db: &Database, id: &str, req: UpdateRepublicRequest) -> Result<RepublicResponse, ApiError> {
    let changes = republic_changes(req);
    let changed = db.with_conn(|conn| changes.apply(conn, "republics", id))?;
    if changed == 0 {
        return Err(ApiError::not_found("Republic"));
    }
    load_republic(db, id)
}

pub fn delete_republic(db: &Database, id: &str) -> Result<(), ApiError> {
    let deleted = db.with_conn(|conn| queries::republics::delete(conn, id))?;
    if deleted == 0 {
        return Err(ApiError::not_found("Republic"));
    }
    Ok(())
}

pub fn list_members(db: &Database, id: &str) -> Result<Vec<MemberSummary>, ApiError> {
    db.with_conn(|conn| -> Result<_, ApiError> {
        if !queries::republics::exists(conn, id)? {
            return Err(ApiError::not_found("Republic"));
        }
        Ok(queries::republics::members(conn, id)?)
    })
    .map(|rows| rows.into_iter().map(convert::member).collect())
}

pub fn replace_casa(db: &Database, republic_id: &str, req: &CasaRequest) -> Result<CasaResponse, ApiError> {
    let fields = CasaFields {
        cidade: req.cidade.trim(),
        estado: req.estado.trim(),
        endereco: req.endereco.as_deref(),
        valor_aluguel: req.valor_aluguel,
        valor_total: req.valor_total,
        quantidade_vagas: req.quantidade_vagas,
    };
    let estado = fields.estado.to_uppercase();
    let fields = CasaFields { estado: &estado, ..fields };

    db.transaction(|conn| -> Result<_, ApiError> {
        if !queries::republics::exists(conn, republic_id)? {
            return Err(ApiError::not_found("Republic"));
        }
        Ok(queries::republics::replace_casa(conn, republic_id, &fields)?)
    })
    .map(convert::casa)
}

// -- Handlers --

pub async fn create(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateRepublicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let republic = run_blocking(move || create_republic(&state.db, &req)).await?;
    info!("Created republic {} ({})", republic.name, republic.id);
    Ok((StatusCode::CREATED, Json(republic)))
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(move || Ok(state.db.with_conn(queries::republics::list)?)).await?;
    let summaries: Vec<RepublicSummary> = rows.into_iter().map(convert::republic_summary).collect();
    Ok(Json(summaries))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let republic = run_blocking(move || load_republic(&state.db, &id.to_string())).await?;
    Ok(Json(republic))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateRepublicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    debug!("Updating republic {}", id);
    let republic = run_blocking(move || update_republic(&state.db, &id.to_string(), req)).await?;
    Ok(Json(republic))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || delete_republic(&state.db, &id.to_string())).await?;
    info!("Deleted republic {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let members = run_blocking(move || list_members(&state.db, &id.to_string())).await?;
    Ok(Json(members))
}

pub async fn put_casa(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<CasaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let casa = run_blocking(move || replace_casa(&state.db, &id.to_string(), &req)).await?;
    Ok(Json(casa))
}
