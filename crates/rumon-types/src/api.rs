use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    EventStatus, EventVisibility, Faculdade, InviteStatus, PostType, PostVisibility,
    RepublicStatus, RepublicTipo, UserHierarchy,
};

// -- JWT Claims --

/// Bearer token claims. Issued by `/auth/login`, checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreRegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreRegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub apelido: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub periodo_ingresso: Option<String>,
    pub origem: Option<String>,
    pub faculdade: Option<Faculdade>,
    pub curso: Option<String>,
    pub hierarquia: Option<UserHierarchy>,
    pub descricao: Option<String>,
    /// An empty string clears the photo.
    pub linkfoto_perfil: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetRepublicRequest {
    #[serde(alias = "republic_id")]
    pub republic_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialMediaRequest {
    pub telefone: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialMediaResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub telefone: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepublicRef {
    pub id: Uuid,
    pub name: String,
}

/// Full profile. Never carries the password hash or activation token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_active: bool,
    pub apelido: Option<String>,
    pub periodo_ingresso: Option<String>,
    pub origem: Option<String>,
    pub faculdade: Option<Faculdade>,
    pub curso: Option<String>,
    pub hierarquia: Option<UserHierarchy>,
    pub descricao: Option<String>,
    pub linkfoto_perfil: Option<String>,
    pub republic: Option<RepublicRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub apelido: Option<String>,
    pub linkfoto_perfil: Option<String>,
}

// -- Republics --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRepublicRequest {
    pub name: String,
    pub address: String,
    pub description: Option<String>,
}

/// Lenient partial update: blank strings are ignored, enum-like fields are
/// applied only when they name a known value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRepublicRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub link_foto: Option<String>,
    pub tipo: Option<String>,
    #[serde(alias = "fundada_em")]
    pub fundada_em: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "foto_capa")]
    pub foto_capa: Option<String>,
    pub instagram: Option<String>,
    pub hino: Option<String>,
    pub link_estatuto_pdf: Option<String>,
    #[serde(alias = "usuario_rumon_id")]
    pub usuario_rumon_id: Option<String>,
    #[serde(alias = "casa_id")]
    pub casa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CasaRequest {
    pub cidade: String,
    pub estado: String,
    pub endereco: Option<String>,
    pub valor_aluguel: Option<f64>,
    pub valor_total: Option<f64>,
    pub quantidade_vagas: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CasaResponse {
    pub id: Uuid,
    pub cidade: String,
    pub estado: String,
    pub endereco: Option<String>,
    pub valor_aluguel: Option<f64>,
    pub valor_total: Option<f64>,
    pub quantidade_vagas: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepublicSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub link_foto: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: Uuid,
    pub name: String,
    pub linkfoto_perfil: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepublicResponse {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub description: Option<String>,
    pub link_foto: Option<String>,
    pub tipo: Option<RepublicTipo>,
    pub fundada_em: Option<NaiveDate>,
    pub status: Option<RepublicStatus>,
    pub foto_capa: Option<String>,
    pub instagram: Option<String>,
    pub hino: Option<String>,
    pub link_estatuto_pdf: Option<String>,
    pub usuario_rumon: Option<UserSummary>,
    pub casa: Option<CasaResponse>,
    pub users: Vec<MemberSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Event types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEventTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub one_per_day: bool,
    pub months_in_advance: Option<u32>,
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEventTypeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub one_per_day: Option<bool>,
    pub months_in_advance: Option<u32>,
    pub requires_approval: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub one_per_day: bool,
    pub months_in_advance: Option<u32>,
    pub requires_approval: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventTypeRef {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEventRequest {
    pub name: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub location: String,
    pub media_url: Option<String>,
    #[serde(default)]
    pub visibility: EventVisibility,
    #[serde(alias = "event_type_id")]
    pub event_type_id: Uuid,
    #[serde(alias = "republic_ids")]
    pub republic_ids: Vec<Uuid>,
    #[serde(default, alias = "invited_user_ids")]
    pub invited_user_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub media_url: Option<String>,
    pub visibility: Option<EventVisibility>,
    #[serde(alias = "event_type_id")]
    pub event_type_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateEventStatusRequest {
    pub status: EventStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateInviteStatusRequest {
    pub status: InviteStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InviteBatchRequest {
    #[serde(alias = "user_ids")]
    pub user_ids: Option<Vec<Uuid>>,
    #[serde(alias = "republic_ids")]
    pub republic_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InviteRepublicsRequest {
    #[serde(alias = "republic_ids")]
    pub republic_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InviteUsersRequest {
    #[serde(alias = "user_ids")]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleEventsQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepublicCard {
    pub id: Uuid,
    pub name: String,
    pub link_foto: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRepublicResponse {
    pub id: Uuid,
    pub republic: RepublicCard,
}

/// Event as listed: type, creator and organizers, no invites.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub location: String,
    pub media_url: Option<String>,
    pub visibility: EventVisibility,
    pub status: EventStatus,
    pub rejection_reason: Option<String>,
    pub created_by: Option<UserSummary>,
    pub event_type: EventTypeRef,
    pub event_republics: Vec<EventRepublicResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: EventSummary,
    pub event_invites: Vec<InviteResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: InviteStatus,
    pub user: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInviteResponse {
    pub id: Uuid,
    pub status: InviteStatus,
    pub event: EventSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedInvite {
    pub user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchInviteResult {
    pub success: Vec<InviteResponse>,
    pub failed: Vec<FailedInvite>,
}

// -- Feed --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePostRequest {
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub visibility: PostVisibility,
    #[serde(default)]
    pub visible_republic_ids: Vec<Uuid>,
    #[serde(default)]
    pub visible_user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub linkfoto_perfil: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub visibility: PostVisibility,
    pub author: AuthorSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
    pub emoticons: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub linkfoto_perfil: Option<String>,
    pub republic: Option<RepublicRef>,
    pub periodo_ingresso: Option<String>,
    pub hierarquia: Option<UserHierarchy>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub emoticons: BTreeMap<String, i64>,
    pub author: CommentAuthor,
    pub likes_count: usize,
    pub user_liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub visibility: PostVisibility,
    pub author: AuthorSummary,
    pub likes_count: usize,
    pub user_liked: bool,
    pub comments: Vec<CommentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: pass the `createdAt` of the oldest post of the previous page.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}
