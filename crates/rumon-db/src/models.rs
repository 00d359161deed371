//! Database row types, one per SELECT shape. Ids and timestamps stay as the
//! stored TEXT; enum columns are parsed on read so a bad value surfaces as a
//! query error rather than leaking to the wire.
use rumon_types::models::{
    EventStatus, EventVisibility, Faculdade, InviteStatus, PostType, PostVisibility,
    RepublicStatus, RepublicTipo, UserHierarchy,
};

// -- Users --

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: Option<String>,
    pub is_active: bool,
    pub apelido: Option<String>,
    pub periodo_ingresso: Option<String>,
    pub origem: Option<String>,
    pub faculdade: Option<Faculdade>,
    pub curso: Option<String>,
    pub hierarquia: Option<UserHierarchy>,
    pub descricao: Option<String>,
    pub linkfoto_perfil: Option<String>,
    pub republic_id: Option<String>,
    pub republic_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct SocialMediaRow {
    pub id: String,
    pub user_id: String,
    pub telefone: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Columns shared by every "who is this" reference (creator, invitee, rumon).
#[derive(Debug, Clone)]
pub struct UserRefRow {
    pub id: String,
    pub name: String,
    pub apelido: Option<String>,
    pub linkfoto_perfil: Option<String>,
}

// -- Republics --

#[derive(Debug, Clone)]
pub struct RepublicRow {
    pub id: String,
    pub name: String,
    pub address: String,
    pub description: Option<String>,
    pub link_foto: Option<String>,
    pub tipo: Option<RepublicTipo>,
    pub fundada_em: Option<String>,
    pub status: Option<RepublicStatus>,
    pub foto_capa: Option<String>,
    pub instagram: Option<String>,
    pub hino: Option<String>,
    pub link_estatuto_pdf: Option<String>,
    pub usuario_rumon_id: Option<String>,
    pub casa_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CasaRow {
    pub id: String,
    pub cidade: String,
    pub estado: String,
    pub endereco: Option<String>,
    pub valor_aluguel: Option<f64>,
    pub valor_total: Option<f64>,
    pub quantidade_vagas: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    pub linkfoto_perfil: Option<String>,
}

// -- Events --

#[derive(Debug, Clone)]
pub struct EventTypeRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub one_per_day: bool,
    pub months_in_advance: Option<u32>,
    pub requires_approval: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// An event joined with its type and creator.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub media_url: Option<String>,
    pub visibility: EventVisibility,
    pub status: EventStatus,
    pub rejection_reason: Option<String>,
    pub event_type_id: String,
    pub event_type_name: String,
    pub event_type_color: Option<String>,
    pub created_by: Option<UserRefRow>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct EventRepublicRow {
    pub id: String,
    pub event_id: String,
    pub republic_id: String,
    pub republic_name: String,
    pub republic_link_foto: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InviteRow {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: InviteStatus,
    pub user: Option<UserRefRow>,
    pub created_at: String,
    pub updated_at: String,
}

// -- Feed --

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub post_type: PostType,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub visibility: PostVisibility,
    pub author_id: String,
    pub author_name: String,
    pub author_email: String,
    pub author_linkfoto_perfil: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub content: String,
    /// Raw JSON object text, e.g. `{"😂": 2}`.
    pub emoticons: String,
    pub author_id: String,
    pub author_name: String,
    pub author_email: String,
    pub author_linkfoto_perfil: Option<String>,
    pub author_periodo_ingresso: Option<String>,
    pub author_hierarquia: Option<UserHierarchy>,
    pub author_republic_id: Option<String>,
    pub author_republic_name: Option<String>,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

pub struct LikeRow {
    pub target_id: String,
    pub user_id: String,
}
