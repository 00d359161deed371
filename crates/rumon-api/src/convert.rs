//! Row -> wire conversions. Stored ids and timestamps are trusted but not
//! assumed: anything that fails to parse is logged and defaulted so one bad
//! row cannot fail a whole listing.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use rumon_db::models::{
    CasaRow, CommentRow, EventRepublicRow, EventRow, EventTypeRow, InviteRow, MemberRow, PostRow,
    RepublicRow, SocialMediaRow, UserRefRow, UserRow,
};
use rumon_types::api::{
    AuthorSummary, CasaResponse, CommentAuthor, CommentResponse, EventRepublicResponse,
    EventSummary, EventTypeRef, EventTypeResponse, InviteResponse, MemberSummary, PostResponse,
    RepublicCard, RepublicRef, RepublicResponse, RepublicSummary, SocialMediaResponse,
    UserProfile, UserSummary,
};

pub fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub fn timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // datetime('now') defaults: "YYYY-MM-DD HH:MM:SS", no zone
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!("Corrupt date '{}': {}", raw, e);
        NaiveDate::default()
    })
}

// -- Users --

pub fn user_profile(row: UserRow) -> UserProfile {
    let republic = match (&row.republic_id, &row.republic_name) {
        (Some(id), Some(name)) => Some(RepublicRef {
            id: uuid(id, "republic_id"),
            name: name.clone(),
        }),
        _ => None,
    };

    UserProfile {
        id: uuid(&row.id, "user id"),
        name: row.name,
        email: row.email,
        phone: row.phone,
        is_active: row.is_active,
        apelido: row.apelido,
        periodo_ingresso: row.periodo_ingresso,
        origem: row.origem,
        faculdade: row.faculdade,
        curso: row.curso,
        hierarquia: row.hierarquia,
        descricao: row.descricao,
        linkfoto_perfil: row.linkfoto_perfil,
        republic,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn user_summary(row: UserRefRow) -> UserSummary {
    UserSummary {
        id: uuid(&row.id, "user id"),
        name: row.name,
        apelido: row.apelido,
        linkfoto_perfil: row.linkfoto_perfil,
    }
}

pub fn social_media(row: SocialMediaRow) -> SocialMediaResponse {
    SocialMediaResponse {
        id: uuid(&row.id, "social media id"),
        user_id: uuid(&row.user_id, "user id"),
        telefone: row.telefone,
        whatsapp: row.whatsapp,
        instagram: row.instagram,
        linkedin: row.linkedin,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

// -- Republics --

pub fn republic_summary(row: RepublicRow) -> RepublicSummary {
    RepublicSummary {
        id: uuid(&row.id, "republic id"),
        name: row.name,
        description: row.description,
        link_foto: row.link_foto,
    }
}

pub fn member(row: MemberRow) -> MemberSummary {
    MemberSummary {
        id: uuid(&row.id, "user id"),
        name: row.name,
        linkfoto_perfil: row.linkfoto_perfil,
    }
}

pub fn casa(row: CasaRow) -> CasaResponse {
    CasaResponse {
        id: uuid(&row.id, "casa id"),
        cidade: row.cidade,
        estado: row.estado,
        endereco: row.endereco,
        valor_aluguel: row.valor_aluguel,
        valor_total: row.valor_total,
        quantidade_vagas: row.quantidade_vagas,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn republic(
    row: RepublicRow,
    usuario_rumon: Option<UserRow>,
    casa_row: Option<CasaRow>,
    members: Vec<MemberRow>,
) -> RepublicResponse {
    RepublicResponse {
        id: uuid(&row.id, "republic id"),
        name: row.name,
        address: row.address,
        description: row.description,
        link_foto: row.link_foto,
        tipo: row.tipo,
        fundada_em: row.fundada_em.as_deref().map(date),
        status: row.status,
        foto_capa: row.foto_capa,
        instagram: row.instagram,
        hino: row.hino,
        link_estatuto_pdf: row.link_estatuto_pdf,
        usuario_rumon: usuario_rumon.map(|u| UserSummary {
            id: uuid(&u.id, "user id"),
            name: u.name,
            apelido: u.apelido,
            linkfoto_perfil: u.linkfoto_perfil,
        }),
        casa: casa_row.map(casa),
        users: members.into_iter().map(member).collect(),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

// -- Events --

pub fn event_type(row: EventTypeRow) -> EventTypeResponse {
    EventTypeResponse {
        id: uuid(&row.id, "event type id"),
        name: row.name,
        description: row.description,
        color: row.color,
        one_per_day: row.one_per_day,
        months_in_advance: row.months_in_advance,
        requires_approval: row.requires_approval,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

fn event_republic(row: EventRepublicRow) -> EventRepublicResponse {
    EventRepublicResponse {
        id: uuid(&row.id, "event republic id"),
        republic: RepublicCard {
            id: uuid(&row.republic_id, "republic id"),
            name: row.republic_name,
            link_foto: row.republic_link_foto,
        },
    }
}

/// Attach each event's organizers (fetched in one batch) and convert.
pub fn event_summaries(rows: Vec<EventRow>, organizers: Vec<EventRepublicRow>) -> Vec<EventSummary> {
    let mut by_event: HashMap<String, Vec<EventRepublicResponse>> = HashMap::new();
    for org in organizers {
        by_event
            .entry(org.event_id.clone())
            .or_default()
            .push(event_republic(org));
    }

    rows.into_iter()
        .map(|row| {
            let republics = by_event.remove(&row.id).unwrap_or_default();
            event_summary(row, republics)
        })
        .collect()
}

fn event_summary(row: EventRow, event_republics: Vec<EventRepublicResponse>) -> EventSummary {
    EventSummary {
        id: uuid(&row.id, "event id"),
        name: row.name,
        description: row.description,
        event_date: date(&row.event_date),
        event_time: row.event_time,
        location: row.location,
        media_url: row.media_url,
        visibility: row.visibility,
        status: row.status,
        rejection_reason: row.rejection_reason,
        created_by: row.created_by.map(user_summary),
        event_type: EventTypeRef {
            id: uuid(&row.event_type_id, "event_type_id"),
            name: row.event_type_name,
            color: row.event_type_color,
        },
        event_republics,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn invite(row: InviteRow) -> InviteResponse {
    InviteResponse {
        id: uuid(&row.id, "invite id"),
        event_id: uuid(&row.event_id, "event_id"),
        user_id: uuid(&row.user_id, "user_id"),
        status: row.status,
        user: row.user.map(user_summary),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

// -- Feed --

pub fn post_author(row: &PostRow) -> AuthorSummary {
    AuthorSummary {
        id: uuid(&row.author_id, "author_id"),
        name: row.author_name.clone(),
        email: row.author_email.clone(),
        linkfoto_perfil: row.author_linkfoto_perfil.clone(),
    }
}

pub fn post(row: PostRow) -> PostResponse {
    PostResponse {
        id: uuid(&row.id, "post id"),
        author: post_author(&row),
        post_type: row.post_type,
        content: row.content,
        media_url: row.media_url,
        visibility: row.visibility,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

/// A comment with its like tally as seen by one viewer.
pub fn comment(row: CommentRow, likes_count: usize, user_liked: bool) -> CommentResponse {
    let republic = match (&row.author_republic_id, &row.author_republic_name) {
        (Some(id), Some(name)) => Some(RepublicRef {
            id: uuid(id, "republic_id"),
            name: name.clone(),
        }),
        _ => None,
    };

    CommentResponse {
        id: uuid(&row.id, "comment id"),
        post_id: uuid(&row.post_id, "post_id"),
        emoticons: emoticons(&row.emoticons),
        content: row.content,
        author: CommentAuthor {
            id: uuid(&row.author_id, "author_id"),
            name: row.author_name,
            email: row.author_email,
            linkfoto_perfil: row.author_linkfoto_perfil,
            republic,
            periodo_ingresso: row.author_periodo_ingresso,
            hierarquia: row.author_hierarquia,
        },
        likes_count,
        user_liked,
        created_at: timestamp(&row.created_at),
    }
}

/// Stored emoticon JSON back to a map; anything unreadable becomes empty.
pub fn emoticons(raw: &str) -> BTreeMap<String, i64> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt emoticons '{}': {}", raw, e);
        BTreeMap::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_rfc3339_and_sqlite_defaults() {
        let a = timestamp("2024-12-01T10:00:00.000Z");
        let b = timestamp("2024-12-01 10:00:00");
        assert_eq!(a, b);
        assert_eq!(timestamp("garbage"), DateTime::<Utc>::default());
    }

    #[test]
    fn corrupt_ids_default_instead_of_failing() {
        assert_eq!(uuid("not-a-uuid", "test"), Uuid::default());
        let id = Uuid::new_v4();
        assert_eq!(uuid(&id.to_string(), "test"), id);
    }

    #[test]
    fn emoticons_round_trip_from_storage() {
        let map = emoticons(r#"{"🔥": 3}"#);
        assert_eq!(map.get("🔥"), Some(&3));
        assert!(emoticons("not json").is_empty());
    }
}
