use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use rumon_db::models::{LikeRow, PostRow};
use rumon_db::queries::{self, feed::LikeTarget, feed::NewPost};
use rumon_db::Database;
use rumon_types::api::{
    Claims, CommentResponse, CreateCommentRequest, CreatePostRequest, FeedEntry, FeedQuery,
    LikeResponse, PostResponse,
};
use rumon_types::models::{PostType, PostVisibility};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::events::dedupe;
use crate::extract::{Validate, ValidJson};
use crate::run_blocking;
use crate::validate::{self, Errors};

const MAX_FEED_LIMIT: u32 = 200;

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        let has_content = self.content.as_deref().is_some_and(validate::not_blank);
        let media_ok = self.media_url.as_deref().is_some_and(validate::is_http_url);

        let mut errors = Errors::new();
        match self.post_type {
            PostType::Text => errors.check(has_content, "content is required for text posts"),
            PostType::Image | PostType::Video => errors.check(
                media_ok,
                format!("mediaUrl must be a valid URL for {} posts", self.post_type),
            ),
        };
        errors
            .check(
                self.visibility != PostVisibility::Republics || !self.visible_republic_ids.is_empty(),
                "visibleRepublicIds must not be empty for republic posts",
            )
            .check(
                self.visibility != PostVisibility::Users || !self.visible_user_ids.is_empty(),
                "visibleUserIds must not be empty for user posts",
            )
            .finish()
    }
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        Errors::new()
            .check(validate::not_blank(&self.content), "content must not be empty")
            .finish()
    }
}

/// Live post or 404; soft-deleted posts count as missing.
fn live_post(conn: &Connection, id: &str) -> Result<PostRow, ApiError> {
    queries::feed::find_post(conn, id)?
        .filter(|p| p.deleted_at.is_none())
        .ok_or_else(|| ApiError::not_found("Post"))
}

fn ensure_author(author_id: &str, user: Uuid, what: &str) -> Result<(), ApiError> {
    if convert::uuid(author_id, "author_id") == user {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("You can only delete your own {}", what)))
    }
}

/// Like count per target, and which targets `viewer` liked.
fn tally(likes: Vec<LikeRow>, viewer: &str) -> HashMap<String, (usize, bool)> {
    let mut out: HashMap<String, (usize, bool)> = HashMap::new();
    for like in likes {
        let entry = out.entry(like.target_id).or_default();
        entry.0 += 1;
        entry.1 |= like.user_id == viewer;
    }
    out
}

// -- Services --

pub fn publish_post(db: &Database, author: Uuid, req: &CreatePostRequest) -> Result<PostResponse, ApiError> {
    let id = Uuid::new_v4().to_string();
    let author = author.to_string();

    let row = db.transaction(|conn| -> Result<_, ApiError> {
        queries::feed::insert_post(
            conn,
            &NewPost {
                id: &id,
                post_type: req.post_type,
                content: req.content.as_deref().map(str::trim),
                media_url: req.media_url.as_deref(),
                visibility: req.visibility,
                author_id: &author,
            },
        )?;

        match req.visibility {
            PostVisibility::All => {}
            PostVisibility::Republics => {
                for republic_id in dedupe(req.visible_republic_ids.iter().copied()) {
                    queries::feed::add_visible_republic(conn, &id, &republic_id.to_string())?;
                }
            }
            PostVisibility::Users => {
                for user_id in dedupe(req.visible_user_ids.iter().copied()) {
                    queries::feed::add_visible_user(conn, &id, &user_id.to_string())?;
                }
            }
        }

        live_post(conn, &id)
    })?;

    Ok(convert::post(row))
}

pub fn remove_post(db: &Database, user: Uuid, post_id: Uuid) -> Result<(), ApiError> {
    let post_id = post_id.to_string();
    db.with_conn(|conn| -> Result<_, ApiError> {
        let post = live_post(conn, &post_id)?;
        ensure_author(&post.author_id, user, "posts")?;
        queries::feed::soft_delete_post(conn, &post_id)?;
        Ok(())
    })
}

pub fn add_comment(
    db: &Database,
    author: Uuid,
    post_id: Uuid,
    req: &CreateCommentRequest,
) -> Result<CommentResponse, ApiError> {
    let id = Uuid::new_v4().to_string();
    let post_id = post_id.to_string();
    let emoticons = serde_json::to_string(&req.emoticons.clone().unwrap_or_default())
        .map_err(|e| ApiError::Internal(format!("emoticon encoding failed: {}", e)))?;

    db.with_conn(|conn| -> Result<_, ApiError> {
        live_post(conn, &post_id)?;
        queries::feed::insert_comment(
            conn,
            &id,
            &post_id,
            &author.to_string(),
            req.content.trim(),
            &emoticons,
        )?;
        let row = queries::feed::find_comment(conn, &id)?
            .ok_or_else(|| ApiError::not_found("Comment"))?;
        Ok(convert::comment(row, 0, false))
    })
}

pub fn remove_comment(db: &Database, user: Uuid, comment_id: Uuid) -> Result<(), ApiError> {
    let comment_id = comment_id.to_string();
    db.with_conn(|conn| -> Result<_, ApiError> {
        let comment = queries::feed::find_comment(conn, &comment_id)?
            .filter(|c| c.deleted_at.is_none())
            .ok_or_else(|| ApiError::not_found("Comment"))?;
        ensure_author(&comment.author_id, user, "comments")?;
        queries::feed::soft_delete_comment(conn, &comment_id)?;
        Ok(())
    })
}

/// Flip `user`'s like on a live post or comment.
pub fn toggle_like(db: &Database, target: LikeTarget, target_id: Uuid, user: Uuid) -> Result<bool, ApiError> {
    let target_id = target_id.to_string();
    db.with_conn(|conn| -> Result<_, ApiError> {
        match target {
            LikeTarget::Post => {
                live_post(conn, &target_id)?;
            }
            LikeTarget::Comment => {
                queries::feed::find_comment(conn, &target_id)?
                    .filter(|c| c.deleted_at.is_none())
                    .ok_or_else(|| ApiError::not_found("Comment"))?;
            }
        }
        Ok(queries::feed::toggle_like(conn, target, &target_id, &user.to_string())?)
    })
}

/// Rewrite a client `createdAt` into the stored millisecond form so the
/// text comparison in the query orders correctly.
fn cursor(before: &str) -> Result<String, ApiError> {
    DateTime::parse_from_rfc3339(before.trim())
        .map(|t| t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true))
        .map_err(|_| ApiError::BadRequest("before must be an RFC 3339 timestamp".into()))
}

/// One page of `viewer`'s feed with likes and live comments attached.
pub fn load_feed(db: &Database, viewer: Uuid, limit: u32, before: Option<&str>) -> Result<Vec<FeedEntry>, ApiError> {
    let limit = limit.clamp(1, MAX_FEED_LIMIT);
    let viewer = viewer.to_string();
    let before = before.map(cursor).transpose()?;

    db.with_conn(|conn| -> Result<_, ApiError> {
        let posts = queries::feed::feed_for(conn, &viewer, limit, before.as_deref())?;
        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        let comments = queries::feed::comments_for_posts(conn, &post_ids)?;
        let comment_ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();

        let post_likes = tally(queries::feed::likes_for(conn, LikeTarget::Post, &post_ids)?, &viewer);
        let comment_likes = tally(
            queries::feed::likes_for(conn, LikeTarget::Comment, &comment_ids)?,
            &viewer,
        );

        let mut comments_by_post: HashMap<String, Vec<CommentResponse>> = HashMap::new();
        for row in comments {
            let (count, liked) = comment_likes.get(&row.id).copied().unwrap_or_default();
            comments_by_post
                .entry(row.post_id.clone())
                .or_default()
                .push(convert::comment(row, count, liked));
        }

        Ok(posts
            .into_iter()
            .map(|row| {
                let (likes_count, user_liked) = post_likes.get(&row.id).copied().unwrap_or_default();
                let comments = comments_by_post.remove(&row.id).unwrap_or_default();
                let post = convert::post(row);
                FeedEntry {
                    id: post.id,
                    post_type: post.post_type,
                    content: post.content,
                    media_url: post.media_url,
                    visibility: post.visibility,
                    author: post.author,
                    likes_count,
                    user_liked,
                    comments,
                    created_at: post.created_at,
                    updated_at: post.updated_at,
                }
            })
            .collect())
    })
}

// -- Handlers --

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = run_blocking(move || {
        load_feed(&state.db, claims.sub, query.limit, query.before.as_deref())
    })
    .await?;
    debug!("Feed for {}: {} posts", claims.sub, entries.len());
    Ok(Json(entries))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidJson(req): ValidJson<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = run_blocking(move || publish_post(&state.db, claims.sub, &req)).await?;
    info!("Post {} created by {}", post.id, claims.sub);
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || remove_post(&state.db, claims.sub, id)).await?;
    info!("Post {} deleted by {}", id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = run_blocking(move || add_comment(&state.db, claims.sub, id, &req)).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || remove_comment(&state.db, claims.sub, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = run_blocking(move || toggle_like(&state.db, LikeTarget::Post, id, claims.sub)).await?;
    Ok(Json(LikeResponse { liked }))
}

pub async fn like_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = run_blocking(move || toggle_like(&state.db, LikeTarget::Comment, id, claims.sub)).await?;
    Ok(Json(LikeResponse { liked }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: Database,
        /// [author, housemate, outsider]
        users: Vec<Uuid>,
        republic: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let republic = Uuid::new_v4();

        db.with_conn(|conn| -> anyhow::Result<()> {
            queries::republics::insert(conn, &republic.to_string(), "Rep Gama", "Rua C", None)?;
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
            for member in &users[..2] {
                queries::users::set_republic(conn, &member.to_string(), Some(republic.to_string().as_str()))?;
            }
            Ok(())
        })
        .unwrap();

        Fixture { db, users, republic }
    }

    fn text_post(visibility: PostVisibility) -> CreatePostRequest {
        CreatePostRequest {
            post_type: PostType::Text,
            content: Some("Churrasco no sábado".into()),
            media_url: None,
            visibility,
            visible_republic_ids: vec![],
            visible_user_ids: vec![],
        }
    }

    fn feed_ids(db: &Database, viewer: Uuid) -> Vec<Uuid> {
        load_feed(db, viewer, 50, None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect()
    }

    #[test]
    fn republic_posts_reach_members_only() {
        let f = fixture();
        let mut req = text_post(PostVisibility::Republics);
        req.visible_republic_ids = vec![f.republic];
        let post = publish_post(&f.db, f.users[0], &req).unwrap();

        assert_eq!(feed_ids(&f.db, f.users[0]), vec![post.id]);
        assert_eq!(feed_ids(&f.db, f.users[1]), vec![post.id]);
        assert!(feed_ids(&f.db, f.users[2]).is_empty());
    }

    #[test]
    fn user_posts_reach_listed_users() {
        let f = fixture();
        let mut req = text_post(PostVisibility::Users);
        req.visible_user_ids = vec![f.users[2], f.users[2]];
        let post = publish_post(&f.db, f.users[0], &req).unwrap();

        assert_eq!(feed_ids(&f.db, f.users[2]), vec![post.id]);
        assert!(feed_ids(&f.db, f.users[1]).is_empty());
    }

    #[test]
    fn before_cursor_pages_past_whole_second_posts() {
        let f = fixture();
        let older = publish_post(&f.db, f.users[0], &text_post(PostVisibility::All)).unwrap();
        let newer = publish_post(&f.db, f.users[0], &text_post(PostVisibility::All)).unwrap();
        f.db.with_conn(|conn| -> anyhow::Result<()> {
            conn.execute(
                "UPDATE posts SET created_at = ?1 WHERE id = ?2",
                ["2024-12-01T10:00:00.000Z", older.id.to_string().as_str()],
            )?;
            conn.execute(
                "UPDATE posts SET created_at = ?1 WHERE id = ?2",
                ["2024-12-01T10:00:05.250Z", newer.id.to_string().as_str()],
            )?;
            Ok(())
        })
        .unwrap();

        let page = load_feed(&f.db, f.users[1], 50, None).unwrap();
        assert_eq!(page.iter().map(|e| e.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        // the cursor a client sees on the wire
        let wire = |t: DateTime<Utc>| serde_json::to_value(t).unwrap().as_str().unwrap().to_string();
        assert_eq!(wire(page[1].created_at), "2024-12-01T10:00:00Z");

        let next = load_feed(&f.db, f.users[1], 50, Some(&wire(page[0].created_at))).unwrap();
        assert_eq!(next.iter().map(|e| e.id).collect::<Vec<_>>(), vec![older.id]);

        let last = load_feed(&f.db, f.users[1], 50, Some(&wire(page[1].created_at))).unwrap();
        assert!(last.is_empty());

        let err = load_feed(&f.db, f.users[1], 50, Some("yesterday")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn liking_twice_restores_the_original_state() {
        let f = fixture();
        let post = publish_post(&f.db, f.users[0], &text_post(PostVisibility::All)).unwrap();

        assert!(toggle_like(&f.db, LikeTarget::Post, post.id, f.users[1]).unwrap());
        let entry = &load_feed(&f.db, f.users[1], 50, None).unwrap()[0];
        assert_eq!((entry.likes_count, entry.user_liked), (1, true));

        assert!(!toggle_like(&f.db, LikeTarget::Post, post.id, f.users[1]).unwrap());
        let entry = &load_feed(&f.db, f.users[1], 50, None).unwrap()[0];
        assert_eq!((entry.likes_count, entry.user_liked), (0, false));
    }

    #[test]
    fn comments_carry_author_details_and_likes() {
        let f = fixture();
        let post = publish_post(&f.db, f.users[0], &text_post(PostVisibility::All)).unwrap();
        let comment = add_comment(
            &f.db,
            f.users[1],
            post.id,
            &CreateCommentRequest {
                content: "Tô dentro".into(),
                emoticons: Some([("🔥".to_string(), 2)].into_iter().collect()),
            },
        )
        .unwrap();
        assert_eq!(comment.author.republic.as_ref().map(|r| r.id), Some(f.republic));
        assert_eq!(comment.emoticons.get("🔥"), Some(&2));

        toggle_like(&f.db, LikeTarget::Comment, comment.id, f.users[0]).unwrap();
        let feed = load_feed(&f.db, f.users[0], 50, None).unwrap();
        let seen = &feed[0].comments[0];
        assert_eq!(seen.id, comment.id);
        assert_eq!((seen.likes_count, seen.user_liked), (1, true));
    }

    #[test]
    fn soft_deleted_posts_leave_the_feed_but_stay_stored() {
        let f = fixture();
        let post = publish_post(&f.db, f.users[0], &text_post(PostVisibility::All)).unwrap();

        assert!(matches!(remove_post(&f.db, f.users[1], post.id), Err(ApiError::Forbidden(_))));
        remove_post(&f.db, f.users[0], post.id).unwrap();

        assert!(feed_ids(&f.db, f.users[0]).is_empty());
        let stored = f
            .db
            .with_conn(|conn| queries::feed::find_post(conn, &post.id.to_string()))
            .unwrap();
        assert!(stored.is_some_and(|p| p.deleted_at.is_some()));

        assert!(matches!(remove_post(&f.db, f.users[0], post.id), Err(ApiError::NotFound(_))));
        assert!(matches!(
            toggle_like(&f.db, LikeTarget::Post, post.id, f.users[0]),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn deleted_comments_are_hidden() {
        let f = fixture();
        let post = publish_post(&f.db, f.users[0], &text_post(PostVisibility::All)).unwrap();
        let req = CreateCommentRequest {
            content: "primeiro".into(),
            emoticons: None,
        };
        let comment = add_comment(&f.db, f.users[1], post.id, &req).unwrap();

        assert!(matches!(remove_comment(&f.db, f.users[0], comment.id), Err(ApiError::Forbidden(_))));
        remove_comment(&f.db, f.users[1], comment.id).unwrap();
        assert!(load_feed(&f.db, f.users[0], 50, None).unwrap()[0].comments.is_empty());
    }

    #[test]
    fn post_validation_depends_on_type() {
        let mut req = text_post(PostVisibility::All);
        req.content = Some("  ".into());
        assert!(req.validate().is_err());

        req.post_type = PostType::Image;
        req.media_url = Some("https://cdn.rep.com/foto.jpg".into());
        assert!(req.validate().is_ok());

        let mut targeted = text_post(PostVisibility::Users);
        assert!(targeted.validate().is_err());
        targeted.visible_user_ids = vec![Uuid::new_v4()];
        assert!(targeted.validate().is_ok());
    }
}
