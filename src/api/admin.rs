//! Privileged moderation: club approval, deletions, user activation.
//! Role verification happens in the [`AdminOnly`] extractor; handlers here
//! skip ownership checks by design.

use super::{
    club::delete_club_cascade, notification::NotificationResponse, users::UserResponse, PageInfo,
    Pagination,
};
use crate::{
    auth::AdminOnly,
    bootstrap::ROOT_ADMIN_EMAIL,
    email,
    error::{AppError, AppResult},
    membership::{self, ClubStatus},
    models::{Category, Club, NotificationKind, Post, RelatedObject, Role, User},
    notify,
    schema::{clubs, join_requests, notifications, posts, users},
    DbPool,
};
use axum::{
    extract::{Path, Query},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Jsonb};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    total_users: i64,
    total_clubs: i64,
    total_posts: i64,
    pending_clubs: i64,
    total_notifications: i64,
}

#[derive(Deserialize)]
struct UserListQuery {
    search: Option<String>,
    role: Option<Role>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct ClubListQuery {
    search: Option<String>,
    status: Option<ClubStatus>,
    category: Option<Category>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct PostListQuery {
    search: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct NotificationListQuery {
    #[serde(rename = "type")]
    kind: Option<NotificationKind>,
    read: Option<bool>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserListResponse {
    users: Vec<UserResponse>,
    pagination: PageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminClubResponse {
    id: i32,
    name: String,
    description: String,
    category: Category,
    status: ClubStatus,
    member_count: i32,
    logo: Option<String>,
    banner: Option<String>,
    owner: String,
    owner_email: String,
    created_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubListResponse {
    clubs: Vec<AdminClubResponse>,
    pagination: PageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminPostResponse {
    id: i32,
    title: String,
    content: String,
    author: String,
    club: String,
    created_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostListResponse {
    posts: Vec<AdminPostResponse>,
    pagination: PageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationListResponse {
    notifications: Vec<NotificationResponse>,
    pagination: PageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    message: String,
}

async fn dashboard(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
) -> AppResult<Json<DashboardResponse>> {
    let conn = &mut pool.get().await?;

    let total_users: i64 = users::table.count().get_result(conn).await?;
    let total_clubs: i64 = clubs::table.count().get_result(conn).await?;
    let total_posts: i64 = posts::table.count().get_result(conn).await?;
    let pending_clubs: i64 = clubs::table
        .filter(clubs::status.eq(ClubStatus::Pending))
        .count()
        .get_result(conn)
        .await?;
    let total_notifications: i64 = notifications::table.count().get_result(conn).await?;

    Ok(Json(DashboardResponse {
        total_users,
        total_clubs,
        total_posts,
        pending_clubs,
        total_notifications,
    }))
}

async fn list_users(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<UserListResponse>> {
    let conn = &mut pool.get().await?;
    let pagination = Pagination::from_params(query.page, query.limit);

    let filtered = || {
        let mut q = users::table.into_boxed();
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            q = q.filter(
                users::first_name
                    .ilike(pattern.clone())
                    .or(users::last_name.ilike(pattern.clone()))
                    .or(users::email.ilike(pattern)),
            );
        }
        if let Some(role) = query.role {
            q = q.filter(users::role.eq(role));
        }
        q
    };

    let total: i64 = filtered().count().get_result(conn).await?;
    let page = filtered()
        .order(users::created_at.desc())
        .offset(pagination.offset())
        .limit(pagination.limit)
        .load::<User>(conn)
        .await?;

    Ok(Json(UserListResponse {
        users: page.into_iter().map(UserResponse::from_user).collect(),
        pagination: PageInfo::new(pagination, total),
    }))
}

async fn list_clubs(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Query(query): Query<ClubListQuery>,
) -> AppResult<Json<ClubListResponse>> {
    let conn = &mut pool.get().await?;
    let pagination = Pagination::from_params(query.page, query.limit);

    let filtered = || {
        let mut q = clubs::table.inner_join(users::table).into_boxed();
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            q = q.filter(
                clubs::name
                    .ilike(pattern.clone())
                    .or(clubs::description.ilike(pattern)),
            );
        }
        if let Some(status) = query.status {
            q = q.filter(clubs::status.eq(status));
        }
        if let Some(category) = query.category {
            q = q.filter(clubs::category.eq(category));
        }
        q
    };

    let total: i64 = filtered().count().get_result(conn).await?;
    let page = filtered()
        .order(clubs::created_at.desc())
        .offset(pagination.offset())
        .limit(pagination.limit)
        .load::<(Club, User)>(conn)
        .await?;

    Ok(Json(ClubListResponse {
        clubs: page
            .into_iter()
            .map(|(club, owner)| AdminClubResponse {
                id: club.id,
                name: club.name,
                description: club.description,
                category: club.category,
                status: club.status,
                member_count: club.member_count,
                logo: club.logo,
                banner: club.banner,
                owner: owner.full_name(),
                owner_email: owner.email,
                created_at: club.created_at,
            })
            .collect(),
        pagination: PageInfo::new(pagination, total),
    }))
}

async fn list_posts(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Query(query): Query<PostListQuery>,
) -> AppResult<Json<PostListResponse>> {
    let conn = &mut pool.get().await?;
    let pagination = Pagination::from_params(query.page, query.limit);

    let filtered = || {
        let mut q = posts::table
            .inner_join(users::table)
            .inner_join(clubs::table)
            .into_boxed();
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            q = q.filter(
                posts::title
                    .ilike(pattern.clone())
                    .or(posts::content.ilike(pattern)),
            );
        }
        q
    };

    let total: i64 = filtered().count().get_result(conn).await?;
    let page = filtered()
        .order(posts::created_at.desc())
        .offset(pagination.offset())
        .limit(pagination.limit)
        .load::<(Post, User, Club)>(conn)
        .await?;

    Ok(Json(PostListResponse {
        posts: page
            .into_iter()
            .map(|(post, author, club)| AdminPostResponse {
                id: post.id,
                title: post.title,
                content: post.content,
                author: author.full_name(),
                club: club.name,
                created_at: post.created_at,
            })
            .collect(),
        pagination: PageInfo::new(pagination, total),
    }))
}

async fn list_notifications(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<NotificationListResponse>> {
    let conn = &mut pool.get().await?;
    let pagination = Pagination::from_params(query.page, query.limit);

    let filtered = || {
        let mut q = notifications::table.into_boxed();
        if let Some(kind) = query.kind {
            q = q.filter(notifications::kind.eq(kind));
        }
        if let Some(read) = query.read {
            q = q.filter(notifications::read.eq(read));
        }
        q
    };

    let total: i64 = filtered().count().get_result(conn).await?;
    let page = filtered()
        .order(notifications::created_at.desc())
        .offset(pagination.offset())
        .limit(pagination.limit)
        .load(conn)
        .await?;

    Ok(Json(NotificationListResponse {
        notifications: page
            .into_iter()
            .map(NotificationResponse::from_notification)
            .collect(),
        pagination: PageInfo::new(pagination, total),
    }))
}

async fn load_club(conn: &mut AsyncPgConnection, club_id: i32) -> AppResult<Club> {
    clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("club not found"))
}

async fn load_owner(conn: &mut AsyncPgConnection, club: &Club) -> AppResult<Option<User>> {
    Ok(users::table
        .find(club.owner_id)
        .first::<User>(conn)
        .await
        .optional()?)
}

async fn approve_club(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    let next = club.status.approve()?;

    // guarded by the current status so a concurrent reject cannot be
    // overwritten
    let approved = diesel::update(
        clubs::table
            .find(club.id)
            .filter(clubs::status.eq(ClubStatus::Pending)),
    )
    .set((
        clubs::status.eq(next),
        clubs::updated_at.eq(Utc::now().naive_utc()),
    ))
    .get_result::<Club>(conn)
    .await
    .optional()?
    .ok_or_else(|| AppError::conflict("club is not pending approval"))?;

    if let Some(owner) = load_owner(conn, &approved).await? {
        let message = format!(
            "Your club \"{}\" has been approved by the admin.",
            approved.name
        );
        notify::notify_best_effort(
            conn,
            owner.id,
            NotificationKind::ClubApproved,
            &message,
            RelatedObject::Club(approved.id),
        )
        .await;
        email::send_best_effort(
            owner.email.clone(),
            owner.full_name(),
            format!("Club Approved: {}", approved.name),
            format!(
                r#"Dear {},

Your club "{}" has been approved by the admin.
Your club is now active and visible to users.

Best regards,
Campus Connect Team"#,
                owner.full_name(),
                approved.name
            ),
        );
    }

    Ok(Json(MessageResponse {
        message: "Club approved successfully".to_string(),
    }))
}

async fn reject_club(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    club.status.rejectable()?;

    // the club row is gone after the cascade; capture what the owner
    // notification needs first
    let owner = load_owner(conn, &club).await?;
    let club_name = club.name.clone();

    delete_club_cascade(conn, club.id).await?;

    if let Some(owner) = owner {
        let message = format!(
            "Your club \"{club_name}\" has been rejected by the admin and deleted."
        );
        notify::notify_best_effort(
            conn,
            owner.id,
            NotificationKind::ClubRejected,
            &message,
            RelatedObject::Club(club.id),
        )
        .await;
        email::send_best_effort(
            owner.email.clone(),
            owner.full_name(),
            format!("Club Rejected and Deleted: {club_name}"),
            format!(
                r#"Dear {},

Unfortunately, your club "{club_name}" has been rejected by the admin and has been deleted from the platform.

Best regards,
Campus Connect Team"#,
                owner.full_name(),
            ),
        );
    }

    Ok(Json(MessageResponse {
        message: "Club rejected and deleted successfully".to_string(),
    }))
}

async fn delete_club(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;

    let owner = load_owner(conn, &club).await?;
    let club_name = club.name.clone();

    delete_club_cascade(conn, club.id).await?;

    if let Some(owner) = owner {
        let message = format!("Your club \"{club_name}\" has been deleted by the admin.");
        notify::notify_best_effort(
            conn,
            owner.id,
            NotificationKind::ClubDeleted,
            &message,
            RelatedObject::Club(club.id),
        )
        .await;
        email::send_best_effort(
            owner.email.clone(),
            owner.full_name(),
            format!("Club Deleted: {club_name}"),
            format!(
                r#"Dear {},

Your club "{club_name}" has been deleted by the admin.

Best regards,
Campus Connect Team"#,
                owner.full_name(),
            ),
        );
    }

    Ok(Json(MessageResponse {
        message: "Club deleted successfully".to_string(),
    }))
}

async fn toggle_user_status(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;

    let user = users::table
        .find(user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let updated = diesel::update(users::table.find(user.id))
        .set((
            users::is_active.eq(!user.is_active),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result::<User>(conn)
        .await?;

    let verb = if updated.is_active {
        "activated"
    } else {
        "deactivated"
    };
    Ok(Json(MessageResponse {
        message: format!("User {verb} successfully"),
    }))
}

async fn delete_user(
    Extension(pool): Extension<DbPool>,
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;

    let user = users::table
        .find(user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if user.role == Role::Admin && user.email == *ROOT_ADMIN_EMAIL {
        return Err(AppError::conflict("cannot delete the main admin account"));
    }

    // clubs they own go away entirely
    let owned: Vec<i32> = clubs::table
        .filter(clubs::owner_id.eq(user.id))
        .select(clubs::id)
        .load(conn)
        .await?;
    for club_id in owned {
        delete_club_cascade(conn, club_id).await?;
    }

    // drop their membership edge from every remaining roster
    let joined: Vec<i32> = clubs::table
        .filter(sql::<Bool>("members @> ").bind::<Jsonb, _>(serde_json::json!([{ "user": user.id }])))
        .select(clubs::id)
        .load(conn)
        .await?;
    for club_id in joined {
        membership::update_members(conn, club_id, |_, members| members.remove(user.id)).await?;
    }

    diesel::delete(posts::table.filter(posts::author_id.eq(user.id)))
        .execute(conn)
        .await?;
    diesel::delete(join_requests::table.filter(join_requests::user_id.eq(user.id)))
        .execute(conn)
        .await?;
    diesel::delete(notifications::table.filter(notifications::recipient_id.eq(user.id)))
        .execute(conn)
        .await?;
    diesel::delete(users::table.find(user.id))
        .execute(conn)
        .await?;

    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/:user_id/toggle-status", post(toggle_user_status))
        .route("/users/:user_id", delete(delete_user))
        .route("/clubs", get(list_clubs))
        .route("/clubs/:club_id/approve", post(approve_club))
        .route("/clubs/:club_id/reject", post(reject_club))
        .route("/clubs/:club_id", delete(delete_club))
        .route("/posts", get(list_posts))
        .route("/notifications", get(list_notifications))
}
