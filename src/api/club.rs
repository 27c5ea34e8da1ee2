//! Club membership workflow: creation, discovery, join requests,
//! owner-authored posts.

use super::users::ClubSummary;
use crate::{
    auth::ExtractAuth,
    email,
    error::{AppError, AppResult},
    membership::{self, ClubStatus, MemberList, MemberRole},
    models::{
        Category, Club, JoinRequest, JoinRequestStatus, NotificationKind, Post, RelatedObject,
        Role, User,
    },
    notify,
    schema::{clubs, join_requests, posts, users},
    DbPool,
};
use axum::{
    extract::{Path, Query},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateClubRequest {
    name: String,
    description: String,
    category: Category,
    logo: Option<String>,
    banner: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateClubRequest {
    name: Option<String>,
    description: Option<String>,
    category: Option<Category>,
    logo: Option<String>,
    banner: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    search: Option<String>,
    category: Option<Category>,
    page: Option<i64>,
    limit: Option<i64>,
}

impl SearchQuery {
    fn pagination(&self) -> super::Pagination {
        super::Pagination::from_params(self.page, self.limit)
    }
}

#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JoinRequestAction {
    Approve,
    Decline,
}

#[derive(Deserialize)]
struct RespondRequest {
    action: JoinRequestAction,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    title: String,
    content: String,
    media: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerInfo {
    id: i32,
    name: String,
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberInfo {
    user_id: i32,
    name: String,
    profile_picture: Option<String>,
    joined_at: NaiveDateTime,
    role: MemberRole,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubDetailResponse {
    id: i32,
    name: String,
    description: String,
    category: Category,
    logo: Option<String>,
    banner: Option<String>,
    status: ClubStatus,
    member_count: i32,
    owner: OwnerInfo,
    members: Vec<MemberInfo>,
    created_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClubOverview {
    id: i32,
    name: String,
    description: String,
    category: Category,
    status: ClubStatus,
    member_count: i32,
    logo: Option<String>,
    banner: Option<String>,
    created_at: NaiveDateTime,
}

impl ClubOverview {
    fn from_club(club: Club) -> ClubOverview {
        ClubOverview {
            id: club.id,
            name: club.name,
            description: club.description,
            category: club.category,
            status: club.status,
            member_count: club.member_count,
            logo: club.logo,
            banner: club.banner,
            created_at: club.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    clubs: Vec<ClubSummary>,
    pagination: super::PageInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequestResponse {
    id: i32,
    user_id: i32,
    name: String,
    email: String,
    profile_picture: Option<String>,
    created_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostResponse {
    id: i32,
    club_id: i32,
    title: String,
    content: String,
    media: Option<String>,
    author: String,
    created_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    message: String,
}

async fn load_club(conn: &mut AsyncPgConnection, club_id: i32) -> AppResult<Club> {
    clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("club not found"))
}

async fn load_detail(conn: &mut AsyncPgConnection, club: Club) -> AppResult<ClubDetailResponse> {
    let owner = users::table
        .find(club.owner_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| anyhow::anyhow!("club {} has no owner row", club.id))?;

    let member_users: HashMap<i32, User> = users::table
        .filter(users::id.eq_any(club.members.user_ids().collect::<Vec<_>>()))
        .load::<User>(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let members = club
        .members
        .iter()
        .map(|m| MemberInfo {
            user_id: m.user,
            name: member_users
                .get(&m.user)
                .map(User::full_name)
                .unwrap_or_else(|| "former member".to_string()),
            profile_picture: member_users
                .get(&m.user)
                .and_then(|u| u.profile_picture_url.clone()),
            joined_at: m.joined_at,
            role: m.role,
        })
        .collect();

    Ok(ClubDetailResponse {
        id: club.id,
        name: club.name,
        description: club.description,
        category: club.category,
        logo: club.logo,
        banner: club.banner,
        status: club.status,
        member_count: club.member_count,
        owner: OwnerInfo {
            id: owner.id,
            name: owner.full_name(),
            email: owner.email,
        },
        members,
        created_at: club.created_at,
    })
}

async fn create_club(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Json(req): Json<CreateClubRequest>,
) -> AppResult<Json<ClubDetailResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = clubs)]
    struct NewClub {
        name: String,
        description: String,
        category: Category,
        logo: Option<String>,
        banner: Option<String>,
        owner_id: i32,
        members: MemberList,
        status: ClubStatus,
        member_count: i32,
        version: i32,
    }

    let name = req.name.trim().to_string();
    let description = req.description.trim().to_string();
    if name.is_empty() || description.is_empty() {
        return Err(AppError::validation(
            "name, description, and category are required",
        ));
    }

    let conn = &mut pool.get().await?;

    let now = Utc::now().naive_utc();
    let new_club = diesel::insert_into(clubs::table)
        .values(NewClub {
            name,
            description,
            category: req.category,
            logo: req.logo,
            banner: req.banner,
            owner_id: user.id,
            members: MemberList::founding(user.id, now),
            status: ClubStatus::Pending,
            member_count: 1,
            version: 0,
        })
        .on_conflict(clubs::name)
        .do_nothing()
        .get_result::<Club>(conn)
        .await
        .optional()?;

    let Some(new_club) = new_club else {
        return Err(AppError::conflict("a club with this name already exists"));
    };

    // first club makes the creator a club owner; admins stay admins
    if user.role == Role::User {
        diesel::update(users::table.find(user.id))
            .set(users::role.eq(Role::ClubOwner))
            .execute(conn)
            .await?;
    }

    let admins = users::table
        .filter(users::role.eq(Role::Admin))
        .load::<User>(conn)
        .await?;
    let message = format!(
        "New club \"{}\" created by {}. Awaiting approval.",
        new_club.name,
        user.full_name()
    );
    let body = format!(
        r#"Hello Admin,

A new club "{}" has been created by {} ({}).
Description: {}
Category: {}

Please review and approve or reject the club.

Best regards,
Campus Connect Team"#,
        new_club.name,
        user.full_name(),
        user.email,
        new_club.description,
        new_club.category.as_str(),
    );
    for admin in admins {
        notify::notify_best_effort(
            conn,
            admin.id,
            NotificationKind::ClubApproval,
            &message,
            RelatedObject::Club(new_club.id),
        )
        .await;
        email::send_best_effort(
            admin.email.clone(),
            admin.full_name(),
            format!("New Club Awaiting Approval: {}", new_club.name),
            body.clone(),
        );
    }

    Ok(Json(load_detail(conn, new_club).await?))
}

async fn search_clubs(
    Extension(pool): Extension<DbPool>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let conn = &mut pool.get().await?;
    let pagination = query.pagination();

    let filtered = || {
        let mut q = clubs::table
            .filter(clubs::status.eq(ClubStatus::Active))
            .into_boxed();
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            q = q.filter(
                clubs::name
                    .ilike(pattern.clone())
                    .or(clubs::description.ilike(pattern)),
            );
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
        .load::<Club>(conn)
        .await?;

    Ok(Json(SearchResponse {
        clubs: page.into_iter().map(ClubSummary::from_club).collect(),
        pagination: super::PageInfo::new(pagination, total),
    }))
}

async fn my_clubs(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
) -> AppResult<Json<Vec<ClubOverview>>> {
    let conn = &mut pool.get().await?;

    let owned = clubs::table
        .filter(clubs::owner_id.eq(user.id))
        .order(clubs::created_at.desc())
        .load::<Club>(conn)
        .await?;

    Ok(Json(owned.into_iter().map(ClubOverview::from_club).collect()))
}

async fn club_detail(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<ClubDetailResponse>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;

    // non-active clubs are only visible to their owner and admins
    if club.status != ClubStatus::Active && club.owner_id != user.id && user.role != Role::Admin {
        return Err(AppError::not_found("club is not active"));
    }

    Ok(Json(load_detail(conn, club).await?))
}

async fn update_club(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
    Json(req): Json<UpdateClubRequest>,
) -> AppResult<Json<ClubDetailResponse>> {
    #[derive(AsChangeset)]
    #[diesel(table_name = clubs)]
    struct ClubEdit {
        name: Option<String>,
        description: Option<String>,
        category: Option<Category>,
        logo: Option<String>,
        banner: Option<String>,
        updated_at: NaiveDateTime,
    }

    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    if club.owner_id != user.id {
        return Err(AppError::forbidden("you are not the owner of this club"));
    }

    let new_name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::validation("club name must not be empty")),
        Some(name) if name != club.name => {
            let taken: i64 = clubs::table
                .filter(clubs::name.eq(name))
                .filter(clubs::id.ne(club.id))
                .count()
                .get_result(conn)
                .await?;
            if taken > 0 {
                return Err(AppError::conflict("a club with this name already exists"));
            }
            Some(name.to_string())
        }
        _ => None,
    };

    let updated = diesel::update(clubs::table.find(club.id))
        .set(ClubEdit {
            name: new_name,
            description: req.description.map(|d| d.trim().to_string()),
            category: req.category,
            logo: req.logo,
            banner: req.banner,
            updated_at: Utc::now().naive_utc(),
        })
        .get_result::<Club>(conn)
        .await?;

    Ok(Json(load_detail(conn, updated).await?))
}

async fn delete_club(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    if club.owner_id != user.id {
        return Err(AppError::forbidden("you are not the owner of this club"));
    }

    delete_club_cascade(conn, club.id).await?;

    Ok(Json(MessageResponse {
        message: "Club deleted successfully".to_string(),
    }))
}

/// Removes a club and the rows scoped to it. Notifications are left alone;
/// their messages were rendered at creation time.
pub(super) async fn delete_club_cascade(
    conn: &mut AsyncPgConnection,
    club_id: i32,
) -> AppResult<()> {
    diesel::delete(posts::table.filter(posts::club_id.eq(club_id)))
        .execute(conn)
        .await?;
    diesel::delete(join_requests::table.filter(join_requests::club_id.eq(club_id)))
        .execute(conn)
        .await?;
    diesel::delete(clubs::table.find(club_id))
        .execute(conn)
        .await?;
    Ok(())
}

async fn club_members(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(_user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<MemberInfo>>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    Ok(Json(load_detail(conn, club).await?.members))
}

async fn send_join_request(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = join_requests)]
    struct NewJoinRequest {
        club_id: i32,
        user_id: i32,
        status: JoinRequestStatus,
    }

    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;

    if club.owner_id == user.id {
        return Err(AppError::conflict("you are the owner of this club"));
    }
    if club.members.contains(user.id) {
        return Err(AppError::conflict("you are already a member of this club"));
    }

    let existing = join_requests::table
        .filter(join_requests::club_id.eq(club.id))
        .filter(join_requests::user_id.eq(user.id))
        .first::<JoinRequest>(conn)
        .await
        .optional()?;

    match existing {
        Some(request) if request.status == JoinRequestStatus::Pending => {
            return Err(AppError::conflict(
                "you already have a pending join request for this club",
            ));
        }
        Some(request) => {
            // a declined or stale request can be re-opened
            diesel::update(join_requests::table.find(request.id))
                .set((
                    join_requests::status.eq(JoinRequestStatus::Pending),
                    join_requests::created_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)
                .await?;
        }
        None => {
            diesel::insert_into(join_requests::table)
                .values(NewJoinRequest {
                    club_id: club.id,
                    user_id: user.id,
                    status: JoinRequestStatus::Pending,
                })
                .execute(conn)
                .await?;
        }
    }

    let message = format!(
        "{} requested to join your club: {}",
        user.full_name(),
        club.name
    );
    notify::notify(
        conn,
        club.owner_id,
        NotificationKind::JoinRequest,
        &message,
        RelatedObject::User(user.id),
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "Join request sent successfully".to_string(),
    }))
}

async fn list_join_requests(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<JoinRequestResponse>>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    if club.owner_id != user.id {
        return Err(AppError::forbidden("you are not the owner of this club"));
    }

    let pending = join_requests::table
        .inner_join(users::table)
        .filter(join_requests::club_id.eq(club.id))
        .filter(join_requests::status.eq(JoinRequestStatus::Pending))
        .order(join_requests::created_at.desc())
        .load::<(JoinRequest, User)>(conn)
        .await?;

    Ok(Json(
        pending
            .into_iter()
            .map(|(request, requester)| JoinRequestResponse {
                id: request.id,
                user_id: requester.id,
                name: requester.full_name(),
                email: requester.email,
                profile_picture: requester.profile_picture_url,
                created_at: request.created_at,
            })
            .collect(),
    ))
}

async fn respond_to_join_request(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path((club_id, target_user_id)): Path<(i32, i32)>,
    Json(req): Json<RespondRequest>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    if club.owner_id != user.id {
        return Err(AppError::forbidden("you are not the owner of this club"));
    }

    let target = users::table
        .find(target_user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let request = join_requests::table
        .filter(join_requests::club_id.eq(club.id))
        .filter(join_requests::user_id.eq(target.id))
        .filter(join_requests::status.eq(JoinRequestStatus::Pending))
        .first::<JoinRequest>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("no pending join request from this user"))?;

    let (message, subject, body, kind) = match req.action {
        JoinRequestAction::Approve => {
            let club = membership::update_members(conn, club.id, |_, members| {
                members.add(target.id, Utc::now().naive_utc())
            })
            .await?;

            diesel::update(join_requests::table.find(request.id))
                .set(join_requests::status.eq(JoinRequestStatus::Approved))
                .execute(conn)
                .await?;

            (
                format!(
                    "Your request to join the club \"{}\" has been approved.",
                    club.name
                ),
                format!("Join Request Approved for {}", club.name),
                format!(
                    r#"Dear {},

Your request to join the club "{}" has been approved by the club owner.
You are now a member of the club.

Best regards,
Campus Connect Team"#,
                    target.full_name(),
                    club.name
                ),
                NotificationKind::JoinApproved,
            )
        }
        JoinRequestAction::Decline => {
            diesel::update(join_requests::table.find(request.id))
                .set(join_requests::status.eq(JoinRequestStatus::Declined))
                .execute(conn)
                .await?;

            (
                format!(
                    "Your request to join the club \"{}\" has been declined.",
                    club.name
                ),
                format!("Join Request Declined for {}", club.name),
                format!(
                    r#"Dear {},

Your request to join the club "{}" has been declined by the club owner.

Best regards,
Campus Connect Team"#,
                    target.full_name(),
                    club.name
                ),
                NotificationKind::JoinDeclined,
            )
        }
    };

    notify::notify_best_effort(
        conn,
        target.id,
        kind,
        &message,
        RelatedObject::Club(club.id),
    )
    .await;
    email::send_best_effort(target.email.clone(), target.full_name(), subject, body);

    let verb = match req.action {
        JoinRequestAction::Approve => "approved",
        JoinRequestAction::Decline => "declined",
    };
    Ok(Json(MessageResponse {
        message: format!("Join request {verb} successfully"),
    }))
}

async fn leave_club(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;

    membership::update_members(conn, club_id, |club, members| {
        if club.owner_id == user.id {
            return Err(AppError::conflict(
                "the owner cannot leave their own club",
            ));
        }
        members.remove(user.id)
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Successfully left the club".to_string(),
    }))
}

async fn create_post(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(club_id): Path<i32>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = posts)]
    struct NewPost {
        club_id: i32,
        author_id: i32,
        title: String,
        content: String,
        media_url: Option<String>,
    }

    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::validation("title and content are required"));
    }

    let conn = &mut pool.get().await?;
    let club = load_club(conn, club_id).await?;
    if club.owner_id != user.id {
        return Err(AppError::forbidden(
            "only the club owner can publish posts",
        ));
    }

    let post = diesel::insert_into(posts::table)
        .values(NewPost {
            club_id: club.id,
            author_id: user.id,
            title,
            content,
            media_url: req.media,
        })
        .get_result::<Post>(conn)
        .await?;

    // fan out to every member except the author; one failed recipient must
    // not block the rest
    let message = format!(
        "New post \"{}\" published in club \"{}\".",
        post.title, club.name
    );
    for member_id in club.members.user_ids().filter(|id| *id != user.id) {
        notify::notify_best_effort(
            conn,
            member_id,
            NotificationKind::NewPost,
            &message,
            RelatedObject::Post(post.id),
        )
        .await;
    }

    Ok(Json(PostResponse {
        id: post.id,
        club_id: post.club_id,
        title: post.title,
        content: post.content,
        media: post.media_url,
        author: user.full_name(),
        created_at: post.created_at,
    }))
}

async fn club_posts(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(_user): ExtractAuth,
    Path(club_id): Path<i32>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let conn = &mut pool.get().await?;
    load_club(conn, club_id).await?;

    let club_posts = posts::table
        .inner_join(users::table)
        .filter(posts::club_id.eq(club_id))
        .order(posts::created_at.desc())
        .load::<(Post, User)>(conn)
        .await?;

    Ok(Json(
        club_posts
            .into_iter()
            .map(|(post, author)| PostResponse {
                id: post.id,
                club_id: post.club_id,
                title: post.title,
                content: post.content,
                media: post.media_url,
                author: author.full_name(),
                created_at: post.created_at,
            })
            .collect(),
    ))
}

async fn delete_post(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Path(post_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let conn = &mut pool.get().await?;

    let post = posts::table
        .find(post_id)
        .first::<Post>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("post not found"))?;
    let club = load_club(conn, post.club_id).await?;

    if post.author_id != user.id || club.owner_id != user.id {
        return Err(AppError::forbidden(
            "you are not authorized to delete this post",
        ));
    }

    diesel::delete(posts::table.find(post.id))
        .execute(conn)
        .await?;

    Ok(Json(MessageResponse {
        message: "Post deleted successfully".to_string(),
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", post(create_club).get(search_clubs))
        .route("/mine", get(my_clubs))
        .route("/:club_id", get(club_detail).put(update_club).delete(delete_club))
        .route("/:club_id/members", get(club_members))
        .route("/:club_id/join-request", post(send_join_request))
        .route("/:club_id/requests", get(list_join_requests))
        .route("/:club_id/requests/:user_id", post(respond_to_join_request))
        .route("/:club_id/leave", post(leave_club))
        .route("/:club_id/posts", post(create_post).get(club_posts))
        .route("/posts/:post_id", delete(delete_post))
}
