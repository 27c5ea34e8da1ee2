use crate::{
    auth::{self, ExtractAuth},
    error::{AppError, AppResult},
    models::{Category, Club, Post, Role, User},
    schema::{clubs, posts, users},
    DbPool,
};
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Jsonb};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub faculty: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
}

impl UserResponse {
    pub fn from_user(user: User) -> UserResponse {
        UserResponse {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            faculty: user.faculty,
            profile_picture: user.profile_picture_url,
            is_verified: user.is_verified,
            is_active: user.is_active,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubSummary {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub member_count: i32,
    pub logo: Option<String>,
    pub banner: Option<String>,
}

impl ClubSummary {
    pub fn from_club(club: Club) -> ClubSummary {
        ClubSummary {
            id: club.id,
            name: club.name,
            description: club.description,
            category: club.category,
            member_count: club.member_count,
            logo: club.logo,
            banner: club.banner,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedPostResponse {
    id: i32,
    title: String,
    content: String,
    media: Option<String>,
    author: String,
    club: String,
    created_at: NaiveDateTime,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    first_name: String,
    last_name: String,
    faculty: String,
    phone: String,
    profile_picture: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

async fn profile(ExtractAuth(user): ExtractAuth) -> AppResult<Json<UserResponse>> {
    Ok(Json(UserResponse::from_user(user)))
}

async fn update_profile(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    let faculty = req.faculty.trim().to_string();
    let phone = req.phone.trim().to_string();

    if first_name.is_empty() || last_name.is_empty() || faculty.is_empty() || phone.is_empty() {
        return Err(AppError::validation("all fields are required"));
    }

    let conn = &mut pool.get().await?;

    let phone_taken: i64 = users::table
        .filter(users::phone.eq(&phone))
        .filter(users::id.ne(user.id))
        .count()
        .get_result(conn)
        .await?;
    if phone_taken > 0 {
        return Err(AppError::conflict("phone number already in use"));
    }

    let updated = diesel::update(users::table.find(user.id))
        .set((
            users::first_name.eq(first_name),
            users::last_name.eq(last_name),
            users::faculty.eq(faculty),
            users::phone.eq(phone),
            users::profile_picture_url.eq(req.profile_picture),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result::<User>(conn)
        .await?;

    Ok(Json(UserResponse::from_user(updated)))
}

async fn change_password(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<()>> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(AppError::validation(
            "current password and new password are required",
        ));
    }
    if req.new_password.len() < 6 {
        return Err(AppError::validation(
            "new password must be at least 6 characters long",
        ));
    }

    if !auth::verify_password(req.current_password, &user.password_hash)? {
        return Err(AppError::validation("current password is incorrect"));
    }

    let conn = &mut pool.get().await?;

    diesel::update(users::table.find(user.id))
        .set((
            users::password_hash.eq(auth::hash_password(req.new_password)?),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)
        .await?;

    Ok(Json(()))
}

async fn joined_clubs(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let conn = &mut pool.get().await?;

    // JSONB containment on the embedded roster
    let clubs = clubs::table
        .filter(sql::<Bool>("members @> ").bind::<Jsonb, _>(serde_json::json!([{ "user": user.id }])))
        .order(clubs::created_at.desc())
        .load::<Club>(conn)
        .await?;

    Ok(Json(clubs.into_iter().map(ClubSummary::from_club).collect()))
}

async fn feed(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(user): ExtractAuth,
) -> AppResult<Json<Vec<FeedPostResponse>>> {
    let conn = &mut pool.get().await?;

    let joined = clubs::table
        .filter(sql::<Bool>("members @> ").bind::<Jsonb, _>(serde_json::json!([{ "user": user.id }])))
        .load::<Club>(conn)
        .await?;
    let club_ids: Vec<i32> = joined.iter().map(|c| c.id).collect();

    let feed = posts::table
        .inner_join(users::table)
        .inner_join(clubs::table)
        .filter(posts::club_id.eq_any(club_ids))
        .order(posts::created_at.desc())
        .load::<(Post, User, Club)>(conn)
        .await?;

    Ok(Json(
        feed.into_iter()
            .map(|(post, author, club)| FeedPostResponse {
                id: post.id,
                title: post.title,
                content: post.content,
                media: post.media_url,
                author: author.full_name(),
                club: club.name,
                created_at: post.created_at,
            })
            .collect(),
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/change-password", post(change_password))
        .route("/clubs", get(joined_clubs))
        .route("/feed", get(feed))
}
