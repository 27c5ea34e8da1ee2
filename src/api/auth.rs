use super::users::UserResponse;
use crate::{
    auth,
    email,
    error::{AppError, AppResult},
    models::{Role, User},
    schema::users,
    DbPool,
};
use axum::{routing::post, Extension, Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// expires after one day
const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
const OTP_LIFETIME_MINUTES: i64 = 10;

fn generate_otp() -> String {
    rand::thread_rng().gen_range(1000..10000).to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    phone: String,
    faculty: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    message: String,
    user_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOtpRequest {
    email: String,
    otp: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateOtpRequest {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizedResponse {
    message: String,
    token: String,
    user: UserResponse,
}

impl AuthorizedResponse {
    fn new(message: impl Into<String>, user: User) -> anyhow::Result<AuthorizedResponse> {
        Ok(AuthorizedResponse {
            message: message.into(),
            token: auth::generate_jwt(&user, TOKEN_LIFETIME)?,
            user: UserResponse::from_user(user),
        })
    }
}

async fn register(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = users)]
    struct NewUser {
        first_name: String,
        last_name: String,
        email: String,
        phone: String,
        password_hash: String,
        role: Role,
        faculty: String,
        is_verified: bool,
        is_active: bool,
        otp: String,
        otp_expiry: chrono::NaiveDateTime,
    }

    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let phone = req.phone.trim().to_string();
    let faculty = req.faculty.trim().to_string();

    if first_name.is_empty()
        || last_name.is_empty()
        || email.is_empty()
        || req.password.is_empty()
        || phone.is_empty()
        || faculty.is_empty()
    {
        return Err(AppError::validation("all fields are required"));
    }

    let conn = &mut pool.get().await?;

    let email_taken: i64 = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result(conn)
        .await?;
    if email_taken > 0 {
        return Err(AppError::conflict("user already exists with this email"));
    }

    let phone_taken: i64 = users::table
        .filter(users::phone.eq(&phone))
        .count()
        .get_result(conn)
        .await?;
    if phone_taken > 0 {
        return Err(AppError::conflict(
            "user already exists with this phone number",
        ));
    }

    let otp = generate_otp();
    let new_user = diesel::insert_into(users::table)
        .values(NewUser {
            first_name,
            last_name,
            email,
            phone,
            password_hash: auth::hash_password(req.password)?,
            role: Role::User,
            faculty,
            is_verified: false,
            is_active: true,
            otp: otp.clone(),
            otp_expiry: Utc::now().naive_utc() + ChronoDuration::minutes(OTP_LIFETIME_MINUTES),
        })
        .get_result::<User>(conn)
        .await?;

    let body = format!(
        r#"Dear {},

Welcome to Campus Connect! Your account has been successfully created.
Account Details:
- Name: {}
- Email: {}
- Faculty: {}
- Phone: {}

Your OTP for account verification is: {otp}
This OTP will expire in {OTP_LIFETIME_MINUTES} minutes. Please verify your account to start using the platform.

Best regards,
Campus Connect Team"#,
        new_user.full_name(),
        new_user.full_name(),
        new_user.email,
        new_user.faculty,
        new_user.phone,
    );
    email::send_best_effort(
        new_user.email.clone(),
        new_user.full_name(),
        "Welcome to Campus Connect - Verify Your Account".to_string(),
        body,
    );

    Ok(Json(RegisterResponse {
        message: "User registered successfully. Please check your email for OTP to verify your account.".to_string(),
        user_id: new_user.id,
    }))
}

async fn verify_otp(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    if req.email.is_empty() || req.otp.is_empty() {
        return Err(AppError::validation("email and OTP are required"));
    }

    let conn = &mut pool.get().await?;

    let user = users::table
        .filter(users::email.eq(req.email.to_lowercase()))
        .filter(users::otp.eq(&req.otp))
        .filter(users::otp_expiry.gt(Utc::now().naive_utc()))
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::validation("invalid or expired OTP"))?;

    let user = diesel::update(users::table.find(user.id))
        .set((
            users::is_verified.eq(true),
            users::otp.eq(None::<String>),
            users::otp_expiry.eq(None::<chrono::NaiveDateTime>),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result::<User>(conn)
        .await?;

    Ok(Json(AuthorizedResponse::new(
        "Account verified successfully",
        user,
    )?))
}

async fn regenerate_otp(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<RegenerateOtpRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let conn = &mut pool.get().await?;

    let user = users::table
        .filter(users::email.eq(req.email.to_lowercase()))
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if user.is_verified {
        return Err(AppError::conflict("account is already verified"));
    }

    let otp = generate_otp();
    diesel::update(users::table.find(user.id))
        .set((
            users::otp.eq(&otp),
            users::otp_expiry
                .eq(Utc::now().naive_utc() + ChronoDuration::minutes(OTP_LIFETIME_MINUTES)),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)
        .await?;

    let body = format!(
        r#"Dear {},

Your new OTP for verifying your Campus Connect account is: {otp}
This OTP will expire in {OTP_LIFETIME_MINUTES} minutes.

Best regards,
Campus Connect Team"#,
        user.full_name(),
    );
    email::send_best_effort(
        user.email.clone(),
        user.full_name(),
        "New OTP for Campus Connect Account Verification".to_string(),
        body,
    );

    Ok(Json(RegisterResponse {
        message: "New OTP sent to your email".to_string(),
        user_id: user.id,
    }))
}

async fn login(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let conn = &mut pool.get().await?;

    let user = users::table
        .filter(users::email.eq(req.email.to_lowercase()))
        .first::<User>(conn)
        .await
        .optional()?;

    let Some(user) = user else {
        return Err(AppError::unauthorized("invalid credentials"));
    };

    if !auth::verify_password(req.password, &user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    if !user.is_verified {
        return Err(AppError::forbidden(
            "account not verified. please verify your email with OTP",
        ));
    }
    if !user.is_active {
        return Err(AppError::forbidden("account has been deactivated"));
    }

    Ok(Json(AuthorizedResponse::new("Login successful", user)?))
}

pub fn app() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/regenerate-otp", post(regenerate_otp))
        .route("/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_four_digits() {
        for _ in 0..64 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 4);
            let value: u32 = otp.parse().unwrap();
            assert!((1000..10000).contains(&value));
        }
    }
}
