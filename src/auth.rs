use crate::{
    error::AppError,
    models::{Role, User},
    schema::users,
    DbPool,
};
use argon2::Argon2;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, RequestParts},
    headers::{authorization::Bearer, Authorization},
    Extension, TypedHeader,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{ops::Deref, time::Duration};

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

lazy_static::lazy_static! {
    // TODO: use jwt_secret from config instead of env var
    static ref KEYS: Keys = {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Keys {
            encoding: EncodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
            decoding: DecodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
        }
    };
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: Role,
    pub exp: u64,
}

#[allow(unused_must_use)]
pub fn ensure_jwt_secret_is_valid() {
    KEYS.deref();
}

pub fn generate_jwt(user: &User, exp: Duration) -> JwtResult<String> {
    jsonwebtoken::encode(
        &Header::default(),
        &Claims {
            user_id: user.id,
            role: user.role,
            exp: jsonwebtoken::get_current_timestamp() + exp.as_secs(),
        },
        &KEYS.encoding,
    )
}

pub fn validate_jwt(token: &str) -> JwtResult<TokenData<Claims>> {
    jsonwebtoken::decode::<Claims>(token, &KEYS.decoding, &Validation::default())
}

/// Authenticated caller. The user row is reloaded on every request so a
/// deactivation takes effect immediately, not only at token expiry.
pub struct ExtractAuth(pub User);

#[async_trait]
impl<B: Send> FromRequest<B> for ExtractAuth {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| AppError::unauthorized("missing bearer token"))?;

        let claims = validate_jwt(bearer.token())
            .map_err(|_| AppError::unauthorized("invalid or expired token"))?
            .claims;

        let Extension(pool) = Extension::<DbPool>::from_request(req)
            .await
            .map_err(|_| anyhow::anyhow!("database pool is not attached to the router"))?;
        let conn = &mut pool.get().await?;

        let user = users::table
            .find(claims.user_id)
            .first::<User>(conn)
            .await
            .optional()?
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

        if !user.is_active {
            return Err(AppError::forbidden("account has been deactivated"));
        }
        if !user.is_verified {
            return Err(AppError::forbidden("account is not verified"));
        }

        Ok(ExtractAuth(user))
    }
}

/// Caller with the admin role. Relationship checks past that (ownership,
/// recipient) stay in the handlers.
pub struct AdminOnly(pub User);

#[async_trait]
impl<B: Send> FromRequest<B> for AdminOnly {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let ExtractAuth(user) = ExtractAuth::from_request(req).await?;
        if user.role != Role::Admin {
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }
}
