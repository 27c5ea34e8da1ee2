use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    ResponseStatusError(StatusCode, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            message: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "internal server error");
                AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response()
            }
            AppError::ResponseStatusError(code, s) => (
                code,
                Json(AppErrorResponse {
                    status: code.as_u16(),
                    message: s,
                }),
            )
                .into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    /// Missing or malformed input, fixable by the caller.
    pub fn validation(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::BAD_REQUEST, s)
    }

    /// A state invariant would be violated: duplicate name, already a
    /// member, wrong status for a transition.
    pub fn conflict(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::CONFLICT, s)
    }

    /// Referenced entity does not exist.
    pub fn not_found(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, s)
    }

    /// Caller lacks the required relationship to the entity (ownership,
    /// recipient). Role checks happen upstream in the extractors.
    pub fn forbidden(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::FORBIDDEN, s)
    }

    pub fn unauthorized(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::from(StatusCode::UNAUTHORIZED, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        match err {
            AppError::ResponseStatusError(code, _) => code,
            AppError::InternalServerError(_) => panic!("expected a status error"),
        }
    }

    #[test]
    fn taxonomy_maps_to_expected_status_codes() {
        assert_eq!(status_of(AppError::validation("v")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::conflict("c")), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::not_found("n")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::forbidden("f")), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(AppError::unauthorized("u")),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn foreign_errors_become_internal() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, AppError::InternalServerError(_)));
    }
}
