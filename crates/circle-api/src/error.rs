use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use circle_types::api::{Failure, Success};

pub type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Success::new(data)))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] circle_db::Error),

    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(e) if e.is_recoverable() => (StatusCode::OK, self.to_string()),
            ApiError::Store(circle_db::Error::Consistency(_)) => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Store(_) | ApiError::Hash(_) => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            ApiError::Body(rejection) => (rejection.status(), self.to_string()),
        };

        (status, Json(Failure::new(message))).into_response()
    }
}

/// JSON body extractor whose rejection uses the `{success: false}` shape.
pub struct Body<T>(pub T);

impl<T, S> FromRequest<S> for Body<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Body(value))
    }
}
