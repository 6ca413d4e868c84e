use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Who is acting on the request, taken from the optional `X-User-ID` header
/// set by the calling back-office frontend. Recorded as `created_by`.
#[derive(Debug, Clone, Default)]
pub struct Actor(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Actor(None));
        };

        let user_id = value
            .to_str()
            .map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("X-User-ID header is not valid text"))
            })?
            .trim();
        if user_id.is_empty() {
            return Ok(Actor(None));
        }

        tracing::Span::current().record("user_id", user_id);

        Ok(Actor(Some(user_id.to_string())))
    }
}
