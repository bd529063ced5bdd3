use async_trait::async_trait;

use super::{read_failure, store_failure, ApiResult, CrudHandler};
use crate::auth::{constant_time_eq, create_random_string, hash_password, now_ms, ID_LEN};
use crate::gateway::{ApiError, ApiRequest, ApiResponse, AppState};
use crate::models::{Token, User};
use crate::store::{Collection, DocumentStoreExt};
use crate::validation::{validate_phone, validate_string_field};

/// `/tokens`: login, lookup, extension and logout.
pub struct TokensHandler;

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

#[async_trait]
impl CrudHandler for TokensHandler {
    async fn post(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let phone = validate_phone(req.payload_field("phone"));
        let password = validate_string_field(req.payload_field("password"));
        let (Some(phone), Some(password)) = (phone, password) else {
            return Err(ApiError::Validation("Missing required fields"));
        };

        let user: User = state
            .store
            .read_as(Collection::Users, &phone)
            .await
            .map_err(|e| {
                read_failure(
                    e,
                    ApiError::NotFound("Could not find the user's data"),
                    "Could not create the new token",
                )
            })?;

        let matches = hash_password(&state.config.auth.hashing_secret, &password)
            .is_some_and(|hash| constant_time_eq(hash.as_bytes(), user.hashed_password.as_bytes()));
        if !matches {
            return Err(ApiError::Validation("Invalid user or password"));
        }

        let token = Token {
            id: create_random_string(ID_LEN),
            phone,
            expires: now_ms().saturating_add(secs_to_ms(state.config.auth.token_ttl_secs)),
        };

        state
            .store
            .create_as(Collection::Tokens, &token.id, &token)
            .await
            .map_err(|e| store_failure(e, "Could not create the new token"))?;

        tracing::debug!(phone = %token.phone, "Token issued");
        ApiResponse::json(&token)
    }

    async fn get(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let id = validate_string_field(&req.query_value("id"))
            .ok_or(ApiError::Validation("Invalid id"))?;

        let token: Token = state
            .store
            .read_as(Collection::Tokens, &id)
            .await
            .map_err(|e| {
                read_failure(
                    e,
                    ApiError::NotFound("Invalid token"),
                    "Could not read the token",
                )
            })?;

        ApiResponse::json(&token)
    }

    async fn put(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let id = validate_string_field(req.payload_field("id"));
        let extend = req.payload_field("extend").as_bool() == Some(true);
        let Some(id) = id.filter(|_| extend) else {
            return Err(ApiError::Validation("Missing required fields or invalid"));
        };

        let not_found = || ApiError::NotFound("Specified token does not exist");

        let mut token: Token = state
            .store
            .read_as(Collection::Tokens, &id)
            .await
            .map_err(|e| read_failure(e, not_found(), "Could not update the token expiration"))?;

        let now = now_ms();
        if token.is_expired_at(now) {
            return Err(ApiError::Validation(
                "Token already expired, cannot be extended",
            ));
        }

        token.expires = now.saturating_add(secs_to_ms(state.config.auth.token_extend_secs));

        state
            .store
            .update_as(Collection::Tokens, &id, &token)
            .await
            .map_err(|e| read_failure(e, not_found(), "Could not update the token expiration"))?;

        ApiResponse::json(&token)
    }

    async fn delete(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let id = validate_string_field(&req.param("id"))
            .ok_or(ApiError::Validation("Invalid id"))?;
        let invalid = || ApiError::NotFound("Invalid token");

        state
            .store
            .read(Collection::Tokens, &id)
            .await
            .map_err(|e| read_failure(e, invalid(), "Error deleting the token"))?;

        state
            .store
            .delete(Collection::Tokens, &id)
            .await
            .map_err(|e| read_failure(e, invalid(), "Error deleting the token"))?;

        Ok(ApiResponse::empty())
    }
}
