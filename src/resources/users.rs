use async_trait::async_trait;

use super::{read_failure, store_failure, ApiResult, CrudHandler};
use crate::auth::{hash_password, verify_token};
use crate::gateway::{ApiError, ApiRequest, ApiResponse, AppState};
use crate::models::User;
use crate::resources::links::cascade_delete_user;
use crate::store::{Collection, DocumentStoreExt, StoreError};
use crate::validation::{validate_phone, validate_user_data};

/// `/users`: sign-up, profile read and update, cascading delete.
pub struct UsersHandler;

fn hash_or_fail(state: &AppState, password: &str) -> Result<String, ApiError> {
    hash_password(&state.config.auth.hashing_secret, password).ok_or_else(|| {
        tracing::error!("Error hashing password");
        ApiError::Store("Could not hash the user's password")
    })
}

#[async_trait]
impl CrudHandler for UsersHandler {
    async fn post(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let data = validate_user_data(&req.payload);
        if !data.is_valid() {
            return Err(ApiError::Validation("Missing required fields"));
        }
        let (Some(first_name), Some(last_name), Some(phone), Some(password)) =
            (data.first_name, data.last_name, data.phone, data.password)
        else {
            return Err(ApiError::Validation("Missing required fields"));
        };

        match state.store.read(Collection::Users, &phone).await {
            Ok(_) => return Err(ApiError::Validation("User already exists")),
            Err(e) if e.is_absent() => {}
            Err(e) => return Err(store_failure(e, "Could not create the new user")),
        }

        let user = User {
            first_name,
            last_name,
            phone,
            hashed_password: hash_or_fail(state, &password)?,
            tos_agreement: true,
            checks: Vec::new(),
        };

        match state
            .store
            .create_as(Collection::Users, &user.phone, &user)
            .await
        {
            Ok(()) => {}
            // Another request registered the phone between our read and write.
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(ApiError::Validation("User already exists"));
            }
            Err(e) => return Err(store_failure(e, "Could not create the new user")),
        }

        tracing::info!(phone = %user.phone, "User created");
        ApiResponse::json(&user.profile())
    }

    async fn get(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let phone = validate_phone(&req.query_value("phone"))
            .ok_or(ApiError::Validation("Invalid user"))?;

        let policy = state.config.auth.token_policy;
        if !verify_token(state.store.as_ref(), req.token(), &phone, policy).await {
            return Err(ApiError::Unauthorized);
        }

        let user: User = state
            .store
            .read_as(Collection::Users, &phone)
            .await
            .map_err(|e| {
                read_failure(
                    e,
                    ApiError::NotFound("Invalid data"),
                    "Could not read the user",
                )
            })?;

        ApiResponse::json(&user.profile())
    }

    async fn put(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let invalid = || ApiError::InvalidUpdate("Invalid data");
        let phone = validate_phone(req.payload_field("phone")).ok_or_else(invalid)?;

        let policy = state.config.auth.token_policy;
        if !verify_token(state.store.as_ref(), req.token(), &phone, policy).await {
            return Err(ApiError::Unauthorized);
        }

        let data = validate_user_data(&req.payload);
        if !data.has_updates() {
            return Err(invalid());
        }

        let mut user: User = state
            .store
            .read_as(Collection::Users, &phone)
            .await
            .map_err(|e| read_failure(e, invalid(), "Could not update the user"))?;

        if let Some(first_name) = data.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = data.last_name {
            user.last_name = last_name;
        }
        if let Some(password) = data.password {
            user.hashed_password = hash_or_fail(state, &password)?;
        }

        state
            .store
            .update_as(Collection::Users, &phone, &user)
            .await
            .map_err(|e| read_failure(e, invalid(), "Could not update the user"))?;

        ApiResponse::json(&user.profile())
    }

    async fn delete(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let phone = validate_phone(&req.param("phone"))
            .ok_or(ApiError::Validation("Invalid data"))?;

        let policy = state.config.auth.token_policy;
        if !verify_token(state.store.as_ref(), req.token(), &phone, policy).await {
            return Err(ApiError::Unauthorized);
        }

        let user: User = state
            .store
            .read_as(Collection::Users, &phone)
            .await
            .map_err(|e| {
                read_failure(
                    e,
                    ApiError::NotFound("Could not find the specified user"),
                    "Could not delete the specified user",
                )
            })?;

        let report = cascade_delete_user(state.store.as_ref(), &user)
            .await
            .map_err(|e| store_failure(e, "Could not delete the specified user"))?;

        if report.is_complete() {
            tracing::info!(phone = %user.phone, checks = report.deleted.len(), "User deleted");
            return Ok(ApiResponse::empty());
        }

        Err(ApiError::PartialFailure {
            message: format!(
                "Errors encountered while attempting to delete all of the user's checks. \
                 {} of {} checks may not have been deleted from the system successfully",
                report.failed.len(),
                report.total()
            ),
            reconciliation: report.failed,
        })
    }
}
