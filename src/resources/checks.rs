use async_trait::async_trait;

use super::{read_failure, store_failure, ApiResult, CrudHandler};
use crate::auth::{create_random_string, now_ms, token_authorizes, verify_token, ID_LEN};
use crate::gateway::{ApiError, ApiRequest, ApiResponse, AppState};
use crate::models::{Check, Token, User};
use crate::resources::links::{attach_check, detach_check, LinkError, ReconciliationTask};
use crate::store::{Collection, DocumentStoreExt, StoreError};
use crate::validation::{validate_checks_data, validate_string_field};

/// `/checks`: uptime check definitions owned by a user.
pub struct ChecksHandler;

/// Resolve the caller's token to the user it belongs to. Any failure short
/// of a store error is a 403.
async fn owner_of(state: &AppState, token_id: Option<&str>) -> Result<User, ApiError> {
    let token_id = token_id.ok_or(ApiError::Forbidden)?;

    let token: Token = state
        .store
        .read_as(Collection::Tokens, token_id)
        .await
        .map_err(|e| read_failure(e, ApiError::Forbidden, "Could not read the token"))?;

    let policy = state.config.auth.token_policy;
    if !token_authorizes(&token, &token.phone, policy, now_ms()) {
        return Err(ApiError::Forbidden);
    }

    state
        .store
        .read_as(Collection::Users, &token.phone)
        .await
        .map_err(|e| read_failure(e, ApiError::Forbidden, "Could not read the user"))
}

fn no_such_check() -> ApiError {
    ApiError::NotFound("Specified check does not exist")
}

/// Read the check named by `id` and confirm the caller's token belongs to its
/// owner.
async fn authorized_check(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Check, ApiError> {
    let check: Check = state
        .store
        .read_as(Collection::Checks, id)
        .await
        .map_err(|e| read_failure(e, no_such_check(), "Could not read the check"))?;

    let policy = state.config.auth.token_policy;
    if !verify_token(state.store.as_ref(), req.token(), &check.user_phone, policy).await {
        return Err(ApiError::Forbidden);
    }
    Ok(check)
}

fn unreconciled(message: &str, source: StoreError, task: ReconciliationTask) -> ApiError {
    tracing::error!("{message}: {source}");
    ApiError::PartialFailure {
        message: message.to_string(),
        reconciliation: vec![task],
    }
}

#[async_trait]
impl CrudHandler for ChecksHandler {
    async fn post(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let invalid = || ApiError::Validation("Missing required inputs, or inputs are invalid");
        let data = validate_checks_data(&req.payload);
        if !data.are_valid_all_fields() {
            return Err(invalid());
        }
        let (Some(protocol), Some(url), Some(method), Some(codes), Some(timeout)) = (
            data.protocol,
            data.url,
            data.method,
            data.success_codes,
            data.timeout_seconds,
        ) else {
            return Err(invalid());
        };

        let mut user = owner_of(state, req.token()).await?;

        let max = state.config.checks.max_checks;
        if user.checks.len() >= max {
            return Err(ApiError::QuotaExceeded { max });
        }

        let check = Check {
            id: create_random_string(ID_LEN),
            user_phone: user.phone.clone(),
            protocol,
            url,
            method,
            success_codes: codes,
            timeout_seconds: timeout,
        };

        match attach_check(state.store.as_ref(), &mut user, &check).await {
            Ok(()) => {}
            Err(LinkError::Aborted(e)) => {
                return Err(store_failure(e, "Could not create the new check"));
            }
            Err(LinkError::RolledBack(e)) => {
                return Err(store_failure(e, "Could not update the user with the new check"));
            }
            Err(LinkError::Unreconciled { source, task }) => {
                return Err(unreconciled(
                    "Could not update the user with the new check, \
                     and the check could not be removed",
                    source,
                    task,
                ));
            }
        }

        tracing::info!(check_id = %check.id, phone = %check.user_phone, "Check created");
        ApiResponse::json(&check)
    }

    async fn get(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let id = validate_string_field(&req.query_value("id"))
            .ok_or(ApiError::Validation("Missing required field"))?;

        let check = authorized_check(state, req, &id).await?;
        ApiResponse::json(&check)
    }

    async fn put(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let id = validate_string_field(req.payload_field("id"))
            .ok_or(ApiError::Validation("Missing required field"))?;

        let data = validate_checks_data(&req.payload);
        if !data.has_updates() {
            return Err(ApiError::Validation("Missing fields to update"));
        }

        let mut check = authorized_check(state, req, &id).await?;

        if let Some(protocol) = data.protocol {
            check.protocol = protocol;
        }
        if let Some(url) = data.url {
            check.url = url;
        }
        if let Some(method) = data.method {
            check.method = method;
        }
        if let Some(success_codes) = data.success_codes {
            check.success_codes = success_codes;
        }
        if let Some(timeout_seconds) = data.timeout_seconds {
            check.timeout_seconds = timeout_seconds;
        }

        state
            .store
            .update_as(Collection::Checks, &id, &check)
            .await
            .map_err(|e| read_failure(e, no_such_check(), "Could not update the check"))?;

        ApiResponse::json(&check)
    }

    async fn delete(&self, state: &AppState, req: &ApiRequest) -> ApiResult {
        let id = validate_string_field(&req.param("id"))
            .ok_or(ApiError::Validation("Missing required field"))?;

        let check = authorized_check(state, req, &id).await?;

        match detach_check(state.store.as_ref(), &check).await {
            Ok(()) => Ok(ApiResponse::empty()),
            Err(LinkError::Aborted(e) | LinkError::RolledBack(e)) => {
                Err(store_failure(e, "Could not delete the check"))
            }
            Err(LinkError::Unreconciled { source, task }) => Err(unreconciled(
                "The check was deleted, but could not be removed from the user's checks",
                source,
                task,
            )),
        }
    }
}
