use crate::config::TokenPolicy;
use crate::models::Token;
use crate::store::{Collection, DocumentStore, DocumentStoreExt};

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether `token` authorizes requests on behalf of `phone`.
///
/// A missing token, an unknown id, or a failed read all yield `false`.
pub async fn verify_token(
    store: &dyn DocumentStore,
    token: Option<&str>,
    phone: &str,
    policy: TokenPolicy,
) -> bool {
    let Some(token_id) = token else {
        return false;
    };

    let token: Token = match store.read_as(Collection::Tokens, token_id).await {
        Ok(token) => token,
        Err(e) => {
            if !e.is_absent() {
                tracing::warn!("Token lookup failed: {e}");
            }
            return false;
        }
    };

    token_authorizes(&token, phone, policy, now_ms())
}

/// Pure half of [`verify_token`].
pub fn token_authorizes(token: &Token, phone: &str, policy: TokenPolicy, now_ms: i64) -> bool {
    let owned = token.phone == phone;
    let expired = token.is_expired_at(now_ms);
    match policy {
        TokenPolicy::Strict => owned && !expired,
        TokenPolicy::Legacy => owned || !expired,
    }
}
