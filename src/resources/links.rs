//! Bidirectional references between users and checks.
//!
//! A check is reachable from two places: `Check.userPhone` and the owner's
//! `User.checks`. The store cannot update both atomically, so each logical
//! operation here issues its writes in a fixed order and, when a later write
//! fails, either undoes the earlier one or returns a [`ReconciliationTask`]
//! naming exactly what is left to do.
//!
//! A deleted check is never recreated to repair an index.

use serde::{Deserialize, Serialize};

use crate::models::{Check, User};
use crate::store::{Collection, DocumentStore, DocumentStoreExt, StoreError};

/// A half-finished cross-collection operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationTask {
    /// A check document exists that its owner does not list.
    OrphanedCheck { check_id: String, user_phone: String },
    /// A user lists a check id whose document is gone.
    DanglingReference { user_phone: String, check_id: String },
}

impl ReconciliationTask {
    /// Finish the operation. Safe to call repeatedly: work that is already
    /// done counts as success.
    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        match self {
            Self::OrphanedCheck {
                check_id,
                user_phone,
            } => {
                // The owner may have picked the check up since; only delete
                // if it is still unreferenced.
                match store.read_as::<User>(Collection::Users, user_phone).await {
                    Ok(user) if user.checks.contains(check_id) => return Ok(()),
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e),
                }
                ignore_not_found(store.delete(Collection::Checks, check_id).await)
            }
            Self::DanglingReference {
                user_phone,
                check_id,
            } => {
                let mut user: User = match store.read_as(Collection::Users, user_phone).await {
                    Ok(user) => user,
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return Err(e),
                };
                if remove_first(&mut user.checks, check_id) {
                    store.update_as(Collection::Users, user_phone, &user).await?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Failed before anything was written.
    #[error("nothing was changed: {0}")]
    Aborted(#[source] StoreError),

    /// A later write failed and the earlier write was undone.
    #[error("write failed and was rolled back: {0}")]
    RolledBack(#[source] StoreError),

    /// A later write failed and the earlier write could not be undone.
    #[error("operation left unfinished: {source}")]
    Unreconciled {
        #[source]
        source: StoreError,
        task: ReconciliationTask,
    },
}

/// Outcome of deleting a user and then each of their checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub deleted: Vec<String>,
    pub failed: Vec<ReconciliationTask>,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove the first occurrence of `id`. Returns whether anything was removed.
pub fn remove_first(ids: &mut Vec<String>, id: &str) -> bool {
    match ids.iter().position(|existing| existing == id) {
        Some(pos) => {
            ids.remove(pos);
            true
        }
        None => false,
    }
}

fn ignore_not_found(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Write `check`, then append its id to `user.checks` and write `user`.
///
/// On success `user` reflects the stored document. On failure `user` is left
/// as it was passed in.
pub async fn attach_check(
    store: &dyn DocumentStore,
    user: &mut User,
    check: &Check,
) -> Result<(), LinkError> {
    store
        .create_as(Collection::Checks, &check.id, check)
        .await
        .map_err(LinkError::Aborted)?;

    user.checks.push(check.id.clone());
    let Err(user_err) = store.update_as(Collection::Users, &user.phone, &*user).await else {
        return Ok(());
    };
    user.checks.pop();

    match store.delete(Collection::Checks, &check.id).await {
        Ok(()) => {
            tracing::warn!(
                check_id = %check.id,
                "User update failed, new check rolled back: {user_err}"
            );
            Err(LinkError::RolledBack(user_err))
        }
        Err(undo_err) => {
            let task = ReconciliationTask::OrphanedCheck {
                check_id: check.id.clone(),
                user_phone: user.phone.clone(),
            };
            tracing::warn!(?task, "Check rollback failed: {undo_err}");
            Err(LinkError::Unreconciled {
                source: user_err,
                task,
            })
        }
    }
}

/// Delete `check`, then remove its id from the owner's `checks`.
///
/// The delete is final. If the owner cannot be updated afterwards the
/// reference is left dangling and reported.
pub async fn detach_check(store: &dyn DocumentStore, check: &Check) -> Result<(), LinkError> {
    match store.delete(Collection::Checks, &check.id).await {
        Ok(()) => {}
        // Already gone: still make sure the owner no longer lists it.
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(LinkError::Aborted(e)),
    }

    let dangling = |source: StoreError| {
        let task = ReconciliationTask::DanglingReference {
            user_phone: check.user_phone.clone(),
            check_id: check.id.clone(),
        };
        tracing::warn!(?task, "Check deleted but owner not updated: {source}");
        LinkError::Unreconciled { source, task }
    };

    let mut user: User = match store.read_as(Collection::Users, &check.user_phone).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            tracing::warn!(check_id = %check.id, "Deleted check had no owner on record");
            return Ok(());
        }
        Err(e) => return Err(dangling(e)),
    };

    if !remove_first(&mut user.checks, &check.id) {
        tracing::warn!(check_id = %check.id, "Deleted check was not listed by its owner");
        return Ok(());
    }

    store
        .update_as(Collection::Users, &user.phone, &user)
        .await
        .map_err(dangling)
}

/// Delete `user`, then each of their checks in order.
///
/// Fails only if the user document itself cannot be deleted, in which case
/// no check is touched. Checks that are already absent count as deleted.
pub async fn cascade_delete_user(
    store: &dyn DocumentStore,
    user: &User,
) -> Result<CascadeReport, StoreError> {
    store.delete(Collection::Users, &user.phone).await?;

    let mut report = CascadeReport::default();
    for check_id in &user.checks {
        match ignore_not_found(store.delete(Collection::Checks, check_id).await) {
            Ok(()) => report.deleted.push(check_id.clone()),
            Err(e) => {
                let task = ReconciliationTask::OrphanedCheck {
                    check_id: check_id.clone(),
                    user_phone: user.phone.clone(),
                };
                tracing::warn!(?task, "Cascade could not delete check: {e}");
                report.failed.push(task);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, Protocol};
    use crate::resources::test_support::{FaultyStore, Op, PHONE};

    fn user(checks: &[&str]) -> User {
        User {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: PHONE.into(),
            hashed_password: "hash".into(),
            tos_agreement: true,
            checks: checks.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn check(id: &str) -> Check {
        Check {
            id: id.into(),
            user_phone: PHONE.into(),
            protocol: Protocol::Http,
            url: "example.com".into(),
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds: 2,
        }
    }

    async fn seed_user(store: &FaultyStore, u: &User) {
        store.inner.create_as(Collection::Users, &u.phone, u).await.unwrap();
    }

    async fn stored_user(store: &FaultyStore) -> User {
        store.inner.read_as(Collection::Users, PHONE).await.unwrap()
    }

    #[test]
    fn remove_first_only_drops_first_match() {
        let mut ids = vec!["a".to_string(), "b".into(), "a".into()];
        assert!(remove_first(&mut ids, "a"));
        assert_eq!(ids, ["b", "a"]);
        assert!(!remove_first(&mut ids, "z"));
    }

    #[tokio::test]
    async fn attach_writes_both_sides() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;

        attach_check(&store, &mut u, &check("c1")).await.unwrap();

        assert_eq!(u.checks, ["c1"]);
        assert_eq!(stored_user(&store).await.checks, ["c1"]);
        assert_eq!(store.inner.count(Collection::Checks), 1);
    }

    #[tokio::test]
    async fn attach_rolls_back_check_when_user_write_fails() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        store.fail(Op::Update, Collection::Users);

        let err = attach_check(&store, &mut u, &check("c1")).await.unwrap_err();

        assert!(matches!(err, LinkError::RolledBack(_)));
        assert!(u.checks.is_empty());
        assert_eq!(store.inner.count(Collection::Checks), 0);
    }

    #[tokio::test]
    async fn attach_reports_orphan_when_rollback_fails() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        store.fail(Op::Update, Collection::Users);
        store.fail(Op::Delete, Collection::Checks);

        let err = attach_check(&store, &mut u, &check("c1")).await.unwrap_err();
        let task = match err {
            LinkError::Unreconciled { task, .. } => task,
            other => panic!("expected an unreconciled link, got {other:?}"),
        };
        assert_eq!(
            task,
            ReconciliationTask::OrphanedCheck {
                check_id: "c1".into(),
                user_phone: PHONE.into()
            }
        );

        store.heal();
        task.apply(&store).await.unwrap();
        assert_eq!(store.inner.count(Collection::Checks), 0);
        // Applying again is a no-op.
        task.apply(&store).await.unwrap();
    }

    #[tokio::test]
    async fn attach_aborts_cleanly_when_check_write_fails() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        store.fail(Op::Create, Collection::Checks);

        let err = attach_check(&store, &mut u, &check("c1")).await.unwrap_err();
        assert!(matches!(err, LinkError::Aborted(_)));
        assert!(stored_user(&store).await.checks.is_empty());
    }

    #[tokio::test]
    async fn detach_removes_both_sides() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        attach_check(&store, &mut u, &check("c1")).await.unwrap();
        attach_check(&store, &mut u, &check("c2")).await.unwrap();

        detach_check(&store, &check("c1")).await.unwrap();

        assert_eq!(stored_user(&store).await.checks, ["c2"]);
        assert_eq!(store.inner.count(Collection::Checks), 1);
    }

    #[tokio::test]
    async fn detach_reports_dangling_reference_and_never_resurrects() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        attach_check(&store, &mut u, &check("c1")).await.unwrap();
        store.fail(Op::Update, Collection::Users);

        let err = detach_check(&store, &check("c1")).await.unwrap_err();
        let task = match err {
            LinkError::Unreconciled { task, .. } => task,
            other => panic!("expected an unreconciled link, got {other:?}"),
        };
        assert_eq!(store.inner.count(Collection::Checks), 0);
        assert_eq!(stored_user(&store).await.checks, ["c1"]);

        store.heal();
        task.apply(&store).await.unwrap();
        assert!(stored_user(&store).await.checks.is_empty());
    }

    #[tokio::test]
    async fn orphan_task_keeps_check_that_owner_now_lists() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        attach_check(&store, &mut u, &check("c1")).await.unwrap();

        let task = ReconciliationTask::OrphanedCheck {
            check_id: "c1".into(),
            user_phone: PHONE.into(),
        };
        task.apply(&store).await.unwrap();
        assert_eq!(store.inner.count(Collection::Checks), 1);
    }

    #[tokio::test]
    async fn cascade_deletes_user_and_checks() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        for id in ["c1", "c2", "c3"] {
            attach_check(&store, &mut u, &check(id)).await.unwrap();
        }

        let report = cascade_delete_user(&store, &u).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.deleted, ["c1", "c2", "c3"]);
        assert_eq!(store.inner.count(Collection::Users), 0);
        assert_eq!(store.inner.count(Collection::Checks), 0);
    }

    #[tokio::test]
    async fn cascade_counts_partial_failures() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        for id in ["c1", "c2", "c3"] {
            attach_check(&store, &mut u, &check(id)).await.unwrap();
        }
        store.fail_id(Op::Delete, "c2");

        let report = cascade_delete_user(&store, &u).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.total(), 3);
        assert_eq!(report.deleted, ["c1", "c3"]);
        assert_eq!(
            report.failed,
            [ReconciliationTask::OrphanedCheck {
                check_id: "c2".into(),
                user_phone: PHONE.into()
            }]
        );

        store.heal();
        for task in &report.failed {
            task.apply(&store).await.unwrap();
        }
        assert_eq!(store.inner.count(Collection::Checks), 0);
    }

    #[tokio::test]
    async fn cascade_treats_missing_checks_as_deleted() {
        let store = FaultyStore::default();
        let u = user(&["ghost"]);
        seed_user(&store, &u).await;

        let report = cascade_delete_user(&store, &u).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.deleted, ["ghost"]);
    }

    #[tokio::test]
    async fn cascade_stops_when_user_delete_fails() {
        let store = FaultyStore::default();
        let mut u = user(&[]);
        seed_user(&store, &u).await;
        attach_check(&store, &mut u, &check("c1")).await.unwrap();
        store.fail(Op::Delete, Collection::Users);

        assert!(cascade_delete_user(&store, &u).await.is_err());
        assert_eq!(store.inner.count(Collection::Checks), 1);
    }
}
