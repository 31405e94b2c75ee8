use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::dto::UserFields;
use super::SyncError;
use super::repo::{self, UserStore};
use super::repo_types::User;
use crate::remote::RemoteUserGateway;

/// Keeps local user records in step with the remote user API.
///
/// Every operation makes at most one remote call and only then touches the
/// local store. Remote writes are never rolled back when the local write
/// fails validation.
#[derive(Clone)]
pub struct UserSyncController {
    store: Arc<dyn UserStore>,
    gateway: Arc<RemoteUserGateway>,
}

impl UserSyncController {
    pub fn new(store: Arc<dyn UserStore>, gateway: Arc<RemoteUserGateway>) -> Self {
        Self { store, gateway }
    }

    /// Fetch the remote collection, upsert each payload by id, and return
    /// every local record. Remote content wins over local edits.
    #[instrument(skip(self))]
    pub async fn list_and_reconcile(&self) -> Result<Vec<User>, SyncError> {
        let payloads = self.gateway.list_all().await?;

        for payload in payloads {
            let Some(id) = payload.id else {
                warn!(username = %payload.username, "remote user without id skipped");
                continue;
            };
            match repo::upsert(self.store.as_ref(), id, &payload.into_fields()).await {
                Ok(_) => {}
                Err(SyncError::ValidationFailed(errors)) => {
                    warn!(user_id = id, %errors, "remote user failed local validation; skipped");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.store.all().await?)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> Result<User, SyncError> {
        self.store.find(id).await?.ok_or(SyncError::NotFound(id))
    }

    /// Create remotely, then mirror the answer into a new local record whose
    /// id is assigned by the store.
    #[instrument(skip(self, fields))]
    pub async fn create_user(&self, fields: UserFields) -> Result<User, SyncError> {
        let created = self.gateway.create(&fields).await?;
        let remote_id = created.id;

        let user = repo::save_new(self.store.as_ref(), None, &created.into_fields())
            .await
            .inspect_err(|e| warn!(?remote_id, error = %e, "remote user created but not saved"))?;

        info!(user_id = user.id, ?remote_id, "user created");
        Ok(user)
    }

    /// Update remotely, then apply the returned content to record `id`,
    /// keeping the local id.
    #[instrument(skip(self, fields))]
    pub async fn update_user(&self, id: i64, fields: UserFields) -> Result<User, SyncError> {
        let existing = self.get_user(id).await?;

        let updated = self.gateway.update(&fields).await?;
        let user = repo::save_existing(self.store.as_ref(), existing.id, &updated.into_fields())
            .await
            .inspect_err(|e| warn!(user_id = id, error = %e, "remote user updated but not saved"))?;

        info!(user_id = user.id, "user updated");
        Ok(user)
    }

    /// Delete remotely; the local record is removed only when the remote
    /// confirms.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i64) -> Result<String, SyncError> {
        let existing = self.get_user(id).await?;

        let outcome = self.gateway.delete(existing.id).await?;
        if !outcome.succeeded {
            return Err(SyncError::DeleteRejected {
                id,
                status: outcome.code,
            });
        }

        if !self.store.delete(existing.id).await? {
            warn!(user_id = id, "local record already gone after remote delete");
        }
        info!(user_id = id, "user deleted");
        Ok(format!("Deleted user with id {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::MemoryUserStore;
    use crate::users::repo::StoreError;
    use crate::users::validation::TAKEN;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    struct Harness {
        server: MockServer,
        store: Arc<MemoryUserStore>,
        controller: UserSyncController,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryUserStore::new());
        let gateway =
            Arc::new(RemoteUserGateway::new(&format!("{}/users", server.uri()), None).unwrap());
        let controller = UserSyncController::new(store.clone(), gateway);
        Harness {
            server,
            store,
            controller,
        }
    }

    fn fields(name: &str, username: &str, email: &str) -> UserFields {
        UserFields {
            name: name.into(),
            username: username.into(),
            email: email.into(),
            phone: "555".into(),
            website: Some(String::new()),
        }
    }

    fn remote(id: i64, f: &UserFields) -> serde_json::Value {
        json!({
            "id": id,
            "name": f.name,
            "username": f.username,
            "email": f.email,
            "phone": f.phone,
            "website": f.website,
        })
    }

    #[tokio::test]
    async fn reconcile_upserts_every_remote_id() {
        let h = harness().await;
        let ann = fields("Ann", "ann1", "a@x.com");
        let bob = fields("Bob", "bobby", "b@x.com");
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([remote(1, &ann), remote(4, &bob)])),
            )
            .mount(&h.server)
            .await;

        let users = h.controller.list_and_reconcile().await.unwrap();
        assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(users[0].fields(), ann);
        assert_eq!(users[1].fields(), bob);

        // second pass does not duplicate
        let again = h.controller.list_and_reconcile().await.unwrap();
        assert_eq!(again.len(), 2);
    }

    #[tokio::test]
    async fn reconcile_overwrites_with_latest_remote_content() {
        let h = harness().await;
        let first = fields("Ann", "ann1", "a@x.com");
        let second = fields("Ann2", "ann1", "a@x.com");

        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([remote(1, &first)])))
            .up_to_n_times(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([remote(1, &second)])))
            .mount(&h.server)
            .await;

        h.controller.list_and_reconcile().await.unwrap();
        assert_eq!(h.store.find(1).await.unwrap().unwrap().name, "Ann");

        h.controller.list_and_reconcile().await.unwrap();
        assert_eq!(h.store.find(1).await.unwrap().unwrap().name, "Ann2");
    }

    #[tokio::test]
    async fn reconcile_overwrites_unmirrored_local_edits() {
        let h = harness().await;
        let remote_ann = fields("Ann", "ann1", "a@x.com");
        h.store
            .insert(Some(1), &fields("Local Ann", "ann1", "a@x.com"))
            .await
            .unwrap();
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([remote(1, &remote_ann)])))
            .mount(&h.server)
            .await;

        h.controller.list_and_reconcile().await.unwrap();
        assert_eq!(h.store.find(1).await.unwrap().unwrap().name, "Ann");
    }

    #[tokio::test]
    async fn reconcile_skips_invalid_and_idless_payloads() {
        let h = harness().await;
        let good = fields("Ann", "ann1", "a@x.com");
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                remote(1, &good),
                remote(2, &fields("B", "bo", "b@x.com")),
                { "name": "No Id", "username": "noid", "email": "n@x.com", "phone": "1" }
            ])))
            .mount(&h.server)
            .await;

        let users = h.controller.list_and_reconcile().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1);
    }

    #[tokio::test]
    async fn reconcile_surfaces_remote_failure() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&h.server)
            .await;

        let err = h.controller.list_and_reconcile().await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable(_)));
        assert!(h.store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_local_id_and_mirrors_remote_fields() {
        let h = harness().await;
        h.store
            .insert(Some(3), &fields("Cat", "catty", "c@x.com"))
            .await
            .unwrap();

        let submitted = fields("Ann", "ann1", "a@x.com");
        let echoed = fields("Ann", "ann1", "a@x.com");
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_json(json!({
                "name": "Ann", "username": "ann1", "email": "a@x.com",
                "phone": "555", "website": ""
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(remote(11, &echoed)))
            .expect(1)
            .mount(&h.server)
            .await;

        let user = h.controller.create_user(submitted).await.unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.fields(), echoed);
    }

    #[tokio::test]
    async fn create_with_duplicate_username_fails_after_remote_create() {
        let h = harness().await;
        h.store
            .insert(None, &fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap();

        let dup = fields("Another", "ann1", "other@x.com");
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(201).set_body_json(remote(11, &dup)))
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h.controller.create_user(dup).await.unwrap_err();
        match err {
            SyncError::ValidationFailed(errors) => {
                assert_eq!(errors.messages("username"), &[TAKEN.to_string()]);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(h.store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_surfaces_remote_failure_without_local_write() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&h.server)
            .await;

        let err = h
            .controller
            .create_user(fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable(_)));
        assert!(h.store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_local_id() {
        let h = harness().await;
        let local = h
            .store
            .insert(Some(9), &fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap();

        let changed = fields("Annie", "annie", "annie@x.com");
        Mock::given(method("PUT"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(remote(1, &changed)))
            .expect(1)
            .mount(&h.server)
            .await;

        let user = h.controller.update_user(local.id, changed.clone()).await.unwrap();
        assert_eq!(user.id, 9);
        assert_eq!(user.fields(), changed);
        assert!(h.store.find(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_validation_failure_leaves_record_unchanged() {
        let h = harness().await;
        h.store
            .insert(Some(1), &fields("Bob", "bobby", "b@x.com"))
            .await
            .unwrap();
        let ann = h
            .store
            .insert(Some(2), &fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap();

        let clash = fields("Ann", "ann1", "b@x.com");
        Mock::given(method("PUT"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(remote(1, &clash)))
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h.controller.update_user(ann.id, clash).await.unwrap_err();
        match err {
            SyncError::ValidationFailed(errors) => assert!(errors.has("email")),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(h.store.find(2).await.unwrap().unwrap().email, "a@x.com");
    }

    #[tokio::test]
    async fn update_surfaces_remote_failure_without_local_write() {
        let h = harness().await;
        let ann = fields("Ann", "ann1", "a@x.com");
        let local = h.store.insert(Some(3), &ann).await.unwrap();
        Mock::given(method("PUT"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h
            .controller
            .update_user(local.id, fields("Annie", "annie", "annie@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable(_)));
        assert_eq!(h.store.find(3).await.unwrap().unwrap(), local);
    }

    #[tokio::test]
    async fn update_of_unknown_user_makes_no_remote_call() {
        let h = harness().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = h
            .controller
            .update_user(99, fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(99)));
    }

    #[tokio::test]
    async fn delete_removes_record_on_remote_success() {
        let h = harness().await;
        h.store
            .insert(Some(7), &fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap();
        Mock::given(method("DELETE"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&h.server)
            .await;

        let message = h.controller.delete_user(7).await.unwrap();
        assert_eq!(message, "Deleted user with id 7");
        assert!(h.store.find(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_keeps_record_on_remote_failure() {
        let h = harness().await;
        h.store
            .insert(Some(7), &fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap();
        Mock::given(method("DELETE"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h.controller.delete_user(7).await.unwrap_err();
        assert!(matches!(err, SyncError::DeleteRejected { id: 7, status: 500 }));
        assert!(err.to_string().contains("500"));
        assert!(h.store.find(7).await.unwrap().is_some());
    }

    /// Store whose record disappears between lookup and delete.
    struct VanishingStore(MemoryUserStore);

    #[axum::async_trait]
    impl UserStore for VanishingStore {
        async fn all(&self) -> Result<Vec<User>, StoreError> {
            self.0.all().await
        }
        async fn find(&self, id: i64) -> Result<Option<User>, StoreError> {
            self.0.find(id).await
        }
        async fn find_by_username(
            &self,
            username: &str,
        ) -> Result<Option<User>, StoreError> {
            self.0.find_by_username(username).await
        }
        async fn find_by_email(
            &self,
            email: &str,
        ) -> Result<Option<User>, StoreError> {
            self.0.find_by_email(email).await
        }
        async fn insert(
            &self,
            id: Option<i64>,
            fields: &UserFields,
        ) -> Result<User, StoreError> {
            self.0.insert(id, fields).await
        }
        async fn update(
            &self,
            id: i64,
            fields: &UserFields,
        ) -> Result<User, StoreError> {
            self.0.update(id, fields).await
        }
        async fn delete(&self, id: i64) -> Result<bool, StoreError> {
            self.0.delete(id).await?;
            Ok(false)
        }
    }

    #[tokio::test]
    async fn delete_still_succeeds_when_local_row_already_gone() {
        let server = MockServer::start().await;
        let store = Arc::new(VanishingStore(MemoryUserStore::new()));
        store
            .insert(Some(7), &fields("Ann", "ann1", "a@x.com"))
            .await
            .unwrap();
        let gateway =
            Arc::new(RemoteUserGateway::new(&format!("{}/users", server.uri()), None).unwrap());
        let controller = UserSyncController::new(store.clone(), gateway);
        Mock::given(method("DELETE"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let message = controller.delete_user(7).await.unwrap();
        assert_eq!(message, "Deleted user with id 7");
        assert!(store.find(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_of_unknown_user_is_not_found() {
        let h = harness().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = h.controller.delete_user(5).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(5)));
    }
}
