use std::time::Duration;

use anyhow::Context;
use reqwest::{Client as ReqwestClient, Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{RemoteError, RemoteUserPayload};
use crate::users::dto::UserFields;

/// The remote API only honours writes against this resource, so every
/// update and delete is sent to `{base}/1` whatever local record is involved.
pub const CANONICAL_REMOTE_ID: i64 = 1;

/// Result of a remote delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub succeeded: bool,
    pub code: u16,
}

/// HTTP adapter for the remote user collection.
///
/// Each operation issues exactly one request. Nothing is retried or cached.
#[derive(Clone)]
pub struct RemoteUserGateway {
    client: ReqwestClient,
    users_url: String,
}

impl RemoteUserGateway {
    /// Build a gateway for the collection at `users_url`
    /// (e.g. "https://jsonplaceholder.typicode.com/users").
    pub fn new(users_url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("build remote http client")?;

        Ok(Self {
            client,
            users_url: users_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn users_url(&self) -> &str {
        &self.users_url
    }

    fn canonical_url(&self) -> String {
        format!("{}/{}", self.users_url, CANONICAL_REMOTE_ID)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&UserFields>,
    ) -> Result<Response, RemoteError> {
        let mut req = self.client.request(method.clone(), url);
        if let Some(fields) = body {
            req = req.json(fields);
        }
        req.send().await.map_err(|source| {
            warn!(%method, %url, error = %source, "remote request failed");
            RemoteError::Transport {
                method,
                url: url.to_string(),
                source,
            }
        })
    }

    async fn read_json<T: DeserializeOwned>(
        method: Method,
        url: &str,
        response: Response,
    ) -> Result<T, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            warn!(%method, %url, %status, "remote rejected request");
            return Err(RemoteError::Status {
                method,
                url: url.to_string(),
                status,
            });
        }
        response.json::<T>().await.map_err(|source| RemoteError::Decode {
            method,
            url: url.to_string(),
            source,
        })
    }

    /// GET the whole collection.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<RemoteUserPayload>, RemoteError> {
        let url = self.users_url.clone();
        let response = self.send(Method::GET, &url, None).await?;
        let users: Vec<RemoteUserPayload> = Self::read_json(Method::GET, &url, response).await?;
        debug!(count = users.len(), "remote users listed");
        Ok(users)
    }

    /// POST a new user; the answer carries the remote-assigned id.
    #[instrument(skip(self, fields))]
    pub async fn create(&self, fields: &UserFields) -> Result<RemoteUserPayload, RemoteError> {
        let url = self.users_url.clone();
        let response = self.send(Method::POST, &url, Some(fields)).await?;
        let created: RemoteUserPayload = Self::read_json(Method::POST, &url, response).await?;
        debug!(remote_id = ?created.id, "remote user created");
        Ok(created)
    }

    /// PUT the fields onto the canonical remote resource.
    #[instrument(skip(self, fields))]
    pub async fn update(&self, fields: &UserFields) -> Result<RemoteUserPayload, RemoteError> {
        let url = self.canonical_url();
        let response = self.send(Method::PUT, &url, Some(fields)).await?;
        Self::read_json(Method::PUT, &url, response).await
    }

    /// DELETE the canonical remote resource on behalf of local record `id`.
    ///
    /// A non-success status is not an error here; it is reported through
    /// [`DeleteOutcome`] so the caller can keep its record.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome, RemoteError> {
        let url = self.canonical_url();
        debug!(local_id = id, remote_id = CANONICAL_REMOTE_ID, "deleting remote user");
        let response = self.send(Method::DELETE, &url, None).await?;
        let status = response.status();
        if status.is_success() {
            Ok(DeleteOutcome {
                succeeded: true,
                code: 200,
            })
        } else {
            warn!(local_id = id, %status, "remote delete rejected");
            Ok(DeleteOutcome {
                succeeded: false,
                code: status.as_u16(),
            })
        }
    }
}
