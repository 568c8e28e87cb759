//! Hosted exchange provider
//!
//! Talks to a tandem sync endpoint over HTTP: `PUT /sync` uploads the
//! tracked files as a multipart body, `GET /sync` returns them
//! base64-encoded in JSON, `GET /sync/meta` returns just the metadata.
//! All requests carry a bearer credential.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, ProviderResult, SyncProvider};
use crate::store::{STORE_DB, STORE_SHM, STORE_WAL};
use crate::types::{ConfigSnapshot, SyncMeta};

/// Exchange point backed by a hosted sync endpoint
pub struct HostedProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    last_modified: DateTime<Utc>,
    device_name: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    db: String,
    db_shm: Option<String>,
    db_wal: Option<String>,
    last_modified: DateTime<Utc>,
    device_name: String,
}

impl HostedProvider {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

/// Decode an optional base64 blob field; empty or missing means absent
fn decode_blob(field: Option<String>) -> ProviderResult<Option<Vec<u8>>> {
    field
        .filter(|s| !s.is_empty())
        .map(|s| {
            base64::engine::general_purpose::STANDARD
                .decode(&s)
                .map_err(|e| ProviderError::Backend(format!("base64 decode: {}", e)))
        })
        .transpose()
}

#[async_trait]
impl SyncProvider for HostedProvider {
    async fn push(&self, snapshot: &ConfigSnapshot) -> ProviderResult<()> {
        let mut form = Form::new()
            .part(
                "db",
                Part::bytes(snapshot.db.clone()).file_name(STORE_DB),
            )
            .text("device_name", snapshot.meta.device_name.clone());
        if let Some(shm) = &snapshot.db_shm {
            form = form.part("db_shm", Part::bytes(shm.clone()).file_name(STORE_SHM));
        }
        if let Some(wal) = &snapshot.db_wal {
            form = form.part("db_wal", Part::bytes(wal.clone()).file_name(STORE_WAL));
        }

        let resp = self
            .client
            .put(format!("{}/sync", self.api_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Backend(format!("HTTP {}", resp.status())));
        }
        debug!("pushed snapshot to {}", self.api_url);
        Ok(())
    }

    async fn pull(&self) -> ProviderResult<ConfigSnapshot> {
        let resp = self
            .client
            .get(format!("{}/sync", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Backend(format!("HTTP {}", resp.status())));
        }

        let body: PullResponse = resp.json().await?;
        let db = decode_blob(Some(body.db))?
            .ok_or_else(|| ProviderError::Backend("empty primary blob".into()))?;
        Ok(ConfigSnapshot {
            db,
            db_shm: decode_blob(body.db_shm)?,
            db_wal: decode_blob(body.db_wal)?,
            meta: SyncMeta {
                last_modified: body.last_modified,
                device_name: body.device_name,
            },
        })
    }

    async fn remote_meta(&self) -> ProviderResult<SyncMeta> {
        let resp = self
            .client
            .get(format!("{}/sync/meta", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Backend(format!("HTTP {}", resp.status())));
        }

        let meta: MetaResponse = resp.json().await?;
        Ok(SyncMeta {
            last_modified: meta.last_modified,
            device_name: meta.device_name,
        })
    }
}
