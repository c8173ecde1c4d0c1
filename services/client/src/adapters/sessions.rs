//! services/client/src/adapters/sessions.rs
//!
//! This module contains the adapter for the session persistence endpoint,
//! the durable store keyed by session identifier. It implements the
//! `SessionStore` port from the `core` crate.

use async_trait::async_trait;
use interview_core::domain::{SessionDocument, SessionStatus};
use interview_core::ports::{PortError, PortResult, SessionStore};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that persists sessions over HTTP.
#[derive(Clone)]
pub struct HttpSessionStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionStore {
    /// Creates a new `HttpSessionStore`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: String,
}

#[derive(Serialize, Deserialize)]
struct StatusBody {
    status: SessionStatus,
}

fn unexpected(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn get_session(&self, session_id: &str) -> PortResult<SessionDocument> {
        let url = format!("{}/sessions/{}", self.base_url, session_id);
        let response = self.client.get(&url).send().await.map_err(unexpected)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(session_id.to_string()));
        }
        let response = response.error_for_status().map_err(unexpected)?;
        response.json().await.map_err(unexpected)
    }

    async fn create_session(&self, doc: &SessionDocument) -> PortResult<String> {
        let url = format!("{}/sessions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(doc)
            .send()
            .await
            .map_err(unexpected)?
            .error_for_status()
            .map_err(unexpected)?;
        let created: CreateSessionResponse = response.json().await.map_err(unexpected)?;
        Ok(created.session_id)
    }

    async fn update_session(&self, session_id: &str, doc: &SessionDocument) -> PortResult<()> {
        let url = format!("{}/sessions/{}", self.base_url, session_id);
        let response = self
            .client
            .put(&url)
            .json(doc)
            .send()
            .await
            .map_err(unexpected)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(PortError::NotFound(session_id.to_string())),
            // The endpoint rejects updates to completed sessions.
            StatusCode::CONFLICT => Err(PortError::Completed),
            _ => {
                response.error_for_status().map_err(unexpected)?;
                Ok(())
            }
        }
    }

    async fn get_status(&self, session_id: &str) -> PortResult<SessionStatus> {
        let url = format!("{}/sessions/status/{}", self.base_url, session_id);
        let response = self.client.get(&url).send().await.map_err(unexpected)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(session_id.to_string()));
        }
        let response = response.error_for_status().map_err(unexpected)?;
        let body: StatusBody = response.json().await.map_err(unexpected)?;
        Ok(body.status)
    }

    async fn update_status(&self, session_id: &str, status: SessionStatus) -> PortResult<()> {
        let url = format!("{}/sessions/status/{}", self.base_url, session_id);
        let response = self
            .client
            .patch(&url)
            .json(&StatusBody { status })
            .send()
            .await
            .map_err(unexpected)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(session_id.to_string()));
        }
        response.error_for_status().map_err(unexpected)?;
        Ok(())
    }
}
