//! services/client/src/adapters/questions.rs
//!
//! This module contains the adapter for the external question source,
//! which supplies the ordered list of active guiding questions. It
//! implements the `QuestionSource` port from the `core` crate.

use async_trait::async_trait;
use interview_core::domain::{QaCategory, SeedQuestion};
use interview_core::ports::{PortError, PortResult, QuestionSource};
use serde::Deserialize;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that fetches active questions over HTTP.
#[derive(Clone)]
pub struct HttpQuestionSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuestionSource {
    /// Creates a new `HttpQuestionSource`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDto {
    id: String,
    text: String,
    short_text: String,
    category: Option<String>,
}

impl QuestionDto {
    fn to_domain(self) -> SeedQuestion {
        let category = match self.category.as_deref() {
            Some("tutorial") => QaCategory::Tutorial,
            _ => QaCategory::Research,
        };
        SeedQuestion {
            id: self.id,
            text: self.text,
            short_text: self.short_text,
            category,
        }
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn active_questions(&self) -> PortResult<Vec<SeedQuestion>> {
        let url = format!("{}/questions/active", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let dtos: Vec<QuestionDto> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(dtos.into_iter().map(QuestionDto::to_domain).collect())
    }
}
