// service/annotation_service.rs
//
// External AI collaborator: a dispatcher consumes job-creation events and
// attaches a structured diagnosis to each job exactly once. A failure is
// terminal for that job's diagnosis; the job itself keeps flowing through
// proposal collection.
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    db::{db::DBClient, jobdb::JobExt},
    models::jobmodel::{AiAnalysis, Job, JobRecord},
};

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("job has no media to analyze")]
    MissingMedia,

    #[error("could not download media: {0}")]
    Download(String),

    #[error("vision API call failed: {0}")]
    Api(String),

    #[error("vision API returned an unexpected payload: {0}")]
    Schema(String),
}

#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn analyze(
        &self,
        description: &str,
        media_url: &str,
    ) -> Result<AiAnalysis, AnnotationError>;
}

fn build_prompt(description: &str) -> String {
    format!(
        "You are an expert repair technician. Analyze this photo of an equipment \
         breakdown (reported description: {}). List the specific tools needed for \
         the repair and estimate a repair price range in Tunisian Dinars (TND), \
         e.g. \"50 TND - 80 TND\". Give the client short safety advice or first \
         troubleshooting steps. Respond only in strict JSON.",
        description
    )
}

/// Strict response schema sent to the model so the reply parses into
/// `AiAnalysis` without post-processing.
fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "recommended_tools": {
                "type": "array",
                "description": "Tools needed for the repair.",
                "items": { "type": "string" }
            },
            "estimated_price": {
                "type": "string",
                "description": "Estimated price range in Tunisian Dinars (TND), e.g. 50 TND - 80 TND."
            },
            "advice": {
                "type": "string",
                "description": "Safety advice or first troubleshooting steps for the client."
            }
        },
        "required": ["recommended_tools", "estimated_price", "advice"]
    })
}

pub fn parse_analysis(text: &str) -> Result<AiAnalysis, AnnotationError> {
    serde_json::from_str::<AiAnalysis>(text.trim())
        .map_err(|e| AnnotationError::Schema(e.to_string()))
}

/// Client for a Gemini-style `generateContent` endpoint. The image is
/// downloaded from its public URL and inlined as base64.
pub struct GeminiVisionClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiVisionClient {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    async fn fetch_media(&self, url: &str) -> Result<(String, String), AnnotationError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AnnotationError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnnotationError::Download(format!(
                "media URL answered with status {}",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AnnotationError::Download(e.to_string()))?;

        Ok((general_purpose::STANDARD.encode(&bytes), mime_type))
    }
}

#[async_trait]
impl VisionClient for GeminiVisionClient {
    async fn analyze(
        &self,
        description: &str,
        media_url: &str,
    ) -> Result<AiAnalysis, AnnotationError> {
        let (data, mime_type) = self.fetch_media(media_url).await?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": build_prompt(description) },
                    { "inline_data": { "mime_type": mime_type, "data": data } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnnotationError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnnotationError::Api(format!(
                "vision endpoint answered with status {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnnotationError::Api(e.to_string()))?;

        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| AnnotationError::Schema("no text candidate in reply".to_string()))?;

        parse_analysis(text)
    }
}

/// Consumes job-creation events and writes the diagnosis (or the error
/// marker) back through the store's conditional update, so the write lands
/// at most once even if an event is ever replayed.
pub struct AnnotationDispatcher {
    db_client: Arc<DBClient>,
    vision: Arc<dyn VisionClient>,
}

impl AnnotationDispatcher {
    pub fn new(db_client: Arc<DBClient>, vision: Arc<dyn VisionClient>) -> Self {
        Self { db_client, vision }
    }

    pub async fn run(self, mut events: mpsc::UnboundedReceiver<JobRecord>) {
        tracing::info!("AI annotation dispatcher started");

        while let Some(record) = events.recv().await {
            self.annotate(record.job).await;
        }

        tracing::info!("AI annotation dispatcher stopped");
    }

    async fn annotate(&self, job: Job) {
        tracing::info!("Analyzing job {} ({})", job.id, job.status.to_str());

        let outcome = match job.media_urls.first() {
            Some(media_url) => self.vision.analyze(&job.description, media_url).await,
            None => Err(AnnotationError::MissingMedia),
        };

        let write = match outcome {
            Ok(analysis) => {
                tracing::info!(
                    "Job {} analyzed: tools [{}], price {}",
                    job.id,
                    analysis.recommended_tools.join(", "),
                    analysis.estimated_price
                );
                self.db_client.record_analysis(job.id, &analysis).await
            }
            Err(err) => {
                tracing::error!("Analysis of job {} failed: {}", job.id, err);
                self.db_client
                    .record_analysis_failure(job.id, err.to_string())
                    .await
            }
        };

        match write {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!("Job {} already carries a diagnosis, skipping", job.id)
            }
            Err(err) => tracing::error!("Could not record diagnosis for job {}: {}", job.id, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_diagnosis_parses() {
        let analysis = parse_analysis(
            r#"{
                "recommended_tools": ["multimeter", "screwdriver"],
                "estimated_price": "50 TND - 80 TND",
                "advice": "Unplug the unit before opening it."
            }"#,
        )
        .unwrap();

        assert_eq!(analysis.recommended_tools.len(), 2);
        assert_eq!(analysis.estimated_price, "50 TND - 80 TND");
    }

    #[test]
    fn missing_fields_are_a_schema_error() {
        let err = parse_analysis(r#"{"estimated_price": "50 TND"}"#).unwrap_err();
        assert!(matches!(err, AnnotationError::Schema(_)));

        let err = parse_analysis("not json at all").unwrap_err();
        assert!(matches!(err, AnnotationError::Schema(_)));
    }

    #[test]
    fn prompt_carries_the_reported_description() {
        let prompt = build_prompt("washing machine leaks");
        assert!(prompt.contains("washing machine leaks"));
        assert!(prompt.contains("TND"));
    }
}
