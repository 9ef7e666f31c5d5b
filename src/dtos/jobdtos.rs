use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One media file as submitted over the API, base64-encoded. Size limits are
/// enforced against the decoded bytes by the object store client.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct MediaFileDto {
    #[validate(length(min = 1, message = "File name is required"))]
    pub file_name: String,

    #[validate(length(min = 1, message = "Content type is required"))]
    pub content_type: String,

    #[validate(length(min = 1, message = "File data is required"))]
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateJobDto {
    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    pub description: String,

    #[validate(length(min = 1, message = "At least one photo or video is required"))]
    pub media: Vec<MediaFileDto>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitProposalDto {
    pub price: f64,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 100, message = "Duration must be at most 100 characters"))]
    pub duration: Option<String>,

    #[validate(range(min = 1, max = 50, message = "Worker count must be between 1 and 50"))]
    pub worker_count: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptProposalDto {
    pub worker_id: Uuid,
}

//Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_job_requires_description_and_media() {
        let dto = CreateJobDto {
            description: "".to_string(),
            media: vec![],
        };
        assert!(dto.validate().is_err());

        let dto = CreateJobDto {
            description: "broken compressor".to_string(),
            media: vec![MediaFileDto {
                file_name: "a.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                data: "aGVsbG8=".to_string(),
            }],
        };
        assert!(dto.validate().is_ok());
    }
}
