use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendMessageDto {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub text: String,

    /// Optional id of the message being replied to; the outgoing text is
    /// prefixed with a quoted excerpt of it.
    pub reply_to: Option<Uuid>,
}
