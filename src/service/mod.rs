pub mod annotation_service;
pub mod chat_service;
pub mod error;
pub mod job_service;
pub mod notification_service;
pub mod storage_service;
