pub mod background_jobs;
pub mod candidate_retriever;
pub mod error;
pub mod maintenance_service;
pub mod matching_service;
pub mod notification_service;
pub mod scoring;
