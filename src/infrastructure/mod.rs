pub mod config;
pub mod error;
pub mod records;
pub mod storage;
pub mod template_repository;
