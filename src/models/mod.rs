//! Data models for the PDF upload service.
//!
//! `FileRecord` maps to the `files` table via `sqlx::FromRow`; the upload
//! and catalog types are what the HTTP layer serializes back to clients.

pub mod file_record;
pub mod upload;
