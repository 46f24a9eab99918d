// src/store/mod.rs
//! Typed client seam for the external File Store.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::file::{FileRecord, FileStatus, FileType, Principal, UserRole};

pub mod http;
pub mod memory;
#[cfg(test)]
pub mod testing;

pub use http::HttpFileStore;
pub use memory::InMemoryFileStore;

/// Upload progress in whole percent, 0..=100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Payloads are sent in chunks of this size so progress can be reported.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Short name for status pages and logs.
    fn name(&self) -> &'static str;

    /// False while the connection to the store is still being set up.
    fn is_ready(&self) -> bool;

    async fn upload_file(
        &self,
        caller: &Principal,
        file_id: &str,
        file_type: FileType,
        payload: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> Result<(), AppError>;

    async fn update_file_status(
        &self,
        caller: &Principal,
        file_id: &str,
        status: FileStatus,
    ) -> Result<(), AppError>;

    async fn get_file(&self, caller: &Principal, file_id: &str) -> Result<FileRecord, AppError>;

    async fn get_user_files(&self, caller: &Principal, user: &Principal) -> Result<Vec<FileRecord>, AppError>;

    async fn file_bytes(&self, caller: &Principal, file_id: &str) -> Result<Vec<u8>, AppError>;

    async fn get_caller_user_role(&self, caller: &Principal) -> Result<UserRole, AppError>;

    async fn is_caller_admin(&self, caller: &Principal) -> Result<bool, AppError> {
        Ok(self.get_caller_user_role(caller).await? == UserRole::Admin)
    }

    async fn assign_caller_user_role(
        &self,
        caller: &Principal,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), AppError>;
}

pub type SharedFileStore = Arc<dyn FileStore>;

/// Percentages reported after each chunk of a `len`-byte payload is sent.
/// Always ends at 100, even for an empty payload.
pub fn chunk_progress(len: usize, chunk_size: usize) -> Vec<u8> {
    if len == 0 || chunk_size == 0 {
        return vec![100];
    }
    let mut steps = Vec::new();
    let mut sent = 0usize;
    while sent < len {
        sent = (sent + chunk_size).min(len);
        steps.push(((sent as u128 * 100) / len as u128) as u8);
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_progress_ends_at_full() {
        assert_eq!(chunk_progress(0, 10), vec![100]);
        assert_eq!(chunk_progress(10, 10), vec![100]);
        assert_eq!(chunk_progress(25, 10), vec![40, 80, 100]);
        assert_eq!(chunk_progress(3, 64 * 1024), vec![100]);
    }
}
