// src/store/testing.rs
//! File Store wrapper that injects failures and records calls, for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{FileStore, InMemoryFileStore, ProgressFn};
use crate::error::AppError;
use crate::models::file::{FileRecord, FileStatus, FileType, Principal, UserRole};

#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryFileStore,
    upload_faults: Mutex<HashMap<FileType, AppError>>,
    status_faults: Mutex<HashMap<FileStatus, AppError>>,
    bytes_fault: Mutex<Option<AppError>>,
    get_file_faults: Mutex<u32>,
    uploads: Mutex<Vec<(String, FileType)>>,
    status_updates: Mutex<Vec<(String, FileStatus)>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_upload(&self, file_type: FileType, err: AppError) {
        self.upload_faults.lock().unwrap().insert(file_type, err);
    }

    pub fn fail_status(&self, status: FileStatus, err: AppError) {
        self.status_faults.lock().unwrap().insert(status, err);
    }

    pub fn fail_bytes(&self, err: AppError) {
        *self.bytes_fault.lock().unwrap() = Some(err);
    }

    /// The next `times` calls to `get_file` fail with `Unknown`.
    pub fn fail_get_file(&self, times: u32) {
        *self.get_file_faults.lock().unwrap() = times;
    }

    pub fn clear_faults(&self) {
        self.upload_faults.lock().unwrap().clear();
        self.status_faults.lock().unwrap().clear();
        *self.bytes_fault.lock().unwrap() = None;
        *self.get_file_faults.lock().unwrap() = 0;
    }

    /// Attempted uploads, including failed ones.
    pub fn uploads(&self) -> Vec<(String, FileType)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn status_updates(&self) -> Vec<(String, FileStatus)> {
        self.status_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for FaultyStore {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn upload_file(
        &self,
        caller: &Principal,
        file_id: &str,
        file_type: FileType,
        payload: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> Result<(), AppError> {
        self.uploads.lock().unwrap().push((file_id.to_string(), file_type));
        let fault = self.upload_faults.lock().unwrap().get(&file_type).cloned();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.upload_file(caller, file_id, file_type, payload, progress).await
    }

    async fn update_file_status(
        &self,
        caller: &Principal,
        file_id: &str,
        status: FileStatus,
    ) -> Result<(), AppError> {
        self.status_updates.lock().unwrap().push((file_id.to_string(), status));
        let fault = self.status_faults.lock().unwrap().get(&status).cloned();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.update_file_status(caller, file_id, status).await
    }

    async fn get_file(&self, caller: &Principal, file_id: &str) -> Result<FileRecord, AppError> {
        {
            let mut remaining = self.get_file_faults.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Unknown("transient store error".to_string()));
            }
        }
        self.inner.get_file(caller, file_id).await
    }

    async fn get_user_files(&self, caller: &Principal, user: &Principal) -> Result<Vec<FileRecord>, AppError> {
        self.inner.get_user_files(caller, user).await
    }

    async fn file_bytes(&self, caller: &Principal, file_id: &str) -> Result<Vec<u8>, AppError> {
        let fault = self.bytes_fault.lock().unwrap().clone();
        if let Some(err) = fault {
            return Err(err);
        }
        self.inner.file_bytes(caller, file_id).await
    }

    async fn get_caller_user_role(&self, caller: &Principal) -> Result<UserRole, AppError> {
        self.inner.get_caller_user_role(caller).await
    }

    async fn assign_caller_user_role(
        &self,
        caller: &Principal,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), AppError> {
        self.inner.assign_caller_user_role(caller, user, role).await
    }
}
