// src/store/memory.rs
//! In-process File Store used when no remote store is configured, and by tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{chunk_progress, FileStore, ProgressFn, UPLOAD_CHUNK_SIZE};
use crate::error::AppError;
use crate::models::file::{BlobRef, FileRecord, FileStatus, FileType, Principal, UserRole};

struct StoredFile {
    record: FileRecord,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    files: HashMap<String, StoredFile>,
    roles: HashMap<Principal, UserRole>,
    admin_assigned: bool,
}

pub struct InMemoryFileStore {
    inner: RwLock<Inner>,
    ready: AtomicBool,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ready: AtomicBool::new(true),
        }
    }

    #[cfg(test)]
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Number of stored files, any owner.
    #[cfg(test)]
    pub async fn file_count(&self) -> usize {
        self.inner.read().await.files.len()
    }
}

impl Default for InMemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Resolves the caller's role. The first signed-in caller becomes admin.
    fn role_of(&mut self, caller: &Principal) -> UserRole {
        if caller.is_anonymous() {
            return UserRole::Guest;
        }
        if let Some(role) = self.roles.get(caller) {
            return *role;
        }
        let role = if self.admin_assigned {
            UserRole::User
        } else {
            self.admin_assigned = true;
            tracing::info!("👑 First caller {} registered as admin", caller);
            UserRole::Admin
        };
        self.roles.insert(caller.clone(), role);
        role
    }

    fn require_user(&mut self, caller: &Principal) -> Result<UserRole, AppError> {
        match self.role_of(caller) {
            UserRole::Guest => Err(AppError::Unauthorized(format!(
                "caller {} may not access files",
                caller
            ))),
            role => Ok(role),
        }
    }

    fn owned_file(&mut self, caller: &Principal, file_id: &str) -> Result<&mut StoredFile, AppError> {
        let role = self.require_user(caller)?;
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| AppError::NotFound(file_id.to_string()))?;
        if role != UserRole::Admin && &file.record.user_id != caller {
            return Err(AppError::Unauthorized(format!(
                "caller {} does not own {}",
                caller, file_id
            )));
        }
        Ok(file)
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn upload_file(
        &self,
        caller: &Principal,
        file_id: &str,
        file_type: FileType,
        payload: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> Result<(), AppError> {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }
        let mut inner = self.inner.write().await;
        inner.require_user(caller)?;
        if inner.files.contains_key(file_id) {
            return Err(AppError::AlreadyExists(file_id.to_string()));
        }

        if let Some(progress) = progress {
            for percent in chunk_progress(payload.len(), UPLOAD_CHUNK_SIZE) {
                progress(percent);
            }
        }

        let record = FileRecord {
            file_id: file_id.to_string(),
            file_type,
            status: FileStatus::Processing,
            upload_time: Utc::now(),
            completion_time: None,
            blob: BlobRef {
                size_bytes: payload.len() as u64,
                url: None,
            },
            user_id: caller.clone(),
        };
        inner.files.insert(file_id.to_string(), StoredFile { record, payload });
        tracing::debug!("📦 Stored {} file {} for {}", file_type.as_str(), file_id, caller);
        Ok(())
    }

    async fn update_file_status(
        &self,
        caller: &Principal,
        file_id: &str,
        status: FileStatus,
    ) -> Result<(), AppError> {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }
        let mut inner = self.inner.write().await;
        let file = inner.owned_file(caller, file_id)?;
        file.record.status = status;
        file.record.completion_time = match status {
            FileStatus::Completed => Some(Utc::now()),
            _ => None,
        };
        Ok(())
    }

    async fn get_file(&self, caller: &Principal, file_id: &str) -> Result<FileRecord, AppError> {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }
        let mut inner = self.inner.write().await;
        Ok(inner.owned_file(caller, file_id)?.record.clone())
    }

    async fn get_user_files(&self, caller: &Principal, user: &Principal) -> Result<Vec<FileRecord>, AppError> {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }
        let mut inner = self.inner.write().await;
        let role = inner.require_user(caller)?;
        if role != UserRole::Admin && caller != user {
            return Err(AppError::Unauthorized(format!(
                "caller {} may not list files of {}",
                caller, user
            )));
        }
        Ok(inner
            .files
            .values()
            .filter(|f| &f.record.user_id == user)
            .map(|f| f.record.clone())
            .collect())
    }

    async fn file_bytes(&self, caller: &Principal, file_id: &str) -> Result<Vec<u8>, AppError> {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }
        let mut inner = self.inner.write().await;
        Ok(inner.owned_file(caller, file_id)?.payload.clone())
    }

    async fn get_caller_user_role(&self, caller: &Principal) -> Result<UserRole, AppError> {
        Ok(self.inner.write().await.role_of(caller))
    }

    async fn assign_caller_user_role(
        &self,
        caller: &Principal,
        user: &Principal,
        role: UserRole,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner.role_of(caller) != UserRole::Admin {
            return Err(AppError::Unauthorized("only admins can assign roles".to_string()));
        }
        inner.roles.insert(user.clone(), role);
        tracing::info!("🎛️ {} assigned role {:?} to {}", caller, role, user);
        Ok(())
    }
}
