//! Append-only audit trail for security-relevant events.
//!
//! Unlike most side effects in this crate, an audit write failure is never
//! swallowed: if the ledger cannot be written, the operation that triggered
//! it did not happen as far as compliance is concerned, so the error must
//! propagate to the caller instead of being logged and ignored.

use std::sync::Arc;

use async_trait::async_trait;

use aegis_core::AppResult;
use aegis_domain::AuditLogEntry;

/// Repository port for the audit log.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends an entry to the audit log.
    async fn append(&self, entry: &AuditLogEntry) -> AppResult<()>;
}

/// Application service recording audit log entries.
#[derive(Clone)]
pub struct AuditService {
    repository: Arc<dyn AuditRepository>,
}

impl AuditService {
    /// Creates a new audit service.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Records an audit entry. Logs at `error` level and propagates the
    /// failure if the write does not succeed; callers must not treat audit
    /// logging as best-effort.
    pub async fn record(&self, entry: AuditLogEntry) -> AppResult<()> {
        let action = entry.action();
        let tenant_id = entry.tenant_id();

        match self.repository.append(&entry).await {
            Ok(()) => {
                if entry.is_sensitive() {
                    tracing::warn!(
                        ?action,
                        %tenant_id,
                        actor_user_id = ?entry.actor_user_id(),
                        "sensitive audit event recorded"
                    );
                } else {
                    tracing::debug!(?action, %tenant_id, "audit event recorded");
                }
                Ok(())
            }
            Err(error) => {
                tracing::error!(?action, %tenant_id, %error, "audit log write failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use aegis_core::{AppError, TenantId};
    use aegis_domain::AuditAction;
    use chrono::Utc;

    use super::*;

    struct FakeRepository {
        entries: Mutex<Vec<AuditLogEntry>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditRepository for FakeRepository {
        async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Internal("write failed".to_owned()));
            }
            self.entries.lock().unwrap_or_else(|poison| poison.into_inner()).push(entry.clone());
            Ok(())
        }
    }

    fn entry(action: AuditAction) -> AuditLogEntry {
        AuditLogEntry::new(TenantId::new(), None, action, None, None, None, true, None, Utc::now())
    }

    #[tokio::test]
    async fn successful_write_is_recorded() {
        let repository = Arc::new(FakeRepository { entries: Mutex::new(Vec::new()), fail: false });
        let service = AuditService::new(repository.clone());
        service.record(entry(AuditAction::LoginSucceeded)).await.unwrap_or_else(|_| panic!("test"));
        assert_eq!(repository.entries.lock().unwrap_or_else(|poison| poison.into_inner()).len(), 1);
    }

    #[tokio::test]
    async fn failed_write_propagates_error() {
        let repository = Arc::new(FakeRepository { entries: Mutex::new(Vec::new()), fail: true });
        let service = AuditService::new(repository);
        let result = service.record(entry(AuditAction::PasswordChanged)).await;
        assert!(result.is_err());
    }
}
