//! User lifecycle: registration, retrieval, and password changes.
//!
//! Login orchestration (lockout, CAPTCHA, MFA branching, session/token
//! issuance) lives in [`crate::auth_service`]; this service owns only the
//! user record itself.

use std::sync::Arc;

use async_trait::async_trait;

use aegis_core::{AppError, AppResult, TenantId};
use aegis_domain::{EmailAddress, UserId, validate_password};

/// User record returned by repository queries.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Tenant this user belongs to.
    pub tenant_id: TenantId,
    /// Canonical, lowercased email address.
    pub email: String,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// Whether the account can currently authenticate.
    pub active: bool,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Whether TOTP MFA is enabled for this account.
    pub totp_enabled: bool,
}

/// Repository port for user persistence.
///
/// Every lookup is scoped to a bound tenant; there is no method that can
/// resolve a user across tenant boundaries.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by email within a tenant (case-insensitive).
    async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> AppResult<Option<UserRecord>>;

    /// Finds a user by identifier within a tenant.
    async fn find_by_id(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Creates a new user record. Returns the assigned user ID.
    async fn create(
        &self,
        tenant_id: TenantId,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> AppResult<UserId>;

    /// Updates the password hash for a user.
    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()>;

    /// Marks the user's email as verified.
    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()>;

    /// Flips the `totp_enabled` flag for a user.
    async fn set_totp_enabled(&self, user_id: UserId, enabled: bool) -> AppResult<()>;
}

/// Port for password hashing operations. Keeps domain/application free of
/// direct cryptographic library coupling.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password using the current scheme (Argon2id).
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    ///
    /// Implementations must take constant time regardless of whether the
    /// hash is well-formed, so callers can always verify against a real or
    /// dummy hash without leaking which case occurred.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;

    /// Returns whether a stored hash was produced with parameters weaker
    /// than the hasher's current configuration and should be upgraded the
    /// next time the plaintext is available (i.e. right after a successful
    /// login).
    fn needs_rehash(&self, hash: &str) -> bool;

    /// A hash string that `verify_password` always rejects, computed once at
    /// startup with the same cost parameters as a live hash. Used to burn
    /// the same CPU time attackers would observe from a real verification
    /// when the account or credential being checked does not exist.
    fn dummy_hash(&self) -> &str;
}

/// Parameters for user registration.
pub struct RegisterParams {
    /// Tenant the new account joins.
    pub tenant_id: TenantId,
    /// Email address for the new account.
    pub email: String,
    /// Plaintext password (validated against password-policy rules).
    pub password: String,
}

/// Application service for user registration and account management.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(user_repository: Arc<dyn UserRepository>, password_hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }

    /// Returns the user repository, for composition by other services.
    #[must_use]
    pub fn user_repository(&self) -> &Arc<dyn UserRepository> {
        &self.user_repository
    }

    /// Returns the password hasher, for composition by other services.
    #[must_use]
    pub fn password_hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.password_hasher
    }

    /// Registers a new user with email and password.
    ///
    /// Returns a generic conflict error on a duplicate email without
    /// revealing which part of the input collided.
    pub async fn register(&self, params: RegisterParams) -> AppResult<UserId> {
        let email_address = EmailAddress::new(&params.email)?;
        validate_password(&params.password, false)?;

        let existing = self
            .user_repository
            .find_by_email(params.tenant_id, email_address.as_str())
            .await?;

        if existing.is_some() {
            let _ = self.password_hasher.hash_password(&params.password);
            return Err(AppError::Conflict(
                "unable to register with the provided details".to_owned(),
            ));
        }

        let password_hash = self.password_hasher.hash_password(&params.password)?;

        self.user_repository
            .create(params.tenant_id, email_address.as_str(), &password_hash, false)
            .await
    }

    /// Changes the password for an authenticated user.
    ///
    /// Requires the current password for verification.
    pub async fn change_password(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .user_repository
            .find_by_id(tenant_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        let current_valid = self
            .password_hasher
            .verify_password(current_password, &user.password_hash)?;

        if !current_valid {
            return Err(AppError::Unauthorized(
                "current password is incorrect".to_owned(),
            ));
        }

        validate_password(new_password, user.totp_enabled)?;

        let new_hash = self.password_hasher.hash_password(new_password)?;
        self.user_repository.update_password(user_id, &new_hash).await
    }

    /// Returns a user record by ID, if it exists within the tenant.
    pub async fn find_by_id(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Option<UserRecord>> {
        self.user_repository.find_by_id(tenant_id, user_id).await
    }

    /// Returns a user record by email, if it exists within the tenant.
    pub async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> AppResult<Option<UserRecord>> {
        self.user_repository.find_by_email(tenant_id, email).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct FakeUserRepository {
        users: Mutex<Vec<UserRecord>>,
    }

    #[async_trait]
    impl UserRepository for FakeUserRepository {
        async fn find_by_email(&self, tenant_id: TenantId, email: &str) -> AppResult<Option<UserRecord>> {
            Ok(self
                .users
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .iter()
                .find(|user| user.tenant_id == tenant_id && user.email == email)
                .cloned())
        }

        async fn find_by_id(&self, tenant_id: TenantId, user_id: UserId) -> AppResult<Option<UserRecord>> {
            Ok(self
                .users
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .iter()
                .find(|user| user.tenant_id == tenant_id && user.id == user_id)
                .cloned())
        }

        async fn create(
            &self,
            tenant_id: TenantId,
            email: &str,
            password_hash: &str,
            email_verified: bool,
        ) -> AppResult<UserId> {
            let id = UserId::new();
            self.users
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .push(UserRecord {
                    id,
                    tenant_id,
                    email: email.to_owned(),
                    email_verified,
                    active: true,
                    password_hash: password_hash.to_owned(),
                    totp_enabled: false,
                });
            Ok(id)
        }

        async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(user) = users.iter_mut().find(|user| user.id == user_id) {
                user.password_hash = password_hash.to_owned();
            }
            Ok(())
        }

        async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(user) = users.iter_mut().find(|user| user.id == user_id) {
                user.email_verified = true;
            }
            Ok(())
        }

        async fn set_totp_enabled(&self, user_id: UserId, enabled: bool) -> AppResult<()> {
            let mut users = self.users.lock().unwrap_or_else(|poison| poison.into_inner());
            if let Some(user) = users.iter_mut().find(|user| user.id == user_id) {
                user.totp_enabled = enabled;
            }
            Ok(())
        }
    }

    struct PlaintextHasher;

    impl PasswordHasher for PlaintextHasher {
        fn hash_password(&self, password: &str) -> AppResult<String> {
            Ok(format!("plain:{password}"))
        }

        fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
            Ok(hash == format!("plain:{password}"))
        }

        fn needs_rehash(&self, _hash: &str) -> bool {
            false
        }

        fn dummy_hash(&self) -> &str {
            "plain:dummy"
        }
    }

    fn service() -> UserService {
        UserService::new(
            Arc::new(FakeUserRepository { users: Mutex::new(Vec::new()) }),
            Arc::new(PlaintextHasher),
        )
    }

    #[tokio::test]
    async fn register_then_find_by_email_round_trips() {
        let service = service();
        let tenant_id = TenantId::new();
        let user_id = service
            .register(RegisterParams {
                tenant_id,
                email: "User@Example.com".to_owned(),
                password: "a-reasonable-passphrase".to_owned(),
            })
            .await
            .unwrap_or_else(|_| panic!("test"));

        let found = service
            .find_by_email(tenant_id, "user@example.com")
            .await
            .unwrap_or_else(|_| panic!("test"));
        assert_eq!(found.map(|user| user.id), Some(user_id));
    }

    #[tokio::test]
    async fn duplicate_email_in_same_tenant_is_rejected() {
        let service = service();
        let tenant_id = TenantId::new();
        let params = || RegisterParams {
            tenant_id,
            email: "dup@example.com".to_owned(),
            password: "a-reasonable-passphrase".to_owned(),
        };
        service.register(params()).await.unwrap_or_else(|_| panic!("test"));
        let result = service.register(params()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn same_email_is_isolated_across_tenants() {
        let service = service();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        service
            .register(RegisterParams {
                tenant_id: tenant_a,
                email: "shared@example.com".to_owned(),
                password: "a-reasonable-passphrase".to_owned(),
            })
            .await
            .unwrap_or_else(|_| panic!("test"));

        let result = service
            .register(RegisterParams {
                tenant_id: tenant_b,
                email: "shared@example.com".to_owned(),
                password: "a-different-passphrase".to_owned(),
            })
            .await;
        assert!(result.is_ok());
    }
}
