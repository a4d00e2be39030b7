//! Scenario tests for the auth use cases
//! Run against the in-memory store with cheap hashing.

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use crate::application::events::{AuthEvent, EventPublisher, RecordingEventPublisher};
    use crate::application::*;
    use crate::domain::entity::{NewUser, User};
    use crate::domain::repository::UserRepository;
    use crate::domain::services::{SigningKey, TokenSigner, TotpManager};
    use crate::domain::value_object::{
        UserId,
        email::Email,
        user_name::UserName,
        user_password::{RawPassword, UserPassword},
        user_role::UserRole,
    };
    use crate::error::AuthResult;
    use crate::infra::InMemoryAuthRepository;

    pub const PASSWORD: &str = "password123";
    pub const SECRET: &str = "scenario-test-secret-long-enough-for-hs256";

    pub struct Harness {
        pub repo: Arc<InMemoryAuthRepository>,
        pub config: Arc<AuthConfig>,
        pub signer: Arc<TokenSigner>,
        pub recorder: Arc<RecordingEventPublisher>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with(InMemoryAuthRepository::new(), AuthConfig::development())
        }

        pub fn with_config(config: AuthConfig) -> Self {
            Self::with(InMemoryAuthRepository::new(), config)
        }

        pub fn with(repo: InMemoryAuthRepository, config: AuthConfig) -> Self {
            let signer = TokenSigner::new(
                SigningKey::from_secret(SECRET).unwrap(),
                config.jwt_issuer.clone(),
            );
            Self {
                repo: Arc::new(repo),
                config: Arc::new(config),
                signer: Arc::new(signer),
                recorder: Arc::new(RecordingEventPublisher::new()),
            }
        }

        pub fn events(&self) -> Arc<dyn EventPublisher> {
            self.recorder.clone()
        }

        pub fn sessions(&self) -> SessionIssuer<InMemoryAuthRepository> {
            SessionIssuer::new(self.repo.clone(), self.signer.clone(), self.config.clone())
        }

        pub fn register_use_case(&self) -> RegisterUseCase<InMemoryAuthRepository> {
            RegisterUseCase::new(self.repo.clone(), self.events(), self.config.clone())
        }

        pub async fn register(&self, name: &str, email: &str) -> AuthResult<RegisterOutput> {
            self.register_use_case()
                .execute(RegisterInput {
                    name: name.to_string(),
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    phone: "+1-555-0100".to_string(),
                    role: None,
                })
                .await
        }

        pub fn login_use_case(&self) -> LoginUseCase<InMemoryAuthRepository, InMemoryAuthRepository> {
            LoginUseCase::new(self.repo.clone(), self.sessions(), self.config.clone())
        }

        pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutput> {
            self.login_use_case()
                .execute(LoginInput {
                    email: email.to_string(),
                    password: password.to_string(),
                    totp_code: None,
                    expected_role: None,
                })
                .await
        }

        pub fn refresh_use_case(
            &self,
        ) -> RefreshUseCase<InMemoryAuthRepository, InMemoryAuthRepository> {
            RefreshUseCase::new(
                self.repo.clone(),
                self.repo.clone(),
                self.sessions(),
                self.config.clone(),
            )
        }

        pub fn validate_use_case(&self) -> ValidateTokenUseCase<InMemoryAuthRepository> {
            ValidateTokenUseCase::new(self.repo.clone(), self.signer.clone(), self.config.clone())
        }

        pub fn deactivate_use_case(
            &self,
        ) -> DeactivateUserUseCase<InMemoryAuthRepository, InMemoryAuthRepository> {
            DeactivateUserUseCase::new(
                self.repo.clone(),
                self.repo.clone(),
                self.events(),
                self.config.clone(),
            )
        }

        pub fn update_role_use_case(&self) -> UpdateUserRoleUseCase<InMemoryAuthRepository> {
            UpdateUserRoleUseCase::new(self.repo.clone(), self.events(), self.config.clone())
        }

        /// Insert an account with `role` directly into the store
        pub async fn seed(&self, name: &str, email: &str, role: UserRole) -> User {
            let password_hash = UserPassword::hash(
                RawPassword::new(PASSWORD.to_string()).unwrap(),
                self.config.pepper(),
                self.config.hashing_cost,
            )
            .await
            .unwrap();
            let totp = TotpManager::new(&self.config.totp_issuer)
                .generate_secret(email)
                .unwrap();

            let user = User::new(NewUser {
                email: Email::new(email).unwrap(),
                password_hash,
                name: UserName::new(name).unwrap(),
                phone: String::new(),
                totp_secret: totp.secret,
                role,
                created_by: None,
            });
            UserRepository::create(self.repo.as_ref(), &user).await.unwrap();
            user
        }

        pub async fn user(&self, id: &UserId) -> User {
            UserRepository::find_by_id(self.repo.as_ref(), id)
                .await
                .unwrap()
                .unwrap()
        }

        pub fn reset_token_for(&self, user_id: &UserId) -> Option<String> {
            self.recorder
                .events()
                .into_iter()
                .rev()
                .find_map(|event| match event {
                    AuthEvent::PasswordResetRequested {
                        user_id: id,
                        reset_token,
                        ..
                    } if id == *user_id => Some(reset_token),
                    _ => None,
                })
        }
    }
}

#[cfg(test)]
mod register_tests {
    use super::support::*;
    use crate::application::events::AuthEvent;
    use crate::application::{RegisterInput, RegisterWithSessionUseCase};
    use crate::domain::value_object::{user_role::UserRole, user_status::UserStatus};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_register_alice() {
        let h = Harness::new();

        let output = h.register("Alice", "alice@x.com").await.unwrap();
        let user = &output.user;

        assert_eq!(user.email.as_str(), "alice@x.com");
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, UserRole::User);
        assert!(user.last_login_at.is_none());
        assert!(user.created_by.is_none());

        let secret = user.totp_secret.as_base32();
        assert!(!secret.is_empty());
        assert!(!user.password_hash.as_phc_string().contains(secret));
        assert!(user.password_hash.as_phc_string().starts_with("$argon2id$"));
        assert_eq!(output.totp.secret.as_base32(), secret);
        assert!(output.totp.uri.starts_with("otpauth://totp/"));

        let stored = h.user(&user.id).await;
        assert_eq!(stored.email, user.email);

        assert!(matches!(
            h.recorder.events().as_slice(),
            [AuthEvent::UserRegistered { role: UserRole::User, .. }]
        ));
    }

    #[tokio::test]
    async fn test_register_normalizes_and_rejects_duplicate_email() {
        let h = Harness::new();
        h.register("Alice", "  Alice@X.com ").await.unwrap();

        let err = h.register("Alice Two", "alice@x.com").await.err().unwrap();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(h.repo.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let h = Harness::new();

        let err = h.register("Alice", "not-an-email").await.err().unwrap();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = h.register("   ", "blank@x.com").await.err().unwrap();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = h
            .register_use_case()
            .execute(RegisterInput {
                name: "Short".into(),
                email: "short@x.com".into(),
                password: "short".into(),
                phone: String::new(),
                role: None,
            })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(h.repo.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_public_register_refuses_elevated_roles() {
        let h = Harness::new();

        for role in ["admin", "super_admin"] {
            let err = h
                .register_use_case()
                .execute(RegisterInput {
                    name: "Mallory".into(),
                    email: "mallory@x.com".into(),
                    password: PASSWORD.into(),
                    phone: String::new(),
                    role: Some(role.into()),
                })
                .await
                .err()
                .unwrap();
            assert!(matches!(err, AuthError::InsufficientPrivilege));
        }
        assert_eq!(h.repo.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_with_session_issues_usable_tokens() {
        let h = Harness::new();
        let use_case = RegisterWithSessionUseCase::new(h.register_use_case(), h.sessions());

        let output = use_case
            .execute(RegisterInput {
                name: "Dana".into(),
                email: "dana@x.com".into(),
                password: PASSWORD.into(),
                phone: String::new(),
                role: None,
            })
            .await
            .unwrap();

        let claims = h.signer.verify(&output.tokens.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), output.user.id);
        assert_eq!(h.repo.refresh_token_count().await, 1);
    }
}

#[cfg(test)]
mod login_tests {
    use std::time::Duration;

    use super::support::*;
    use crate::application::{AuthConfig, LoginInput, ValidateTokenInput};
    use crate::domain::repository::UserRepository;
    use crate::domain::value_object::{user_role::UserRole, user_status::UserStatus};
    use crate::error::AuthError;
    use crate::infra::InMemoryAuthRepository;

    #[tokio::test]
    async fn test_wrong_then_correct_password() {
        let h = Harness::new();
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;

        let err = h.login("alice@x.com", "wrong-password").await.err().unwrap();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(h.user(&user.id).await.last_login_at.is_none());
        assert_eq!(h.repo.refresh_token_count().await, 0);

        let output = h.login("alice@x.com", PASSWORD).await.unwrap();
        assert_eq!(output.user.id, user.id);
        assert!(!output.tokens.access_token.is_empty());
        assert!(!output.tokens.refresh_token.is_empty());
        assert!(h.user(&user.id).await.last_login_at.is_some());
        assert_eq!(h.repo.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_email_looks_like_wrong_password() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();

        let unknown = h.login("nobody@x.com", PASSWORD).await.err().unwrap();
        let malformed = h.login("nobody", PASSWORD).await.err().unwrap();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(malformed, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_token_lifetimes() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();

        let tokens = h.login("alice@x.com", PASSWORD).await.unwrap().tokens;
        let claims = h.signer.verify(&tokens.access_token).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 3600);

        let refresh_ttl = tokens.refresh_token_expires_at - tokens.access_token_expires_at;
        assert!((refresh_ttl - chrono::Duration::days(6)).num_seconds().abs() <= 2);
    }

    #[tokio::test]
    async fn test_non_active_accounts_cannot_login() {
        let h = Harness::new();
        let admin = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;

        for status in [UserStatus::Suspended, UserStatus::Inactive] {
            let email = format!("{}@x.com", status.code());
            let user = h.register("Target", &email).await.unwrap().user;
            h.deactivate_use_case()
                .execute(crate::application::DeactivateUserInput {
                    user_id: user.id,
                    new_status: status,
                    reason: None,
                    updated_by: admin.id,
                })
                .await
                .unwrap();

            let err = h.login(&email, PASSWORD).await.err().unwrap();
            assert!(matches!(err, AuthError::AccountNotActive));
        }
    }

    #[tokio::test]
    async fn test_totp_required_by_deployment() {
        let config = AuthConfig {
            require_totp: true,
            ..AuthConfig::development()
        };
        let h = Harness::with_config(config);
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;

        let err = h.login("alice@x.com", PASSWORD).await.err().unwrap();
        assert!(matches!(err, AuthError::InvalidTotp));

        let bad = h
            .login_use_case()
            .execute(LoginInput {
                email: "alice@x.com".into(),
                password: PASSWORD.into(),
                totp_code: Some("000000".into()),
                expected_role: None,
            })
            .await;
        // One in a million chance of "000000" being the live code
        if let Err(err) = bad {
            assert!(matches!(err, AuthError::InvalidTotp));
        }

        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap();
        let code = user.totp_secret.code_at(now).unwrap();
        let output = h
            .login_use_case()
            .execute(LoginInput {
                email: "alice@x.com".into(),
                password: PASSWORD.into(),
                totp_code: Some(code),
                expected_role: None,
            })
            .await
            .unwrap();
        assert_eq!(output.user.id, user.id);
    }

    #[tokio::test]
    async fn test_password_checked_before_totp() {
        let config = AuthConfig {
            require_totp: true,
            ..AuthConfig::development()
        };
        let h = Harness::with_config(config);
        h.register("Alice", "alice@x.com").await.unwrap();

        let err = h.login("alice@x.com", "wrong-password").await.err().unwrap();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_expected_role() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();
        h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;

        let err = h
            .login_use_case()
            .execute(LoginInput {
                email: "alice@x.com".into(),
                password: PASSWORD.into(),
                totp_code: None,
                expected_role: Some(UserRole::Admin),
            })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InsufficientPrivilege));
        assert_eq!(h.repo.refresh_token_count().await, 0);

        let output = h
            .login_use_case()
            .execute(LoginInput {
                email: "root@x.com".into(),
                password: PASSWORD.into(),
                totp_code: None,
                expected_role: Some(UserRole::Admin),
            })
            .await
            .unwrap();
        assert_eq!(output.user.role, UserRole::SuperAdmin);
    }

    #[tokio::test]
    async fn test_elevated_surface_requires_totp_by_default() {
        let config = AuthConfig {
            require_totp_for_elevated: true,
            ..AuthConfig::development()
        };
        let h = Harness::with_config(config);
        h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;

        let err = h
            .login_use_case()
            .execute(LoginInput {
                email: "root@x.com".into(),
                password: PASSWORD.into(),
                totp_code: None,
                expected_role: Some(UserRole::Admin),
            })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InvalidTotp));

        // The general surface does not ask for it
        assert!(h.login("root@x.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_suspension_during_login_is_kept() {
        let h = Harness::with(
            InMemoryAuthRepository::with_latency(Duration::from_millis(60)),
            AuthConfig::development(),
        );
        let admin = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.seed("Alice", "alice@x.com", UserRole::User).await;
        let unthrottled = h.repo.without_latency();

        let login = h.login_use_case();
        let pending = tokio::spawn(async move {
            login
                .execute(LoginInput {
                    email: "alice@x.com".into(),
                    password: PASSWORD.into(),
                    totp_code: None,
                    expected_role: None,
                })
                .await
        });

        // Lands after the login has read the user, before it stamps the login
        tokio::time::sleep(Duration::from_millis(90)).await;
        unthrottled
            .set_status(&user.id, UserStatus::Suspended, &admin.id, chrono::Utc::now())
            .await
            .unwrap();

        let outcome = pending.await.unwrap();
        let stored = h.user(&user.id).await;
        assert_eq!(stored.status, UserStatus::Suspended);
        assert_eq!(stored.updated_by, Some(admin.id));

        if let Ok(output) = outcome {
            let err = h
                .validate_use_case()
                .execute(ValidateTokenInput {
                    access_token: output.tokens.access_token,
                    required_permissions: Vec::new(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::AccountNotActive));

            let err = h
                .refresh_use_case()
                .execute(output.tokens.refresh_token)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::AccountNotActive));
        }
    }

    #[tokio::test]
    async fn test_unknown_email_still_pays_for_a_hash() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();

        // Same outcome as a wrong password, store untouched
        let err = h.login("ghost@x.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.repo.refresh_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_slow_store_is_unavailable() {
        let config = AuthConfig {
            store_timeout: Duration::from_millis(20),
            ..AuthConfig::development()
        };
        let h = Harness::with(
            InMemoryAuthRepository::with_latency(Duration::from_millis(500)),
            config,
        );

        let err = h.login("alice@x.com", PASSWORD).await.err().unwrap();
        assert!(matches!(err, AuthError::Unavailable(_)));
        assert!(err.is_retryable());
    }
}

#[cfg(test)]
mod token_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::support::*;
    use crate::application::{DeactivateUserInput, UpdateUserRoleInput, ValidateTokenInput};
    use crate::domain::services::{SigningKey, TokenSigner};
    use crate::domain::value_object::{
        UserId, permission::Permission, user_role::UserRole, user_status::UserStatus,
    };
    use crate::error::AuthError;

    fn input(token: &str, required: &[Permission]) -> ValidateTokenInput {
        ValidateTokenInput {
            access_token: token.to_string(),
            required_permissions: required.iter().map(|p| p.code().to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_validation_is_idempotent() {
        let h = Harness::new();
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        let token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.access_token;

        let first = h
            .validate_use_case()
            .execute(input(&token, &[Permission::ProfileRead]))
            .await
            .unwrap();
        let second = h
            .validate_use_case()
            .execute(input(&token, &[Permission::ProfileRead]))
            .await
            .unwrap();

        assert_eq!(first.user.id, user.id);
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(first.permissions, second.permissions);
        assert_eq!(first.claims, second.claims);
        assert_eq!(
            first.permissions,
            vec![Permission::ProfileRead, Permission::ProfileUpdate]
        );
    }

    #[tokio::test]
    async fn test_suspension_revokes_live_token() {
        let h = Harness::new();
        let admin = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        let token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.access_token;

        h.deactivate_use_case()
            .execute(DeactivateUserInput {
                user_id: user.id,
                new_status: UserStatus::Suspended,
                reason: Some("chargeback".into()),
                updated_by: admin.id,
            })
            .await
            .unwrap();

        let err = h.validate_use_case().execute(input(&token, &[])).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotActive));
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();
        let token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.access_token;

        let err = h
            .validate_use_case()
            .execute(input(&token, &[Permission::ProfileRead, Permission::UserRead]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));

        let err = h
            .validate_use_case()
            .execute(ValidateTokenInput {
                access_token: token.clone(),
                required_permissions: vec!["reports:export".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn test_bad_token_is_reported_before_permissions() {
        let h = Harness::new();

        let err = h
            .validate_use_case()
            .execute(ValidateTokenInput {
                access_token: "garbage".into(),
                required_permissions: vec!["no:such".into(), "user:read".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_role_change_applies_to_existing_token() {
        let h = Harness::new();
        let admin = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        let token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.access_token;

        h.update_role_use_case()
            .execute(UpdateUserRoleInput {
                user_id: user.id,
                new_role: UserRole::Admin,
                updated_by: admin.id,
            })
            .await
            .unwrap();

        let output = h
            .validate_use_case()
            .execute(input(&token, &[Permission::UserRead]))
            .await
            .unwrap();
        assert_eq!(output.user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_foreign_and_orphan_tokens_are_invalid() {
        let h = Harness::new();

        let foreign = TokenSigner::new(
            SigningKey::from_secret("a-completely-different-signing-secret!!").unwrap(),
            h.config.jwt_issuer.clone(),
        );
        let token = foreign
            .issue(&UserId::new(), Duration::from_secs(60))
            .unwrap()
            .token;
        let err = h.validate_use_case().execute(input(&token, &[])).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        // Correct signature, but nobody behind the subject
        let orphan = h.signer.issue(&UserId::new(), Duration::from_secs(60)).unwrap().token;
        let err = h.validate_use_case().execute(input(&orphan, &[])).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let err = h.validate_use_case().execute(input("garbage", &[])).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_signers_are_isolated() {
        let a = Arc::new(TokenSigner::new(SigningKey::generate(), "susi-auth-service"));
        let b = Arc::new(TokenSigner::new(SigningKey::generate(), "susi-auth-service"));
        let token = a.issue(&UserId::new(), Duration::from_secs(60)).unwrap().token;
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}

#[cfg(test)]
mod refresh_tests {
    use std::sync::Arc;

    use super::support::*;
    use crate::application::{DeactivateUserInput, LogoutUseCase};
    use crate::domain::value_object::{user_role::UserRole, user_status::UserStatus};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let h = Harness::new();
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        let tokens = h.login("alice@x.com", PASSWORD).await.unwrap().tokens;

        let rotated = h
            .refresh_use_case()
            .execute(tokens.refresh_token.clone())
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, tokens.refresh_token);
        let claims = h.signer.verify(&rotated.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(h.repo.refresh_token_count().await, 1);

        // The old value is spent
        let err = h
            .refresh_use_case()
            .execute(tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));

        // The new value works
        assert!(h.refresh_use_case().execute(rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();
        let refresh_token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.refresh_token;

        let use_case = Arc::new(h.refresh_use_case());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let use_case = use_case.clone();
                let token = refresh_token.clone();
                tokio::spawn(async move { use_case.execute(token).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(matches!(err, AuthError::InvalidRefreshToken)),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(h.repo.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_ends_session() {
        let h = Harness::new();
        h.register("Alice", "alice@x.com").await.unwrap();
        let refresh_token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.refresh_token;

        let logout = LogoutUseCase::new(h.repo.clone(), h.config.clone());
        logout.execute(refresh_token.clone()).await;
        logout.execute(refresh_token.clone()).await;
        logout.execute("never-issued".into()).await;
        logout.execute(String::new()).await;
        assert_eq!(h.repo.refresh_token_count().await, 0);

        let err = h.refresh_use_case().execute(refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn test_empty_and_unknown_refresh_tokens() {
        let h = Harness::new();
        for token in ["", "   ", "not-a-real-token"] {
            let err = h.refresh_use_case().execute(token.into()).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidRefreshToken));
        }
    }

    #[tokio::test]
    async fn test_deactivation_ends_sessions() {
        let h = Harness::new();
        let admin = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        let refresh_token = h.login("alice@x.com", PASSWORD).await.unwrap().tokens.refresh_token;

        h.deactivate_use_case()
            .execute(DeactivateUserInput {
                user_id: user.id,
                new_status: UserStatus::Suspended,
                reason: None,
                updated_by: admin.id,
            })
            .await
            .unwrap();

        let err = h.refresh_use_case().execute(refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }
}

#[cfg(test)]
mod password_reset_tests {
    use chrono::{Duration, Utc};

    use super::support::*;
    use crate::application::events::AuthEvent;
    use crate::application::{ForgotPasswordUseCase, ResetPasswordInput, ResetPasswordUseCase};
    use crate::error::AuthError;
    use crate::infra::InMemoryAuthRepository;

    fn forgot(h: &Harness) -> ForgotPasswordUseCase<InMemoryAuthRepository, InMemoryAuthRepository> {
        ForgotPasswordUseCase::new(h.repo.clone(), h.repo.clone(), h.events(), h.config.clone())
    }

    fn reset(
        h: &Harness,
    ) -> ResetPasswordUseCase<InMemoryAuthRepository, InMemoryAuthRepository, InMemoryAuthRepository>
    {
        ResetPasswordUseCase::new(
            h.repo.clone(),
            h.repo.clone(),
            h.repo.clone(),
            h.events(),
            h.config.clone(),
        )
    }

    fn reset_input(token: &str, password: &str) -> ResetPasswordInput {
        ResetPasswordInput {
            token: token.to_string(),
            new_password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_email_is_reported() {
        let h = Harness::new();
        let err = forgot(&h).execute("ghost@x.com".into()).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailNotFound));
        assert_eq!(h.repo.reset_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_reset_flow() {
        let h = Harness::new();
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        h.login("alice@x.com", PASSWORD).await.unwrap();
        assert_eq!(h.repo.refresh_token_count().await, 1);

        let output = forgot(&h).execute("alice@x.com".into()).await.unwrap();
        let ttl = output.expires_at - Utc::now();
        assert!(ttl <= Duration::hours(1) && ttl > Duration::minutes(59));

        let token = h.reset_token_for(&user.id).unwrap();
        reset(&h)
            .execute(reset_input(&token, "new-password-456"))
            .await
            .unwrap();

        // Old sessions are gone, old password no longer works
        assert_eq!(h.repo.refresh_token_count().await, 0);
        let err = h.login("alice@x.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(h.login("alice@x.com", "new-password-456").await.is_ok());

        // Single use
        let err = reset(&h)
            .execute(reset_input(&token, "another-password-789"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredResetToken));

        assert!(
            h.recorder
                .events()
                .iter()
                .any(|e| matches!(e, AuthEvent::PasswordReset { user_id } if *user_id == user.id))
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let h = Harness::new();
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        forgot(&h).execute("alice@x.com".into()).await.unwrap();
        let token = h.reset_token_for(&user.id).unwrap();

        h.repo
            .update_reset_token(&user.id, |t| t.expires_at = Utc::now() - Duration::seconds(1))
            .await;

        let err = reset(&h)
            .execute(reset_input(&token, "new-password-456"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredResetToken));

        // Password unchanged
        assert!(h.login("alice@x.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_weak_password_keeps_token_usable() {
        let h = Harness::new();
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;
        forgot(&h).execute("alice@x.com".into()).await.unwrap();
        let token = h.reset_token_for(&user.id).unwrap();

        let err = reset(&h).execute(reset_input(&token, "short")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(h.repo.reset_token_count().await, 1);

        reset(&h)
            .execute(reset_input(&token, "long-enough-now"))
            .await
            .unwrap();
        assert_eq!(h.repo.reset_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_reset_token() {
        let h = Harness::new();
        let err = reset(&h)
            .execute(reset_input("made-up", "new-password-456"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredResetToken));
    }
}

#[cfg(test)]
mod admin_tests {
    use super::support::*;
    use crate::application::events::AuthEvent;
    use crate::application::{
        CreateAdminInput, CreateAdminUseCase, DeactivateUserInput, ListUsersUseCase,
        LookupUserUseCase, UpdateUserRoleInput, UserLookup,
    };
    use crate::domain::repository::ListUsersQuery;
    use crate::domain::value_object::{UserId, user_role::UserRole, user_status::UserStatus};
    use crate::error::AuthError;

    fn create_admin_input(creator_id: UserId, email: &str, role: UserRole) -> CreateAdminInput {
        CreateAdminInput {
            creator_id,
            name: "Ops".into(),
            email: email.into(),
            password: PASSWORD.into(),
            phone: String::new(),
            role,
        }
    }

    #[tokio::test]
    async fn test_non_super_admin_cannot_change_roles() {
        let h = Harness::new();
        let admin = h.seed("Ada", "ada@x.com", UserRole::Admin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;

        let err = h
            .update_role_use_case()
            .execute(UpdateUserRoleInput {
                user_id: user.id,
                new_role: UserRole::Admin,
                updated_by: admin.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsufficientPrivilege));
        assert_eq!(h.user(&user.id).await.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_super_admin_changes_role() {
        let h = Harness::new();
        let root = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;

        let updated = h
            .update_role_use_case()
            .execute(UpdateUserRoleInput {
                user_id: user.id,
                new_role: UserRole::SuperAdmin,
                updated_by: root.id,
            })
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::SuperAdmin);
        assert_eq!(updated.updated_by, Some(root.id));
        assert_eq!(h.user(&user.id).await.role, UserRole::SuperAdmin);

        assert!(h.recorder.events().iter().any(|e| matches!(
            e,
            AuthEvent::UserRoleChanged {
                old_role: UserRole::User,
                new_role: UserRole::SuperAdmin,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_unknown_target_is_not_found() {
        let h = Harness::new();
        let root = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;

        let err = h
            .update_role_use_case()
            .execute(UpdateUserRoleInput {
                user_id: UserId::new(),
                new_role: UserRole::Admin,
                updated_by: root.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_inactive_super_admin_cannot_act() {
        let h = Harness::new();
        let root = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;

        // Self-deactivation is allowed
        h.deactivate_use_case()
            .execute(DeactivateUserInput {
                user_id: root.id,
                new_status: UserStatus::Inactive,
                reason: Some("left the company".into()),
                updated_by: root.id,
            })
            .await
            .unwrap();

        let err = h
            .update_role_use_case()
            .execute(UpdateUserRoleInput {
                user_id: user.id,
                new_role: UserRole::Admin,
                updated_by: root.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsufficientPrivilege));
    }

    #[tokio::test]
    async fn test_super_admin_cannot_deactivate_another_super_admin() {
        let h = Harness::new();
        let root = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let other = h.seed("Other", "other@x.com", UserRole::SuperAdmin).await;

        let err = h
            .deactivate_use_case()
            .execute(DeactivateUserInput {
                user_id: other.id,
                new_status: UserStatus::Suspended,
                reason: None,
                updated_by: root.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsufficientPrivilege));
        assert_eq!(h.user(&other.id).await.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn test_deactivate_records_reason() {
        let h = Harness::new();
        let root = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let user = h.register("Alice", "alice@x.com").await.unwrap().user;

        let updated = h
            .deactivate_use_case()
            .execute(DeactivateUserInput {
                user_id: user.id,
                new_status: UserStatus::Suspended,
                reason: Some("  chargeback ".into()),
                updated_by: root.id,
            })
            .await
            .unwrap();
        assert_eq!(updated.status, UserStatus::Suspended);

        assert!(h.recorder.events().iter().any(|e| matches!(
            e,
            AuthEvent::UserStatusChanged {
                new_status: UserStatus::Suspended,
                reason: Some(reason),
                ..
            } if reason == "chargeback"
        )));

        // Reactivation restores login
        h.deactivate_use_case()
            .execute(DeactivateUserInput {
                user_id: user.id,
                new_status: UserStatus::Active,
                reason: None,
                updated_by: root.id,
            })
            .await
            .unwrap();
        assert!(h.login("alice@x.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_admin() {
        let h = Harness::new();
        let root = h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        let use_case = CreateAdminUseCase::new(h.repo.clone(), h.events(), h.config.clone());

        let (admin, totp) = use_case
            .execute(create_admin_input(root.id, "ops@x.com", UserRole::Admin))
            .await
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(admin.created_by, Some(root.id));
        assert!(!totp.secret.as_base32().is_empty());

        // Admins cannot create admins
        let err = use_case
            .execute(create_admin_input(admin.id, "ops2@x.com", UserRole::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InsufficientPrivilege));

        let err = use_case
            .execute(create_admin_input(root.id, "plain@x.com", UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = use_case
            .execute(create_admin_input(root.id, "ops@x.com", UserRole::SuperAdmin))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_list_users_filters_and_pages() {
        let h = Harness::new();
        h.seed("Root", "root@x.com", UserRole::SuperAdmin).await;
        for i in 0..12 {
            h.register(&format!("User {i}"), &format!("user{i}@x.com"))
                .await
                .unwrap();
        }
        let use_case = ListUsersUseCase::new(h.repo.clone(), h.config.clone());

        let all = use_case.execute(ListUsersQuery::default()).await.unwrap();
        assert_eq!(all.users.len(), 10);
        assert_eq!(all.pagination.total, 13);
        assert_eq!(all.pagination.total_pages, 2);
        assert!(
            all.users
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at)
        );

        let second = use_case
            .execute(ListUsersQuery::new(Some(2), Some(10), None, None))
            .await
            .unwrap();
        assert_eq!(second.users.len(), 3);

        let supers = use_case
            .execute(ListUsersQuery::new(None, None, Some(UserRole::SuperAdmin), None))
            .await
            .unwrap();
        assert_eq!(supers.pagination.total, 1);
        assert_eq!(supers.users[0].email.as_str(), "root@x.com");

        let suspended = use_case
            .execute(ListUsersQuery::new(None, None, None, Some(UserStatus::Suspended)))
            .await
            .unwrap();
        assert!(suspended.users.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_user() {
        let h = Harness::new();
        let user = h.register("Alice Example", "alice@x.com").await.unwrap().user;
        let use_case = LookupUserUseCase::new(h.repo.clone(), h.config.clone());

        let by_id = use_case.execute(UserLookup::Id(user.id)).await.unwrap();
        let by_email = use_case
            .execute(UserLookup::Email("ALICE@x.com".into()))
            .await
            .unwrap();
        let by_name = use_case
            .execute(UserLookup::Name("Alice Example".into()))
            .await
            .unwrap();
        assert_eq!(by_id.id, user.id);
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_name.id, user.id);

        let err = use_case
            .execute(UserLookup::Name("Nobody".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }
}
