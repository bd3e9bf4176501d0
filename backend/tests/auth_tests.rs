//! Account and session tests
//!
//! Sign-up rules, email verification, sign-in, refresh token rotation with
//! last-writer-wins, sign-out revocation and password reset.

mod common;

use chrono::{Duration, Utc};
use common::*;
use shared::{AccountEmailKind, Role};

use agristock::error::AppError;
use agristock::services::auth::{AuthService, EditDetailsInput, SignUpInput};
use agristock::store::{Change, Store};

const PASSWORD: &str = "pineapple-42";

fn farmer_signup(email: &str) -> SignUpInput {
    SignUpInput {
        first_name: Some("Ama".to_string()),
        last_name: Some("Owusu".to_string()),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        farm_name: Some("Owusu Farms".to_string()),
        farm_location: Some("Techiman".to_string()),
        tel_number: Some("0244123456".to_string()),
        role: Role::Farmer,
    }
}

/// Sign up and verify an account, returning its email
async fn verified_account(app: &TestApp, email: &str) -> String {
    let auth = AuthService::new(&app.state);
    auth.sign_up(farmer_signup(email)).await.unwrap();
    let token = app.mailer.last_token(email, AccountEmailKind::Verify).unwrap();
    auth.verify_email(&token).await.unwrap();
    email.to_string()
}

// ============================================================================
// Registration & verification
// ============================================================================

#[cfg(test)]
mod registration_tests {
    use super::*;

    #[tokio::test]
    async fn test_farmer_signup_requires_profile_fields() {
        let app = test_app();
        let err = AuthService::new(&app.state)
            .sign_up(SignUpInput {
                farm_name: None,
                ..farmer_signup("ama@example.com")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "farmName"));
    }

    #[tokio::test]
    async fn test_admin_signup_needs_only_credentials() {
        let app = test_app();
        let user = AuthService::new(&app.state)
            .sign_up(SignUpInput {
                first_name: None,
                last_name: None,
                email: "Warehouse@Example.com".to_string(),
                password: PASSWORD.to_string(),
                farm_name: None,
                farm_location: None,
                tel_number: None,
                role: Role::Admin,
            })
            .await
            .unwrap();
        assert_eq!(user.email, "warehouse@example.com");
        assert_eq!(user.role, Role::Admin);
        assert!(!user.email_verified);
    }

    #[tokio::test]
    async fn test_signup_rejects_short_password_and_duplicates() {
        let app = test_app();
        let auth = AuthService::new(&app.state);

        let err = auth
            .sign_up(SignUpInput {
                password: "short".to_string(),
                ..farmer_signup("ama@example.com")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        auth.sign_up(farmer_signup("ama@example.com")).await.unwrap();
        let err = auth.sign_up(farmer_signup("AMA@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_verification_link_and_sign_in_gate() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        auth.sign_up(farmer_signup("ama@example.com")).await.unwrap();

        let (_, kind, link) = app.mailer.account_emails.lock().unwrap()[0].clone();
        assert_eq!(kind, AccountEmailKind::Verify);
        assert!(link.starts_with("http://localhost:5173/verify/"));

        let err = auth.sign_in("ama@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let token = app.mailer.last_token("ama@example.com", AccountEmailKind::Verify).unwrap();
        let user = auth.verify_email(&token).await.unwrap();
        assert!(user.email_verified);

        // tokens are single use
        let err = auth.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let session = auth.sign_in("ama@example.com", PASSWORD).await.unwrap();
        assert!(session.tokens.refresh_token.is_some());
    }

    #[tokio::test]
    async fn test_expired_verification_token() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        auth.sign_up(farmer_signup("ama@example.com")).await.unwrap();
        let token = app.mailer.last_token("ama@example.com", AccountEmailKind::Verify).unwrap();

        let mut user = app
            .state
            .store
            .find_user_by_verify_token(&token)
            .await
            .unwrap()
            .unwrap();
        user.verify_token_expiry = Some(Utc::now() - Duration::minutes(1));
        app.state
            .store
            .commit(Change::UpdateUser(user).into())
            .await
            .unwrap();

        let err = auth.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        auth.resend_verification("ama@example.com").await.unwrap();
        let fresh = app.mailer.last_token("ama@example.com", AccountEmailKind::Verify).unwrap();
        assert_ne!(fresh, token);
        auth.verify_email(&fresh).await.unwrap();
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[cfg(test)]
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_errors() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let email = verified_account(&app, "ama@example.com").await;

        let err = auth.sign_in("nobody@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = auth.sign_in(&email, "wrong-password").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_refresh_rotation_is_last_writer_wins() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let email = verified_account(&app, "ama@example.com").await;

        let session = auth.sign_in(&email, PASSWORD).await.unwrap();
        let first = session.tokens.refresh_token.unwrap();

        let rotated = auth.refresh(&first).await.unwrap();
        let second = rotated.refresh_token.unwrap();
        assert_ne!(first, second);

        // the superseded token still earns an access token, without rotation
        let honoured = auth.refresh(&first).await.unwrap();
        assert!(honoured.refresh_token.is_none());
        let claims = auth.validate_access_token(&honoured.access_token).unwrap();
        assert_eq!(claims.email, email);

        let rotated = auth.refresh(&second).await.unwrap();
        assert!(rotated.refresh_token.is_some());
    }

    #[tokio::test]
    async fn test_sign_out_revokes_every_refresh_token() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let email = verified_account(&app, "ama@example.com").await;

        let first = auth.sign_in(&email, PASSWORD).await.unwrap().tokens.refresh_token.unwrap();
        let second = auth.refresh(&first).await.unwrap().refresh_token.unwrap();

        auth.sign_out(&second).await.unwrap();
        assert!(matches!(auth.refresh(&second).await.unwrap_err(), AppError::Unauthorized(_)));
        assert!(matches!(auth.refresh(&first).await.unwrap_err(), AppError::Unauthorized(_)));

        // a new sign-in starts a fresh chain
        let fresh = auth.sign_in(&email, PASSWORD).await.unwrap().tokens.refresh_token.unwrap();
        assert!(auth.refresh(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_racing_a_refresh_stays_revoked() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let email = verified_account(&app, "ama@example.com").await;
        let session = auth.sign_in(&email, PASSWORD).await.unwrap();
        let first = session.tokens.refresh_token.unwrap();

        // queue a refresh, then a sign-out, behind the user's lock
        let held = app.state.locks.lock(session.user.id).await;
        let refresh = {
            let auth = AuthService::new(&app.state);
            let token = first.clone();
            tokio::spawn(async move { auth.refresh(&token).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!refresh.is_finished());

        let sign_out = {
            let auth = AuthService::new(&app.state);
            let token = first.clone();
            tokio::spawn(async move { auth.sign_out(&token).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(held);

        let rotated = refresh.await.unwrap().unwrap();
        sign_out.await.unwrap().unwrap();

        let user = app.state.store.get_user(session.user.id).await.unwrap().unwrap();
        assert!(user.refresh_token_hash.is_none());
        assert!(user.tokens_revoked_at.is_some());

        let rotated = rotated.refresh_token.unwrap();
        assert!(matches!(auth.refresh(&rotated).await.unwrap_err(), AppError::Unauthorized(_)));
        assert!(matches!(auth.refresh(&first).await.unwrap_err(), AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage_and_access_tokens() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let email = verified_account(&app, "ama@example.com").await;
        let session = auth.sign_in(&email, PASSWORD).await.unwrap();

        assert!(matches!(auth.refresh("not-a-jwt").await.unwrap_err(), AppError::Unauthorized(_)));
        // signed with the access secret
        assert!(matches!(
            auth.refresh(&session.tokens.access_token).await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }
}

// ============================================================================
// Password reset & administration
// ============================================================================

#[cfg(test)]
mod account_tests {
    use super::*;

    #[tokio::test]
    async fn test_password_reset_flow() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let email = verified_account(&app, "ama@example.com").await;

        auth.forgot_password(&email, Some("https://shop.example.com/")).await.unwrap();
        let (_, _, link) = app.mailer.account_emails.lock().unwrap().last().cloned().unwrap();
        assert!(link.starts_with("https://shop.example.com/resetpwd/"));
        let token = app.mailer.last_token(&email, AccountEmailKind::Reset).unwrap();

        let err = auth.reset_password(&token, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        auth.reset_password(&token, "mango-and-lime-7").await.unwrap();
        assert!(auth.sign_in(&email, PASSWORD).await.is_err());
        assert!(auth.sign_in(&email, "mango-and-lime-7").await.is_ok());

        let err = auth.reset_password(&token, "another-secret-9").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_forgot_password_for_unknown_email() {
        let app = test_app();
        let err = AuthService::new(&app.state)
            .forgot_password("ghost@example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_admin_operations() {
        let app = test_app();
        let auth = AuthService::new(&app.state);
        let farmer = seed_farmer(&app.state).await;

        let user = auth
            .edit_details(
                farmer.id,
                EditDetailsInput {
                    farm_location: Some("Sunyani".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(user.farm_location.as_deref(), Some("Sunyani"));
        assert_eq!(user.farm_name, farmer.farm_name);

        let err = auth
            .edit_details(
                farmer.id,
                EditDetailsInput {
                    tel_number: Some("12ab".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        assert!(auth.admin_verify(farmer.id).await.unwrap().admin_verified);
        assert_eq!(auth.list_users().await.unwrap().len(), 1);

        auth.delete_user(farmer.id).await.unwrap();
        assert!(matches!(auth.profile(farmer.id).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(auth.delete_user(farmer.id).await.unwrap_err(), AppError::NotFound(_)));
    }
}
