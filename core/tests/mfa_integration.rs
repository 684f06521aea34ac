//! End-to-end multi-factor step-up tests: an unverified chain, a passing
//! verifier, and the re-derived access token.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use am_core::domain::events::testing::RecordingEventPublisher;
use am_core::domain::value_objects::platform::{Platform, PlatformKind};
use am_core::errors::{DomainError, OtpError};
use am_core::jwt::{TokenCodec, TokenKind, ValidationOptions};
use am_core::repositories::{
    MockOtpDeviceRepository, MockRefreshTokenRepository, MockSessionRepository,
};
use am_core::services::{MfaService, SessionService, METHOD_AUTHENTICATOR, METHOD_EMAIL};
use am_shared::config::{MfaConfig, TokenConfig};

struct Harness {
    sessions: SessionService<
        MockSessionRepository,
        MockRefreshTokenRepository,
        RecordingEventPublisher,
    >,
    mfa: MfaService<MockRefreshTokenRepository, RecordingEventPublisher>,
    codec: Arc<TokenCodec>,
    mfa_config: MfaConfig,
}

fn harness() -> Harness {
    let token_config = TokenConfig::new("integration-test-signing-key");
    let mut mfa_config = MfaConfig::default();
    mfa_config.email_otp.hash_cost = 4;
    mfa_config.mobile_otp.hash_cost = 4;
    mfa_config.security_code.hash_cost = 4;

    let codec = Arc::new(TokenCodec::from_config(&token_config).unwrap());
    let refresh_tokens = Arc::new(MockRefreshTokenRepository::new());
    let publisher = Arc::new(RecordingEventPublisher::new());

    let sessions = SessionService::new(
        Arc::new(MockSessionRepository::new()),
        Arc::clone(&refresh_tokens),
        Arc::clone(&publisher),
        Arc::clone(&codec),
        token_config.clone(),
    );
    let mfa = MfaService::new(
        Arc::new(MockOtpDeviceRepository::new()),
        Arc::new(MockOtpDeviceRepository::new()),
        Arc::new(MockOtpDeviceRepository::new()),
        Arc::new(MockOtpDeviceRepository::new()),
        Arc::new(MockOtpDeviceRepository::new()),
        refresh_tokens,
        publisher,
        mfa_config.clone(),
        &token_config,
    );

    Harness {
        sessions,
        mfa,
        codec,
        mfa_config,
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn platform() -> Platform {
    Platform::new("app-web", PlatformKind::Web)
}

/// Scenario B: return login starts unverified, a correct authenticator
/// code plus confirmation flips the chain, and a freshly derived access
/// token carries the multi-factor claims.
#[tokio::test]
async fn step_up_flow_with_authenticator() {
    let h = harness();
    let now = at(0);

    let (session, _) = h
        .sessions
        .login("user-1", &platform(), "device-1", now)
        .await
        .unwrap();
    let record = h
        .sessions
        .generate_refresh_token(&session, true, None, now)
        .await
        .unwrap();

    // The pre-step-up access token is unverified
    let pair = h.sessions.issue_tokens(&record, now).unwrap();
    let access = h
        .codec
        .parse(
            TokenKind::Access,
            &pair.access_token,
            &ValidationOptions::default(),
            now,
        )
        .unwrap();
    assert!(!access.multi_factor());

    // Enroll and verify a 6-digit code for the current 30-second window
    let device = h.mfa.setup_totp("user-1", now).await.unwrap();
    let code = device.code_at(at(30), &h.mfa_config.totp);
    assert_eq!(code.len(), 6);
    assert!(h.mfa.verify_totp("user-1", &code, at(30)).await.unwrap());

    h.mfa
        .confirm_session(record.id, METHOD_AUTHENTICATOR, at(30))
        .await
        .unwrap();

    // The next refresh-derived access token is verified
    let refreshed = h
        .sessions
        .refresh_access_token(&pair.refresh_token, at(31))
        .await
        .unwrap();
    let access = h
        .codec
        .parse(
            TokenKind::Access,
            &refreshed,
            &ValidationOptions::default(),
            at(31),
        )
        .unwrap();
    assert!(access.multi_factor());
    assert_eq!(access.multi_factor_ref(), Some(METHOD_AUTHENTICATOR));
    assert!(access.multi_factor_expires().is_some());
}

/// The email verifier drives the same confirmation path.
#[tokio::test]
async fn step_up_flow_with_email_pin() {
    let h = harness();
    let now = at(0);

    let (session, _) = h
        .sessions
        .login("user-2", &platform(), "device-1", now)
        .await
        .unwrap();
    let record = h
        .sessions
        .generate_refresh_token(&session, true, None, now)
        .await
        .unwrap();

    let pin = h
        .mfa
        .request_email_otp("user-2", "user@example.com", now)
        .await
        .unwrap();
    assert!(h.mfa.verify_email_otp("user-2", &pin, at(5)).await.unwrap());

    let updated = h
        .mfa
        .confirm_session(record.id, METHOD_EMAIL, at(5))
        .await
        .unwrap();
    assert!(updated.multi_factor_auth);

    let access = h.sessions.derive_access_token(&updated, None, at(6));
    assert!(access.multi_factor());
    assert_eq!(access.multi_factor_ref(), Some(METHOD_EMAIL));
}

/// A wrong code never confirms anything and the throttle holds across the
/// service boundary.
#[tokio::test]
async fn failed_verification_keeps_chain_unverified() {
    let h = harness();
    let now = at(0);

    let (session, _) = h
        .sessions
        .login("user-3", &platform(), "device-1", now)
        .await
        .unwrap();
    let record = h
        .sessions
        .generate_refresh_token(&session, true, None, now)
        .await
        .unwrap();

    h.mfa.setup_totp("user-3", now).await.unwrap();
    assert!(!h.mfa.verify_totp("user-3", "000000", at(30)).await.unwrap());

    // Immediate retry is throttled
    let err = h
        .mfa
        .verify_totp("user-3", "000000", at(30))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Otp(OtpError::Throttled { .. })));

    // The chain never saw a confirmation
    let access = h.sessions.derive_access_token(&record, None, at(31));
    assert!(!access.multi_factor());
}

/// Backup codes work as a fallback verifier for the same chain.
#[tokio::test]
async fn backup_code_confirms_chain_once() {
    let h = harness();
    let now = at(0);

    let (session, _) = h
        .sessions
        .login("user-4", &platform(), "device-1", now)
        .await
        .unwrap();
    let record = h
        .sessions
        .generate_refresh_token(&session, true, None, now)
        .await
        .unwrap();

    let codes = h.mfa.generate_backup_codes("user-4", now).await.unwrap();
    assert!(h
        .mfa
        .verify_backup_code("user-4", &codes[3], at(10))
        .await
        .unwrap());
    let updated = h
        .mfa
        .confirm_session(record.id, "backup_code", at(10))
        .await
        .unwrap();
    assert!(updated.multi_factor_auth);

    // The spent code cannot be replayed for a second confirmation
    assert!(!h
        .mfa
        .verify_backup_code("user-4", &codes[3], at(20))
        .await
        .unwrap());
}
