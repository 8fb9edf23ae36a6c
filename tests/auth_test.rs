use receipt_calculator::{IdentityProvider, ReceiptError, SqliteIdentityProvider};

fn provider_with_account() -> SqliteIdentityProvider {
    let identity = SqliteIdentityProvider::open_in_memory().unwrap();
    identity
        .sign_up("Chemist@Plant.example", "s3cret-pass", Some("Chemist"))
        .unwrap();
    identity
}

#[test]
fn sign_up_returns_profile() {
    let identity = SqliteIdentityProvider::open_in_memory().unwrap();
    let profile = identity
        .sign_up(" lab@plant.example ", "longenough", None)
        .unwrap();

    assert_eq!(profile.email, "lab@plant.example");
    assert_eq!(profile.display_name, None);
    assert!(!profile.uid.is_empty());
    assert!(!profile.created_at.is_empty());
}

#[test]
fn sign_up_rejects_bad_input() {
    let identity = provider_with_account();

    assert!(matches!(
        identity.sign_up("nobody", "longenough", None),
        Err(ReceiptError::InvalidEmail(_))
    ));
    assert!(matches!(
        identity.sign_up("new@plant.example", "short", None),
        Err(ReceiptError::WeakPassword { min: 6 })
    ));
    assert!(matches!(
        identity.sign_up("chemist@plant.example", "another-pass", None),
        Err(ReceiptError::EmailInUse(_))
    ));
}

#[test]
fn sign_in_exposes_current_user_until_sign_out() {
    let identity = provider_with_account();

    let session = identity.sign_in("CHEMIST@plant.example", "s3cret-pass").unwrap();
    let profile = identity.current_user(&session).unwrap();
    assert_eq!(profile.email, "chemist@plant.example");
    assert_eq!(profile.display_name.as_deref(), Some("Chemist"));
    assert_eq!(profile.uid, session.uid);

    let stale = session.clone();
    identity.sign_out(session).unwrap();
    assert!(matches!(
        identity.current_user(&stale),
        Err(ReceiptError::InvalidSession)
    ));
    assert!(matches!(
        identity.sign_out(stale),
        Err(ReceiptError::InvalidSession)
    ));
}

#[test]
fn wrong_password_and_unknown_email_look_the_same() {
    let identity = provider_with_account();

    assert!(matches!(
        identity.sign_in("chemist@plant.example", "wrong-pass"),
        Err(ReceiptError::InvalidCredentials)
    ));
    assert!(matches!(
        identity.sign_in("ghost@plant.example", "s3cret-pass"),
        Err(ReceiptError::InvalidCredentials)
    ));
}

#[test]
fn sessions_are_independent() {
    let identity = provider_with_account();

    let first = identity.sign_in("chemist@plant.example", "s3cret-pass").unwrap();
    let second = identity.sign_in("chemist@plant.example", "s3cret-pass").unwrap();
    assert_ne!(first.token, second.token);

    identity.sign_out(first).unwrap();
    assert!(identity.current_user(&second).is_ok());
}
