#![allow(dead_code)]

use std::time::Duration;

use courier_auth::JwtVerifier;
use courier_messenger::messenger::{Messenger, MessengerConfig};
use courier_messenger::UserId;

pub const SECRET: &[u8] = b"integration-test-secret";

pub type TestMessenger = Messenger<mock_db::Db, JwtVerifier>;

/// Empty store holding only the shared fixture users and admin profile.
pub fn fixture_db() -> mock_db::Db {
    let db = mock_db::Db::empty();
    for user in db_tests::fixture_users() {
        db.insert_user(user).unwrap();
    }
    db.set_admin_profile(Some(db_tests::fixture_admin_profile())).unwrap();
    db
}

pub fn verifier() -> JwtVerifier {
    JwtVerifier::new(SECRET)
}

pub fn messenger(db: &mock_db::Db) -> TestMessenger {
    messenger_with(db, MessengerConfig::default())
}

pub fn messenger_with(db: &mock_db::Db, config: MessengerConfig) -> TestMessenger {
    Messenger::with_config(db.clone(), verifier(), config)
}

pub fn fast_timeout() -> MessengerConfig {
    MessengerConfig { io_timeout: Duration::from_millis(50), ..MessengerConfig::default() }
}

pub fn token_for(user_id: UserId) -> String {
    verifier().issue(user_id, None, None, chrono::Duration::hours(1)).unwrap()
}

pub fn expired_token_for(user_id: UserId) -> String {
    verifier().issue(user_id, None, None, chrono::Duration::hours(-1)).unwrap()
}
