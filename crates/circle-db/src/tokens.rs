use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::debug;

use circle_types::models::Token;
use circle_types::now_millis;

use crate::adapter::Kind;
use crate::error::{Error, Result};
use crate::store::Store;

fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

impl Store {
    /// Issue a fresh session token, replacing any previous one. The returned
    /// secret is never stored.
    pub fn issue_token(&self, user_id: &str) -> Result<String> {
        let secret = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
        let token = Token {
            user_id: user_id.to_string(),
            digest: digest(&secret),
            expires: now_millis() + self.token_ttl_ms(),
        };
        self.save(Kind::Token, user_id, &token)?;
        debug!("Issued token for {}", user_id);
        Ok(secret)
    }

    /// Whether `secret` is the user's current, unexpired token. An expired
    /// token is dropped on sight.
    pub fn validate_token(&self, user_id: &str, secret: &str) -> Result<bool> {
        let Some(token) = self.load::<Token>(Kind::Token, user_id)? else {
            return Ok(false);
        };
        if token.expires <= now_millis() {
            self.documents().delete(Kind::Token, user_id)?;
            debug!("Token for {} expired", user_id);
            return Ok(false);
        }
        Ok(token.digest == digest(secret))
    }

    pub fn authorize(&self, user_id: &str, secret: &str) -> Result<()> {
        if !self.validate_token(user_id, secret)? {
            return Err(Error::unauthorized("token is invalid"));
        }
        Ok(())
    }

    pub fn revoke_token(&self, user_id: &str) -> Result<bool> {
        Ok(self.documents().delete(Kind::Token, user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn issued_token_validates_until_replaced() {
        let store = Store::in_memory();
        let first = store.issue_token("u").unwrap();
        assert!(store.validate_token("u", &first).unwrap());
        assert!(!store.validate_token("u", "guess").unwrap());
        assert!(!store.validate_token("other", &first).unwrap());

        let second = store.issue_token("u").unwrap();
        assert_ne!(first, second);
        assert!(!store.validate_token("u", &first).unwrap());
        assert!(store.authorize("u", &second).is_ok());
    }

    #[test]
    fn only_the_digest_is_stored() {
        let store = Store::in_memory();
        let secret = store.issue_token("u").unwrap();
        let stored = store.documents().get(Kind::Token, "u").unwrap().unwrap();
        assert!(!stored.to_string().contains(&secret));
    }

    #[test]
    fn expired_token_is_rejected_and_removed() {
        let store = Store::in_memory().with_token_ttl(Duration::ZERO);
        let secret = store.issue_token("u").unwrap();
        assert!(matches!(store.authorize("u", &secret), Err(Error::Unauthorized(_))));
        assert!(store.documents().get(Kind::Token, "u").unwrap().is_none());
    }

    #[test]
    fn revoke() {
        let store = Store::in_memory();
        let secret = store.issue_token("u").unwrap();
        assert!(store.revoke_token("u").unwrap());
        assert!(!store.validate_token("u", &secret).unwrap());
        assert!(!store.revoke_token("u").unwrap());
    }
}
