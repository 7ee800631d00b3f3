//! OAuth 1.0a request signing (HMAC-SHA1, user context)
//!
//! Twitter's v2 write endpoints accept the same four credentials as the v1.1 API: the
//! application's consumer key and secret plus the user's access token and secret. Only
//! the `oauth_*` parameters and query parameters are signed; JSON bodies are not.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use crate::error::PlatformError;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

/// The four user-context credentials
pub struct OAuth1Signer {
    consumer_key: SecretString,
    consumer_secret: SecretString,
    token: SecretString,
    token_secret: SecretString,
}

impl OAuth1Signer {
    pub fn new(
        consumer_key: SecretString,
        consumer_secret: SecretString,
        token: SecretString,
        token_secret: SecretString,
    ) -> Self {
        Self {
            consumer_key,
            consumer_secret,
            token,
            token_secret,
        }
    }

    /// `Authorization` header value for a request without signed parameters
    pub fn authorization(&self, method: &str, url: &str) -> Result<String, PlatformError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_with(method, url, &nonce, &timestamp)
    }

    fn authorization_with(
        &self,
        method: &str,
        url: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, PlatformError> {
        let mut params = vec![
            ("oauth_consumer_key", self.consumer_key.expose_secret()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", SIGNATURE_METHOD),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.token.expose_secret()),
            ("oauth_version", VERSION),
        ];
        let signature = self.sign(method, url, &params)?;
        params.push(("oauth_signature", signature.as_str()));
        params.sort();

        let fields: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    /// Base64 HMAC-SHA1 of the signature base string
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String, PlatformError> {
        let key = format!(
            "{}&{}",
            encode(self.consumer_secret.expose_secret()),
            encode(self.token_secret.expose_secret())
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| PlatformError::Other(format!("Cannot sign request: {}", e)))?;
        mac.update(signature_base(method, url, params).as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// `METHOD&url&params` with parameters encoded, sorted and joined
fn signature_base(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();
    encoded.sort();

    let joined: Vec<String> = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&joined.join("&"))
    )
}

/// RFC 3986 percent-encoding: everything except `A-Za-z0-9-._~`
fn encode(text: &str) -> String {
    urlencoding::encode(text).into_owned()
}
