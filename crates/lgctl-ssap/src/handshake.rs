//! The pairing handshake.
//!
//! Two paths over an already-open link:
//!
//! 1. **Fast path**: a stored client key exists and the stored handshake
//!    fingerprint matches the current registration template. Substitute the
//!    key into the template, send one register frame, save the (possibly
//!    refreshed) key the TV returns.
//! 2. **Full pairing**: no usable key. Send the template with the key
//!    placeholder blanked, which makes the TV show its permission prompt.
//!    The final `registered` frame carries the new key; both the key and the
//!    template fingerprint are stored.
//!
//! A TV that never answers (closed link, no matching frame) surfaces as
//! [`Error::Pairing`] rather than a generic transport failure, so callers
//! can tell the user to accept the on-screen prompt and try again.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::keystore::KeyStore;
use crate::link::Link;
use crate::protocol::{REGISTRATION_TEMPLATE, registration_payload};

/// How long to wait for the user to accept the prompt on first pairing.
pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(60);

/// Run the handshake on `link`, persisting pairing state in `store`.
/// Returns the client key in effect afterwards.
///
/// # Errors
///
/// [`Error::Pairing`] when the TV rejects or never answers the
/// registration; [`Error::Storage`] when persisting the key fails (a failed
/// save must not pass as a successful pairing).
pub async fn pair(link: &Link, store: &mut KeyStore, timeout: Duration) -> Result<String> {
    let stored_key = store.client_key().map(str::to_string);

    if let Some(key) = stored_key
        && store.has_valid_handshake(REGISTRATION_TEMPLATE)
    {
        debug!("registering with stored client key");
        let payload = registration_payload(Some(&key))?;
        let response = link.register(payload, timeout).await.map_err(as_pairing)?;
        let key = extract_client_key(&response.payload)?;
        store.save_client_key(&key)?;
        return Ok(key);
    }

    info!("no usable client key, starting full pairing (accept the prompt on the TV)");
    let payload = registration_payload(None)?;
    let response = link.register(payload, timeout).await.map_err(as_pairing)?;
    let key = extract_client_key(&response.payload)?;
    store.save_client_key(&key)?;
    store.save_handshake(REGISTRATION_TEMPLATE)?;
    Ok(key)
}

fn extract_client_key(payload: &Value) -> Result<String> {
    payload
        .get("client-key")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Pairing("registration response carried no client key".to_string()))
}

/// Registration failures are pairing failures; the distinction lets callers
/// explain a timed-out prompt instead of reporting a dead network.
fn as_pairing(e: Error) -> Error {
    match e {
        Error::Closed => Error::Pairing("link closed before registration completed".to_string()),
        Error::Timeout => {
            Error::Pairing("TV did not answer the registration request".to_string())
        }
        Error::Tv(msg) => Error::Pairing(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_key() {
        let payload = serde_json::json!({ "client-key": "abcdef" });
        assert_eq!(extract_client_key(&payload).unwrap(), "abcdef");
    }

    #[test]
    fn test_extract_client_key_missing_is_pairing_error() {
        let payload = serde_json::json!({ "returnValue": true });
        assert!(matches!(
            extract_client_key(&payload),
            Err(Error::Pairing(_))
        ));

        let payload = serde_json::json!({ "client-key": "" });
        assert!(matches!(
            extract_client_key(&payload),
            Err(Error::Pairing(_))
        ));
    }

    #[test]
    fn test_transport_failures_become_pairing_failures() {
        assert!(matches!(as_pairing(Error::Closed), Error::Pairing(_)));
        assert!(matches!(as_pairing(Error::Timeout), Error::Pairing(_)));
        assert!(matches!(
            as_pairing(Error::Tv("denied".to_string())),
            Error::Pairing(_)
        ));
        // Storage failures keep their identity.
        let storage = as_pairing(Error::Storage(std::io::Error::other("disk full")));
        assert!(matches!(storage, Error::Storage(_)));
    }
}
