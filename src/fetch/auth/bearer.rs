use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::ClientError;

/// Sets `Authorization: Bearer <token>`, replacing any previous value.
///
/// The header is marked sensitive so it is redacted from `Debug` output.
pub fn attach(headers: &mut HeaderMap, token: &str) -> Result<(), ClientError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        ClientError::InvalidRequest("access token is not a valid header value".into())
    })?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}
