//! Steam sign-in over OpenID 2.0.
//!
//! Steam only acts as an identity provider: the relying party redirects the
//! browser to Steam with `checkid_setup`, Steam redirects back with a signed
//! assertion, and the relying party confirms it with a direct
//! `check_authentication` call instead of keeping association state.

use async_trait::async_trait;
use url::Url;

use crate::error::AppError;
use crate::steam::SteamClient;

const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";
const CLAIMED_ID_PREFIXES: [&str; 2] = [
    "https://steamcommunity.com/openid/id/",
    "http://steamcommunity.com/openid/id/",
];

#[derive(Debug, thiserror::Error)]
pub enum OpenIdError {
    #[error("assertion was not positive (mode: {0})")]
    NotPositive(String),

    #[error("return_to does not point at this site")]
    ReturnToMismatch,

    #[error("missing openid.claimed_id")]
    MissingClaimedId,

    #[error("claimed id is not a Steam id: {0}")]
    InvalidClaimedId(String),

    #[error("provider rejected the assertion")]
    Rejected,

    #[error(transparent)]
    Provider(#[from] AppError),
}

/// Build the `checkid_setup` redirect sending the browser to Steam.
///
/// # Errors
///
/// Returns `url::ParseError` if the configured provider URL is malformed.
pub fn login_url(provider: &str, realm: &str, return_to: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(provider)?;
    url.query_pairs_mut()
        .append_pair("openid.ns", OPENID_NS)
        .append_pair("openid.mode", "checkid_setup")
        .append_pair("openid.return_to", return_to)
        .append_pair("openid.realm", realm)
        .append_pair("openid.identity", IDENTIFIER_SELECT)
        .append_pair("openid.claimed_id", IDENTIFIER_SELECT);
    Ok(url)
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Extract the 64-bit Steam id from `openid.claimed_id`.
///
/// # Errors
///
/// Returns an error if the claim is missing or is not a Steam community id.
pub fn claimed_steam_id(params: &[(String, String)]) -> Result<u64, OpenIdError> {
    let claimed = param(params, "openid.claimed_id").ok_or(OpenIdError::MissingClaimedId)?;

    CLAIMED_ID_PREFIXES
        .iter()
        .find_map(|prefix| claimed.strip_prefix(prefix))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| OpenIdError::InvalidClaimedId(claimed.to_string()))
}

/// Check the local parts of an assertion: mode, return address and claim.
///
/// # Errors
///
/// Returns the first check that failed.
pub fn check_assertion(
    params: &[(String, String)],
    expected_return_to: &str,
) -> Result<u64, OpenIdError> {
    let mode = param(params, "openid.mode").unwrap_or_default();
    if mode != "id_res" {
        return Err(OpenIdError::NotPositive(mode.to_string()));
    }

    let return_to = param(params, "openid.return_to").unwrap_or_default();
    if !same_endpoint(return_to, expected_return_to) {
        return Err(OpenIdError::ReturnToMismatch);
    }

    claimed_steam_id(params)
}

/// `return_to` must be the callback itself; only its query may differ.
fn same_endpoint(return_to: &str, expected: &str) -> bool {
    match (Url::parse(return_to), Url::parse(expected)) {
        (Ok(mut got), Ok(want)) => {
            got.set_query(None);
            got.set_fragment(None);
            got == want
        }
        _ => false,
    }
}

/// Fully verify an assertion, including the round trip to Steam.
///
/// # Errors
///
/// Returns an error if any local check fails, the provider cannot be reached,
/// or the provider says the assertion is invalid.
pub async fn verify(
    client: &SteamClient,
    params: &[(String, String)],
    expected_return_to: &str,
) -> Result<u64, OpenIdError> {
    let steam_id = check_assertion(params, expected_return_to)?;

    if client.check_authentication(params).await? {
        Ok(steam_id)
    } else {
        Err(OpenIdError::Rejected)
    }
}

/// Confirms a Steam OpenID assertion and yields the 64-bit Steam id.
#[async_trait]
pub trait AssertionVerifier: Send + Sync {
    async fn verify(
        &self,
        params: &[(String, String)],
        expected_return_to: &str,
    ) -> Result<u64, OpenIdError>;
}

#[async_trait]
impl AssertionVerifier for SteamClient {
    async fn verify(
        &self,
        params: &[(String, String)],
        expected_return_to: &str,
    ) -> Result<u64, OpenIdError> {
        verify(self, params, expected_return_to).await
    }
}

/// Parse the key-value form body of a `check_authentication` response.
#[must_use]
pub fn is_valid_response(body: &str) -> bool {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .any(|(k, v)| k.trim() == "is_valid" && v.trim() == "true")
}
