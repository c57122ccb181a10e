//! API credentials and the OAuth2 PKCE handshake

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::application::services::ServiceTokens;
use crate::domain::entities::TwitterCredentials;

/// Shared token service name, as in `set api twitter ...`
pub const SERVICE: &str = "twitter";

pub fn not_authenticated(prefix: &str) -> String {
    format!(
        "The bot owner needs to set the Twitter API tokens first. See `{}tweetset creds` for instructions.",
        prefix
    )
}

pub fn not_authorized(prefix: &str) -> String {
    format!(
        "You need to authorize your Twitter account first with `{}twitter authorize`.",
        prefix
    )
}

/// Instructions shown by `tweetset creds`
pub fn creds_instructions(prefix: &str) -> String {
    format!(
        "1. Visit https://developer.twitter.com and apply for a developer account.\n\
         2. Once your account is approved create a Project.\n\
         3. Add an app to the project and copy the **Bearer Token**. \
         Optionally copy the **Client ID** and **Client Secret**.\n\
         4. Under User authentication settings enable OAuth 2.0 and set the redirect uri.\n\n\
         5. Do `{}set api twitter bearer_token YOUR_BEARER_TOKEN client_id YOUR_CLIENT_ID \
         client_secret YOUR_CLIENT_SECRET redirect_uri YOUR_REDIRECT_URI`\n",
        prefix
    )
}

/// App credentials from the shared `twitter` tokens; missing keys are empty or None
pub fn credentials_from(tokens: &ServiceTokens) -> TwitterCredentials {
    let optional = |key: &str| tokens.get(key).filter(|v| !v.is_empty()).cloned();
    TwitterCredentials {
        bearer_token: tokens.get("bearer_token").cloned().unwrap_or_default(),
        client_id: optional("client_id"),
        client_secret: optional("client_secret"),
        redirect_uri: optional("redirect_uri"),
    }
}

/// Verifier and state kept between the two halves of `twitter authorize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuth {
    pub verifier: String,
    pub state: String,
}

impl PendingAuth {
    pub fn new() -> Self {
        // 64 chars, inside the 43..=128 range PKCE allows
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self {
            verifier,
            state: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

impl Default for PendingAuth {
    fn default() -> Self {
        Self::new()
    }
}

/// Authorization code and state from a pasted code or redirect URL
pub fn extract_code(input: &str) -> Option<(String, Option<String>)> {
    let input = input.trim().trim_start_matches('<').trim_end_matches('>');
    if input.is_empty() {
        return None;
    }
    if !input.contains("code=") {
        return Some((input.to_string(), None));
    }
    let url = Url::parse(input).ok()?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    code.filter(|c| !c.is_empty()).map(|c| (c, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_skip_blank_optionals() {
        let mut tokens = ServiceTokens::new();
        tokens.insert("bearer_token".into(), "abc".into());
        tokens.insert("client_id".into(), "".into());
        tokens.insert("redirect_uri".into(), "https://127.0.0.1/".into());
        let creds = credentials_from(&tokens);
        assert_eq!(creds.bearer_token, "abc");
        assert!(creds.client_id.is_none());
        assert_eq!(creds.redirect_uri.as_deref(), Some("https://127.0.0.1/"));
        assert!(credentials_from(&ServiceTokens::new()).bearer_token.is_empty());
    }

    #[test]
    fn codes_come_from_urls_or_bare_text() {
        assert_eq!(extract_code(" abc123 "), Some(("abc123".into(), None)));
        assert_eq!(
            extract_code("<https://127.0.0.1/?state=s1&code=xyz>"),
            Some(("xyz".into(), Some("s1".into())))
        );
        assert_eq!(extract_code("https://127.0.0.1/?code="), None);
        assert_eq!(extract_code(""), None);
    }

    #[test]
    fn verifier_fits_pkce_bounds() {
        let pending = PendingAuth::new();
        assert!((43..=128).contains(&pending.verifier.len()));
        assert_ne!(pending.state, PendingAuth::new().state);
    }
}
