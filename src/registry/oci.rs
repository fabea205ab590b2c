use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, WatchError};
use crate::registry::{DockerKeychain, ImageReference, Registry};

/// Upper bound on followed `Link` pages, guarding against a registry that
/// keeps pointing at the same page.
const MAX_PAGES: usize = 1000;

/// Body of `GET /v2/<name>/tags/list`.
#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Body of a token endpoint response.
///
/// Docker Hub and most registries answer with `token`, some (e.g. GHCR) with
/// `access_token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."`.
    ///
    /// Returns `None` for other schemes or when no realm is given.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for (key, value) in split_auth_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(BearerChallenge {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// Split comma separated `key="value"` pairs, honouring commas inside quotes
/// (scopes like `repository:a:pull,push` contain them).
fn split_auth_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = params.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_string();
        let after = rest[eq + 1..].trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (quoted[..end].to_string(), &quoted[end + 1..]),
                None => (quoted.to_string(), ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim().to_string(), &after[end..]),
                None => (after.trim().to_string(), ""),
            }
        };

        pairs.push((key, value));
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    pairs
}

/// Extract the target of a `Link: <url>; rel="next"` header, resolved against
/// `base` (`scheme://host`) when relative.
pub fn next_page_url(link: &str, base: &str) -> Option<String> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            let p = p.trim().replace(' ', "");
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.to_string())
        } else {
            Some(format!("{}{}", base, url))
        }
    })
}

/// OCI Distribution API client for listing repository tags.
///
/// A `401` bearer challenge is answered with a token fetched from the
/// challenge realm, authenticated with the registry's entry in the Docker
/// keychain when there is one and anonymously otherwise. A `401` basic
/// challenge is answered with the keychain credentials directly.
pub struct OciRegistry {
    agent: ureq::Agent,
    keychain: DockerKeychain,
}

impl OciRegistry {
    /// Create a client whose every request is bounded by `timeout`, using
    /// credentials from the default Docker config.
    pub fn new(timeout: Duration) -> Self {
        Self::with_keychain(timeout, DockerKeychain::load())
    }

    pub fn with_keychain(timeout: Duration, keychain: DockerKeychain) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("registry-watch/", env!("CARGO_PKG_VERSION")))
            .build();
        OciRegistry { agent, keychain }
    }

    fn get(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> std::result::Result<ureq::Response, ureq::Error> {
        let mut request = self.agent.get(url);
        if let Some(value) = authorization {
            request = request.set("Authorization", value);
        }
        request.call()
    }

    /// Fetch a pull token for `reference` as instructed by `challenge`.
    fn fetch_token(&self, challenge: &BearerChallenge, reference: &ImageReference) -> Result<String> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", reference.repository));

        let mut request = self.agent.get(&challenge.realm).query("scope", &scope);
        if let Some(service) = &challenge.service {
            request = request.query("service", service);
        }
        let credentials = self.keychain.resolve(&reference.registry);
        if let Some(credentials) = credentials {
            request = request.set("Authorization", &credentials.basic_header());
        }

        tracing::debug!(
            realm = %challenge.realm,
            %scope,
            authenticated = credentials.is_some(),
            "requesting registry token"
        );

        let body: TokenResponse = request
            .call()
            .map_err(|e| {
                WatchError::registry(format!("token request to {} failed: {}", challenge.realm, e))
            })?
            .into_json()
            .map_err(|e| {
                WatchError::registry(format!("invalid token response from {}: {}", challenge.realm, e))
            })?;

        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                WatchError::registry(format!("token response from {} has no token", challenge.realm))
            })
    }

    /// `Authorization` value answering the `WWW-Authenticate` challenge `header`.
    fn answer_challenge(&self, header: &str, reference: &ImageReference) -> Result<String> {
        if let Some(challenge) = BearerChallenge::parse(header) {
            let token = self.fetch_token(&challenge, reference)?;
            return Ok(format!("Bearer {}", token));
        }

        let is_basic = header
            .trim()
            .get(..5)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic"));
        match self.keychain.resolve(&reference.registry) {
            Some(credentials) if is_basic => Ok(credentials.basic_header()),
            _ => Err(WatchError::registry(format!(
                "{} requires authentication and no usable credentials were found",
                reference
            ))),
        }
    }

    /// Fetch one page, answering an authentication challenge at most once per run.
    fn fetch_page(
        &self,
        url: &str,
        reference: &ImageReference,
        authorization: &mut Option<String>,
    ) -> Result<ureq::Response> {
        match self.get(url, authorization.as_deref()) {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(401, response)) if authorization.is_none() => {
                let header = response.header("www-authenticate").unwrap_or_default();
                let value = self.answer_challenge(header, reference)?;
                let response = self
                    .get(url, Some(&value))
                    .map_err(|e| request_error(reference, e))?;
                *authorization = Some(value);
                Ok(response)
            }
            Err(e) => Err(request_error(reference, e)),
        }
    }
}

fn request_error(reference: &ImageReference, err: ureq::Error) -> WatchError {
    match err {
        ureq::Error::Status(code, _) => WatchError::registry(format!(
            "listing tags for {} returned HTTP {}",
            reference, code
        )),
        ureq::Error::Transport(transport) => WatchError::registry(format!(
            "listing tags for {} failed: {}",
            reference, transport
        )),
    }
}

impl Registry for OciRegistry {
    fn list_tags(&self, image: &str) -> Result<Vec<String>> {
        let reference = ImageReference::parse(image)?;
        let base = format!("{}://{}", reference.scheme(), reference.registry);

        let mut tags = Vec::new();
        let mut authorization = None;
        let mut next = Some(reference.tags_url());
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(WatchError::registry(format!(
                    "tag listing for {} exceeded {} pages",
                    reference, MAX_PAGES
                )));
            }

            tracing::debug!(%url, page = pages, "listing tags");
            let response = self.fetch_page(&url, &reference, &mut authorization)?;
            next = response
                .header("link")
                .and_then(|link| next_page_url(link, &base));

            let page: TagList = response.into_json().map_err(|e| {
                WatchError::registry(format!("invalid tag list for {}: {}", reference, e))
            })?;
            tags.extend(page.tags.unwrap_or_default());
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_docker_hub_challenge() {
        let header = r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/nginx:pull""#;
        let challenge = BearerChallenge::parse(header).unwrap();
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.docker.io"));
        assert_eq!(
            challenge.scope.as_deref(),
            Some("repository:library/nginx:pull")
        );
    }

    #[test]
    fn test_parse_challenge_with_comma_in_scope() {
        let header = r#"Bearer realm="https://ghcr.io/token", scope="repository:acme/api:pull,push", service="ghcr.io""#;
        let challenge = BearerChallenge::parse(header).unwrap();
        assert_eq!(
            challenge.scope.as_deref(),
            Some("repository:acme/api:pull,push")
        );
        assert_eq!(challenge.service.as_deref(), Some("ghcr.io"));
    }

    #[test]
    fn test_parse_challenge_without_optional_params() {
        let challenge = BearerChallenge::parse(r#"Bearer realm="https://r.example/token""#).unwrap();
        assert_eq!(challenge.service, None);
        assert_eq!(challenge.scope, None);
    }

    #[test]
    fn test_parse_non_bearer_challenge() {
        assert!(BearerChallenge::parse(r#"Basic realm="Registry""#).is_none());
        assert!(BearerChallenge::parse(r#"Bearer service="x""#).is_none());
        assert!(BearerChallenge::parse("").is_none());
    }

    #[test]
    fn test_next_page_relative_link() {
        let link = r#"</v2/acme/api/tags/list?last=v1.9.0&n=100>; rel="next""#;
        assert_eq!(
            next_page_url(link, "https://ghcr.io").as_deref(),
            Some("https://ghcr.io/v2/acme/api/tags/list?last=v1.9.0&n=100")
        );
    }

    #[test]
    fn test_next_page_absolute_link() {
        let link = r#"<https://mirror.example/v2/a/tags/list?last=b>; rel="next""#;
        assert_eq!(
            next_page_url(link, "https://ghcr.io").as_deref(),
            Some("https://mirror.example/v2/a/tags/list?last=b")
        );
    }

    #[test]
    fn test_next_page_ignores_other_relations() {
        assert_eq!(next_page_url(r#"</v2/a/tags/list>; rel="prev""#, "https://x"), None);
        assert_eq!(next_page_url("garbage", "https://x"), None);
    }

    fn ghcr_reference() -> ImageReference {
        ImageReference::parse("ghcr.io/acme/private").unwrap()
    }

    #[test]
    fn test_basic_challenge_uses_keychain_credentials() {
        let keychain =
            DockerKeychain::parse(r#"{"auths": {"ghcr.io": {"auth": "dXNlcjpwYXNz"}}}"#).unwrap();
        let registry = OciRegistry::with_keychain(Duration::from_secs(1), keychain);

        let value = registry
            .answer_challenge(r#"Basic realm="ghcr.io""#, &ghcr_reference())
            .unwrap();
        assert_eq!(value, "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_basic_challenge_without_credentials_fails() {
        let registry = OciRegistry::with_keychain(Duration::from_secs(1), DockerKeychain::default());

        let err = registry
            .answer_challenge(r#"Basic realm="ghcr.io""#, &ghcr_reference())
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("no usable credentials"));

        assert!(registry.answer_challenge("", &ghcr_reference()).is_err());
    }

    #[test]
    fn test_list_tags_rejects_invalid_reference_before_any_request() {
        let registry = OciRegistry::with_keychain(Duration::from_secs(1), DockerKeychain::default());
        let err = registry.list_tags("").unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_tag_list_tolerates_null_tags() {
        let page: TagList = serde_json::from_str(r#"{"name":"acme/api","tags":null}"#).unwrap();
        assert!(page.tags.is_none());
    }
}
