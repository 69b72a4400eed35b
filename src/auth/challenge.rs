//! `WWW-Authenticate` / `Proxy-Authenticate` parsing.
//!
//! A header may carry several challenges separated by commas, each one
//! either a bare scheme, a scheme with a token68, or a scheme with
//! `name=value` parameters (values optionally quoted).

use crate::base::neterror::NetError;
use http::HeaderMap;
use http::HeaderName;
use std::collections::BTreeMap;

/// Challenges keyed by lower-cased scheme name; the first one of a
/// scheme wins.
pub type ChallengeMap = BTreeMap<String, AuthChallenge>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    scheme: String,
    token: Option<String>,
    params: Vec<(String, String)>,
}

impl AuthChallenge {
    pub fn new(scheme: &str) -> Self {
        Self { scheme: scheme.to_ascii_lowercase(), token: None, params: Vec::new() }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Lower-cased scheme name.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The token68 form, e.g. a Negotiate blob.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn realm(&self) -> Option<&str> {
        self.param("realm")
    }
}

/// Split on commas outside quoted strings.
fn split_elements(header: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in header.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(header[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(header[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn is_token68(s: &str) -> bool {
    let body = s.trim_end_matches('=');
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '/'))
}

fn unquote(value: &str) -> Result<String, NetError> {
    let Some(inner) = value.strip_prefix('"') else {
        return Ok(value.to_string());
    };
    let inner = inner
        .strip_suffix('"')
        .ok_or_else(|| NetError::MalformedChallenge(format!("unterminated quoted string: {}", value)))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Parse a single `name=value` or `name="value"` parameter.
fn parse_param(param: &str) -> Result<(String, String), NetError> {
    let (name, value) = param
        .split_once('=')
        .ok_or_else(|| NetError::MalformedChallenge(format!("expected name=value: {}", param)))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(NetError::MalformedChallenge(format!("bad parameter name: {}", param)));
    }
    Ok((name.to_ascii_lowercase(), unquote(value.trim())?))
}

/// Parse one header value into its challenges, in order.
pub fn parse_challenges(header: &str) -> Result<Vec<AuthChallenge>, NetError> {
    let mut challenges: Vec<AuthChallenge> = Vec::new();

    for element in split_elements(header) {
        let head = element.split(char::is_whitespace).next().unwrap_or_default();
        // `name = value` is a parameter even with whitespace around the `=`.
        let after_head = element[head.len()..].trim_start();
        let starts_challenge = !head.contains('=') && !after_head.starts_with('=');

        if starts_challenge {
            let mut challenge = AuthChallenge::new(head);
            let rest = element[head.len()..].trim();
            if !rest.is_empty() {
                if is_token68(rest) {
                    challenge.token = Some(rest.to_string());
                } else {
                    challenge.params.push(parse_param(rest)?);
                }
            }
            challenges.push(challenge);
        } else {
            let current = challenges.last_mut().ok_or_else(|| {
                NetError::MalformedChallenge(format!("parameter before scheme: {}", element))
            })?;
            if current.token.is_some() {
                return Err(NetError::MalformedChallenge(format!(
                    "parameter after token68: {}",
                    element
                )));
            }
            current.params.push(parse_param(element)?);
        }
    }
    Ok(challenges)
}

/// Collect every challenge under `name`, keyed by scheme.
pub fn parse_headers(headers: &HeaderMap, name: &HeaderName) -> Result<ChallengeMap, NetError> {
    let mut map = ChallengeMap::new();
    for value in headers.get_all(name) {
        let value = value
            .to_str()
            .map_err(|_| NetError::MalformedChallenge("non-ASCII challenge header".into()))?;
        for challenge in parse_challenges(value)? {
            map.entry(challenge.scheme.clone()).or_insert(challenge);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_realm() {
        let challenges = parse_challenges(r#"Basic realm="WallyWorld""#).unwrap();
        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].scheme(), "basic");
        assert_eq!(challenges[0].realm(), Some("WallyWorld"));
    }

    #[test]
    fn test_multiple_challenges_one_header() {
        let header = r#"Newauth realm="apps", type=1, title="Login to \"apps\"", Basic realm="simple""#;
        let challenges = parse_challenges(header).unwrap();
        assert_eq!(challenges.len(), 2);
        assert_eq!(challenges[0].scheme(), "newauth");
        assert_eq!(challenges[0].param("type"), Some("1"));
        assert_eq!(challenges[0].param("title"), Some(r#"Login to "apps""#));
        assert_eq!(challenges[1].realm(), Some("simple"));
    }

    #[test]
    fn test_token68_and_bare_scheme() {
        let challenges = parse_challenges("Negotiate YIIB+w==, NTLM").unwrap();
        assert_eq!(challenges[0].token(), Some("YIIB+w=="));
        assert_eq!(challenges[1].scheme(), "ntlm");
        assert!(challenges[1].params().is_empty());
    }

    #[test]
    fn test_quoted_comma() {
        let challenges = parse_challenges(r#"Digest realm="a, b", nonce="xyz""#).unwrap();
        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].realm(), Some("a, b"));
        assert_eq!(challenges[0].param("nonce"), Some("xyz"));
    }

    #[test]
    fn test_spaced_parameter_continues_challenge() {
        let challenges = parse_challenges(r#"Digest realm="api", nonce = "abc", qop= "auth""#).unwrap();
        assert_eq!(challenges.len(), 1);
        assert_eq!(challenges[0].scheme(), "digest");
        assert_eq!(challenges[0].param("nonce"), Some("abc"));
        assert_eq!(challenges[0].param("qop"), Some("auth"));

        let challenges = parse_challenges(r#"Basic realm = "files""#).unwrap();
        assert_eq!(challenges[0].realm(), Some("files"));
    }

    #[test]
    fn test_malformed() {
        assert!(parse_challenges(r#"realm="x""#).is_err());
        assert!(parse_challenges(r#"Basic realm="open"#).is_err());
    }

    #[test]
    fn test_headers_first_scheme_wins() {
        let mut headers = HeaderMap::new();
        headers.append("www-authenticate", r#"Basic realm="one""#.parse().unwrap());
        headers.append("www-authenticate", r#"BASIC realm="two""#.parse().unwrap());
        let map = parse_headers(&headers, &http::header::WWW_AUTHENTICATE).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["basic"].realm(), Some("one"));
    }
}
