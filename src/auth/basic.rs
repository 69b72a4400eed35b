//! HTTP Basic authentication (RFC 7617).

use crate::auth::challenge::AuthChallenge;
use crate::auth::credentials::Credentials;
use crate::auth::scheme::AuthScheme;
use crate::base::neterror::NetError;
use crate::http::request::ExecRequest;
use base64::{engine::general_purpose, Engine as _};
use http::HeaderValue;
use zeroize::Zeroizing;

/// Basic scheme: a single leg, complete as soon as it is challenged.
#[derive(Debug, Clone, Default)]
pub struct BasicScheme {
    realm: Option<String>,
    complete: bool,
}

impl BasicScheme {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthScheme for BasicScheme {
    fn name(&self) -> &str {
        "basic"
    }

    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), NetError> {
        self.realm = challenge.realm().map(str::to_string);
        self.complete = true;
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn is_connection_based(&self) -> bool {
        false
    }

    fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    fn authenticate(
        &mut self,
        credentials: &Credentials,
        _request: &ExecRequest,
    ) -> Result<HeaderValue, NetError> {
        let token = Zeroizing::new(format!("{}:{}", credentials.username(), credentials.password()));
        let mut encoded = Zeroizing::new(String::from("Basic "));
        general_purpose::STANDARD.encode_string(token.as_bytes(), &mut *encoded);
        let mut value = HeaderValue::from_str(&encoded).map_err(|e| NetError::Auth(e.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::requestbody::RequestBody;

    #[test]
    fn test_header_value() {
        let mut scheme = BasicScheme::new();
        scheme.process_challenge(&AuthChallenge::new("Basic").with_param("realm", "Realm")).unwrap();
        assert!(scheme.is_complete());
        assert_eq!(scheme.realm(), Some("Realm"));

        let request = ExecRequest::new(http::Request::new(RequestBody::Empty));
        let value = scheme.authenticate(&Credentials::new("user", "pass"), &request).unwrap();
        // base64("user:pass") = "dXNlcjpwYXNz"
        assert_eq!(value, "Basic dXNlcjpwYXNz");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_rfc7617_example() {
        let mut scheme = BasicScheme::new();
        scheme.process_challenge(&AuthChallenge::new("Basic")).unwrap();
        let request = ExecRequest::new(http::Request::new(RequestBody::Empty));
        let value = scheme.authenticate(&Credentials::new("Aladdin", "open sesame"), &request).unwrap();
        assert_eq!(value, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn test_fresh_scheme_incomplete() {
        assert!(!BasicScheme::new().is_complete());
    }
}
