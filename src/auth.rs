//! Credential providers for the rport API.
//!
//! rport accepts HTTP basic auth (login + password) or a bearer token.
//! [`FallbackAuth`] asks each provider in order and uses the first one that
//! yields credentials, so basic auth wins when both are configured.

use crate::config::{self, ParameterBag};

/// Credentials attached to every REST request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { login: String, password: String },
    Bearer(String),
}

impl Credentials {
    /// Attach these credentials to a request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Basic { login, password } => request.basic_auth(login, Some(password)),
            Credentials::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// Something that may be able to produce credentials.
pub trait CredentialProvider: Send + Sync {
    /// `None` means "not configured", letting the next provider try.
    fn provide(&self) -> Option<Credentials>;
}

/// Basic auth from a login/password pair.
pub struct BasicAuth {
    pub login: String,
    pub password: String,
}

impl CredentialProvider for BasicAuth {
    fn provide(&self) -> Option<Credentials> {
        if self.login.is_empty() {
            return None;
        }
        Some(Credentials::Basic {
            login: self.login.clone(),
            password: self.password.clone(),
        })
    }
}

/// Bearer token auth.
pub struct BearerAuth {
    pub token: String,
}

impl CredentialProvider for BearerAuth {
    fn provide(&self) -> Option<Credentials> {
        if self.token.is_empty() {
            None
        } else {
            Some(Credentials::Bearer(self.token.clone()))
        }
    }
}

/// Ordered chain of providers; the first non-empty answer wins.
#[derive(Default)]
pub struct FallbackAuth {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl FallbackAuth {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Basic auth from `login`/`password`, falling back to `token`.
    pub fn from_params(params: &ParameterBag) -> Self {
        Self::new(vec![
            Box::new(BasicAuth {
                login: params.read_string(config::LOGIN, ""),
                password: params.read_string(config::PASSWORD, ""),
            }),
            Box::new(BearerAuth {
                token: params.read_string(config::TOKEN, ""),
            }),
        ])
    }
}

impl CredentialProvider for FallbackAuth {
    fn provide(&self) -> Option<Credentials> {
        self.providers.iter().find_map(|p| p.provide())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_preferred() {
        let params = ParameterBag::from_values([
            (config::LOGIN, "admin"),
            (config::PASSWORD, "pw"),
            (config::TOKEN, "tok"),
        ]);
        assert_eq!(
            FallbackAuth::from_params(&params).provide(),
            Some(Credentials::Basic {
                login: "admin".into(),
                password: "pw".into()
            })
        );
    }

    #[test]
    fn falls_back_to_bearer() {
        let params = ParameterBag::from_values([(config::TOKEN, "tok")]);
        assert_eq!(
            FallbackAuth::from_params(&params).provide(),
            Some(Credentials::Bearer("tok".into()))
        );
    }

    #[test]
    fn nothing_configured() {
        let auth = FallbackAuth::from_params(&ParameterBag::default());
        assert_eq!(auth.provide(), None);
        assert_eq!(FallbackAuth::default().provide(), None);
    }
}
