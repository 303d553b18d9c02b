//! Upstream credential resolution.
//!
//! Credentials are resolved once at startup from three sources, lowest
//! precedence first: the environment, the config file, explicit overrides
//! (command-line flags). Each field is resolved independently, so a key id
//! from the environment may pair with a secret from the command line.

use std::fmt;

use thiserror::Error;

use super::settings::CredentialSettings;

/// Environment variable holding the access key id.
pub const ACCESS_KEY_ID_ENV: &str = "TILEQUEUE_ACCESS_KEY_ID";

/// Environment variable holding the secret access key.
pub const SECRET_ACCESS_KEY_ENV: &str = "TILEQUEUE_SECRET_ACCESS_KEY";

/// A resolved key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

// Keeps the secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    /// Only one half of the key pair was supplied
    #[error("Incomplete credentials: {missing} is not set")]
    Incomplete { missing: &'static str },
}

impl Credentials {
    /// Resolves credentials from the process environment, `file` and
    /// `overrides`.
    ///
    /// Returns `Ok(None)` when no source supplies either value.
    pub fn resolve(
        file: &CredentialSettings,
        overrides: &CredentialSettings,
    ) -> Result<Option<Self>, CredentialsError> {
        Self::resolve_with(file, overrides, |name| std::env::var(name).ok())
    }

    /// Like [`Credentials::resolve`] with an explicit environment lookup.
    pub fn resolve_with<F>(
        file: &CredentialSettings,
        overrides: &CredentialSettings,
        env: F,
    ) -> Result<Option<Self>, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: &Option<String>, configured: &Option<String>, var: &str| {
            explicit
                .clone()
                .or_else(|| configured.clone())
                .or_else(|| env(var))
                .filter(|v| !v.trim().is_empty())
        };

        let access_key_id = pick(
            &overrides.access_key_id,
            &file.access_key_id,
            ACCESS_KEY_ID_ENV,
        );
        let secret_access_key = pick(
            &overrides.secret_access_key,
            &file.secret_access_key,
            SECRET_ACCESS_KEY_ENV,
        );

        match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Some(Self {
                access_key_id,
                secret_access_key,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CredentialsError::Incomplete {
                missing: "secret access key",
            }),
            (None, Some(_)) => Err(CredentialsError::Incomplete {
                missing: "access key id",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(id: Option<&str>, secret: Option<&str>) -> CredentialSettings {
        CredentialSettings {
            access_key_id: id.map(str::to_string),
            secret_access_key: secret.map(str::to_string),
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_none_when_nothing_configured() {
        let resolved =
            Credentials::resolve_with(&settings(None, None), &settings(None, None), env_of(&[]))
                .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_environment_used_as_fallback() {
        let env = env_of(&[(ACCESS_KEY_ID_ENV, "env-id"), (SECRET_ACCESS_KEY_ENV, "env-secret")]);
        let resolved = Credentials::resolve_with(&settings(None, None), &settings(None, None), env)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.access_key_id, "env-id");
        assert_eq!(resolved.secret_access_key, "env-secret");
    }

    #[test]
    fn test_explicit_overrides_environment_and_file() {
        let env = env_of(&[(ACCESS_KEY_ID_ENV, "env-id"), (SECRET_ACCESS_KEY_ENV, "env-secret")]);
        let file = settings(Some("file-id"), Some("file-secret"));
        let overrides = settings(None, Some("flag-secret"));

        let resolved = Credentials::resolve_with(&file, &overrides, env)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.access_key_id, "file-id");
        assert_eq!(resolved.secret_access_key, "flag-secret");
    }

    #[test]
    fn test_half_pair_is_an_error() {
        let err = Credentials::resolve_with(
            &settings(Some("id"), None),
            &settings(None, None),
            env_of(&[]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CredentialsError::Incomplete {
                missing: "secret access key"
            }
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials {
            access_key_id: "id".to_string(),
            secret_access_key: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
