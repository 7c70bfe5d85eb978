use secrecy::SecretString;

/// Environment variable holding the engine access key
pub const ACCESS_KEY_VAR: &str = "MODEL_STUDIO_ACCESS_KEY";
/// Environment variable holding the engine secret key
pub const SECRET_KEY_VAR: &str = "MODEL_STUDIO_SECRET_KEY";

/// Access/secret key pair sent as basic auth
#[derive(Debug)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: SecretString,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: SecretString::from(secret_key.into()),
        }
    }

    /// Read both keys from the environment. Missing or empty keys mean no credentials.
    pub fn from_env() -> Option<Self> {
        let access_key = std::env::var(ACCESS_KEY_VAR).ok().filter(|k| !k.is_empty())?;
        let secret_key = std::env::var(SECRET_KEY_VAR).ok().filter(|k| !k.is_empty())?;
        Some(Self::new(access_key, secret_key))
    }
}

/// Configuration for talking to the remote engine
#[derive(Debug)]
pub struct ApiConfig {
    /// Engine root, e.g. `http://localhost:9090/Monolith`
    pub base_url: String,
    /// Insight to bind to; the engine creates one when absent
    pub insight_id: Option<String>,
    pub credentials: Option<Credentials>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let config = ApiConfig {
            base_url: "http://localhost:9090/Monolith".to_string(),
            insight_id: None,
            credentials: Some(Credentials::new("access", "top-secret")),
        };

        let printed = format!("{:?}", config);

        assert!(printed.contains("access"));
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("top-secret"));
    }
}
