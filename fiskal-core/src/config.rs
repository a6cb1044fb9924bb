//! Configuration and environment selection.
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;

/// Fiscalization service environment.
/// - Demo: the test service (`cistest.apis-it.hr`), used with FINA demo certificates.
/// - Production: the live service operated by the Tax Administration.
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use fiskal_core::config::Environment;
///
/// let env = Environment::from_str("demo")?;
/// assert_eq!(env.cert_issuer().as_str(), "OU=DEMO,O=FINA,C=HR");
/// # Ok::<(), fiskal_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Demo,
    Production,
}

/// Error returned when parsing an [`Environment`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("invalid environment: {input}")]
    Invalid { input: String },
}

impl FromStr for Environment {
    type Err = EnvironmentParseError;
    fn from_str(env: &str) -> Result<Environment, EnvironmentParseError> {
        match env.trim().to_ascii_lowercase().as_str() {
            "demo" | "test" => Ok(Environment::Demo),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(EnvironmentParseError::Invalid {
                input: env.to_string(),
            }),
        }
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Demo => "demo",
            Environment::Production => "production",
        }
    }

    pub fn endpoint_url(&self) -> &'static str {
        match self {
            Environment::Demo => "https://cistest.apis-it.hr:8449/FiskalizacijaServiceTest",
            Environment::Production => "https://cis.porezna-uprava.hr:8449/FiskalizacijaService",
        }
    }

    /// Issuer name written into the signature's `X509IssuerName`.
    pub fn cert_issuer(&self) -> CertIssuer {
        match self {
            Environment::Demo => CertIssuer("OU=DEMO,O=FINA,C=HR"),
            Environment::Production => CertIssuer("OU=RDC,O=FINA,C=HR"),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate issuer resolved from an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CertIssuer(&'static str);

impl CertIssuer {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVariable(&'static str),
    #[error(transparent)]
    Environment(#[from] EnvironmentParseError),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

pub const ENV_ENVIRONMENT: &str = "FISKAL_ENVIRONMENT";
pub const ENV_APP_CERTIFICATE: &str = "FISKAL_APP_CERTIFICATE";
pub const ENV_CERTIFICATE: &str = "FISKAL_CERTIFICATE";
pub const ENV_PRIVATE_KEY: &str = "FISKAL_PRIVATE_KEY";
pub const ENV_PASSWORD: &str = "FISKAL_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "FISKAL_TIMEOUT_SECS";
pub const ENV_CA_CERTIFICATE: &str = "FISKAL_CA_CERTIFICATE";
pub const ENV_ENDPOINT: &str = "FISKAL_ENDPOINT";

/// Where the signing certificate and key come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// PEM certificate plus a separate PEM private key.
    Pem {
        certificate: PathBuf,
        private_key: PathBuf,
    },
    /// Application certificate bundle (`.p12`/`.pfx`) holding both.
    Pkcs12 { path: PathBuf },
}

/// Immutable settings of a [`Fiscalizer`](crate::fiscalizer::Fiscalizer).
///
/// # Examples
/// ```rust
/// use std::time::Duration;
/// use fiskal_core::config::{Config, Environment};
///
/// let config = Config::new(Environment::Demo, "certs/fiskal.pem", "certs/fiskal.key")
///     .with_password("secret")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.endpoint_url(), Environment::Demo.endpoint_url());
/// ```
#[derive(Clone)]
pub struct Config {
    environment: Environment,
    credentials: Credentials,
    password: Option<String>,
    timeout: Duration,
    ca_certificate_path: Option<PathBuf>,
    endpoint: Option<String>,
}

impl Config {
    pub fn new(
        environment: Environment,
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self::with_credentials(
            environment,
            Credentials::Pem {
                certificate: certificate_path.into(),
                private_key: private_key_path.into(),
            },
        )
    }

    /// Signs with the application certificate FINA issues as one PKCS#12 file.
    ///
    /// # Examples
    /// ```rust
    /// use fiskal_core::config::{Config, Credentials, Environment};
    ///
    /// let config = Config::app_certificate(Environment::Demo, "certs/fiskal1.pfx", "12345678");
    /// assert!(matches!(config.credentials(), Credentials::Pkcs12 { .. }));
    /// assert_eq!(config.password(), Some("12345678"));
    /// ```
    pub fn app_certificate(
        environment: Environment,
        path: impl Into<PathBuf>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_credentials(environment, Credentials::Pkcs12 { path: path.into() })
            .with_password(password)
    }

    pub fn with_credentials(environment: Environment, credentials: Credentials) -> Self {
        Self {
            environment,
            credentials,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            ca_certificate_path: None,
            endpoint: None,
        }
    }

    /// Reads `FISKAL_*` variables. Either an application certificate bundle or
    /// both certificate and key paths are required; everything else falls back
    /// to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let environment = match read(ENV_ENVIRONMENT) {
            Some(value) => value.parse()?,
            None => Environment::Demo,
        };
        let credentials = match read(ENV_APP_CERTIFICATE) {
            Some(path) => Credentials::Pkcs12 { path: path.into() },
            None => Credentials::Pem {
                certificate: read(ENV_CERTIFICATE)
                    .ok_or(ConfigError::MissingVariable(ENV_CERTIFICATE))?
                    .into(),
                private_key: read(ENV_PRIVATE_KEY)
                    .ok_or(ConfigError::MissingVariable(ENV_PRIVATE_KEY))?
                    .into(),
            },
        };

        let mut config = Self::with_credentials(environment, credentials);
        config.password = read(ENV_PASSWORD);
        if let Some(value) = read(ENV_TIMEOUT_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: ENV_TIMEOUT_SECS,
                    value: value.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }
        config.ca_certificate_path = read(ENV_CA_CERTIFICATE).map(PathBuf::from);
        config.endpoint = read(ENV_ENDPOINT);
        Ok(config)
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra trust anchor for the service's TLS certificate.
    pub fn with_ca_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_certificate_path = Some(path.into());
        self
    }

    /// Overrides the environment's service URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn ca_certificate_path(&self) -> Option<&Path> {
        self.ca_certificate_path.as_deref()
    }

    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.environment.endpoint_url())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("credentials", &self.credentials)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("ca_certificate_path", &self.ca_certificate_path)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn environment_parses_aliases_and_rejects_unknown() {
        assert_eq!("DEMO".parse::<Environment>(), Ok(Environment::Demo));
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(
            "staging".parse::<Environment>(),
            Err(EnvironmentParseError::Invalid {
                input: "staging".into()
            })
        );
    }

    #[test]
    fn issuer_depends_only_on_environment() {
        assert_eq!(Environment::Demo.cert_issuer().as_str(), "OU=DEMO,O=FINA,C=HR");
        assert_eq!(
            Environment::Production.cert_issuer().as_str(),
            "OU=RDC,O=FINA,C=HR"
        );
        assert_ne!(Environment::Demo.endpoint_url(), Environment::Production.endpoint_url());
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = Config::from_lookup(lookup(&[
            (ENV_ENVIRONMENT, "production"),
            (ENV_CERTIFICATE, "cert.pem"),
            (ENV_PRIVATE_KEY, "key.pem"),
            (ENV_PASSWORD, "secret"),
            (ENV_TIMEOUT_SECS, "10"),
            (ENV_CA_CERTIFICATE, "ca.pem"),
            (ENV_ENDPOINT, "http://localhost:8080/fiskal"),
        ]))
        .expect("config");
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(
            config.credentials(),
            &Credentials::Pem {
                certificate: "cert.pem".into(),
                private_key: "key.pem".into(),
            }
        );
        assert_eq!(config.password(), Some("secret"));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.ca_certificate_path(), Some(Path::new("ca.pem")));
        assert_eq!(config.endpoint_url(), "http://localhost:8080/fiskal");
    }

    #[test]
    fn from_lookup_applies_defaults_and_requires_paths() {
        let config = Config::from_lookup(lookup(&[
            (ENV_CERTIFICATE, "cert.pem"),
            (ENV_PRIVATE_KEY, "key.pem"),
        ]))
        .expect("config");
        assert_eq!(config.environment(), Environment::Demo);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.endpoint_url(), Environment::Demo.endpoint_url());

        let err = Config::from_lookup(lookup(&[(ENV_CERTIFICATE, "cert.pem")]))
            .expect_err("missing key");
        assert!(matches!(err, ConfigError::MissingVariable(ENV_PRIVATE_KEY)));

        let err = Config::from_lookup(lookup(&[
            (ENV_CERTIFICATE, "cert.pem"),
            (ENV_PRIVATE_KEY, "key.pem"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]))
        .expect_err("bad timeout");
        assert!(matches!(err, ConfigError::InvalidValue { name: ENV_TIMEOUT_SECS, .. }));
    }

    #[test]
    fn app_certificate_replaces_certificate_and_key() {
        let config = Config::from_lookup(lookup(&[
            (ENV_APP_CERTIFICATE, "fiskal1.pfx"),
            (ENV_PASSWORD, "12345678"),
        ]))
        .expect("config");
        assert_eq!(
            config.credentials(),
            &Credentials::Pkcs12 {
                path: "fiskal1.pfx".into()
            }
        );
        assert_eq!(config.password(), Some("12345678"));
        assert_eq!(
            Config::app_certificate(Environment::Demo, "fiskal1.pfx", "12345678").credentials(),
            config.credentials()
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::new(Environment::Demo, "c", "k").with_password("hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }
}
