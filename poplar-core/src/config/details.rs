//! Connection details as declared in the configuration file.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use url::Url;

/// Host used when a configuration entry does not name one.
pub const DEFAULT_HOST: &str = "localhost";

/// One entry of the configuration file.
///
/// When `url` is present it is the only source of truth: [`parse_url`]
/// overwrites every other field from it.
///
/// [`parse_url`]: ConnectionDetails::parse_url
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionDetails {
    /// Engine tag, e.g. `postgres` or `mysql`.
    pub dialect: String,
    /// Database name.
    pub database: String,
    /// Host name.
    pub host: String,
    /// Port, if declared.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    /// User name.
    pub user: String,
    /// Password, if any.
    pub password: Option<String>,
    /// Full connection URL.
    pub url: Option<String>,
}

impl ConnectionDetails {
    /// Create empty details for the given engine tag.
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            ..Default::default()
        }
    }

    /// Build details from a single connection URL.
    ///
    /// The engine tag is left empty; the dialect is inferred from the scheme
    /// when the details are turned into a connection.
    ///
    /// ```rust
    /// use poplar_core::config::ConnectionDetails;
    ///
    /// let details = ConnectionDetails::from_url("postgres://app:s3cret@db:6543/shop", 5432).unwrap();
    /// assert_eq!(details.host, "db");
    /// assert_eq!(details.port, Some(6543));
    /// assert_eq!(details.user, "app");
    /// assert_eq!(details.password.as_deref(), Some("s3cret"));
    /// assert_eq!(details.database, "shop");
    /// ```
    pub fn from_url(url: impl Into<String>, fallback_port: u16) -> Result<Self> {
        let mut details = Self {
            url: Some(url.into()),
            ..Default::default()
        };
        details.parse_url(fallback_port)?;
        Ok(details)
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the user.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the connection URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Populate the fields from `url`, if one is set.
    ///
    /// The scheme is ignored, the database is the path without its leading
    /// `/`, and the port falls back to `fallback_port` when the URL has none.
    /// Credentials are percent-decoded. Fields are replaced, not merged.
    pub fn parse_url(&mut self, fallback_port: u16) -> Result<()> {
        let Some(raw) = self.url.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(());
        };

        let parsed = Url::parse(raw).map_err(|source| Error::UrlParse {
            url: mask_url(raw),
            source,
        })?;

        self.database = percent_decode(parsed.path().trim_start_matches('/'));
        self.host = parsed.host_str().unwrap_or_default().to_string();
        self.port = Some(parsed.port().unwrap_or(fallback_port));
        self.user = percent_decode(parsed.username());
        self.password = parsed.password().map(percent_decode);
        Ok(())
    }

    /// The URL scheme, if a URL is set and has one.
    pub fn scheme(&self) -> Option<&str> {
        let url = self.url.as_deref()?;
        url.split_once("://").map(|(scheme, _)| scheme)
    }

    /// The declared port, or `default`.
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }

    /// The declared host, or `localhost`.
    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }
}

impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("dialect", &self.dialect)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("url", &self.url.as_deref().map(mask_url))
            .finish()
    }
}

/// Accept `port: 5432`, `port: "5432"` and `port: ""`.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u64),
        Text(String),
    }

    let port = match Option::<Port>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Port::Number(n)) => n,
        Some(Port::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid port {s:?}")))?
        }
    };

    u16::try_from(port)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("port {port} out of range")))
}

/// Replace the password in a URL with `***` for logging.
pub fn mask_url(url: &str) -> String {
    if let Ok(mut parsed) = Url::parse(url) {
        if parsed.password().is_some() {
            // Only fails for cannot-be-a-base URLs, which carry no password.
            let _ = parsed.set_password(Some("***"));
        }
        return parsed.to_string();
    }

    // Unparseable: blank out the whole userinfo.
    match (url.find("://"), url.rfind('@')) {
        (Some(start), Some(at)) if at > start => {
            format!("{}://***{}", &url[..start], &url[at..])
        }
        _ => url.to_string(),
    }
}

pub(crate) fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

pub(crate) fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
