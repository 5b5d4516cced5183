//! Connection configuration
//!
//! Describes how to reach a live PostgreSQL instance. A fixture produces
//! one of these once its instance is up; the port is whatever the container
//! runtime mapped, so the value is only meaningful after provisioning.

use crate::error::{ConfigError, ConfigResult};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Characters escaped in the userinfo part of a URL
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host
    pub host: String,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    pub database: String,

    /// Username
    pub username: String,

    /// Password
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// SSL mode
    #[serde(default)]
    pub ssl_mode: SslMode,
}

/// SSL connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl SslMode {
    fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

fn default_port() -> u16 {
    5432
}

impl ConnectionConfig {
    /// Plain-text local endpoint, as exposed by a container
    pub fn local(port: u16, database: &str, username: &str, password: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
            database: database.to_string(),
            username: username.to_string(),
            password: Some(password.to_string()),
            ssl_mode: SslMode::Disable,
        }
    }

    /// Parse a postgres:// URL into a ConnectionConfig
    ///
    /// Credentials are optional and percent-decoded. A missing port means
    /// 5432; `sslmode` is read from the query string and defaults to
    /// `disable`.
    pub fn from_url(url: &str) -> ConfigResult<Self> {
        // postgres://[user[:pass]@]host[:port]/dbname[?sslmode=...]
        let url = url.trim();
        let rest = url
            .strip_prefix("postgres://")
            .or_else(|| url.strip_prefix("postgresql://"))
            .ok_or_else(|| ConfigError::Invalid("URL must start with postgres://".into()))?;

        let (creds, host_part) = match rest.rsplit_once('@') {
            Some((creds, host_part)) => (Some(creds), host_part),
            None => (None, rest),
        };

        let (username, password) = match creds {
            Some(creds) => match creds.split_once(':') {
                Some((u, p)) => (decode(u)?, Some(decode(p)?)),
                None => (decode(creds)?, None),
            },
            None => (String::new(), None),
        };

        let (host_port, database) = host_part
            .split_once('/')
            .ok_or_else(|| ConfigError::Invalid("URL must contain /dbname".into()))?;

        let (database, ssl_mode) = if let Some((db, query)) = database.split_once('?') {
            (decode(db)?, parse_sslmode_param(query)?)
        } else {
            (decode(database)?, SslMode::Disable)
        };

        if database.is_empty() {
            return Err(ConfigError::Invalid("URL must name a database".into()));
        }

        let (host, port) = split_host_port(host_port)?;

        if host.is_empty() {
            return Err(ConfigError::Invalid("URL must contain a host".into()));
        }

        Ok(Self {
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
        })
    }

    /// URL without credentials, suitable for a `datasource.url` property
    pub fn url(&self) -> String {
        let mut url = format!(
            "postgres://{}:{}/{}",
            url_host(&self.host),
            self.port,
            utf8_percent_encode(&self.database, USERINFO)
        );
        if self.ssl_mode != SslMode::Disable {
            url.push_str("?sslmode=");
            url.push_str(self.ssl_mode.as_str());
        }
        url
    }

    /// URL carrying percent-encoded credentials, for clients that take a
    /// single DSN
    pub fn url_with_credentials(&self) -> String {
        if self.username.is_empty() && self.password.is_none() {
            return self.url();
        }
        let mut userinfo = utf8_percent_encode(&self.username, USERINFO).to_string();
        if let Some(ref pw) = self.password {
            userinfo.push(':');
            userinfo.push_str(&utf8_percent_encode(pw, USERINFO).to_string());
        }
        let bare = self.url();
        let rest = bare.strip_prefix("postgres://").unwrap_or(&bare);
        format!("postgres://{}@{}", userinfo, rest)
    }

    /// Build a PostgreSQL connection string (without password)
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={}",
            quote_value(&self.host),
            self.port,
            quote_value(&self.database),
            quote_value(&self.username)
        )
    }

    /// Build a full connection string including password
    pub fn connection_string_with_password(&self) -> String {
        let with_ssl = format!(
            "{} sslmode={}",
            self.connection_string(),
            self.ssl_mode.as_str()
        );
        if let Some(ref pw) = self.password {
            format!("{} password={}", with_ssl, quote_value(pw))
        } else {
            with_ssl
        }
    }
}

fn decode(part: &str) -> ConfigResult<String> {
    percent_decode_str(part)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ConfigError::Invalid(format!("Invalid percent-encoding: {}", e)))
}

/// Quote a libpq key/value when it is empty or contains spaces, quotes or
/// backslashes
fn quote_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Parse the `sslmode` value from a URL query string
fn parse_sslmode_param(query: &str) -> ConfigResult<SslMode> {
    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("sslmode=") {
            return match value {
                "disable" => Ok(SslMode::Disable),
                "prefer" | "allow" => Ok(SslMode::Prefer),
                "require" => Ok(SslMode::Require),
                other => Err(ConfigError::Invalid(format!("Unsupported sslmode: {}", other))),
            };
        }
    }
    Ok(SslMode::Disable)
}

/// Host as it appears in a URL; IPv6 literals go in brackets
fn url_host(host: &str) -> Cow<'_, str> {
    if host.contains(':') && !host.starts_with('[') {
        Cow::Owned(format!("[{}]", host))
    } else {
        Cow::Borrowed(host)
    }
}

/// Split `host[:port]` or `[v6addr][:port]`
fn split_host_port(host_port: &str) -> ConfigResult<(String, u16)> {
    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| ConfigError::Invalid(format!("Unclosed '[' in host: {}", host_port)))?;
        match after {
            "" => (host, None),
            _ => match after.strip_prefix(':') {
                Some(p) => (host, Some(p)),
                None => {
                    return Err(ConfigError::Invalid(format!("Invalid host: {}", host_port)));
                }
            },
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (host_port, None),
        }
    };

    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid(format!("Invalid port: {}", p)))?,
        None => default_port(),
    };
    Ok((host.to_string(), port))
}
