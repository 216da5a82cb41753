//! The flat argument namespace shared by generated tools and the invoker.
//!
//! Every tool exposes a single flat bag of arguments. Location is encoded in
//! the key: `path|{name}`, `query|{name}`, `header|{name}`, `formData|{name}`,
//! a bare `body`, and the reserved `openapi|` namespace for the server address
//! and credentials. [`ArgKey`] is the typed form; the wire strings only appear
//! at the MCP boundary.

use serde_json::{Map, Value};

/// Typed identity of one tool argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgKey {
    /// A path template parameter.
    Path(String),
    /// A query-string parameter.
    Query(String),
    /// A request header.
    Header(String),
    /// A form field (`application/x-www-form-urlencoded` bodies).
    FormData(String),
    /// The request body.
    Body,
    /// Base URL override (`openapi|server_addr`).
    ServerAddr,
    /// Bearer token (`openapi|auth_token`).
    AuthToken,
    /// Basic-auth username (`openapi|auth_username`).
    AuthUsername,
    /// Basic-auth password (`openapi|auth_password`).
    AuthPassword,
    /// OAuth2 access token, sent as a bearer token (`openapi|auth_oauth2_token`).
    AuthOAuth2Token,
    /// API key for the named security scheme (`openapi|auth_{scheme}`).
    AuthApiKey(String),
}

impl ArgKey {
    /// The key string used in tool input schemas and call arguments.
    #[must_use]
    pub fn wire(&self) -> String {
        match self {
            ArgKey::Path(name) => format!("path|{name}"),
            ArgKey::Query(name) => format!("query|{name}"),
            ArgKey::Header(name) => format!("header|{name}"),
            ArgKey::FormData(name) => format!("formData|{name}"),
            ArgKey::Body => "body".to_string(),
            ArgKey::ServerAddr => "openapi|server_addr".to_string(),
            ArgKey::AuthToken => "openapi|auth_token".to_string(),
            ArgKey::AuthUsername => "openapi|auth_username".to_string(),
            ArgKey::AuthPassword => "openapi|auth_password".to_string(),
            ArgKey::AuthOAuth2Token => "openapi|auth_oauth2_token".to_string(),
            ArgKey::AuthApiKey(scheme) => format!("openapi|auth_{scheme}"),
        }
    }

    /// Parse a wire key back into its typed form. Returns `None` for keys
    /// outside the namespace, which the invoker ignores.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        if key == "body" {
            return Some(ArgKey::Body);
        }
        if let Some(name) = key.strip_prefix("path|") {
            return Some(ArgKey::Path(name.to_string()));
        }
        if let Some(name) = key.strip_prefix("query|") {
            return Some(ArgKey::Query(name.to_string()));
        }
        if let Some(name) = key.strip_prefix("header|") {
            return Some(ArgKey::Header(name.to_string()));
        }
        if let Some(name) = key.strip_prefix("formData|") {
            return Some(ArgKey::FormData(name.to_string()));
        }
        if let Some(rest) = key.strip_prefix("openapi|") {
            return Some(match rest {
                "server_addr" => ArgKey::ServerAddr,
                "auth_token" => ArgKey::AuthToken,
                "auth_username" => ArgKey::AuthUsername,
                "auth_password" => ArgKey::AuthPassword,
                "auth_oauth2_token" => ArgKey::AuthOAuth2Token,
                other => match other.strip_prefix("auth_") {
                    Some(scheme) => ArgKey::AuthApiKey(scheme.to_string()),
                    // Legacy clients sent bare tokens under ad-hoc subkeys.
                    None => ArgKey::AuthToken,
                },
            });
        }
        None
    }
}

/// Call arguments demultiplexed by location.
#[derive(Debug, Default)]
pub struct CallArgs {
    pub path: Vec<(String, Value)>,
    pub query: Vec<(String, Value)>,
    pub header: Vec<(String, Value)>,
    pub form_data: Vec<(String, Value)>,
    pub body: Option<Value>,
    pub server_addr: Option<String>,
    pub auth_token: Option<String>,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub auth_oauth2_token: Option<String>,
    /// API key values keyed by security scheme name.
    pub api_keys: Vec<(String, String)>,
}

impl CallArgs {
    /// Split a flat argument object into per-location buckets.
    #[must_use]
    pub fn from_object(args: &Map<String, Value>) -> Self {
        let mut out = Self::default();
        for (key, value) in args {
            let Some(key) = ArgKey::parse(key) else {
                tracing::debug!("ignoring argument outside the tool namespace: {key}");
                continue;
            };
            match key {
                ArgKey::Path(name) => out.path.push((name, value.clone())),
                ArgKey::Query(name) => out.query.push((name, value.clone())),
                ArgKey::Header(name) => out.header.push((name, value.clone())),
                ArgKey::FormData(name) => out.form_data.push((name, value.clone())),
                ArgKey::Body => out.body = Some(value.clone()),
                ArgKey::ServerAddr => out.server_addr = Some(value_to_string(value)),
                ArgKey::AuthToken => out.auth_token = Some(value_to_string(value)),
                ArgKey::AuthUsername => out.auth_username = Some(value_to_string(value)),
                ArgKey::AuthPassword => out.auth_password = Some(value_to_string(value)),
                ArgKey::AuthOAuth2Token => out.auth_oauth2_token = Some(value_to_string(value)),
                ArgKey::AuthApiKey(scheme) => out.api_keys.push((scheme, value_to_string(value))),
            }
        }
        out
    }

    /// The effective bearer token: an explicit token wins over an OAuth2 one.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .or(self.auth_oauth2_token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Render a JSON value the way it should appear in a URL, header, or form
/// field: strings verbatim, scalars via `Display`, null empty, and containers
/// as compact JSON.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
