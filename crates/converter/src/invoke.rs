//! HTTP execution of a converted tool.
//!
//! An [`Invoker`] is built once per tool and holds everything the call needs
//! besides the arguments: the method, the path template, the document's
//! default server, and the API key placements captured at conversion time.

use crate::args::{CallArgs, value_to_string};
use crate::error::{ConvertError, Result};
use crate::tool::{ApiKeyIn, ApiKeySpec, ToolDefinition};
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use url::Url;

/// Status and body of a completed call.
#[derive(Debug)]
pub struct InvokeOutcome {
    pub status: u16,
    pub body: String,
}

impl InvokeOutcome {
    /// The tool result text surfaced to the MCP client.
    #[must_use]
    pub fn to_text(&self) -> String {
        format!("status code: {}\nresponse body: {}", self.status, self.body)
    }
}

/// Executes one tool as an HTTP request.
#[derive(Clone, Debug)]
pub struct Invoker {
    client: reqwest::Client,
    method: String,
    path: String,
    default_server: Option<String>,
    api_keys: Vec<ApiKeySpec>,
}

impl Invoker {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        definition: &ToolDefinition,
        default_server: Option<String>,
    ) -> Self {
        Self {
            client,
            method: definition.method.clone(),
            path: definition.path.clone(),
            default_server,
            api_keys: definition.api_keys.clone(),
        }
    }

    /// Execute the call with a flat argument object.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Configuration`] when no server address is
    /// available, and [`ConvertError::Invocation`] for URL, request, or
    /// network failures. A non-2xx response is not an error; the status is
    /// part of the outcome.
    pub async fn invoke(&self, args: &Map<String, Value>) -> Result<InvokeOutcome> {
        let args = CallArgs::from_object(args);

        let server = args
            .server_addr
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.default_server.as_deref())
            .ok_or_else(|| {
                ConvertError::Configuration(
                    "no server address given and the document declares none".to_string(),
                )
            })?;

        // Substitute path parameters; unmatched placeholders are left in
        // place, which makes a missing argument visible in the request line.
        let mut path = self.path.clone();
        for (name, value) in &args.path {
            path = path.replace(&format!("{{{name}}}"), &value_to_string(value));
        }

        let mut url = join_url(server, &path)?;

        // query_pairs_mut leaves a trailing '?' even when nothing is
        // appended, so only touch the query when there is something to add.
        let query_api_keys: Vec<(&str, &str)> = self
            .api_keys
            .iter()
            .filter(|spec| spec.location == ApiKeyIn::Query)
            .filter_map(|spec| args.api_key(&spec.scheme).map(|v| (spec.name.as_str(), v)))
            .collect();
        if !args.query.is_empty() || !query_api_keys.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &args.query {
                pairs.append_pair(name, &value_to_string(value));
            }
            for (name, value) in query_api_keys {
                pairs.append_pair(name, value);
            }
        }

        let method = reqwest::Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|e| ConvertError::Invocation(format!("invalid HTTP method: {e}")))?;
        tracing::debug!(%method, %url, "invoking tool request");

        let mut request = self.client.request(method, url);

        // reqwest appends rather than replaces headers, so a caller-supplied
        // content type must yield to the one set alongside the payload below.
        let has_payload = !args.form_data.is_empty() || args.body.is_some();
        for (name, value) in &args.header {
            if has_payload && name.eq_ignore_ascii_case("content-type") {
                tracing::debug!(header = %name, "dropping caller content type in favor of the payload's");
                continue;
            }
            request = request.header(name.as_str(), value_to_string(value));
        }
        for spec in &self.api_keys {
            if spec.location == ApiKeyIn::Header
                && let Some(value) = args.api_key(&spec.scheme)
            {
                request = request.header(spec.name.as_str(), value);
            }
        }

        if let Some(token) = args.bearer_token() {
            request = request.bearer_auth(token);
        } else if let (Some(user), Some(pass)) =
            (args.auth_username.as_deref(), args.auth_password.as_deref())
            && !user.is_empty()
            && !pass.is_empty()
        {
            request = request.basic_auth(user, Some(pass));
        }

        // Form fields supersede a JSON body; both never travel together.
        if !args.form_data.is_empty() {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            for (name, value) in &args.form_data {
                form.append_pair(name, &value_to_string(value));
            }
            request = request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form.finish());
        } else if let Some(body) = &args.body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConvertError::Invocation(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ConvertError::Invocation(format!("failed to read response: {e}")))?;

        Ok(InvokeOutcome { status, body })
    }
}

impl CallArgs {
    fn api_key(&self, scheme: &str) -> Option<&str> {
        self.api_keys
            .iter()
            .find(|(name, _)| name == scheme)
            .map(|(_, value)| value.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Join a server address and a path the way a URL path join should work for
/// API bases: the base path is kept and the request path is appended to it.
fn join_url(server: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        server.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| ConvertError::Invocation(format!("invalid request URL '{joined}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ArgumentDescriptor;
    use axum::Router;
    use axum::extract::Request;
    use axum::routing::any;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn definition(method: &str, path: &str) -> ToolDefinition {
        ToolDefinition {
            name: "test_tool".to_string(),
            description: String::new(),
            method: method.to_string(),
            path: path.to_string(),
            arguments: Vec::<ArgumentDescriptor>::new(),
            api_keys: Vec::new(),
        }
    }

    /// Echo server returning the request line, headers, and body as JSON.
    async fn spawn_echo() -> (String, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        async fn echo(request: Request) -> axum::Json<Value> {
            let (parts, body) = request.into_parts();
            // Repeated headers are joined so a test can spot duplicates.
            let mut headers: Map<String, Value> = Map::new();
            for (k, v) in &parts.headers {
                let value = v.to_str().unwrap_or_default();
                match headers.get_mut(k.as_str()) {
                    Some(existing) => {
                        let joined = format!("{}, {value}", existing.as_str().unwrap_or_default());
                        *existing = json!(joined);
                    }
                    None => {
                        headers.insert(k.as_str().to_string(), json!(value));
                    }
                }
            }
            let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            axum::Json(json!({
                "method": parts.method.as_str(),
                "uri": parts.uri.to_string(),
                "headers": headers,
                "body": String::from_utf8_lossy(&bytes),
            }))
        }

        let app = Router::new()
            .route("/", any(echo))
            .route("/{*path}", any(echo));
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        (format!("http://{addr}"), tx)
    }

    async fn echo_invoke(
        method: &str,
        path: &str,
        api_keys: Vec<ApiKeySpec>,
        args: Value,
    ) -> Value {
        let (server, shutdown) = spawn_echo().await;
        let mut def = definition(method, path);
        def.api_keys = api_keys;
        let invoker = Invoker::new(reqwest::Client::new(), &def, Some(server));
        let outcome = invoker
            .invoke(args.as_object().unwrap())
            .await
            .unwrap();
        let _ = shutdown.send(());
        assert_eq!(outcome.status, 200);
        serde_json::from_str(&outcome.body).unwrap()
    }

    #[tokio::test]
    async fn substitutes_path_and_appends_query() {
        let echoed = echo_invoke(
            "get",
            "/pets/{petId}",
            Vec::new(),
            json!({"path|petId": 42, "query|verbose": true}),
        )
        .await;
        assert_eq!(echoed["method"], json!("GET"));
        assert_eq!(echoed["uri"], json!("/pets/42?verbose=true"));
    }

    #[tokio::test]
    async fn no_query_arguments_leave_the_url_bare() {
        let echoed = echo_invoke("get", "/pets", Vec::new(), json!({})).await;
        assert_eq!(echoed["uri"], json!("/pets"));
    }

    #[tokio::test]
    async fn unmatched_placeholder_stays_in_the_path() {
        let echoed = echo_invoke("get", "/pets/{petId}", Vec::new(), json!({})).await;
        assert_eq!(echoed["uri"], json!("/pets/%7BpetId%7D"));
    }

    #[tokio::test]
    async fn json_body_gets_content_type() {
        let echoed = echo_invoke(
            "post",
            "/pets",
            Vec::new(),
            json!({"body": {"name": "rex"}}),
        )
        .await;
        assert_eq!(echoed["headers"]["content-type"], json!("application/json"));
        assert_eq!(echoed["body"], json!(r#"{"name":"rex"}"#));
    }

    #[tokio::test]
    async fn form_data_supersedes_json_body() {
        let echoed = echo_invoke(
            "post",
            "/pets",
            Vec::new(),
            json!({"body": {"ignored": true}, "formData|name": "rex", "formData|meta": {"a": 1}}),
        )
        .await;
        assert_eq!(
            echoed["headers"]["content-type"],
            json!("application/x-www-form-urlencoded")
        );
        let body = echoed["body"].as_str().unwrap();
        assert!(body.contains("name=rex"), "{body}");
        // Structured form values are sent as compact JSON.
        assert!(body.contains("meta=%7B%22a%22%3A1%7D"), "{body}");
    }

    #[tokio::test]
    async fn payload_content_type_wins_over_a_caller_header() {
        let echoed = echo_invoke(
            "post",
            "/pets",
            Vec::new(),
            json!({"body": {"name": "rex"}, "header|Content-Type": "text/plain"}),
        )
        .await;
        assert_eq!(echoed["headers"]["content-type"], json!("application/json"));
    }

    #[tokio::test]
    async fn bearer_token_wins_over_basic_auth() {
        let echoed = echo_invoke(
            "get",
            "/secure",
            Vec::new(),
            json!({
                "openapi|auth_token": "tok",
                "openapi|auth_username": "u",
                "openapi|auth_password": "p",
            }),
        )
        .await;
        assert_eq!(echoed["headers"]["authorization"], json!("Bearer tok"));
    }

    #[tokio::test]
    async fn basic_auth_applies_without_a_token() {
        let echoed = echo_invoke(
            "get",
            "/secure",
            Vec::new(),
            json!({"openapi|auth_username": "user", "openapi|auth_password": "pass"}),
        )
        .await;
        // base64("user:pass")
        assert_eq!(
            echoed["headers"]["authorization"],
            json!("Basic dXNlcjpwYXNz")
        );
    }

    #[tokio::test]
    async fn oauth2_token_is_sent_as_bearer() {
        let echoed = echo_invoke(
            "get",
            "/secure",
            Vec::new(),
            json!({"openapi|auth_oauth2_token": "oauth-tok"}),
        )
        .await;
        assert_eq!(
            echoed["headers"]["authorization"],
            json!("Bearer oauth-tok")
        );
    }

    #[tokio::test]
    async fn api_keys_land_in_their_declared_location() {
        let echoed = echo_invoke(
            "get",
            "/secure",
            vec![
                ApiKeySpec {
                    scheme: "header_key".to_string(),
                    location: ApiKeyIn::Header,
                    name: "X-API-Key".to_string(),
                },
                ApiKeySpec {
                    scheme: "query_key".to_string(),
                    location: ApiKeyIn::Query,
                    name: "api_key".to_string(),
                },
            ],
            json!({
                "openapi|auth_header_key": "h-secret",
                "openapi|auth_query_key": "q-secret",
            }),
        )
        .await;
        assert_eq!(echoed["headers"]["x-api-key"], json!("h-secret"));
        assert_eq!(echoed["uri"], json!("/secure?api_key=q-secret"));
    }

    #[tokio::test]
    async fn custom_headers_are_forwarded() {
        let echoed = echo_invoke(
            "get",
            "/pets",
            Vec::new(),
            json!({"header|X-Trace-Id": "abc123"}),
        )
        .await;
        assert_eq!(echoed["headers"]["x-trace-id"], json!("abc123"));
    }

    #[tokio::test]
    async fn server_addr_argument_overrides_the_default() {
        let (server, shutdown) = spawn_echo().await;
        let def = definition("get", "/pets");
        let invoker = Invoker::new(
            reqwest::Client::new(),
            &def,
            Some("http://127.0.0.1:1/unreachable".to_string()),
        );
        let args = json!({"openapi|server_addr": server});
        let outcome = invoker.invoke(args.as_object().unwrap()).await.unwrap();
        let _ = shutdown.send(());
        assert_eq!(outcome.status, 200);
    }

    #[tokio::test]
    async fn missing_server_is_a_configuration_error() {
        let def = definition("get", "/pets");
        let invoker = Invoker::new(reqwest::Client::new(), &def, None);
        let err = invoker.invoke(&Map::new()).await.unwrap_err();
        assert!(matches!(err, ConvertError::Configuration(_)));
    }

    #[test]
    fn join_url_keeps_the_base_path() {
        let url = join_url("http://api.example/v1", "/pets").unwrap();
        assert_eq!(url.as_str(), "http://api.example/v1/pets");

        let url = join_url("http://api.example/v1/", "pets").unwrap();
        assert_eq!(url.as_str(), "http://api.example/v1/pets");
    }

    #[test]
    fn outcome_text_format() {
        let outcome = InvokeOutcome {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(
            outcome.to_text(),
            "status code: 404\nresponse body: not found"
        );
    }
}
