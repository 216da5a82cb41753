//! Read-only accessor over a parsed `OpenAPI` document.
//!
//! The `openapiv3` crate models `$ref`s as `ReferenceOr<T>` but does not resolve
//! them. This module resolves internal `#/components/...` references; loading the
//! document bytes and upgrading v2 documents to v3 shape are the caller's job.

use crate::error::{ConvertError, Result};
use openapiv3::{
    Info, OpenAPI, Operation, Parameter, PathItem, ReferenceOr, RequestBody, Response, Schema,
    SecurityScheme, Server,
};
use serde_json::Value;

/// Maximum `$ref` chain length followed before giving up on a reference.
const MAX_REF_DEPTH: usize = 16;

/// Read-only view over a parsed `OpenAPI` v3 document.
#[derive(Debug)]
pub struct ApiDocument {
    spec: OpenAPI,
}

impl ApiDocument {
    /// Parse an `OpenAPI` v3 document from bytes (JSON or YAML; JSON is a valid
    /// YAML subset, so `serde_yaml` alone is enough).
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Document`] if the bytes are not valid UTF-8, if
    /// the document is an unconverted v2 (`swagger: "2.0"`) document, or if it
    /// does not deserialize as `OpenAPI` v3.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| ConvertError::Document(format!("document is not valid UTF-8: {e}")))?;

        let raw: Value = serde_yaml::from_str(text).map_err(|e| {
            ConvertError::Document(format!("failed to parse OpenAPI document: {e}"))
        })?;

        if raw.get("swagger").is_some() {
            return Err(ConvertError::Document(
                "OpenAPI v2 (swagger) documents are not supported; upgrade the document to v3 \
                 before conversion"
                    .to_string(),
            ));
        }

        let spec: OpenAPI = serde_json::from_value(raw).map_err(|e| {
            ConvertError::Document(format!("failed to parse OpenAPI document: {e}"))
        })?;

        Ok(Self { spec })
    }

    /// Wrap an already-parsed spec.
    #[must_use]
    pub fn from_spec(spec: OpenAPI) -> Self {
        Self { spec }
    }

    #[must_use]
    pub fn info(&self) -> &Info {
        &self.spec.info
    }

    #[must_use]
    pub fn servers(&self) -> &[Server] {
        &self.spec.servers
    }

    /// The server to use when the caller does not pick one. Only a document
    /// declaring exactly one server has an unambiguous default; with several
    /// declared the caller must choose.
    #[must_use]
    pub fn default_server(&self) -> Option<&Server> {
        match self.spec.servers.as_slice() {
            [server] => Some(server),
            _ => None,
        }
    }

    /// Paths sorted by key. Path iteration order is undefined in the source
    /// mapping; sorting keeps the generated tool list reproducible across runs.
    #[must_use]
    pub fn sorted_paths(&self) -> Vec<(&str, &PathItem)> {
        let mut paths: Vec<(&str, &PathItem)> = self
            .spec
            .paths
            .paths
            .iter()
            .filter_map(|(path, item)| match item {
                ReferenceOr::Item(item) => Some((path.as_str(), item)),
                ReferenceOr::Reference { reference } => {
                    // Path-item $refs have no internal components target in v3.0.
                    tracing::warn!("skipping path '{path}' with unresolvable $ref '{reference}'");
                    None
                }
            })
            .collect();
        paths.sort_by_key(|(path, _)| *path);
        paths
    }

    /// The operations of a path item, in a fixed method order.
    #[must_use]
    pub fn operations<'a>(path_item: &'a PathItem) -> Vec<(&'static str, &'a Operation)> {
        let methods = [
            ("get", &path_item.get),
            ("post", &path_item.post),
            ("put", &path_item.put),
            ("delete", &path_item.delete),
            ("options", &path_item.options),
            ("head", &path_item.head),
            ("patch", &path_item.patch),
            ("trace", &path_item.trace),
        ];
        methods
            .into_iter()
            .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
            .collect()
    }

    /// Look up a security scheme declared under `components.securitySchemes`.
    #[must_use]
    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        let components = self.spec.components.as_ref()?;
        match components.security_schemes.get(name)? {
            ReferenceOr::Item(scheme) => Some(scheme),
            ReferenceOr::Reference { .. } => None,
        }
    }

    /// Resolve a schema reference against `components.schemas`, following
    /// reference chains up to a fixed depth.
    #[must_use]
    pub fn resolve_schema<'a>(&'a self, schema: &'a ReferenceOr<Schema>) -> Option<&'a Schema> {
        match schema {
            ReferenceOr::Item(s) => Some(s),
            ReferenceOr::Reference { reference } => self.schema_by_ref(reference),
        }
    }

    /// Boxed variant of [`Self::resolve_schema`] (object properties and array
    /// items are stored boxed in the document model).
    #[must_use]
    pub fn resolve_boxed_schema<'a>(
        &'a self,
        schema: &'a ReferenceOr<Box<Schema>>,
    ) -> Option<&'a Schema> {
        match schema {
            ReferenceOr::Item(s) => Some(s),
            ReferenceOr::Reference { reference } => self.schema_by_ref(reference),
        }
    }

    fn schema_by_ref(&self, reference: &str) -> Option<&Schema> {
        let components = self.spec.components.as_ref()?;
        let mut name = reference.strip_prefix("#/components/schemas/")?;

        for _ in 0..MAX_REF_DEPTH {
            match components.schemas.get(name)? {
                ReferenceOr::Item(s) => return Some(s),
                ReferenceOr::Reference { reference } => {
                    name = reference.strip_prefix("#/components/schemas/")?;
                }
            }
        }
        None
    }

    /// Resolve a parameter reference against `components.parameters`.
    #[must_use]
    pub fn resolve_parameter<'a>(
        &'a self,
        param: &'a ReferenceOr<Parameter>,
    ) -> Option<&'a Parameter> {
        match param {
            ReferenceOr::Item(p) => Some(p),
            ReferenceOr::Reference { reference } => {
                let name = reference.strip_prefix("#/components/parameters/")?;
                match self.spec.components.as_ref()?.parameters.get(name)? {
                    ReferenceOr::Item(p) => Some(p),
                    ReferenceOr::Reference { .. } => None,
                }
            }
        }
    }

    /// Resolve a request-body reference against `components.requestBodies`.
    #[must_use]
    pub fn resolve_request_body<'a>(
        &'a self,
        body: &'a ReferenceOr<RequestBody>,
    ) -> Option<&'a RequestBody> {
        match body {
            ReferenceOr::Item(b) => Some(b),
            ReferenceOr::Reference { reference } => {
                let name = reference.strip_prefix("#/components/requestBodies/")?;
                match self.spec.components.as_ref()?.request_bodies.get(name)? {
                    ReferenceOr::Item(b) => Some(b),
                    ReferenceOr::Reference { .. } => None,
                }
            }
        }
    }

    /// Resolve a response reference against `components.responses`.
    #[must_use]
    pub fn resolve_response<'a>(
        &'a self,
        response: &'a ReferenceOr<Response>,
    ) -> Option<&'a Response> {
        match response {
            ReferenceOr::Item(r) => Some(r),
            ReferenceOr::Reference { reference } => {
                let name = reference.strip_prefix("#/components/responses/")?;
                match self.spec.components.as_ref()?.responses.get(name)? {
                    ReferenceOr::Item(r) => Some(r),
                    ReferenceOr::Reference { .. } => None,
                }
            }
        }
    }

    /// Tool name for an operation: the explicit `operationId` when present,
    /// otherwise `{method}_{path segments joined by '_'}` with braces stripped
    /// (the root path maps to the literal `root`).
    #[must_use]
    pub fn tool_name(path: &str, method: &str, operation: &Operation) -> String {
        if let Some(id) = &operation.operation_id
            && !id.is_empty()
        {
            return id.clone();
        }

        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let path_name = if segments.is_empty() {
            "root".to_string()
        } else {
            segments.join("_").replace(['{', '}'], "")
        };

        format!("{}_{path_name}", method.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_and_yaml() {
        let json = br#"{"openapi":"3.0.0","info":{"title":"t","version":"1"},"paths":{}}"#;
        let doc = ApiDocument::from_bytes(json).unwrap();
        assert_eq!(doc.info().title, "t");

        let yaml = b"openapi: \"3.0.0\"\ninfo:\n  title: t2\n  version: \"1\"\npaths: {}\n";
        let doc = ApiDocument::from_bytes(yaml).unwrap();
        assert_eq!(doc.info().title, "t2");
    }

    #[test]
    fn rejects_v2_documents() {
        let v2 = br#"{"swagger":"2.0","info":{"title":"t","version":"1"},"paths":{}}"#;
        let err = ApiDocument::from_bytes(v2).unwrap_err();
        assert!(err.to_string().contains("v2"));
    }

    #[test]
    fn tool_name_from_operation_id() {
        let op = Operation {
            operation_id: Some("listPets".to_string()),
            ..Operation::default()
        };
        assert_eq!(ApiDocument::tool_name("/pets", "get", &op), "listPets");
    }

    #[test]
    fn tool_name_from_method_and_path() {
        let op = Operation::default();
        assert_eq!(
            ApiDocument::tool_name("/pets/{id}", "GET", &op),
            "get_pets_id"
        );
        assert_eq!(
            ApiDocument::tool_name("/store/order", "post", &op),
            "post_store_order"
        );
        assert_eq!(ApiDocument::tool_name("/", "get", &op), "get_root");
    }

    #[test]
    fn default_server_needs_exactly_one_declared() {
        let none = b"openapi: \"3.0.0\"\ninfo:\n  title: t\n  version: \"1\"\npaths: {}\n";
        let doc = ApiDocument::from_bytes(none).unwrap();
        assert!(doc.default_server().is_none());

        let one = b"openapi: \"3.0.0\"\ninfo:\n  title: t\n  version: \"1\"\npaths: {}\n\
servers:\n  - url: http://a.example\n";
        let doc = ApiDocument::from_bytes(one).unwrap();
        assert_eq!(doc.default_server().unwrap().url, "http://a.example");

        let two = b"openapi: \"3.0.0\"\ninfo:\n  title: t\n  version: \"1\"\npaths: {}\n\
servers:\n  - url: http://a.example\n  - url: http://b.example\n";
        let doc = ApiDocument::from_bytes(two).unwrap();
        assert!(doc.default_server().is_none());
    }

    #[test]
    fn sorted_paths_are_deterministic() {
        let yaml = r#"
openapi: "3.0.0"
info:
  title: t
  version: "1"
paths:
  /zebras:
    get:
      responses:
        "200":
          description: ok
  /ants:
    get:
      responses:
        "200":
          description: ok
"#;
        let doc = ApiDocument::from_bytes(yaml.as_bytes()).unwrap();
        let paths: Vec<&str> = doc.sorted_paths().iter().map(|(p, _)| *p).collect();
        assert_eq!(paths, vec!["/ants", "/zebras"]);
    }
}
