//! Conversion of OpenAPI operations into MCP tool definitions.
//!
//! Each operation becomes one tool with a flat argument bag (see
//! [`crate::args`]). Conversion is fail-fast: one broken operation aborts the
//! whole document instead of silently producing a partial tool set.

use crate::args::{ArgKey, value_to_string};
use crate::document::ApiDocument;
use crate::error::{ConvertError, Result};
use crate::walker::{SchemaWalker, VisitedSet};
use openapiv3::{
    APIKeyLocation, MediaType, Operation, Parameter, ParameterData, ParameterSchemaOrContent,
    PathItem, ReferenceOr, RequestBody, Responses, SecurityRequirement, SecurityScheme,
};
use rmcp::model::Tool;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// JSON Schema type of one tool argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ArgKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArgKind::String => "string",
            ArgKind::Integer => "integer",
            ArgKind::Number => "number",
            ArgKind::Boolean => "boolean",
            ArgKind::Object => "object",
            ArgKind::Array => "array",
        }
    }
}

/// One argument of a generated tool.
#[derive(Clone, Debug)]
pub struct ArgumentDescriptor {
    pub key: ArgKey,
    pub kind: ArgKind,
    pub required: bool,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub enum_values: Vec<String>,
    /// Property schemas for object arguments.
    pub properties: Option<Map<String, Value>>,
    /// Item schema for array arguments.
    pub items: Option<Map<String, Value>>,
}

impl ArgumentDescriptor {
    fn new(key: ArgKey, kind: ArgKind) -> Self {
        Self {
            key,
            kind,
            required: false,
            description: None,
            default: None,
            enum_values: Vec::new(),
            properties: None,
            items: None,
        }
    }

    /// The JSON Schema fragment for this argument in the tool input schema.
    #[must_use]
    pub fn schema(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("type".to_string(), json!(self.kind.as_str()));
        if let Some(desc) = &self.description {
            out.insert("description".to_string(), json!(desc));
        }
        if !self.enum_values.is_empty() {
            out.insert("enum".to_string(), json!(self.enum_values));
        }
        if let Some(default) = &self.default {
            out.insert("default".to_string(), default.clone());
        }
        if let Some(properties) = &self.properties {
            out.insert("properties".to_string(), Value::Object(properties.clone()));
        }
        if let Some(items) = &self.items {
            out.insert("items".to_string(), Value::Object(items.clone()));
        }
        out
    }
}

/// Where an API key credential must be placed on the outgoing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiKeyIn {
    Query,
    Header,
}

/// API key placement captured at conversion time, applied at call time.
#[derive(Clone, Debug)]
pub struct ApiKeySpec {
    /// Security scheme name; the credential arrives as `openapi|auth_{scheme}`.
    pub scheme: String,
    pub location: ApiKeyIn,
    /// Query-parameter or header name declared by the scheme.
    pub name: String,
}

/// A fully converted operation.
#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub method: String,
    pub path: String,
    pub arguments: Vec<ArgumentDescriptor>,
    pub api_keys: Vec<ApiKeySpec>,
}

impl ToolDefinition {
    /// Build the MCP input schema: a flat object whose property names are the
    /// wire argument keys. Arguments with a default are never listed as
    /// required, since the caller can always omit them.
    #[must_use]
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();

        for arg in &self.arguments {
            let wire = arg.key.wire();
            if arg.required && arg.default.is_none() && !required.contains(&wire) {
                required.push(wire.clone());
            }
            properties.insert(wire, Value::Object(arg.schema()));
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            required.sort();
            schema.insert("required".to_string(), json!(required));
        }
        schema
    }

    /// Render as an MCP tool.
    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema()),
        )
    }
}

/// Conversion options.
#[derive(Clone, Debug, Default)]
pub struct ConvertOptions {
    /// Prefix prepended to every generated tool name.
    pub tool_name_prefix: Option<String>,
}

/// Converts every operation of a document into a [`ToolDefinition`].
pub struct Converter<'a> {
    doc: &'a ApiDocument,
    walker: SchemaWalker<'a>,
    options: ConvertOptions,
}

impl<'a> Converter<'a> {
    #[must_use]
    pub fn new(doc: &'a ApiDocument, options: ConvertOptions) -> Self {
        Self {
            doc,
            walker: SchemaWalker::new(doc),
            options,
        }
    }

    /// Convert the whole document. Paths and operations are visited in a
    /// deterministic order, so the output is stable for a given document.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Conversion`] naming the first operation that
    /// could not be converted.
    pub fn convert(&self) -> Result<Vec<ToolDefinition>> {
        let mut tools = Vec::new();
        for (path, path_item) in self.doc.sorted_paths() {
            for (method, operation) in ApiDocument::operations(path_item) {
                let tool = self
                    .convert_operation(path, method, path_item, operation)
                    .map_err(|e| ConvertError::conversion(method, path, e.to_string()))?;
                tracing::debug!(tool = %tool.name, "converted operation {method} {path}");
                tools.push(tool);
            }
        }
        Ok(tools)
    }

    fn convert_operation(
        &self,
        path: &str,
        method: &str,
        path_item: &PathItem,
        operation: &Operation,
    ) -> Result<ToolDefinition> {
        let mut name = ApiDocument::tool_name(path, method, operation);
        if let Some(prefix) = &self.options.tool_name_prefix {
            name = format!("{prefix}{name}");
        }

        let mut arguments = Vec::new();

        // Path-item parameters apply to every operation beneath it; an
        // operation-level parameter with the same key overrides them.
        for param in merged_parameters(self.doc, path_item, operation) {
            arguments.push(self.map_parameter(param)?);
        }

        if let Some(body) = &operation.request_body
            && let Some(body) = self.doc.resolve_request_body(body)
        {
            arguments.extend(self.map_request_body(body));
        }

        arguments.push(self.server_descriptor());

        let mut api_keys = Vec::new();
        if let Some(security) = &operation.security
            && !security.is_empty()
        {
            self.map_security(security, &mut arguments, &mut api_keys)?;
        }

        Ok(ToolDefinition {
            name,
            description: self.describe(operation),
            method: method.to_string(),
            path: path.to_string(),
            arguments,
            api_keys,
        })
    }

    fn map_parameter(&self, param: &Parameter) -> Result<ArgumentDescriptor> {
        let (data, make_key): (&ParameterData, fn(String) -> ArgKey) = match param {
            Parameter::Path { parameter_data, .. } => (parameter_data, ArgKey::Path),
            Parameter::Query { parameter_data, .. } => (parameter_data, ArgKey::Query),
            Parameter::Header { parameter_data, .. } => (parameter_data, ArgKey::Header),
            Parameter::Cookie { parameter_data, .. } => {
                return Err(ConvertError::Document(format!(
                    "cookie parameter '{}' is not supported",
                    parameter_data.name
                )));
            }
        };

        let mut arg = ArgumentDescriptor::new(make_key(data.name.clone()), ArgKind::String);
        arg.required = data.required;
        if !data.description.as_deref().unwrap_or_default().is_empty() {
            arg.description = data.description.clone();
        }

        if let Some(schema) = parameter_schema(data)
            && let Some(schema) = self.doc.resolve_schema(schema)
        {
            let walked = self.walker.walk_schema(schema, &VisitedSet::new());
            self.apply_schema(&mut arg, &walked, false);

            // A declared example doubles as the argument default, rendered as
            // a string like any other URL-bound value.
            if let Some(example) = &schema.schema_data.example {
                arg.default = Some(json!(value_to_string(example)));
            }
        }

        Ok(arg)
    }

    /// One `body` descriptor per content entry, visited in content-type order.
    /// Entries share the single `body` key, so with multiple content types the
    /// last one wins in the input schema.
    fn map_request_body(&self, body: &RequestBody) -> Vec<ArgumentDescriptor> {
        let mut content: Vec<(&String, &MediaType)> = body.content.iter().collect();
        content.sort_by_key(|(ct, _)| ct.as_str());

        let mut out = Vec::new();
        for (_, media_type) in content {
            let Some(schema) = &media_type.schema else {
                continue;
            };
            let Some(schema) = self.doc.resolve_schema(schema) else {
                continue;
            };

            // An untyped body schema is treated as an object.
            let mut arg = ArgumentDescriptor::new(ArgKey::Body, ArgKind::Object);
            arg.required = body.required;
            if !body.description.as_deref().unwrap_or_default().is_empty() {
                arg.description = body.description.clone();
            }

            let walked = self.walker.walk_schema(schema, &VisitedSet::new());
            self.apply_schema(&mut arg, &walked, true);
            out.push(arg);
        }
        out
    }

    /// Fill kind, enum, properties, and items of a descriptor from a walked
    /// schema. Arrays count only when they declare items; objects count only
    /// when they declare properties (for bodies, any object or untyped schema
    /// does). Everything else collapses to the descriptor's fallback kind.
    fn apply_schema(&self, arg: &mut ArgumentDescriptor, walked: &Map<String, Value>, body: bool) {
        let properties = walked
            .get("properties")
            .and_then(Value::as_object)
            .filter(|p| !p.is_empty());
        let items = walked.get("items").and_then(Value::as_object);

        match walked.get("type").and_then(Value::as_str) {
            Some("array") if items.is_some() => {
                arg.kind = ArgKind::Array;
                arg.items = items.cloned();
            }
            Some("object") if body || properties.is_some() => {
                arg.kind = ArgKind::Object;
                arg.properties = properties.cloned();
            }
            _ if properties.is_some() && body => {
                arg.kind = ArgKind::Object;
                arg.properties = properties.cloned();
            }
            Some("integer") => arg.kind = ArgKind::Integer,
            Some("number") => arg.kind = ArgKind::Number,
            Some("boolean") => arg.kind = ArgKind::Boolean,
            Some("string") => arg.kind = ArgKind::String,
            _ => {}
        }

        // Argument enums are stringified so a caller can echo one back
        // verbatim regardless of the schema type.
        if let Some(values) = walked.get("enum").and_then(Value::as_array) {
            arg.enum_values = values.iter().map(value_to_string).collect();
        }
    }

    /// The `openapi|server_addr` argument. With no declared servers the caller
    /// must supply one; with exactly one it becomes the default; with several
    /// the caller must pick one of them.
    fn server_descriptor(&self) -> ArgumentDescriptor {
        let servers = self.doc.servers();
        let mut arg = ArgumentDescriptor::new(ArgKey::ServerAddr, ArgKind::String);
        arg.description = Some("Server address to connect to".to_string());

        match servers.len() {
            0 => arg.required = true,
            1 => {
                arg.default = Some(json!(servers[0].url));
                arg.enum_values = vec![servers[0].url.clone()];
            }
            _ => {
                arg.required = true;
                arg.enum_values = servers.iter().map(|s| s.url.clone()).collect();
            }
        }
        arg
    }

    fn map_security(
        &self,
        requirements: &[SecurityRequirement],
        arguments: &mut Vec<ArgumentDescriptor>,
        api_keys: &mut Vec<ApiKeySpec>,
    ) -> Result<()> {
        let mut seen: Vec<String> = Vec::new();
        let mut push = |arguments: &mut Vec<ArgumentDescriptor>, arg: ArgumentDescriptor| {
            let wire = arg.key.wire();
            if !seen.contains(&wire) {
                seen.push(wire);
                arguments.push(arg);
            }
        };

        for requirement in requirements {
            let mut names: Vec<&String> = requirement.keys().collect();
            names.sort();

            for scheme_name in names {
                let Some(scheme) = self.doc.security_scheme(scheme_name) else {
                    continue;
                };
                let scopes = &requirement[scheme_name];

                match scheme {
                    SecurityScheme::APIKey { location, name, .. } => {
                        let location = match location {
                            APIKeyLocation::Query => ApiKeyIn::Query,
                            APIKeyLocation::Header => ApiKeyIn::Header,
                            APIKeyLocation::Cookie => {
                                return Err(ConvertError::Document(format!(
                                    "cookie API key scheme '{scheme_name}' is not supported"
                                )));
                            }
                        };
                        let in_str = match location {
                            ApiKeyIn::Query => "query",
                            ApiKeyIn::Header => "header",
                        };
                        let mut arg = ArgumentDescriptor::new(
                            ArgKey::AuthApiKey(scheme_name.clone()),
                            ArgKind::String,
                        );
                        arg.required = true;
                        arg.description = Some(format!(
                            "API Key for {scheme_name} authentication (in {in_str} named '{name}')"
                        ));
                        if !api_keys.iter().any(|k| &k.scheme == scheme_name) {
                            api_keys.push(ApiKeySpec {
                                scheme: scheme_name.clone(),
                                location,
                                name: name.clone(),
                            });
                        }
                        push(arguments, arg);
                    }
                    SecurityScheme::HTTP { scheme, .. } => match scheme.as_str() {
                        "basic" => {
                            let mut user =
                                ArgumentDescriptor::new(ArgKey::AuthUsername, ArgKind::String);
                            user.required = true;
                            user.description =
                                Some("Username for Basic authentication".to_string());
                            push(arguments, user);

                            let mut pass =
                                ArgumentDescriptor::new(ArgKey::AuthPassword, ArgKind::String);
                            pass.required = true;
                            pass.description =
                                Some("Password for Basic authentication".to_string());
                            push(arguments, pass);
                        }
                        "bearer" => {
                            let mut arg =
                                ArgumentDescriptor::new(ArgKey::AuthToken, ArgKind::String);
                            arg.required = true;
                            arg.description = Some("Bearer token for authentication".to_string());
                            push(arguments, arg);
                        }
                        other => {
                            tracing::warn!(
                                "ignoring unsupported HTTP auth scheme '{other}' for \
                                 security scheme '{scheme_name}'"
                            );
                        }
                    },
                    SecurityScheme::OAuth2 { .. } => {
                        let mut arg =
                            ArgumentDescriptor::new(ArgKey::AuthOAuth2Token, ArgKind::String);
                        arg.required = true;
                        arg.description = Some(if scopes.is_empty() {
                            "OAuth2 token for authentication".to_string()
                        } else {
                            format!("OAuth2 token with scopes: {}", scopes.join(", "))
                        });
                        push(arguments, arg);
                    }
                    SecurityScheme::OpenIDConnect { .. } => {
                        tracing::warn!(
                            "ignoring OpenID Connect security scheme '{scheme_name}'"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Assemble the tool description: summary, description, a deprecation
    /// warning, and a synopsis of the declared responses.
    fn describe(&self, operation: &Operation) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(summary) = &operation.summary
            && !summary.is_empty()
        {
            parts.push(summary.clone());
        }
        if let Some(description) = &operation.description
            && !description.is_empty()
        {
            parts.push(description.clone());
        }
        if operation.deprecated {
            parts.push("WARNING: This operation is deprecated.".to_string());
        }

        let mut description = parts.join("\n\n");
        let responses = self.describe_responses(&operation.responses);
        if !responses.is_empty() {
            description.push_str("\n\nResponses:\n\n");
            description.push_str(&responses);
        }
        description
    }

    fn describe_responses(&self, responses: &Responses) -> String {
        let mut entries: Vec<(String, &ReferenceOr<openapiv3::Response>)> = responses
            .responses
            .iter()
            .map(|(code, response)| (format!("{code}"), response))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        if let Some(default) = &responses.default {
            entries.push(("default".to_string(), default));
        }

        let mut lines = Vec::new();
        for (code, response) in entries {
            let Some(response) = self.doc.resolve_response(response) else {
                continue;
            };
            let mut line = format!("- status: {code}, description: {}", response.description);

            let mut content: Vec<(&String, &MediaType)> = response.content.iter().collect();
            content.sort_by_key(|(ct, _)| ct.as_str());
            for (content_type, media_type) in content {
                let Some(schema) = &media_type.schema else {
                    continue;
                };
                let Some(schema) = self.doc.resolve_schema(schema) else {
                    continue;
                };
                let walked = self.walker.walk_schema(schema, &VisitedSet::new());
                match serde_json::to_string(&walked) {
                    Ok(json) => {
                        line.push_str(&format!(", content type: {content_type}, schema: {json}"));
                    }
                    Err(e) => tracing::warn!("failed to render response schema: {e}"),
                }
            }
            lines.push(line);
        }
        lines.join("\n\n")
    }
}

/// Path-item parameters merged with operation parameters; an operation
/// parameter replaces a path-item parameter with the same name and location.
fn merged_parameters<'a>(
    doc: &'a ApiDocument,
    path_item: &'a PathItem,
    operation: &'a Operation,
) -> Vec<&'a Parameter> {
    let resolve = |params: &'a [ReferenceOr<Parameter>]| {
        params
            .iter()
            .filter_map(|p| doc.resolve_parameter(p))
            .collect::<Vec<_>>()
    };

    let mut merged = resolve(&path_item.parameters);
    for param in resolve(&operation.parameters) {
        let key = parameter_key(param);
        merged.retain(|existing| parameter_key(existing) != key);
        merged.push(param);
    }
    merged
}

fn parameter_key(param: &Parameter) -> (&'static str, &str) {
    match param {
        Parameter::Query { parameter_data, .. } => ("query", &parameter_data.name),
        Parameter::Header { parameter_data, .. } => ("header", &parameter_data.name),
        Parameter::Path { parameter_data, .. } => ("path", &parameter_data.name),
        Parameter::Cookie { parameter_data, .. } => ("cookie", &parameter_data.name),
    }
}

/// The declared schema of a parameter. Content-declared parameters carry no
/// direct schema and fall back to a plain string argument.
fn parameter_schema(data: &ParameterData) -> Option<&ReferenceOr<openapiv3::Schema>> {
    match &data.format {
        ParameterSchemaOrContent::Schema(schema) => Some(schema),
        ParameterSchemaOrContent::Content(_) => None,
    }
}
