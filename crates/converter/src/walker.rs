//! Recursive schema-to-JSON conversion.
//!
//! Turns `openapiv3` schemas into the plain JSON Schema fragments embedded in
//! MCP tool input schemas. Internal `$ref`s are resolved through
//! [`ApiDocument`]; unresolvable references are passed through as `$ref`
//! objects so the caller still sees where the schema pointed.
//!
//! Cycle detection is keyed by schema title and by component reference: each
//! recursion branch carries its own copy of the visited set, so a schema
//! reused on sibling branches is expanded in full on both, and only a genuine
//! ancestor cycle is cut short with a stub.

use crate::document::ApiDocument;
use openapiv3::{
    AdditionalProperties, AnySchema, ReferenceOr, Schema, SchemaKind, Type,
    VariantOrUnknownOrEmpty,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Keys of the schemas already expanded on the current recursion branch:
/// schema titles and `#/components/schemas/...` references.
#[derive(Clone, Debug, Default)]
pub struct VisitedSet(HashSet<String>);

impl VisitedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// A copy of the set with `key` added. Copying per branch keeps sibling
    /// branches independent.
    fn with(&self, key: &str) -> Self {
        let mut set = self.0.clone();
        set.insert(key.to_string());
        Self(set)
    }
}

/// Walks schemas rooted in one document.
pub struct SchemaWalker<'a> {
    doc: &'a ApiDocument,
}

impl<'a> SchemaWalker<'a> {
    #[must_use]
    pub fn new(doc: &'a ApiDocument) -> Self {
        Self { doc }
    }

    /// Convert a possibly-referenced schema into a JSON Schema fragment.
    #[must_use]
    pub fn walk(&self, schema: &ReferenceOr<Schema>, visited: &VisitedSet) -> Map<String, Value> {
        match schema {
            ReferenceOr::Item(s) => self.walk_schema(s, visited),
            ReferenceOr::Reference { reference } => match self.doc.resolve_schema(schema) {
                Some(s) => self.walk_component(reference, s, visited),
                None => ref_stub(reference),
            },
        }
    }

    fn walk_boxed(
        &self,
        schema: &ReferenceOr<Box<Schema>>,
        visited: &VisitedSet,
    ) -> Map<String, Value> {
        match schema {
            ReferenceOr::Item(s) => self.walk_schema(s, visited),
            ReferenceOr::Reference { reference } => match self.doc.resolve_boxed_schema(schema) {
                Some(s) => self.walk_component(reference, s, visited),
                None => ref_stub(reference),
            },
        }
    }

    /// A referenced component can cycle even when it carries no title, so the
    /// reference key enters the visited set before the component is expanded.
    fn walk_component(
        &self,
        reference: &str,
        schema: &Schema,
        visited: &VisitedSet,
    ) -> Map<String, Value> {
        if visited.contains(reference) {
            let name = reference.rsplit('/').next().unwrap_or(reference);
            return cycle_stub(name);
        }
        self.walk_schema(schema, &visited.with(reference))
    }

    /// Convert a resolved schema into a JSON Schema fragment.
    #[must_use]
    pub fn walk_schema(&self, schema: &Schema, visited: &VisitedSet) -> Map<String, Value> {
        let data = &schema.schema_data;

        // Ancestor cycle through a titled schema: emit a stub instead of
        // recursing forever.
        if let Some(title) = &data.title
            && !title.is_empty()
        {
            if visited.contains(title) {
                return cycle_stub(title);
            }
            let visited = visited.with(title);
            return self.walk_attributes(schema, &visited);
        }

        self.walk_attributes(schema, visited)
    }

    fn walk_attributes(&self, schema: &Schema, visited: &VisitedSet) -> Map<String, Value> {
        let mut out = Map::new();
        let data = &schema.schema_data;

        if let Some(title) = &data.title {
            out.insert("title".to_string(), json!(title));
        }
        if let Some(desc) = &data.description {
            out.insert("description".to_string(), json!(desc));
        }
        if let Some(default) = &data.default {
            out.insert("default".to_string(), default.clone());
        }
        if let Some(example) = &data.example {
            out.insert("example".to_string(), example.clone());
        }
        if data.nullable {
            out.insert("nullable".to_string(), json!(true));
        }
        if data.read_only {
            out.insert("readOnly".to_string(), json!(true));
        }
        if data.write_only {
            out.insert("writeOnly".to_string(), json!(true));
        }
        if data.deprecated {
            out.insert("deprecated".to_string(), json!(true));
        }
        if let Some(discriminator) = &data.discriminator {
            let mut d = Map::new();
            d.insert(
                "propertyName".to_string(),
                json!(discriminator.property_name),
            );
            if !discriminator.mapping.is_empty() {
                let mapping: Map<String, Value> = discriminator
                    .mapping
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect();
                d.insert("mapping".to_string(), Value::Object(mapping));
            }
            out.insert("discriminator".to_string(), Value::Object(d));
        }
        if let Some(docs) = &data.external_docs {
            let mut d = Map::new();
            if let Some(desc) = &docs.description {
                d.insert("description".to_string(), json!(desc));
            }
            d.insert("url".to_string(), json!(docs.url));
            out.insert("externalDocs".to_string(), Value::Object(d));
        }
        // `xml` is not modeled by the document crate; carry it through from the
        // raw extension map when present.
        if let Some(xml) = data.extensions.get("xml") {
            out.insert("xml".to_string(), xml.clone());
        }

        match &schema.schema_kind {
            SchemaKind::Type(t) => self.walk_type(t, visited, &mut out),
            SchemaKind::OneOf { one_of } => {
                out.insert("oneOf".to_string(), self.walk_list(one_of, visited));
            }
            SchemaKind::AnyOf { any_of } => {
                out.insert("anyOf".to_string(), self.walk_list(any_of, visited));
            }
            SchemaKind::AllOf { all_of } => {
                out.insert("allOf".to_string(), self.walk_list(all_of, visited));
            }
            SchemaKind::Not { not } => {
                out.insert("not".to_string(), Value::Object(self.walk(not, visited)));
            }
            SchemaKind::Any(any) => self.walk_any(any, visited, &mut out),
        }

        out
    }

    fn walk_type(&self, t: &Type, visited: &VisitedSet, out: &mut Map<String, Value>) {
        match t {
            Type::String(s) => {
                out.insert("type".to_string(), json!("string"));
                if let Some(format) = format_to_json(&s.format) {
                    out.insert("format".to_string(), format);
                }
                if let Some(pattern) = &s.pattern {
                    out.insert("pattern".to_string(), json!(pattern));
                }
                if let Some(min) = s.min_length {
                    out.insert("minLength".to_string(), json!(min));
                }
                if let Some(max) = s.max_length {
                    out.insert("maxLength".to_string(), json!(max));
                }
                insert_enum(out, s.enumeration.iter().flatten().map(|v| json!(v)));
            }
            Type::Number(n) => {
                out.insert("type".to_string(), json!("number"));
                if let Some(format) = format_to_json(&n.format) {
                    out.insert("format".to_string(), format);
                }
                if let Some(min) = n.minimum {
                    out.insert("minimum".to_string(), json!(min));
                }
                if let Some(max) = n.maximum {
                    out.insert("maximum".to_string(), json!(max));
                }
                if n.exclusive_minimum {
                    out.insert("exclusiveMinimum".to_string(), json!(true));
                }
                if n.exclusive_maximum {
                    out.insert("exclusiveMaximum".to_string(), json!(true));
                }
                if let Some(multiple) = n.multiple_of {
                    out.insert("multipleOf".to_string(), json!(multiple));
                }
                insert_enum(out, n.enumeration.iter().flatten().map(|v| json!(v)));
            }
            Type::Integer(i) => {
                out.insert("type".to_string(), json!("integer"));
                if let Some(format) = format_to_json(&i.format) {
                    out.insert("format".to_string(), format);
                }
                if let Some(min) = i.minimum {
                    out.insert("minimum".to_string(), json!(min));
                }
                if let Some(max) = i.maximum {
                    out.insert("maximum".to_string(), json!(max));
                }
                if i.exclusive_minimum {
                    out.insert("exclusiveMinimum".to_string(), json!(true));
                }
                if i.exclusive_maximum {
                    out.insert("exclusiveMaximum".to_string(), json!(true));
                }
                if let Some(multiple) = i.multiple_of {
                    out.insert("multipleOf".to_string(), json!(multiple));
                }
                insert_enum(out, i.enumeration.iter().flatten().map(|v| json!(v)));
            }
            Type::Boolean(b) => {
                out.insert("type".to_string(), json!("boolean"));
                insert_enum(out, b.enumeration.iter().flatten().map(|v| json!(v)));
            }
            Type::Array(a) => {
                out.insert("type".to_string(), json!("array"));
                if let Some(items) = &a.items {
                    out.insert(
                        "items".to_string(),
                        Value::Object(self.walk_boxed(items, visited)),
                    );
                }
                if let Some(min) = a.min_items {
                    out.insert("minItems".to_string(), json!(min));
                }
                if let Some(max) = a.max_items {
                    out.insert("maxItems".to_string(), json!(max));
                }
                if a.unique_items {
                    out.insert("uniqueItems".to_string(), json!(true));
                }
            }
            Type::Object(o) => {
                out.insert("type".to_string(), json!("object"));
                if !o.properties.is_empty() {
                    let mut properties = Map::new();
                    for (name, prop) in &o.properties {
                        properties.insert(
                            name.clone(),
                            Value::Object(self.walk_boxed(prop, visited)),
                        );
                    }
                    out.insert("properties".to_string(), Value::Object(properties));
                }
                if !o.required.is_empty() {
                    out.insert("required".to_string(), json!(o.required));
                }
                if let Some(min) = o.min_properties {
                    out.insert("minProperties".to_string(), json!(min));
                }
                if let Some(max) = o.max_properties {
                    out.insert("maxProperties".to_string(), json!(max));
                }
                if let Some(additional) = &o.additional_properties {
                    out.insert(
                        "additionalProperties".to_string(),
                        self.walk_additional(additional, visited),
                    );
                }
            }
        }
    }

    /// Untyped schemas carry a loose bag of attributes; copy the useful ones.
    fn walk_any(&self, any: &AnySchema, visited: &VisitedSet, out: &mut Map<String, Value>) {
        if let Some(typ) = &any.typ {
            out.insert("type".to_string(), json!(typ));
        }
        if let Some(format) = &any.format {
            out.insert("format".to_string(), json!(format));
        }
        if let Some(pattern) = &any.pattern {
            out.insert("pattern".to_string(), json!(pattern));
        }
        if let Some(min) = any.minimum {
            out.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = any.maximum {
            out.insert("maximum".to_string(), json!(max));
        }
        insert_enum(out, any.enumeration.iter().cloned());
        if !any.properties.is_empty() {
            let mut properties = Map::new();
            for (name, prop) in &any.properties {
                properties.insert(name.clone(), Value::Object(self.walk_boxed(prop, visited)));
            }
            out.insert("properties".to_string(), Value::Object(properties));
        }
        if !any.required.is_empty() {
            out.insert("required".to_string(), json!(any.required));
        }
        if let Some(items) = &any.items {
            out.insert(
                "items".to_string(),
                Value::Object(self.walk_boxed(items, visited)),
            );
        }
        if let Some(additional) = &any.additional_properties {
            out.insert(
                "additionalProperties".to_string(),
                self.walk_additional(additional, visited),
            );
        }
        if !any.one_of.is_empty() {
            out.insert("oneOf".to_string(), self.walk_list(&any.one_of, visited));
        }
        if !any.any_of.is_empty() {
            out.insert("anyOf".to_string(), self.walk_list(&any.any_of, visited));
        }
        if !any.all_of.is_empty() {
            out.insert("allOf".to_string(), self.walk_list(&any.all_of, visited));
        }
        if let Some(not) = &any.not {
            out.insert("not".to_string(), Value::Object(self.walk(not, visited)));
        }
    }

    fn walk_list(&self, schemas: &[ReferenceOr<Schema>], visited: &VisitedSet) -> Value {
        Value::Array(
            schemas
                .iter()
                .map(|s| Value::Object(self.walk(s, visited)))
                .collect(),
        )
    }

    fn walk_additional(&self, additional: &AdditionalProperties, visited: &VisitedSet) -> Value {
        match additional {
            AdditionalProperties::Any(allowed) => json!(allowed),
            AdditionalProperties::Schema(schema) => Value::Object(self.walk(schema, visited)),
        }
    }
}

/// Enum values are copied through unmodified; argument descriptors stringify
/// them separately at the tool boundary.
fn insert_enum(out: &mut Map<String, Value>, values: impl Iterator<Item = Value>) {
    let values: Vec<Value> = values.collect();
    if !values.is_empty() {
        out.insert("enum".to_string(), Value::Array(values));
    }
}

fn format_to_json<T: Serialize>(format: &VariantOrUnknownOrEmpty<T>) -> Option<Value> {
    match format {
        VariantOrUnknownOrEmpty::Item(f) => serde_json::to_value(f).ok(),
        VariantOrUnknownOrEmpty::Unknown(s) => Some(json!(s)),
        VariantOrUnknownOrEmpty::Empty => None,
    }
}

fn cycle_stub(name: &str) -> Map<String, Value> {
    let mut stub = Map::new();
    stub.insert("type".to_string(), json!("reference"));
    stub.insert("title".to_string(), json!(name));
    stub.insert(
        "description".to_string(),
        json!(format!("Circular reference to {name}")),
    );
    stub
}

fn ref_stub(reference: &str) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("$ref".to_string(), json!(reference));
    out
}
