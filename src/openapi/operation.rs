//! Operations derived from OpenAPI path items.

use super::document::{OperationObject, Parameter};
use super::rest::RestRequest;
use crate::tools::{ObjectSchema, Schema, ToolArgs, ToolError};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;

/// One callable endpoint.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub description: String,
    pub method: Method,
    /// Path template with `{param}` placeholders.
    pub path: String,
    /// Lower-cased names of query parameters.
    pub queries: Vec<String>,
    pub content_type: Option<String>,
    pub schema: ObjectSchema,
}

/// `getItemById` -> `get_item_by_id`.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn sentence(text: &str) -> Option<String> {
    let text = text
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    (!text.is_empty()).then(|| format!("{text}."))
}

fn describe(op: &OperationObject, method: &Method, path: &str) -> String {
    let parts: Vec<String> = [&op.summary, &op.description]
        .into_iter()
        .flatten()
        .filter_map(|text| sentence(text))
        .collect();

    if parts.is_empty() {
        format!("{method} {path}.")
    } else {
        parts.join(" ")
    }
}

/// Path-level parameters, overridden by operation-level ones with the same
/// name and location.
fn effective_parameters<'a>(shared: &'a [Parameter], own: &'a [Parameter]) -> Vec<&'a Parameter> {
    let mut params: Vec<&Parameter> = shared
        .iter()
        .filter(|p| {
            !own.iter()
                .any(|o| o.name == p.name && o.location.eq_ignore_ascii_case(&p.location))
        })
        .collect();
    params.extend(own);
    params
}

impl Operation {
    /// Derive an operation. Returns `None` without an `operationId`.
    pub fn derive(
        path: &str,
        method: Method,
        op: &OperationObject,
        shared_parameters: &[Parameter],
    ) -> Option<Self> {
        let operation_id = op.operation_id.as_deref().map(str::trim).unwrap_or_default();
        if operation_id.is_empty() {
            debug!("Skipping {} {}: no operationId", method, path);
            return None;
        }

        let mut schema = Schema::object();
        let mut queries = Vec::new();

        for param in effective_parameters(shared_parameters, &op.parameters) {
            let location = param.location.to_ascii_lowercase();
            match location.as_str() {
                "query" => queries.push(param.name.to_lowercase()),
                "path" => {}
                _ => continue,
            }

            let mut property = Schema::string();
            if let Some(description) = &param.description {
                property = property.describe(description.as_str());
            }
            schema.insert(param.name.clone(), property);
            if param.required {
                schema.require(param.name.clone());
            }
        }

        let mut content_type = None;
        if let Some(media) = op.request_body.as_ref().and_then(|b| b.json()) {
            content_type = Some("application/json".to_string());
            schema.insert("body", body_schema(&media.schema));
            schema.require("body");
        }

        if schema.is_empty() {
            schema.insert("body", Schema::object().build());
        }

        Some(Self {
            name: camel_to_snake(operation_id),
            description: describe(op, &method, path),
            method,
            path: path.to_string(),
            queries,
            content_type,
            schema,
        })
    }

    /// Bind call arguments into an HTTP request.
    ///
    /// Scalar arguments fill `{name}` placeholders; those recorded as query
    /// parameters are also appended to the query string. `body` is sent as
    /// JSON.
    pub fn bind(&self, args: &ToolArgs) -> Result<RestRequest, ToolError> {
        let mut path = self.path.clone();
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;

        for (key, value) in args {
            let Some(text) = scalar_text(value) else {
                continue;
            };
            path = path.replace(&format!("{{{key}}}"), &text);
            if self.queries.contains(&key.to_lowercase()) {
                query.append_pair(key, &text);
                has_query = true;
            }
        }

        if has_query {
            path.push('?');
            path.push_str(&query.finish());
        }

        let body = match args.get("body") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| ToolError::InvalidArguments(format!("body: {e}")))?,
            ),
        };

        Ok(RestRequest {
            method: self.method.clone(),
            path,
            content_type: body
                .as_ref()
                .map(|_| self.content_type.clone().unwrap_or_else(|| "application/json".into())),
            body,
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `{type: object, properties, required}` from the request body schema.
fn body_schema(schema: &Value) -> Schema {
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    let mut body = json!({ "type": "object", "properties": properties });
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        if !required.is_empty() {
            body["required"] = Value::Array(required.clone());
        }
    }
    Schema::Raw(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn operation(value: Value) -> OperationObject {
        serde_json::from_value(value).unwrap()
    }

    fn args(value: Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn snake_case_names() {
        assert_eq!(camel_to_snake("getItem"), "get_item");
        assert_eq!(camel_to_snake("GetItemByID"), "get_item_by_i_d");
        assert_eq!(camel_to_snake("list_pets"), "list_pets");
    }

    #[test]
    fn descriptions_are_normalized_sentences() {
        let op = operation(json!({
            "operationId": "x",
            "summary": "List items...  ",
            "description": "Returns all items.\n"
        }));
        assert_eq!(describe(&op, &Method::GET, "/items"), "List items. Returns all items.");

        let bare = operation(json!({ "operationId": "x" }));
        assert_eq!(describe(&bare, &Method::DELETE, "/items/{id}"), "DELETE /items/{id}.");
    }

    #[test]
    fn required_parameters_propagate_and_headers_are_dropped() {
        let op = operation(json!({
            "operationId": "searchThings",
            "parameters": [
                { "name": "a", "in": "path", "required": true },
                { "name": "b", "in": "query", "required": true },
                { "name": "C", "in": "query", "description": "Optional filter" },
                { "name": "X-Trace", "in": "header", "required": true }
            ]
        }));

        let derived = Operation::derive("/things/{a}", Method::GET, &op, &[]).unwrap();
        let schema = derived.schema.to_value();

        let mut required: Vec<_> = derived.schema.required().to_vec();
        required.sort();
        assert_eq!(required, vec!["a", "b"]);
        assert_eq!(
            schema["properties"],
            json!({
                "a": { "type": "string" },
                "b": { "type": "string" },
                "C": { "type": "string", "description": "Optional filter" }
            })
        );
        assert_eq!(derived.queries, vec!["b", "c"]);
        assert_eq!(derived.name, "search_things");
    }

    #[test]
    fn operation_parameters_override_shared_ones() {
        let shared: Vec<Parameter> = serde_json::from_value(json!([
            { "name": "id", "in": "path", "required": true, "description": "shared" },
            { "name": "verbose", "in": "query" }
        ]))
        .unwrap();
        let op = operation(json!({
            "operationId": "getItem",
            "parameters": [{ "name": "id", "in": "path", "required": true, "description": "own" }]
        }));

        let derived = Operation::derive("/items/{id}", Method::GET, &op, &shared).unwrap();
        let schema = derived.schema.to_value();
        assert_eq!(schema["properties"]["id"]["description"], "own");
        assert!(schema["properties"].get("verbose").is_some());
    }

    #[test]
    fn json_body_becomes_required_body_property() {
        let op = operation(json!({
            "operationId": "createItem",
            "requestBody": { "content": { "application/json": { "schema": {
                "type": "object",
                "required": ["name"],
                "properties": { "name": { "type": "string" } }
            } } } }
        }));

        let derived = Operation::derive("/items", Method::POST, &op, &[]).unwrap();
        assert_eq!(derived.content_type.as_deref(), Some("application/json"));
        assert_eq!(
            derived.schema.to_value(),
            json!({
                "type": "object",
                "properties": { "body": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"]
                } },
                "required": ["body"]
            })
        );
    }

    #[test]
    fn parameterless_operation_gets_placeholder_body() {
        let op = operation(json!({ "operationId": "ping" }));
        let derived = Operation::derive("/ping", Method::GET, &op, &[]).unwrap();
        assert_eq!(
            derived.schema.to_value(),
            json!({ "type": "object", "properties": { "body": { "type": "object", "properties": {} } } })
        );
    }

    #[test]
    fn missing_operation_id_is_skipped() {
        let op = operation(json!({ "summary": "anonymous" }));
        assert!(Operation::derive("/x", Method::GET, &op, &[]).is_none());
    }

    #[test]
    fn bind_fills_path_and_query() {
        let op = operation(json!({
            "operationId": "listItems",
            "parameters": [
                { "name": "owner", "in": "path", "required": true },
                { "name": "Limit", "in": "query" },
                { "name": "tag", "in": "query" }
            ]
        }));
        let derived = Operation::derive("/users/{owner}/items", Method::GET, &op, &[]).unwrap();

        let request = derived
            .bind(&args(json!({ "owner": "ann", "Limit": 10, "tag": "a b", "ignored": ["x"] })))
            .unwrap();

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/users/ann/items?Limit=10&tag=a+b");
        assert_eq!(request.body, None);
        assert_eq!(request.content_type, None);
    }

    #[test]
    fn bind_serializes_body() {
        let op = operation(json!({
            "operationId": "createItem",
            "requestBody": { "content": { "application/json": { "schema": { "type": "object" } } } }
        }));
        let derived = Operation::derive("/items", Method::POST, &op, &[]).unwrap();

        let request = derived.bind(&args(json!({ "body": { "name": "x" } }))).unwrap();
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"x"}"#));
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
    }
}
