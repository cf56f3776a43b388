//! Typed OpenAPI documents.
//!
//! Only the parts needed to derive operations are modelled. Swagger 2.0
//! documents are converted to the v3 shape on load.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// An OpenAPI 3.x document with all references already internalized.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub openapi: String,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub url: String,
}

/// Operations of one path, plus parameters shared by all of them.
#[derive(Debug, Clone, Deserialize)]
pub struct PathItem<O = OperationObject, P = Parameter> {
    #[serde(default = "Vec::new")]
    pub parameters: Vec<P>,
    pub get: Option<O>,
    pub put: Option<O>,
    pub post: Option<O>,
    pub delete: Option<O>,
    pub options: Option<O>,
    pub head: Option<O>,
    pub patch: Option<O>,
    pub trace: Option<O>,
}

impl<O, P> PathItem<O, P> {
    /// Present operations in a fixed method order.
    pub fn operations(&self) -> Vec<(Method, &O)> {
        [
            (Method::GET, &self.get),
            (Method::PUT, &self.put),
            (Method::POST, &self.post),
            (Method::DELETE, &self.delete),
            (Method::OPTIONS, &self.options),
            (Method::HEAD, &self.head),
            (Method::PATCH, &self.patch),
            (Method::TRACE, &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
        .collect()
    }

    fn map<O2, P2>(self, mut op: impl FnMut(O) -> O2, param: impl FnMut(P) -> Option<P2>) -> PathItem<O2, P2> {
        PathItem {
            parameters: self.parameters.into_iter().filter_map(param).collect(),
            get: self.get.map(&mut op),
            put: self.put.map(&mut op),
            post: self.post.map(&mut op),
            delete: self.delete.map(&mut op),
            options: self.options.map(&mut op),
            head: self.head.map(&mut op),
            patch: self.patch.map(&mut op),
            trace: self.trace.map(&mut op),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Value,
}

impl RequestBody {
    /// The JSON media type entry, ignoring parameters like `charset`.
    pub fn json(&self) -> Option<&MediaType> {
        self.content.iter().find_map(|(media, entry)| {
            let essence = media.split(';').next().unwrap_or_default().trim();
            essence.eq_ignore_ascii_case("application/json").then_some(entry)
        })
    }
}

// -- Swagger 2.0 ---------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerDocument {
    pub swagger: String,
    #[serde(default)]
    pub info: Info,
    pub host: Option<String>,
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem<SwaggerOperation, SwaggerParameter>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerOperation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<SwaggerParameter>,
    pub consumes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub schema: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub format: Option<String>,
    pub items: Option<Value>,
    #[serde(rename = "enum")]
    pub values: Option<Vec<Value>>,
}

impl SwaggerParameter {
    /// Non-body parameters carry their type inline; v3 nests it in `schema`.
    fn inline_schema(&self) -> Option<Value> {
        let kind = self.kind.as_ref()?;
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String(kind.clone()));
        if let Some(format) = &self.format {
            schema.insert("format".into(), Value::String(format.clone()));
        }
        if let Some(items) = &self.items {
            schema.insert("items".into(), items.clone());
        }
        if let Some(values) = &self.values {
            schema.insert("enum".into(), Value::Array(values.clone()));
        }
        Some(Value::Object(schema))
    }

    fn into_parameter(self) -> Option<Parameter> {
        match self.location.as_str() {
            "body" | "formData" => None,
            _ => Some(Parameter {
                schema: self.schema.clone().or_else(|| self.inline_schema()),
                name: self.name,
                location: self.location,
                description: self.description,
                required: self.required,
            }),
        }
    }
}

fn accepts_json(consumes: &[String]) -> bool {
    consumes.is_empty() || consumes.iter().any(|c| c.to_ascii_lowercase().contains("json"))
}

impl SwaggerOperation {
    fn into_operation(self, document_consumes: &[String]) -> OperationObject {
        let consumes = self.consumes.as_deref().unwrap_or(document_consumes);

        let request_body = self
            .parameters
            .iter()
            .find(|p| p.location == "body")
            .filter(|_| accepts_json(consumes))
            .map(|body| RequestBody {
                content: BTreeMap::from([(
                    "application/json".to_string(),
                    MediaType {
                        schema: body.schema.clone().unwrap_or_else(|| json!({ "type": "object" })),
                    },
                )]),
                required: body.required,
            });

        OperationObject {
            operation_id: self.operation_id,
            summary: self.summary,
            description: self.description,
            parameters: self
                .parameters
                .into_iter()
                .filter_map(SwaggerParameter::into_parameter)
                .collect(),
            request_body,
        }
    }
}

impl From<SwaggerDocument> for Document {
    fn from(doc: SwaggerDocument) -> Self {
        let base_path = doc.base_path.unwrap_or_default();
        let servers = match &doc.host {
            Some(host) => {
                let scheme = doc.schemes.first().map(String::as_str).unwrap_or("https");
                vec![Server {
                    url: format!("{scheme}://{host}{base_path}"),
                }]
            }
            None if !base_path.is_empty() => vec![Server { url: base_path }],
            None => Vec::new(),
        };

        let consumes = doc.consumes;
        let paths = doc
            .paths
            .into_iter()
            .map(|(path, item)| {
                let item = item.map(
                    |op| op.into_operation(&consumes),
                    SwaggerParameter::into_parameter,
                );
                (path, item)
            })
            .collect();

        Document {
            openapi: "3.0.0".into(),
            info: doc.info,
            servers,
            paths,
        }
    }
}
