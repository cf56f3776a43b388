//! Loading OpenAPI documents from files or URLs.

use super::document::{Document, SwaggerDocument};
use super::OpenApiError;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a document from a local path or an http(s) URL.
///
/// Remote documents are downloaded into a temporary directory that is
/// removed once parsing finishes.
pub async fn load_document(source: &str) -> Result<Document, OpenApiError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let text = fetch(source).await?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("spec");
        tokio::fs::write(&path, text).await?;
        let document = parse_document_file(&path);
        debug!("Parsed remote document {} via {}", source, path.display());
        return document;
    }

    let path = PathBuf::from(shellexpand::tilde(source).into_owned());
    parse_document_file(&path)
}

async fn fetch(url: &str) -> Result<String, OpenApiError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| OpenApiError::Fetch(format!("{url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(OpenApiError::Fetch(format!("{url}: {status}")));
    }
    response
        .text()
        .await
        .map_err(|e| OpenApiError::Fetch(format!("{url}: {e}")))
}

/// Parse a document file, internalizing every `$ref`.
pub fn parse_document_file(path: &Path) -> Result<Document, OpenApiError> {
    let mut resolver = RefResolver::default();
    let root_path = resolver.canonical(path);
    let root = resolver.load(&root_path)?.clone();
    let resolved = resolver.internalize(&root, &root_path, &mut Vec::new())?;
    let document = into_document(resolved)?;

    info!(
        "Loaded OpenAPI document '{}' ({} paths)",
        document.info.title,
        document.paths.len()
    );
    Ok(document)
}

/// Parse JSON first, then YAML.
pub fn parse_text(text: &str) -> Result<Value, OpenApiError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    serde_yaml::from_str::<Value>(text).map_err(|e| OpenApiError::Unparseable(e.to_string()))
}

/// Try v3 first, then v2 (converted to v3).
pub fn into_document(value: Value) -> Result<Document, OpenApiError> {
    let openapi = value
        .get("openapi")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if openapi.starts_with("3.") {
        return serde_json::from_value::<Document>(value)
            .map_err(|e| OpenApiError::Unparseable(format!("openapi {openapi}: {e}")));
    }

    if value.get("swagger").is_some() {
        return serde_json::from_value::<SwaggerDocument>(value)
            .map(Document::from)
            .map_err(|e| OpenApiError::Unparseable(format!("swagger: {e}")));
    }

    Err(OpenApiError::Unparseable(
        "neither an OpenAPI 3.x nor a Swagger 2.0 document".into(),
    ))
}

/// Resolves local (`#/...`) and relative-file (`other.yaml#/...`) references.
#[derive(Default)]
struct RefResolver {
    documents: HashMap<PathBuf, Value>,
}

impl RefResolver {
    fn canonical(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn load(&mut self, path: &Path) -> Result<&Value, OpenApiError> {
        if !self.documents.contains_key(path) {
            let text = std::fs::read_to_string(path)?;
            let value = parse_text(&text)?;
            self.documents.insert(path.to_path_buf(), value);
        }
        self.documents
            .get(path)
            .ok_or_else(|| OpenApiError::Unparseable(path.display().to_string()))
    }

    fn locate(&self, reference: &str, file: &Path) -> Result<(PathBuf, String), OpenApiError> {
        let (target, pointer) = reference.split_once('#').unwrap_or((reference, ""));

        if target.contains("://") {
            return Err(OpenApiError::Reference {
                reference: reference.into(),
                reason: "remote references are not supported".into(),
            });
        }
        if !pointer.is_empty() && !pointer.starts_with('/') {
            return Err(OpenApiError::Reference {
                reference: reference.into(),
                reason: "fragment is not a JSON pointer".into(),
            });
        }

        let path = if target.is_empty() {
            file.to_path_buf()
        } else {
            let dir = file.parent().unwrap_or_else(|| Path::new("."));
            self.canonical(&dir.join(target))
        };
        Ok((path, pointer.to_string()))
    }

    fn internalize(
        &mut self,
        value: &Value,
        file: &Path,
        stack: &mut Vec<String>,
    ) -> Result<Value, OpenApiError> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.resolve(reference, map, file, stack);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.internalize(item, file, stack)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.internalize(item, file, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve(
        &mut self,
        reference: &str,
        map: &Map<String, Value>,
        file: &Path,
        stack: &mut Vec<String>,
    ) -> Result<Value, OpenApiError> {
        let (target_file, pointer) = self.locate(reference, file)?;
        let key = format!("{}#{}", target_file.display(), pointer);

        // A reference back into the current chain is cut short.
        if stack.contains(&key) {
            debug!("Cutting recursive reference {}", reference);
            return Ok(json!({ "type": "object" }));
        }

        let target = self
            .load(&target_file)
            .map_err(|e| OpenApiError::Reference {
                reference: reference.into(),
                reason: e.to_string(),
            })?
            .pointer(&pointer)
            .cloned()
            .ok_or_else(|| OpenApiError::Reference {
                reference: reference.into(),
                reason: "target not found".into(),
            })?;

        stack.push(key);
        let resolved = self.internalize(&target, &target_file, stack);
        stack.pop();
        let mut resolved = resolved?;

        // Sibling keys next to `$ref` (e.g. `description`) are kept.
        if let Value::Object(out) = &mut resolved {
            for (name, item) in map {
                if name != "$ref" {
                    let item = self.internalize(item, file, stack)?;
                    out.insert(name.clone(), item);
                }
            }
        }
        Ok(resolved)
    }
}
