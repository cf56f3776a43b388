//! Filesystem tools rooted at a working directory.

use super::{required_str, Schema, Tool, ToolArgs, ToolContext, ToolError, ToolOutput, ToolProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Tool provider exposing file operations below `root`.
#[derive(Debug, Clone)]
pub struct FileSystem {
    root: PathBuf,
}

/// A file entry returned by `list_dir`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsOp {
    ListDir,
    ReadFile,
    CreateFile,
    DeleteFile,
    CreateDir,
    DeleteDir,
}

const ALL_OPS: [FsOp; 6] = [
    FsOp::ListDir,
    FsOp::ReadFile,
    FsOp::CreateFile,
    FsOp::DeleteFile,
    FsOp::CreateDir,
    FsOp::DeleteDir,
];

impl FsOp {
    fn name(self) -> &'static str {
        match self {
            Self::ListDir => "list_dir",
            Self::ReadFile => "read_file",
            Self::CreateFile => "create_file",
            Self::DeleteFile => "delete_file",
            Self::CreateDir => "create_dir",
            Self::DeleteDir => "delete_dir",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::ListDir => "list files and directories recursively at path",
            Self::ReadFile => "read the (text) content of a file at path",
            Self::CreateFile => "create or overwrite file at path with content (text)",
            Self::DeleteFile => "delete a file at path and all empty parent directories",
            Self::CreateDir => "create a directory at path and all missing parent directories",
            Self::DeleteDir => "delete a directory at path and all child files and directories",
        }
    }

    fn schema(self) -> Schema {
        let path = Schema::string().describe("Path relative to the working directory");
        let schema = Schema::object().required_property("path", path);
        match self {
            Self::CreateFile => schema.required_property("content", Schema::string()),
            _ => schema,
        }
        .build()
    }
}

impl FileSystem {
    /// Create the provider, creating `root` if it does not exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(root)
        };

        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve root directory: {}", root.display()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a model-supplied path onto the root. Leading slashes are treated
    /// as relative to the root; `..` is rejected, and so is any existing
    /// prefix of the path that links outside the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let relative = Path::new(path.trim_start_matches(['/', '\\']));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(escapes(path)),
            }
        }

        let mut existing = resolved.as_path();
        loop {
            match existing.canonicalize() {
                Ok(real) if real.starts_with(&self.root) => break,
                Ok(real) => {
                    debug!("{} resolves to {}", path, real.display());
                    return Err(escapes(path));
                }
                Err(_) => match existing.parent() {
                    Some(parent) => existing = parent,
                    None => break,
                },
            }
        }
        Ok(resolved)
    }

    pub async fn list_dir(&self, path: &str) -> Result<Vec<FileInfo>, ToolError> {
        let dir = self.resolve(path)?;
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            if !dir.exists() {
                return Err(ToolError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no such directory: {}", dir.display()),
                )));
            }

            let mut files = Vec::new();
            for entry in WalkDir::new(&dir).sort_by_file_name().into_iter().flatten() {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };

                files.push(FileInfo {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/"),
                    size: metadata.len(),
                    timestamp: metadata
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now()),
                });
            }
            Ok(files)
        })
        .await
        .map_err(|e| ToolError::Io(std::io::Error::other(e)))?
    }

    pub async fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let path = self.resolve(path)?;
        Ok(tokio::fs::read_to_string(path).await?)
    }

    pub async fn create_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        let path = self.resolve(path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Delete a file, then prune parent directories that became empty.
    pub async fn delete_file(&self, path: &str) -> Result<(), ToolError> {
        let path = self.resolve(path)?;
        tokio::fs::remove_file(&path).await?;

        let mut dir = path.parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if tokio::fs::remove_dir(&current).await.is_err() {
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        Ok(())
    }

    pub async fn create_dir(&self, path: &str) -> Result<(), ToolError> {
        let path = self.resolve(path)?;
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    pub async fn delete_dir(&self, path: &str) -> Result<(), ToolError> {
        let path = self.resolve(path)?;
        if path == self.root {
            return Err(ToolError::Forbidden("refusing to delete the working directory".into()));
        }
        tokio::fs::remove_dir_all(path).await?;
        Ok(())
    }
}

fn escapes(path: &str) -> ToolError {
    ToolError::InvalidArguments(format!("path escapes the working directory: {path}"))
}

#[async_trait]
impl ToolProvider for FileSystem {
    async fn tools(&self, _ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>> {
        let fs = Arc::new(self.clone());
        Ok(ALL_OPS
            .iter()
            .map(|&op| {
                Arc::new(FsTool {
                    fs: fs.clone(),
                    op,
                }) as Arc<dyn Tool>
            })
            .collect())
    }
}

struct FsTool {
    fs: Arc<FileSystem>,
    op: FsOp,
}

#[async_trait]
impl Tool for FsTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn schema(&self) -> Schema {
        self.op.schema()
    }

    async fn execute(&self, _ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let path = required_str(&args, "path")?;
        debug!("fs {} {}", self.op.name(), path);

        match self.op {
            FsOp::ListDir => {
                let files = self.fs.list_dir(path).await?;
                let value = serde_json::to_value(files)
                    .map_err(|e| ToolError::Io(std::io::Error::other(e)))?;
                Ok(ToolOutput::Json(value))
            }
            FsOp::ReadFile => Ok(ToolOutput::Text(self.fs.read_file(path).await?)),
            FsOp::CreateFile => {
                let content = required_str(&args, "content")?;
                self.fs.create_file(path, content).await?;
                Ok("file created".into())
            }
            FsOp::DeleteFile => {
                self.fs.delete_file(path).await?;
                Ok("file deleted".into())
            }
            FsOp::CreateDir => {
                self.fs.create_dir(path).await?;
                Ok("directory created".into())
            }
            FsOp::DeleteDir => {
                self.fs.delete_dir(path).await?;
                Ok("directory deleted".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn tool(fs: &FileSystem, name: &str) -> Arc<dyn Tool> {
        fs.tools(&ToolContext::default())
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.name() == name)
            .unwrap()
    }

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_read_and_list_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(dir.path()).unwrap();
        let ctx = ToolContext::default();

        let created = tool(&fs, "create_file")
            .await
            .execute(&ctx, args(json!({ "path": "src/main.rs", "content": "fn main() {}" })))
            .await
            .unwrap();
        assert_eq!(created.into_text(), "file created");

        let read = tool(&fs, "read_file")
            .await
            .execute(&ctx, args(json!({ "path": "/src/main.rs" })))
            .await
            .unwrap();
        assert_eq!(read.into_text(), "fn main() {}");

        let files = fs.list_dir(".").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/main.rs");
        assert_eq!(files[0].name, "main.rs");
        assert_eq!(files[0].size, 12);
    }

    #[tokio::test]
    async fn delete_file_prunes_empty_parents_but_not_root() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(dir.path()).unwrap();

        fs.create_file("a/b/c.txt", "x").await.unwrap();
        fs.delete_file("a/b/c.txt").await.unwrap();

        assert!(!fs.root().join("a").exists());
        assert!(fs.root().exists());
    }

    #[tokio::test]
    async fn parent_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(dir.path()).unwrap();

        let err = fs.read_file("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn links_out_of_the_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "hidden").unwrap();
        let fs = FileSystem::new(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), fs.root().join("link")).unwrap();

        let err = fs.read_file("link/secret.txt").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        let err = fs.create_file("link/new.txt", "x").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        let err = fs.delete_dir("link").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        assert!(outside.path().join("secret.txt").exists());
        assert!(!outside.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn missing_path_argument_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::new(dir.path()).unwrap();

        let err = tool(&fs, "list_dir")
            .await
            .execute(&ToolContext::default(), ToolArgs::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: missing 'path' argument");
    }
}
