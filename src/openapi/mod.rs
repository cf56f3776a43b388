//! OpenAPI documents as tool catalogs.
//!
//! A document (v2 or v3, JSON or YAML, local or remote) is loaded with its
//! references internalized, every operation with an `operationId` becomes an
//! [`Operation`], and the [`Catalog`] exposes those as tools backed by a
//! [`RestExecutor`]. Mutating calls pass through a [`ConfirmGate`].

pub mod catalog;
pub mod confirm;
pub mod document;
pub mod loader;
pub mod operation;
pub mod rest;

#[cfg(test)]
mod test_server;

pub use catalog::Catalog;
pub use confirm::{AutoApprove, Confirm, ConfirmGate, ConsoleConfirm};
pub use document::Document;
pub use loader::load_document;
pub use operation::Operation;
pub use rest::{Credentials, RestClient, RestExecutor, RestRequest, RestResponse};

use thiserror::Error;

/// Catalog construction failures. All are fatal to session startup.
#[derive(Debug, Error)]
pub enum OpenApiError {
    #[error("document unparseable: {0}")]
    Unparseable(String),
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("failed to fetch document: {0}")]
    Fetch(String),
    #[error("unresolvable reference {reference}: {reason}")]
    Reference { reference: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
