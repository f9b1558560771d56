//! Identifier resolution
//!
//! Rewrites client-generated temporary identifiers in an outgoing request to
//! the server identifiers assigned since. Identifiers that cannot be
//! resolved yet are sent unchanged; the backend resolves them on its side.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use fieldsync_core::domain::LocalId;
use fieldsync_core::ports::{Endpoint, ILocalStore, RemoteRequest};

use crate::error::MappingError;
use crate::registry::EntityMapping;

/// What the resolver did to one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Payload fields rewritten to server ids
    pub resolved: Vec<String>,
    /// Payload fields still holding a temporary id
    pub unresolved: Vec<String>,
    /// Whether the update target was rewritten
    pub target_resolved: bool,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Resolves temporary identifiers through the local store
pub struct IdentifierResolver {
    store: Arc<dyn ILocalStore>,
}

impl IdentifierResolver {
    pub fn new(store: Arc<dyn ILocalStore>) -> Self {
        Self { store }
    }

    /// Resolves foreign-key fields and the update target of `request` in place
    pub async fn resolve(
        &self,
        mapping: &EntityMapping,
        request: &mut RemoteRequest,
    ) -> Result<ResolutionReport, MappingError> {
        let mut report = ResolutionReport::default();

        for (local_field, target) in mapping.foreign_keys() {
            let field = mapping.remote_field(local_field);
            let Some(value) = request.data.get_mut(field) else {
                continue;
            };
            let Some(LocalId::Temporary(uuid)) = LocalId::from_value(value) else {
                continue;
            };

            match self.store.find_server_id(target, &uuid).await? {
                Some(server_id) => {
                    trace!(field, %uuid, server_id, "Resolved foreign key");
                    *value = Value::from(server_id);
                    report.resolved.push(field.to_string());
                }
                None => {
                    trace!(field, %uuid, "Foreign key left for server-side resolution");
                    report.unresolved.push(field.to_string());
                }
            }
        }

        if let Endpoint::Update { record_id, .. } = &mut request.endpoint {
            if let LocalId::Temporary(uuid) = *record_id {
                if let Some(server_id) = self
                    .store
                    .find_server_id(mapping.entity_type(), &uuid)
                    .await?
                {
                    *record_id = LocalId::Server(server_id);
                    report.target_resolved = true;
                }
            }
        }

        if !report.resolved.is_empty() || !report.unresolved.is_empty() {
            debug!(
                entity_type = %mapping.entity_type(),
                resolved = ?report.resolved,
                unresolved = ?report.unresolved,
                "Identifier resolution"
            );
        }

        Ok(report)
    }
}
