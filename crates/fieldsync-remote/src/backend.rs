//! `IRemoteBackend` implementation over HTTP

use async_trait::async_trait;
use tracing::{debug, info, warn};

use fieldsync_core::domain::{Credentials, RemoteOperationResult, SessionMaterial};
use fieldsync_core::ports::{CredentialError, IRemoteBackend, RemoteRequest};

use crate::auth::exchange_token;
use crate::classify::{classify_response, classify_transport_error};
use crate::client::BackendClient;
use crate::envelope::SubmitParams;

/// Remote backend reached through the unified JSON-RPC endpoints
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: BackendClient,
}

impl HttpBackend {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }
}

#[async_trait]
impl IRemoteBackend for HttpBackend {
    async fn exchange_credentials(
        &self,
        material: &SessionMaterial,
    ) -> Result<Credentials, CredentialError> {
        exchange_token(&self.client, material).await
    }

    #[tracing::instrument(skip(self, credentials, request), fields(operation = %request.operation))]
    async fn submit(
        &self,
        credentials: &Credentials,
        request: &RemoteRequest,
    ) -> RemoteOperationResult {
        let params = SubmitParams {
            operation: &request.operation,
            data: &request.data,
        };

        let response = match self
            .client
            .post_rpc(
                &credentials.endpoint,
                &request.endpoint.path(),
                &request.endpoint.query(),
                &credentials.token,
                params,
            )
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let outcome = classify_transport_error(&err);
                warn!(error = %err, "Submission got no response");
                return outcome;
            }
        };

        let status = response.status();
        let outcome = match response.bytes().await {
            Ok(body) => classify_response(status, &body),
            Err(err) => classify_transport_error(&err),
        };

        match &outcome {
            RemoteOperationResult::Success { server_id, .. } => {
                debug!(%status, ?server_id, "Submission accepted")
            }
            RemoteOperationResult::BusinessRejection { message, .. } => {
                info!(%status, message = %message, "Submission rejected by backend")
            }
            RemoteOperationResult::NetworkFailure { cause, message } => {
                warn!(%status, %cause, message = %message, "Submission failed without an answer")
            }
        }

        outcome
    }
}
