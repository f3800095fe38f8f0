//! Deployment API client

use crate::errors::ClientError;
use crate::http::client::HttpClient;
use crate::models::deployment::{DeployRequest, DeployResponse};

impl HttpClient {
    /// Submit a deployment request.
    ///
    /// A successful response only means the server accepted the work;
    /// the outcome arrives via the event stream.
    pub async fn submit_deployment(
        &self,
        request: &DeployRequest,
    ) -> Result<DeployResponse, ClientError> {
        let response: DeployResponse = self.post("/api/deploy", request).await?;
        Ok(response)
    }
}
