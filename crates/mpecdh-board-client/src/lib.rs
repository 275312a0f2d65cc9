//! Ceremony Board Client
//!
//! Client library for running a participant against the ceremony board
//! service.

use mpecdh_board::wire::{
    BlockingResponse, CreateRequest, ErrorBody, QueueResponse, SubmitRequest, SubmitResponse,
};
use mpecdh_core::channel::{async_trait, Channel};
use mpecdh_core::{
    CeremonyInfo, Element, Error, IdentitySigner, InstanceId, ParticipantId, Prep, Result,
    ThresholdApproval,
};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP client bound to one ceremony instance
#[derive(Debug, Clone)]
pub struct BoardClient {
    /// HTTP client
    client: Client,
    /// Board service URL
    url: String,
    /// Instance this client talks to
    instance: InstanceId,
    /// Request timeout
    timeout: Duration,
}

impl BoardClient {
    /// Create a client for an existing instance
    pub fn new(url: &str, instance: InstanceId) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            instance,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create an instance on the board and bind a client to it
    #[instrument(skip(req))]
    pub async fn create(url: &str, req: &CreateRequest) -> Result<(Self, CeremonyInfo)> {
        let url = url.trim_end_matches('/');
        let request = Client::new()
            .post(format!("{}/v1/ceremonies", url))
            .json(req)
            .timeout(Duration::from_secs(30));
        let info: CeremonyInfo = send(request, url).await?;
        debug!(instance = %info.instance, "Ceremony created");
        Ok((Self::new(url, info.instance), info))
    }

    /// Instance this client talks to
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Mailbox of the participant at ring index `index`
    pub async fn queue(&self, index: usize) -> Result<Vec<Element>> {
        let resp: QueueResponse = self.get(&format!("queue/{}", index)).await?;
        Ok(resp.elements)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/ceremonies/{}/{}", self.url, self.instance, path)
            .trim_end_matches('/')
            .to_string()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.endpoint(path))).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.client.post(self.endpoint(path)).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        send(request.timeout(self.timeout), &self.url).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(format!("board at {}", url))
        } else {
            Error::Relay(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Relay(e.to_string()))?;
        return Err(match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => body.into_error(),
            Err(_) => Error::Relay(format!("request failed with status: {}", status)),
        });
    }

    response
        .json()
        .await
        .map_err(|e| Error::Deserialization(e.to_string()))
}

#[async_trait]
impl Channel for BoardClient {
    async fn info(&self) -> Result<CeremonyInfo> {
        self.get("").await
    }

    async fn prep(&self, participant: &ParticipantId) -> Result<Prep> {
        self.get(&format!("prep/{}", participant)).await
    }

    async fn blocking(&self) -> Result<Vec<ParticipantId>> {
        let resp: BlockingResponse = self.get("blocking").await?;
        Ok(resp.blocking)
    }

    #[instrument(skip(self, signer, element), fields(instance = %self.instance))]
    async fn submit(
        &self,
        signer: &dyn IdentitySigner,
        epoch: u64,
        round: usize,
        element: Element,
    ) -> Result<usize> {
        let req = SubmitRequest::sign(signer, &self.instance, epoch, round, element)?;
        let resp: SubmitResponse = self.post("submit", &req).await?;
        debug!(round = resp.round, status = %resp.status, "Contribution accepted");
        Ok(resp.round)
    }

    async fn reset(&self, approval: &ThresholdApproval) -> Result<()> {
        let info: CeremonyInfo = self.post("reset", approval).await?;
        debug!(epoch = info.epoch, "Ceremony reset");
        Ok(())
    }
}
