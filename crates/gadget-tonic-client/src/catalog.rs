//! Typed wrappers for the catalog calls.

use std::sync::Arc;

use bytes::Bytes;
use gadget_tonic_core::proto::{
    AssetInfo, CreateDeviceRequest, Device, Filter, RateDeviceRequest, RateDeviceResponse,
    SearchDevicesRequest, UploadAssetRequest, UploadAssetResponse, catalog_client,
    upload_asset_request,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Status, transport::Channel};

use crate::credentials::CredentialAgent;

/// Byte size of one upload chunk.
pub const UPLOAD_CHUNK_SIZE: usize = 100 << 10;

/// Catalog client that attaches credentials to every protected call.
pub struct CatalogClient {
    inner: catalog_client::CatalogClient<Channel>,
    credentials: Arc<CredentialAgent>,
}

impl CatalogClient {
    pub fn new(channel: Channel, credentials: Arc<CredentialAgent>) -> Self {
        Self {
            inner: catalog_client::CatalogClient::new(channel),
            credentials,
        }
    }

    /// Creates a device record and returns its (possibly server-assigned)
    /// id. Requires the admin role.
    pub async fn create_device(&mut self, device: Device) -> Result<String, Status> {
        let request = self
            .credentials
            .authenticated(CreateDeviceRequest {
                device: Some(device),
            })
            .await?;

        let response = self.inner.create_device(request).await?;
        Ok(response.into_inner().id)
    }

    /// Collects every device matching the filter. Unprotected: no token is
    /// attached.
    pub async fn search_devices(&mut self, filter: Filter) -> Result<Vec<Device>, Status> {
        let mut stream = self
            .inner
            .search_devices(SearchDevicesRequest {
                filter: Some(filter),
            })
            .await?
            .into_inner();

        let mut devices = Vec::new();
        while let Some(response) = stream.message().await? {
            if let Some(device) = response.device {
                devices.push(device);
            }
        }

        Ok(devices)
    }

    /// Uploads an asset for a device: one info message, then the payload in
    /// [`UPLOAD_CHUNK_SIZE`] chunks. Requires the admin role.
    ///
    /// The feed task runs concurrently with the call itself; if the server
    /// aborts mid-stream (unknown device, size cap), the pending sends fail
    /// quietly and the call's result carries the status.
    pub async fn upload_asset(
        &mut self,
        device_id: &str,
        media_type: &str,
        data: Bytes,
    ) -> Result<UploadAssetResponse, Status> {
        let (tx, rx) = mpsc::channel(8);
        let request = self
            .credentials
            .authenticated(ReceiverStream::new(rx))
            .await?;

        let info = UploadAssetRequest {
            data: Some(upload_asset_request::Data::Info(AssetInfo {
                device_id: device_id.to_string(),
                media_type: media_type.to_string(),
            })),
        };

        tokio::spawn(async move {
            if tx.send(info).await.is_err() {
                return;
            }

            let mut offset = 0;
            while offset < data.len() {
                let end = data.len().min(offset + UPLOAD_CHUNK_SIZE);
                let chunk = UploadAssetRequest {
                    data: Some(upload_asset_request::Data::Chunk(data.slice(offset..end))),
                };

                if tx.send(chunk).await.is_err() {
                    tracing::debug!("server closed the upload stream early");
                    return;
                }

                offset = end;
            }
        });

        let response = self.inner.upload_asset(request).await?;
        Ok(response.into_inner())
    }

    /// Sends a batch of ratings and drains the running-average responses.
    ///
    /// The send direction and the receive direction progress independently:
    /// a task feeds requests (closing the send side when done) while this
    /// call drains responses, and the call completes only once the server
    /// closes its side of the stream.
    pub async fn rate_devices(
        &mut self,
        requests: Vec<RateDeviceRequest>,
    ) -> Result<Vec<RateDeviceResponse>, Status> {
        let (tx, rx) = mpsc::channel(8);
        let request = self
            .credentials
            .authenticated(ReceiverStream::new(rx))
            .await?;

        let mut stream = self.inner.rate_device(request).await?.into_inner();

        let sender = tokio::spawn(async move {
            for message in requests {
                if tx.send(message).await.is_err() {
                    tracing::debug!("server closed the rating stream early");
                    return;
                }
            }
            // Dropping tx signals end-of-input to the server.
        });

        let mut responses = Vec::new();
        while let Some(response) = stream.message().await? {
            responses.push(response);
        }

        let _ = sender.await;
        Ok(responses)
    }
}
