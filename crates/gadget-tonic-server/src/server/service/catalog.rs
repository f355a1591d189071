//! The catalog gRPC service.
//!
//! Implements the four call shapes over the backing stores:
//!
//! - `CreateDevice` (unary) - validates or assigns the UUID, then performs
//!   the create-once insert.
//! - `SearchDevices` (server-streaming) - predicate-filtered snapshot of
//!   the catalog, streamed one device at a time.
//! - `UploadAsset` (client-streaming) - accumulates chunks up to the hard
//!   size cap, then persists the payload under a generated id.
//! - `RateDevice` (bidirectional-streaming) - one running-average response
//!   per rating request, until either side ends the stream.
//!
//! Streaming handlers poll the call deadline cooperatively (before each
//! send or receive); client aborts surface as receive/send failures at the
//! same points, and work in flight between polls runs to completion.

use core::pin::Pin;
use std::sync::Arc;

use bytes::BytesMut;
use gadget_tonic_core::{
    Error,
    proto::{
        CreateDeviceRequest, CreateDeviceResponse, RateDeviceRequest, RateDeviceResponse,
        SearchDevicesRequest, SearchDevicesResponse, UploadAssetRequest, UploadAssetResponse,
        catalog_server::Catalog, upload_asset_request,
    },
    types::MAX_ASSET_SIZE,
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use uuid::Uuid;

use crate::server::{
    config::ServerConfig,
    context::CallDeadline,
    store::{AssetStore, CatalogStore, RatingAggregator},
};

/// The catalog service: orchestrates the stores behind the four RPCs.
#[derive(Clone)]
pub struct CatalogService {
    config: ServerConfig,
    catalog: Arc<CatalogStore>,
    assets: Arc<AssetStore>,
    ratings: Arc<RatingAggregator>,
}

impl CatalogService {
    pub fn new(
        config: ServerConfig,
        catalog: Arc<CatalogStore>,
        assets: Arc<AssetStore>,
        ratings: Arc<RatingAggregator>,
    ) -> Self {
        Self {
            config,
            catalog,
            assets,
            ratings,
        }
    }
}

#[tonic::async_trait]
impl Catalog for CatalogService {
    /// Creates one device record.
    ///
    /// A non-empty id must parse as a UUID; an empty id gets a fresh v4.
    /// The deadline is checked once, immediately before the store write, so
    /// an already-dead call never touches the store.
    async fn create_device(
        &self,
        request: Request<CreateDeviceRequest>,
    ) -> Result<Response<CreateDeviceResponse>, Status> {
        let deadline = CallDeadline::from_metadata(request.metadata());

        let mut device = request
            .into_inner()
            .device
            .ok_or_else(|| Error::InvalidRequest {
                reason: "missing device record".to_string(),
            })
            .map_err(Status::from)?;

        if device.id.is_empty() {
            device.id = Uuid::new_v4().to_string();
        } else if Uuid::parse_str(&device.id).is_err() {
            return Err(Error::InvalidRequest {
                reason: format!("device id {} is not a valid UUID", device.id),
            }
            .into());
        }

        deadline.check()?;

        let id = device.id.clone();
        self.catalog.save(device).map_err(|e| match e {
            Error::AlreadyExists { .. } => e,
            other => Error::Storage {
                context: format!("cannot save device: {other}"),
            },
        })?;

        tracing::info!(%id, "saved device");
        Ok(Response::new(CreateDeviceResponse { id }))
    }

    type SearchDevicesStream =
        Pin<Box<dyn Stream<Item = Result<SearchDevicesResponse, Status>> + Send>>;

    /// Streams every device matching the filter.
    ///
    /// The store is traversed once under the shared lock into a snapshot;
    /// streaming happens after the lock is released, with the deadline
    /// polled before each send. Stopping early (deadline passed or client
    /// gone) is not an error.
    async fn search_devices(
        &self,
        request: Request<SearchDevicesRequest>,
    ) -> Result<Response<Self::SearchDevicesStream>, Status> {
        let deadline = CallDeadline::from_metadata(request.metadata());
        let filter = request.into_inner().filter.unwrap_or_default();
        tracing::debug!(?filter, "received a search request");

        let mut matches = Vec::new();
        self.catalog.search(&filter, || deadline.exceeded(), |device| {
            matches.push(device);
            Ok(())
        })?;

        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            for device in matches {
                if deadline.exceeded() {
                    tracing::debug!("search stream stopped: deadline exceeded");
                    break;
                }

                let id = device.id.clone();
                let response = SearchDevicesResponse {
                    device: Some(device),
                };

                if tx.send(Ok(response)).await.is_err() {
                    // Client went away mid-stream; nothing left to do.
                    break;
                }

                tracing::debug!(%id, "sent device");
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    /// Receives an asset as an info message followed by chunks.
    ///
    /// The cumulative size is capped at [`MAX_ASSET_SIZE`]; crossing the cap
    /// aborts the stream and nothing is persisted. On clean end-of-input
    /// the accumulated payload is handed to the asset store and the single
    /// response carries the generated id and total size.
    async fn upload_asset(
        &self,
        request: Request<Streaming<UploadAssetRequest>>,
    ) -> Result<Response<UploadAssetResponse>, Status> {
        let deadline = CallDeadline::from_metadata(request.metadata());
        let mut stream = request.into_inner();

        let first = stream
            .message()
            .await
            .map_err(recv_error)?
            .ok_or_else(|| Error::InvalidRequest {
                reason: "missing asset info".to_string(),
            })
            .map_err(Status::from)?;

        let info = match first.data {
            Some(upload_asset_request::Data::Info(info)) => info,
            _ => {
                return Err(Error::InvalidRequest {
                    reason: "first message must carry asset info".to_string(),
                }
                .into());
            }
        };

        if self.catalog.find(&info.device_id).is_none() {
            return Err(Error::InvalidRequest {
                reason: format!("device id {} doesn't exist", info.device_id),
            }
            .into());
        }

        tracing::debug!(
            device = %info.device_id,
            media_type = %info.media_type,
            "receiving an asset upload"
        );

        let mut data = BytesMut::new();

        loop {
            deadline.check()?;

            let Some(message) = stream.message().await.map_err(recv_error)? else {
                break;
            };

            let chunk = match message.data {
                Some(upload_asset_request::Data::Chunk(chunk)) => chunk,
                _ => {
                    return Err(Error::InvalidRequest {
                        reason: "expected a data chunk".to_string(),
                    }
                    .into());
                }
            };

            if data.len() + chunk.len() > MAX_ASSET_SIZE {
                return Err(Error::AssetTooLarge {
                    size: data.len() + chunk.len(),
                    limit: MAX_ASSET_SIZE,
                }
                .into());
            }

            data.extend_from_slice(&chunk);
        }

        let size = data.len() as u32;
        let id = self
            .assets
            .save(&info.device_id, &info.media_type, data.freeze())
            .await?;

        tracing::info!(%id, size, "saved asset");
        Ok(Response::new(UploadAssetResponse { id, size }))
    }

    type RateDeviceStream = Pin<Box<dyn Stream<Item = Result<RateDeviceResponse, Status>> + Send>>;

    /// Answers each rating request with the device's updated running
    /// average. End-of-input ends the stream cleanly; an unknown device or
    /// a transport failure is terminal for the stream.
    async fn rate_device(
        &self,
        request: Request<Streaming<RateDeviceRequest>>,
    ) -> Result<Response<Self::RateDeviceStream>, Status> {
        let deadline = CallDeadline::from_metadata(request.metadata());
        let mut stream = request.into_inner();

        let catalog = Arc::clone(&self.catalog);
        let ratings = Arc::clone(&self.ratings);
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);

        tokio::spawn(async move {
            loop {
                if let Err(e) = deadline.check() {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }

                let message = match stream.message().await {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        tracing::debug!("no more rating requests");
                        return;
                    }
                    Err(status) => {
                        let err = recv_error(status);
                        tracing::warn!("cannot receive rating request: {err}");
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };

                let RateDeviceRequest { device_id, score } = message;
                tracing::debug!(%device_id, score, "received a rating request");

                if catalog.find(&device_id).is_none() {
                    let _ = tx
                        .send(Err(Error::NotFound { id: device_id }.into()))
                        .await;
                    return;
                }

                let rating = ratings.add(&device_id, score);
                let response = RateDeviceResponse {
                    device_id,
                    rated_count: rating.count,
                    average_score: rating.average(),
                };

                if tx.send(Ok(response)).await.is_err() {
                    // Client stopped reading responses.
                    return;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

/// Classifies a failed stream receive: client cancellation and deadline
/// expiry keep their codes, anything else is a transport failure.
fn recv_error(status: Status) -> Status {
    match status.code() {
        tonic::Code::Cancelled => Error::Canceled.into(),
        tonic::Code::DeadlineExceeded => Error::DeadlineExceeded.into(),
        _ => Error::Transport {
            context: status.message().to_string(),
        }
        .into(),
    }
}
