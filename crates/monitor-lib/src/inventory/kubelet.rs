//! Kubelet pod-resources inventory client
//!
//! Talks to the kubelet's `PodResourcesLister` gRPC service over its unix
//! socket. The channel is created once and reused for every call.

use super::{flatten_response, InventorySource};
use crate::error::InventoryError;
use crate::models::DeviceAssignment;
use crate::proto::{ListPodResourcesRequest, PodResourcesListerClient};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{debug, info};

/// Default location of the pod-resources socket
pub const DEFAULT_KUBELET_SOCKET: &str = "unix:///var/lib/kubelet/pod-resources/kubelet.sock";

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted response size (16 MiB)
const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Resolve `unix:///path` or `/path` to a socket path
pub fn parse_socket_path(endpoint: &str) -> Result<PathBuf, InventoryError> {
    let invalid = |reason: &str| InventoryError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let path = match endpoint.strip_prefix("unix://") {
        Some(path) => path,
        None if endpoint.contains("://") => return Err(invalid("only unix sockets are supported")),
        None => endpoint,
    };

    if !path.starts_with('/') {
        return Err(invalid("socket path must be absolute"));
    }

    Ok(PathBuf::from(path))
}

/// Inventory source backed by the kubelet pod-resources API
#[derive(Debug, Clone)]
pub struct KubeletInventory {
    client: PodResourcesListerClient<Channel>,
    socket_path: PathBuf,
    timeout: Duration,
}

impl KubeletInventory {
    /// Create a lazily connected client; the socket is dialed on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(endpoint: &str, timeout: Duration) -> Result<Self, InventoryError> {
        let socket_path = parse_socket_path(endpoint)?;
        let connector_path = socket_path.clone();

        // The URI is ignored by the connector below
        let channel = Endpoint::from_static("http://[::]:50051")
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect_with_connector_lazy(service_fn(move |_: Uri| {
                UnixStream::connect(connector_path.clone())
            }));

        info!(socket = %socket_path.display(), "Created kubelet pod-resources client");

        Ok(Self {
            client: PodResourcesListerClient::new(channel).max_decoding_message_size(MAX_RESPONSE_SIZE),
            socket_path,
            timeout,
        })
    }

    /// Path of the kubelet socket
    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl InventorySource for KubeletInventory {
    async fn list_assignments(&self) -> Result<Vec<DeviceAssignment>, InventoryError> {
        let mut client = self.client.clone();
        let request = tonic::Request::new(ListPodResourcesRequest {});

        let response = tokio::time::timeout(self.timeout, client.list(request))
            .await
            .map_err(|_| InventoryError::Timeout(self.timeout))??
            .into_inner();

        debug!(
            pods = response.pod_resources.len(),
            response = ?response,
            "Received pod resources from kubelet"
        );

        Ok(flatten_response(response))
    }
}
