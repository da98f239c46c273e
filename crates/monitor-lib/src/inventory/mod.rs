//! Device inventory sources
//!
//! The inventory reports which devices are allocated to which containers on
//! this node. The kubelet pod-resources implementation lives in [`kubelet`].

mod kubelet;

pub use kubelet::{parse_socket_path, KubeletInventory, DEFAULT_KUBELET_SOCKET, DEFAULT_TIMEOUT};

use crate::error::InventoryError;
use crate::models::DeviceAssignment;
use crate::proto::ListPodResourcesResponse;

use async_trait::async_trait;

/// Snapshot lookup of the node's device assignments
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// List every device assignment on the node, of every resource type
    async fn list_assignments(&self) -> Result<Vec<DeviceAssignment>, InventoryError>;
}

/// Flatten the pods -> containers -> devices -> ids tree, keeping delivered order
pub fn flatten_response(response: ListPodResourcesResponse) -> Vec<DeviceAssignment> {
    let mut assignments = Vec::new();

    for pod in response.pod_resources {
        for container in pod.containers {
            for devices in container.devices {
                for device_id in devices.device_ids {
                    assignments.push(DeviceAssignment {
                        pod_name: pod.name.clone(),
                        pod_namespace: pod.namespace.clone(),
                        container_name: container.name.clone(),
                        resource_name: devices.resource_name.clone(),
                        device_id,
                    });
                }
            }
        }
    }

    assignments
}
