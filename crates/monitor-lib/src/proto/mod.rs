//! Kubelet pod-resources API types
//!
//! With the `proto-gen` feature the client is generated by tonic-build from
//! `proto/podresources/v1alpha1/api.proto`. Without it, the equivalent message
//! and client definitions below are compiled instead.

#[cfg(feature = "proto-gen")]
pub mod v1alpha1 {
    tonic::include_proto!("v1alpha1");
}

#[cfg(not(feature = "proto-gen"))]
pub mod v1alpha1 {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct ListPodResourcesRequest {}

    #[derive(Clone, PartialEq, Message)]
    pub struct ListPodResourcesResponse {
        #[prost(message, repeated, tag = "1")]
        pub pod_resources: Vec<PodResources>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct PodResources {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub namespace: String,
        #[prost(message, repeated, tag = "3")]
        pub containers: Vec<ContainerResources>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct ContainerResources {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(message, repeated, tag = "2")]
        pub devices: Vec<ContainerDevices>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct ContainerDevices {
        #[prost(string, tag = "1")]
        pub resource_name: String,
        #[prost(string, repeated, tag = "2")]
        pub device_ids: Vec<String>,
    }

    pub mod pod_resources_lister_client {
        use super::*;
        use tonic::codegen::*;

        #[derive(Debug, Clone)]
        pub struct PodResourcesListerClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl PodResourcesListerClient<tonic::transport::Channel> {
            pub fn new(channel: tonic::transport::Channel) -> Self {
                let inner = tonic::client::Grpc::new(channel);
                Self { inner }
            }
        }

        impl<T> PodResourcesListerClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + Send,
        {
            /// Limits the maximum size of a decoded message.
            #[must_use]
            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.inner = self.inner.max_decoding_message_size(limit);
                self
            }

            pub async fn list(
                &mut self,
                request: impl tonic::IntoRequest<ListPodResourcesRequest>,
            ) -> Result<tonic::Response<ListPodResourcesResponse>, tonic::Status> {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path =
                    http::uri::PathAndQuery::from_static("/v1alpha1.PodResourcesLister/List");
                self.inner.unary(request.into_request(), path, codec).await
            }
        }
    }
}

pub use v1alpha1::pod_resources_lister_client::PodResourcesListerClient;
pub use v1alpha1::*;
