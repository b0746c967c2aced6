//! gRPC front door for the admission controller.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::AdmissionServiceImpl;

// Include the generated protobuf code
pub mod proto {
    pub mod turnstile {
        pub mod v1 {
            tonic::include_proto!("turnstile.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::turnstile::v1::{
    admission_service_server::AdmissionServiceServer, AdmitRequest, AdmitResponse,
    StatusRequest, StatusResponse,
};
