pub mod error;
pub mod snapshot;
pub mod types;

pub use error::{Error, Result};

/// Generated message and service bindings for the `gadget.v1` protobuf
/// package, plus the encoded file descriptor set used for gRPC server
/// reflection.
pub mod proto {
    tonic::include_proto!("gadget.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("gadget_descriptor");
}
