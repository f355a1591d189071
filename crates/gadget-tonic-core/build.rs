/// Builds the gRPC client and server code for the `gadget.proto` definition
/// using `tonic-prost-build`.
///
/// The `chunk` field of `UploadAssetRequest` is mapped to `Bytes` (from the
/// `bytes` crate) instead of the default `Vec<u8>`, so upload chunks are
/// moved out of the decoded message without copying. A file descriptor set
/// is emitted alongside the generated code for gRPC server reflection.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("gadget_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .bytes([".gadget.v1.UploadAssetRequest.chunk"])
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/gadget.proto"], &["proto"])
        .unwrap();
}
