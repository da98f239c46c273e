//! Build script for generating the kubelet pod-resources client
//!
//! Generation only runs with the `proto-gen` feature and a reachable protoc.
//! Otherwise the checked-in message definitions in `src/proto` are used.

use std::path::PathBuf;
use std::process::Command;

const PROTO_FILE: &str = "../../proto/podresources/v1alpha1/api.proto";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed={}", PROTO_FILE);

    if std::env::var_os("CARGO_FEATURE_PROTO_GEN").is_none() {
        return Ok(());
    }

    let protoc_available =
        std::env::var("PROTOC").is_ok() || Command::new("protoc").arg("--version").output().is_ok();

    if !protoc_available {
        println!("cargo:warning=protoc not found, skipping proto generation");
        println!("cargo:warning=Install protoc or set PROTOC env var to generate proto code");
        return Ok(());
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    // The exporter only ever talks to the kubelet, never serves the API
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .out_dir(&out_dir)
        .compile(&[PROTO_FILE], &["../../proto"])?;

    Ok(())
}
