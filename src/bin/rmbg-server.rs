//! Background removal HTTP server
//!
//! Serves `GET /` and `POST /rmbg` on top of the rmbg-server library with
//! support for ONNX Runtime and Tract backends.

#[cfg(feature = "cli")]
use rmbg_server::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
