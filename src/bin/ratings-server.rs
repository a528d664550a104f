//! Ratings API Server Binary
//!
//! Run with: `cargo run --bin ratings-server`

use strength::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing is initialized in run_server(); RUST_LOG controls the level:
    //   RUST_LOG=debug cargo run --bin ratings-server
    //   RUST_LOG=strength::calendar=debug cargo run --bin ratings-server

    let config = ServerConfig::from_env()?;

    println!("Starting Ratings API Server...");
    println!("   Host: {}", config.host);
    println!("   Port: {}", config.port);
    println!("   Backend: {:?}", config.rating.backend);
    println!("   Data dir: {}", config.rating.data_dir.display());
    println!();
    println!("Available endpoints:");
    println!("  GET  /health                         - Health check");
    println!("  GET  /ratings/c1                     - Mean volatility");
    println!("  GET  /ratings/c2                     - Volatility change");
    println!("  GET  /ratings/c3                     - Volume change");
    println!("  GET  /ratings/combined               - All three ratings");
    println!("  GET  /ratings/:rating/last-update    - Dataset freshness");
    println!("  GET  /instruments/:token             - Resolve a code");
    println!();

    run_server(config).await?;

    Ok(())
}
