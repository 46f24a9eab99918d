use std::env;
use std::process::ExitCode;

use autotoon::assets::{loader_for, MIN_PLACEHOLDER_BYTES, MP4_SIGNATURE};
use autotoon::config::DEFAULT_PLACEHOLDER_ASSET;

/// Validates the placeholder video the dashboard will upload.
/// Usage: check_placeholder [path-or-url]  (defaults to PLACEHOLDER_ASSET)
#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let location = env::args()
        .nth(1)
        .or_else(|| env::var("PLACEHOLDER_ASSET").ok())
        .unwrap_or_else(|| DEFAULT_PLACEHOLDER_ASSET.to_string());

    println!("Checking placeholder video at {}...", location);
    let loader = loader_for(&location);

    let bytes = match loader.fetch().await {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("  - size: {} bytes (minimum {})", bytes.len(), MIN_PLACEHOLDER_BYTES);
    if bytes.len() >= 8 {
        let found = &bytes[4..8];
        println!(
            "  - bytes 4..8: {:02x?} ({})",
            found,
            if found == MP4_SIGNATURE { "ftyp" } else { "expected ftyp" }
        );
    }

    match autotoon::assets::validate_placeholder(&bytes, &loader.source()) {
        Ok(()) => {
            println!("✅ Placeholder is a valid MP4");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
