//! HTTP Ranger command line reader
//!
//! Fetches a byte window of a remote resource with range requests and
//! writes it to stdout.

use http_ranger::{CancelScope, RangerConfig, ResourceBuilder};
use std::env;
use std::io::SeekFrom;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

/// Main entry point
///
/// # Usage
/// ```bash
/// # Print the whole resource
/// http-ranger https://example.com/file.bin
///
/// # Print 1024 bytes starting at offset 4096, with a config file
/// http-ranger https://example.com/file.bin 4096 1024 ranger.yaml
/// ```
#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only the resource bytes
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <url> [offset] [length] [config.yaml]", args[0]);
        std::process::exit(2);
    }

    let url = &args[1];
    let offset = parse_arg(args.get(2), "offset").unwrap_or(0);
    let length = parse_arg(args.get(3), "length");

    let config = match args.get(4) {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            match RangerConfig::from_file(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!("Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => RangerConfig::default(),
    };

    if let Err(e) = run(url, offset, length, config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_arg(arg: Option<&String>, name: &str) -> Option<u64> {
    let arg = arg?;
    match arg.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            eprintln!("invalid {}: {}", name, arg);
            std::process::exit(2);
        }
    }
}

async fn run(
    url: &str,
    offset: u64,
    length: Option<u64>,
    config: RangerConfig,
) -> http_ranger::Result<()> {
    let scope = CancelScope::new();
    let builder = ResourceBuilder::from_config(config)?;
    let resource = builder.build(url, &scope).await?;
    info!("Resource length: {} bytes", resource.len());

    let mut reader = resource.reader(&scope);
    reader.seek(SeekFrom::Start(offset))?;

    let remaining = resource.len() - offset;
    let limit = length.map_or(remaining, |length| length.min(remaining));
    let mut stdout = tokio::io::stdout();
    let copied = tokio::io::copy(&mut (&mut reader).take(limit), &mut stdout).await?;
    info!("Wrote {} bytes from offset {}", copied, offset);

    reader.close();
    Ok(())
}
