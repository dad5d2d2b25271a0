//! Broadcast relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:8080
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example relay_server 127.0.0.1:9090     # binds to 127.0.0.1:9090
//!
//! Join from other terminals:
//!   cargo run --example chat_client -- alice
//!   cargo run --example chat_client -- bob
//!
//! Every message a client publishes is relayed to every connected client,
//! and the publisher's call returns only after the fan-out has settled.

use std::net::SocketAddr;

use relay_rs::{RelayServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9090" -> 127.0.0.1:9090
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9090" -> 0.0.0.0:9090
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    // Try parsing as SocketAddr first (includes port)
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    // Try parsing as IP address without port
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  relay_server                     # binds to 0.0.0.0:8080");
    eprintln!("  relay_server localhost           # binds to 127.0.0.1:8080");
    eprintln!("  relay_server localhost:9090      # binds to 127.0.0.1:9090");
    eprintln!("  relay_server 0.0.0.0:9090        # binds to 0.0.0.0:9090");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_rs=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    println!("Starting relay server on {}", config.bind_addr);
    println!();
    println!("=== Join the chat ===");
    println!("cargo run --example chat_client -- alice");
    println!(
        "cargo run --example chat_client -- bob localhost:{}",
        config.bind_addr.port()
    );
    println!();

    let server = RelayServer::new(config);

    // Ctrl+C retires every subscriber before the process exits
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    server.run_until(shutdown).await?;

    let stats = server.stats().snapshot();
    println!(
        "Served {} connections: {} publishes, {} deliveries, {} failed",
        stats.connections_accepted,
        stats.messages_published,
        stats.messages_delivered,
        stats.deliveries_failed,
    );

    Ok(())
}
