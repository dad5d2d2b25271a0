//! Interactive chat client example
//!
//! Run with: cargo run --example chat_client -- USER_ID [SERVER_ADDR]
//!
//! Examples:
//!   cargo run --example chat_client -- alice                # connects to 127.0.0.1:8080
//!   cargo run --example chat_client -- bob localhost:9090
//!
//! The client opens a subscriber stream and prints every relayed message,
//! its own included. Lines typed on stdin are published to everyone
//! connected; each publish returns once the relay has fanned out.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};

use relay_rs::client::{ClientConfig, ConsoleSink, RelayClient};

/// Parse server address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9090" -> 127.0.0.1:9090
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "192.168.1.5:9090" -> 192.168.1.5:9090
fn parse_server_addr(arg: &str) -> Result<SocketAddr, String> {
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
        "Invalid server address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: chat_client USER_ID [SERVER_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  USER_ID      Identity to chat as (display name defaults to User-<id>)");
    eprintln!("  SERVER_ADDR  Relay server to connect to (default: 127.0.0.1:8080)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  chat_client alice");
    eprintln!("  chat_client bob localhost:9090");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let user_id = match args.get(1) {
        Some(id) => id.clone(),
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    let server_addr = match args.get(2) {
        Some(addr_str) => match parse_server_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "127.0.0.1:8080".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_rs=info".parse()?),
        )
        .init();

    let config = ClientConfig::new(server_addr, &user_id);
    let client = RelayClient::new(config);

    let mut subscription = client.subscribe().await?;
    println!("Connected to {} as {}", server_addr, user_id);
    println!("Type a message and press Enter to send it; Ctrl+C to leave.");

    // Deliveries print from their own task so typing never stalls the stream
    let mut listen_task = tokio::spawn(async move {
        let mut sink = ConsoleSink;
        if let Err(e) = subscription
            .run_until(std::future::pending(), &mut sink)
            .await
        {
            eprintln!("Stream error: {}", e);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = &mut listen_task => {
                println!("Server closed the stream");
                return Ok(());
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    let content = line.trim();
                    if content.is_empty() {
                        continue;
                    }
                    if let Err(e) = client.publish(content).await {
                        eprintln!("Failed to send message: {}", e);
                        break;
                    }
                }
                // stdin closed
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nLeaving the chat...");
                break;
            }
        }
    }

    listen_task.abort();
    Ok(())
}
