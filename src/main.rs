use color_eyre::eyre::{Result, WrapErr};
use serial_http_bridge::{Bridge, BridgeConfig, BridgeServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [SERIAL_PORT] [HTTP_PORT] [BAUD_RATE]");
    eprintln!("  SERIAL_PORT: Serial device of the board (default: /dev/ttyACM0)");
    eprintln!("  HTTP_PORT:   Local port to serve HTTP on (default: 5030)");
    eprintln!("  BAUD_RATE:   Serial line speed (default: 115200)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {program}                          # /dev/ttyACM0, http://localhost:5030");
    eprintln!("  {program} /dev/ttyACM1             # Different serial device");
    eprintln!("  {program} COM3 8080 115200         # Windows port, HTTP on 8080");
    eprintln!();
    eprintln!("Set RUST_LOG to adjust logging (default: serial_http_bridge=info)");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("serial_http_bridge=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args
        .first()
        .map(String::as_str)
        .unwrap_or("serial-http-bridge");

    if args.iter().skip(1).any(|arg| arg == "-h" || arg == "--help") {
        print_usage(program);
        return Ok(());
    }

    let config = match BridgeConfig::from_args(args.iter().skip(1).cloned()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            print_usage(program);
            std::process::exit(1);
        }
    };

    info!(
        serial_port = %config.serial.port,
        baud_rate = config.serial.baud_rate,
        address = %config.http.bind_addr,
        response_timeout_ms = config.response_timeout.as_millis() as u64,
        "Starting serial HTTP bridge"
    );

    let bridge = Bridge::new(config);
    bridge
        .run()
        .await
        .wrap_err("Serial HTTP bridge failed")?;

    Ok(())
}
