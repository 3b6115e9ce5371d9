//! Web server command.

use std::net::{SocketAddr, ToSocketAddrs};

use console::style;

use crate::config::Settings;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;

/// Start the web server.
pub async fn cmd_serve(settings: Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or(&settings.bind).to_string();
    let (host, port) = parse_bind_address(&bind);
    let addr = resolve(&host, port)?;

    println!(
        "{} Starting vehinfo server at http://{}",
        style("→").cyan(),
        addr
    );
    println!(
        "  {} Results are written to {}",
        style("→").dim(),
        settings.results_dir.display()
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, addr).await
}

fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Could not resolve bind address {}:{}", host, port))
}

/// Parse a bind address that can be:
/// - Just a port: "8080" -> 127.0.0.1:8080
/// - Just a host: "0.0.0.0" -> 0.0.0.0:5000
/// - Host and port: "0.0.0.0:8080" -> 0.0.0.0:8080
fn parse_bind_address(bind: &str) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return (DEFAULT_HOST.to_string(), port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port);
        }
    }

    (bind.to_string(), DEFAULT_PORT)
}
