use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cas", about = "Content-addressable object store over HTTP", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on; `:PORT` binds all interfaces
    #[arg(long, env = "LISTEN_ADDR", value_parser = parse_bind)]
    pub bind: Option<SocketAddr>,

    /// Directory holding blobs, sidecars and the index
    #[arg(long, env = "STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Accept uploads with an empty body
    #[arg(long)]
    pub allow_empty_body: bool,

    /// Seconds allowed for a client to send request headers
    #[arg(long)]
    pub header_timeout: Option<u64>,
}

fn parse_bind(s: &str) -> Result<SocketAddr, String> {
    cas_server::parse_listen_addr(s).map_err(|e| e.to_string())
}
