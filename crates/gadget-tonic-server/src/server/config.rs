use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;

/// Runtime configuration for the `gadget-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables, with
/// defaults suitable for local development. The token secret MUST be
/// overridden in any real deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gadget-tonic-server",
    version,
    about = "A role-gated gRPC service for the gadget device catalog"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Symmetric secret used to sign and verify access tokens.
    ///
    /// Environment variable: `TOKEN_SECRET`
    #[arg(long, env = "TOKEN_SECRET", default_value_t = String::from("secret"))]
    pub token_secret: String,

    /// Lifetime of an issued access token, in seconds.
    ///
    /// Clients are expected to refresh before this elapses; the server
    /// rejects expired tokens with no leeway.
    ///
    /// Environment variable: `TOKEN_TTL_SECS`
    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = 900)]
    pub token_ttl_secs: u64,

    /// Directory uploaded asset payloads are written beneath.
    ///
    /// Environment variable: `ASSET_DIR`
    #[arg(long, env = "ASSET_DIR", default_value_t = String::from("tmp/assets"))]
    pub asset_dir: String,

    /// Capacity of the response buffer between a streaming handler and the
    /// gRPC stream.
    ///
    /// Lower values increase backpressure responsiveness; higher values
    /// enable deeper pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,
}

/// Validated server configuration derived from [`CliArgs`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub token_secret: String,
    pub token_ttl: Duration,
    pub asset_dir: PathBuf,
    pub stream_buffer_size: usize,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.token_secret.is_empty() {
            bail!("TOKEN_SECRET must not be empty");
        }

        if args.token_ttl_secs == 0 {
            bail!("TOKEN_TTL_SECS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            token_secret: args.token_secret,
            token_ttl: Duration::from_secs(args.token_ttl_secs),
            asset_dir: PathBuf::from(args.asset_dir),
            stream_buffer_size: args.stream_buffer_size,
        })
    }
}
