//! Command line and environment configuration for the demo server.

use clap::Parser;
use std::net::IpAddr;

/// L402 demo server.
///
/// Every value can also come from the environment, or from a `.env` file in the working
/// directory.
#[derive(Parser, Debug, Clone)]
#[command(name = "l402-axum-demo")]
#[command(about = "Axum server with routes gated behind L402 payments")]
pub struct Config {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,
    /// Port to bind to
    #[arg(long, short, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    /// Payment request returned with every challenge
    #[arg(long, env = "L402_INVOICE", default_value = "lnbcrt10u1demo")]
    pub invoice: String,
    /// Location written into minted macaroons
    #[arg(long, env = "L402_LOCATION", default_value = "l402-axum-demo")]
    pub location: String,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }
}
