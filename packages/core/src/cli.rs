use clap::Parser;

/// Marquee operational control plane CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "marquee-ops",
    version,
    about = "Job scheduler, cache layer, and health monitor for the Marquee backend"
)]
pub struct Cli {
    /// Address the admin API binds to
    #[arg(long)]
    pub bind: Option<String>,

    /// Redis connection URL
    #[arg(long)]
    pub redis_url: Option<String>,

    /// SQLite database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Movie metadata provider base URL
    #[arg(long)]
    pub provider_url: Option<String>,
}
