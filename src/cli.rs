use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "fx-dashboard")]
#[command(about = "Forex dashboard statistics refresher", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration
    #[arg(env = "FX_DASHBOARD_CONFIG", default_value = "fx_dashboard.toml")]
    pub config: PathBuf,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Refresh only this symbol instead of every configured one
    #[arg(long)]
    pub symbol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from(["fx-dashboard", "conf/live.toml", "--once", "--symbol", "USDJPY"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("conf/live.toml"));
        assert!(cli.once);
        assert_eq!(cli.symbol.as_deref(), Some("USDJPY"));
    }

    #[test]
    fn test_watch_mode_is_default() {
        let cli = Cli::try_parse_from(["fx-dashboard", "a.toml"]).unwrap();
        assert!(!cli.once);
        assert!(cli.symbol.is_none());
    }
}
