use clap::Parser;

/// walkie: push-to-talk voice channels over direct peer links.
#[derive(Parser, Debug)]
#[command(name = "walkie", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Signaling relay URL override (ws:// or wss://).
    #[arg(short, long)]
    pub server: Option<String>,

    /// Channel to join once connected.
    #[arg(short, long)]
    pub channel: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_config_flag() {
        let args = Args::try_parse_from(["walkie", "--print-config"]).unwrap();
        assert!(args.print_config);

        let args = Args::try_parse_from(["walkie", "-c", "room1"]).unwrap();
        assert!(!args.print_config);
        assert_eq!(args.channel.as_deref(), Some("room1"));
    }
}
