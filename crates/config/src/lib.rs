#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Configuration for the Lumen rollup node.

use clap::{
    Parser,
    builder::{
        Styles,
        styling::{AnsiColor, Color, Style},
    },
};

mod chain;
pub use chain::{ChainOpts, StoreOpts};

mod da;
pub use da::DaOpts;

mod node;
pub use node::NodeOpts;

mod telemetry;
pub use telemetry::{LogProvider, TelemetryError, TelemetryOpts};

/// CLI options for the Lumen rollup node.
#[derive(Debug, Clone, Parser)]
#[command(author, version, styles = cli_styles(), about)]
pub struct Opts {
    /// A unique name for this Lumen instance, used in metrics and logs
    #[clap(long, env = "LUMEN_INSTANCE_NAME", default_value = "lumen")]
    pub instance_name: String,
    /// Node-related configuration options
    #[clap(flatten)]
    pub node: NodeOpts,
    /// DA-related configuration options
    #[clap(flatten)]
    pub da: DaOpts,
    /// The genesis configuration for the chain.
    #[clap(flatten)]
    pub chain: ChainOpts,
    /// Storage-related configuration options
    #[clap(flatten)]
    pub store: StoreOpts,
    /// Telemetry-related configuration options
    #[clap(flatten)]
    pub telemetry: TelemetryOpts,
}

/// Styles for the CLI.
const fn cli_styles() -> Styles {
    Styles::styled()
        .usage(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .header(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
        .valid(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

#[cfg(test)]
mod tests {
    use super::Opts;
    use clap::Parser;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }

    #[test]
    fn test_defaults_and_overrides() {
        let opts = Opts::parse_from(["lumen"]);
        assert!(!opts.node.aggregator);
        assert_eq!(opts.node.max_pending_blocks, 0);
        assert_eq!(opts.chain.initial_height, 1);

        let opts = Opts::parse_from([
            "lumen",
            "--node.aggregator",
            "--node.block-time-ms",
            "100",
            "--node.max-pending-blocks",
            "2",
            "--da.block-time-ms",
            "200",
            "--chain.initial-height",
            "42",
        ]);
        assert!(opts.node.aggregator);
        assert_eq!(opts.node.block_time().as_millis(), 100);
        assert_eq!(opts.node.max_pending_blocks, 2);
        assert_eq!(opts.da.block_time().as_millis(), 200);
        assert_eq!(opts.chain.initial_height, 42);
    }

    #[test]
    fn test_zero_initial_height_is_rejected() {
        assert!(Opts::try_parse_from(["lumen", "--chain.initial-height", "0"]).is_err());
    }
}
