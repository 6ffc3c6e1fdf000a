use std::path::PathBuf;

use clap::Parser;
use pulse_config::PulseConfig;

/// Run a scripted bridge session against a simulated survey player.
#[derive(Parser, Debug)]
#[command(name = "pulse-preview", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Frame src, absolute or relative to the host origin.
    #[arg(long, default_value = "/player/index.html")]
    pub src: String,

    /// Survey to present.
    #[arg(short, long, default_value = "1234")]
    pub survey: String,

    /// Theme stylesheet to apply before presenting.
    #[arg(long)]
    pub theme: Option<String>,

    /// Brand color token applied with the theme.
    #[arg(long)]
    pub brand: Option<String>,

    /// Move the widget here before presenting (BR, BL, TR, TL).
    #[arg(long)]
    pub placement: Option<String>,

    /// Mount a frame that never answers.
    #[arg(long)]
    pub unresponsive: bool,

    /// Delay before the simulated widget finishes loading, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub widget_delay_ms: u64,

    /// Reject ack timeouts instead of resolving them with the last status.
    #[arg(long)]
    pub strict_acks: bool,

    /// Log every envelope sent and received.
    #[arg(long)]
    pub debug: bool,

    /// How long the survey stays up before it is dismissed, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub linger_ms: u64,
}

impl Args {
    /// Fold the command-line switches into `config`.
    pub fn apply_to(&self, config: &mut PulseConfig) {
        if self.strict_acks {
            config.bridge.compat_implicit_ack = false;
        }
        if self.debug {
            config.bridge.debug = true;
            config.player.debug = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_the_happy_path() {
        let args = Args::try_parse_from(["pulse-preview"]).unwrap();
        assert_eq!(args.survey, "1234");
        assert_eq!(args.src, "/player/index.html");
        assert!(!args.unresponsive);
        assert_eq!(args.widget_delay_ms, 0);
    }

    #[test]
    fn switches_override_config() {
        let args =
            Args::try_parse_from(["pulse-preview", "--strict-acks", "--debug", "-s", "77"])
                .unwrap();
        let mut config = PulseConfig::default();
        args.apply_to(&mut config);
        assert!(!config.bridge.compat_implicit_ack);
        assert!(config.bridge.debug);
        assert!(config.player.debug);
        assert_eq!(args.survey, "77");
    }
}
