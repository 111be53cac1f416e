// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use clap::Parser;
use lumen_render::PresentMode;
use lumen_render_vk::TearingHint;

#[derive(Parser, Debug)]
#[command(name = "lumen", about = "Spinning triangle on a Wayland surface via Vulkan")]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Buffer swap delay in microseconds
    #[arg(short = 'd', value_name = "US", default_value_t = 0)]
    pub delay_us: u64,

    /// Presentation mode: 0 immediate, 1 mailbox, 2 fifo, 3 fifo relaxed
    #[arg(
        short = 'p',
        value_name = "MODE",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(0..=3)
    )]
    pub present_mode: u32,

    /// Run in fullscreen mode
    #[arg(short = 'f')]
    pub fullscreen: bool,

    /// Use fixed width/height ratio when run in fullscreen mode
    #[arg(short = 'r')]
    pub fixed_ratio: bool,

    /// Run in maximized mode
    #[arg(short = 'm')]
    pub maximized: bool,

    /// Create an opaque surface
    #[arg(short = 'o')]
    pub opaque: bool,

    /// Enable tearing via the tearing_control protocol
    #[arg(short = 't')]
    pub tearing: bool,

    /// Enable and disable tearing every benchmark interval
    #[arg(short = 'T')]
    pub toggle_tearing: bool,
}

impl Args {
    pub fn present_mode(&self) -> PresentMode {
        // the value parser already restricts the range
        PresentMode::try_from(self.present_mode).unwrap_or_default()
    }

    pub fn swap_delay(&self) -> Duration {
        Duration::from_micros(self.delay_us)
    }

    pub fn tearing(&self) -> TearingHint {
        TearingHint {
            enabled: self.tearing || self.toggle_tearing,
            periodic: self.toggle_tearing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("lumen").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_fifo_without_delay() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.present_mode(), PresentMode::Fifo);
        assert_eq!(args.swap_delay(), Duration::ZERO);
        assert!(!args.fullscreen && !args.fixed_ratio && !args.maximized && !args.opaque);
        assert!(!args.tearing().enabled);
    }

    #[test]
    fn present_mode_outside_zero_to_three_is_a_usage_error() {
        assert_eq!(parse(&["-p", "1"]).unwrap().present_mode(), PresentMode::Mailbox);
        assert_eq!(parse(&["-p", "3"]).unwrap().present_mode(), PresentMode::FifoRelaxed);
        assert_eq!(parse(&["-p", "4"]).unwrap_err().kind(), ErrorKind::ValueValidation);
        assert!(parse(&["-p", "x"]).is_err());
    }

    #[test]
    fn periodic_tearing_implies_tearing() {
        let hint = parse(&["-T"]).unwrap().tearing();
        assert!(hint.enabled && hint.periodic);

        let hint = parse(&["-t"]).unwrap().tearing();
        assert!(hint.enabled && !hint.periodic);
    }

    #[test]
    fn flags_combine() {
        let args = parse(&["-d", "1500", "-f", "-r", "-o", "-m"]).unwrap();
        assert_eq!(args.swap_delay(), Duration::from_micros(1500));
        assert!(args.fullscreen && args.fixed_ratio && args.opaque && args.maximized);
    }

    #[test]
    fn help_and_unknown_flags() {
        assert_eq!(parse(&["-h"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse(&["-x"]).unwrap_err().kind(), ErrorKind::UnknownArgument);
    }
}
