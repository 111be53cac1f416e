// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::time::Duration;

use lumen_render::RenderSize;
use serde::Deserialize;
use tracing::warn;

pub const CONFIG_PATH: &str = "lumen.toml";

#[derive(Debug, Deserialize, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub window: WindowCfg,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    /// Seconds between throughput reports (and tearing flips with `-T`).
    #[serde(default = "default_interval")]
    pub benchmark_interval_secs: u64,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            benchmark_interval_secs: default_interval(),
        }
    }
}

impl RenderCfg {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.benchmark_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct WindowCfg {
    #[serde(default = "default_side")]
    pub width: u32,
    #[serde(default = "default_side")]
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            width: default_side(),
            height: default_side(),
        }
    }
}

impl WindowCfg {
    pub fn initial_size(&self) -> RenderSize {
        RenderSize::new(self.width.max(1), self.height.max(1))
    }
}

fn default_clear() -> [f32; 4] {
    [0.0, 0.0, 0.0, 0.5]
}
fn default_interval() -> u64 {
    5
}
fn default_side() -> u32 {
    250
}

pub fn parse_cfg(s: &str) -> AppCfg {
    toml::from_str::<AppCfg>(s).unwrap_or_else(|e| {
        warn!("ignoring malformed {CONFIG_PATH}: {e}");
        AppCfg::default()
    })
}

pub fn load_cfg() -> AppCfg {
    match fs::read_to_string(CONFIG_PATH) {
        Ok(s) => parse_cfg(&s),
        Err(_) => AppCfg::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_cfg("");
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 0.5]);
        assert_eq!(cfg.render.report_interval(), Duration::from_secs(5));
        assert_eq!(cfg.window.initial_size(), RenderSize::new(250, 250));
    }

    #[test]
    fn sections_override_independently() {
        let cfg = parse_cfg(
            r#"
            [render]
            benchmark_interval_secs = 2

            [window]
            width = 640
            "#,
        );
        assert_eq!(cfg.render.report_interval(), Duration::from_secs(2));
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 0.5]);
        assert_eq!(cfg.window.initial_size(), RenderSize::new(640, 250));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let cfg = parse_cfg("[render]\nclear_color = \"red\"\n");
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn zero_values_are_clamped() {
        let cfg = parse_cfg("[render]\nbenchmark_interval_secs = 0\n[window]\nwidth = 0\nheight = 0\n");
        assert_eq!(cfg.render.report_interval(), Duration::from_secs(1));
        assert_eq!(cfg.window.initial_size(), RenderSize::new(1, 1));
    }
}
