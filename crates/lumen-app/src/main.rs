// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use lumen_core::{init_tracing, CancelToken};
use lumen_platform::{WaylandWindow, WindowOptions};
use lumen_render::{FrameDriver, WindowState};
use lumen_render_vk::{VkRenderer, VkSettings};
use tracing::info;

mod cli;
mod config;
mod signal;

use cli::Args;
use config::{load_cfg, AppCfg};

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_cfg();
    run(&args, &cfg)
}

fn run(args: &Args, cfg: &AppCfg) -> Result<()> {
    let cancel = CancelToken::new();

    let tearing = args.tearing();
    let mut window = WaylandWindow::open(WindowOptions {
        fullscreen: args.fullscreen,
        maximized: args.maximized,
        tearing: tearing.enabled,
    })?;

    let mut state = WindowState::new(cfg.window.initial_size(), args.fixed_ratio, cancel.clone());
    for event in window.drain_events() {
        state.dispatch(event);
    }
    let size = state.resolve(&mut window.surface_control());

    let settings = VkSettings {
        present_mode: args.present_mode(),
        opaque: args.opaque,
        clear_color: cfg.render.clear_color,
        report_interval: cfg.render.report_interval(),
        tearing,
    };
    let mut renderer = VkRenderer::new(&window, &window, size, &settings)?;
    let mut driver = FrameDriver::new(size, args.swap_delay());

    signal::install().context("installing SIGINT handler")?;

    while !cancel.is_cancelled() {
        window.pump()?;
        for event in window.drain_events() {
            state.dispatch(event);
        }
        signal::forward(&cancel);
        if cancel.is_cancelled() {
            break;
        }
        driver.frame(&mut state, &mut renderer, &mut window.surface_control())?;
    }

    info!("lumen exiting");
    // The Vulkan surface must go before the wl_surface it was made from.
    drop(renderer);
    drop(window);
    Ok(())
}
