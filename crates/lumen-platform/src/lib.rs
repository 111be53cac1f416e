// SPDX-License-Identifier: CEPL-1.0
//! Wayland client glue: globals, outputs, the xdg toplevel and seat input.
//!
//! Compositor events are turned into [`lumen_render::WindowEvent`]s and
//! queued for the loop driver; geometry requests come back through
//! [`SurfaceControl`].

mod input;
mod state;
mod window;

pub use window::{SurfaceControl, WaylandWindow, WindowOptions};
