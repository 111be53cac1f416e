// SPDX-License-Identifier: CEPL-1.0
use std::ffi::c_void;
use std::io::ErrorKind;
use std::ptr::NonNull;

use anyhow::{anyhow, Context, Result};
use lumen_render::{OutputTransform, RenderSize, SurfaceSink, WindowEvent};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle,
    RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle, WindowHandle,
};
use tracing::{debug, info};
use wayland_client::backend::WaylandError;
use wayland_client::protocol::{wl_output, wl_surface};
use wayland_client::{Connection, EventQueue, Proxy};
use wayland_protocols::wp::fractional_scale::v1::client::wp_fractional_scale_v1;
use wayland_protocols::wp::tearing_control::v1::client::wp_tearing_control_v1;
use wayland_protocols::wp::viewporter::client::wp_viewport;
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel};

use crate::state::ClientState;

const TITLE: &str = "lumen";
const APP_ID: &str = "org.lumen.simple-vulkan";

#[derive(Clone, Copy, Debug, Default)]
pub struct WindowOptions {
    pub fullscreen: bool,
    pub maximized: bool,
    /// Attach tearing control and start with the async hint.
    pub tearing: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StartupState {
    Floating,
    Fullscreen,
    Maximized,
}

impl WindowOptions {
    /// Fullscreen wins when both are asked for.
    fn startup_state(&self) -> StartupState {
        if self.fullscreen {
            StartupState::Fullscreen
        } else if self.maximized {
            StartupState::Maximized
        } else {
            StartupState::Floating
        }
    }
}

/// One xdg toplevel on its own event queue.
///
/// Drop the renderer before this: the Vulkan surface borrows `surface`.
pub struct WaylandWindow {
    conn: Connection,
    queue: EventQueue<ClientState>,
    state: ClientState,
    surface: wl_surface::WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    viewport: Option<wp_viewport::WpViewport>,
    fractional: Option<wp_fractional_scale_v1::WpFractionalScaleV1>,
    tearing: Option<wp_tearing_control_v1::WpTearingControlV1>,
}

impl WaylandWindow {
    /// Connect via `WAYLAND_DISPLAY`, bind globals, map the toplevel and
    /// block until the first configure has been acked.
    pub fn open(opts: WindowOptions) -> Result<Self> {
        let conn = Connection::connect_to_env().context("connecting to the Wayland display")?;
        let mut queue = conn.new_event_queue();
        let qh = queue.handle();
        conn.display().get_registry(&qh, ());

        let mut state = ClientState::default();
        queue.roundtrip(&mut state).context("initial registry roundtrip")?;

        let compositor = state
            .compositor
            .clone()
            .ok_or_else(|| anyhow!("compositor does not advertise wl_compositor"))?;
        let wm_base = state
            .wm_base
            .clone()
            .ok_or_else(|| anyhow!("compositor does not advertise xdg_wm_base"))?;

        let surface = compositor.create_surface(&qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, ());
        let toplevel = xdg_surface.get_toplevel(&qh, ());
        toplevel.set_title(TITLE.to_owned());
        toplevel.set_app_id(APP_ID.to_owned());
        match opts.startup_state() {
            StartupState::Fullscreen => toplevel.set_fullscreen(None),
            StartupState::Maximized => toplevel.set_maximized(),
            StartupState::Floating => {}
        }
        state.toplevel = Some(toplevel);

        // The viewport only pays off together with a fractional scale source.
        let (viewport, fractional) = match (&state.viewporter, &state.fractional_manager) {
            (Some(viewporter), Some(manager)) => (
                Some(viewporter.get_viewport(&surface, &qh, ())),
                Some(manager.get_fractional_scale(&surface, &qh, ())),
            ),
            _ => {
                debug!("fractional scaling unavailable");
                (None, None)
            }
        };

        let tearing = match (&state.tearing_manager, opts.tearing) {
            (Some(manager), true) => {
                let control = manager.get_tearing_control(&surface, &qh, ());
                control.set_presentation_hint(wp_tearing_control_v1::PresentationHint::Async);
                Some(control)
            }
            (None, true) => {
                info!("compositor lacks wp_tearing_control_manager_v1; tearing hint ignored");
                None
            }
            _ => None,
        };

        surface.commit();
        while !state.configured {
            queue
                .blocking_dispatch(&mut state)
                .context("waiting for the first configure")?;
        }

        Ok(Self {
            conn,
            queue,
            state,
            surface,
            xdg_surface,
            viewport,
            fractional,
            tearing,
        })
    }

    /// Non-blocking: flush requests, read whatever is on the socket and
    /// dispatch it into the pending event list.
    pub fn pump(&mut self) -> Result<()> {
        self.queue.flush()?;
        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.queue.dispatch_pending(&mut self.state)?;
        Ok(())
    }

    /// Events queued since the last call, in arrival order.
    pub fn drain_events(&mut self) -> Vec<WindowEvent> {
        self.state.take_events()
    }

    pub fn surface_control(&mut self) -> SurfaceControl<'_> {
        SurfaceControl {
            surface: &self.surface,
            viewport: self.viewport.as_ref(),
            tearing: self.tearing.as_ref(),
        }
    }
}

impl Drop for WaylandWindow {
    fn drop(&mut self) {
        if let Some(toplevel) = self.state.toplevel.take() {
            toplevel.destroy();
        }
        self.xdg_surface.destroy();
        if let Some(viewport) = self.viewport.take() {
            viewport.destroy();
        }
        if let Some(fractional) = self.fractional.take() {
            fractional.destroy();
        }
        if let Some(tearing) = self.tearing.take() {
            tearing.destroy();
        }
        self.surface.destroy();
        self.state.release_input();
        let _ = self.conn.flush();
    }
}

impl HasDisplayHandle for WaylandWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        let display = NonNull::new(self.conn.backend().display_ptr().cast::<c_void>())
            .ok_or(HandleError::Unavailable)?;
        let raw = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display));
        // SAFETY: the display outlives `self`, which the returned borrow is tied to.
        Ok(unsafe { DisplayHandle::borrow_raw(raw) })
    }
}

impl HasWindowHandle for WaylandWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        let surface = NonNull::new(self.surface.id().as_ptr().cast::<c_void>())
            .ok_or(HandleError::Unavailable)?;
        let raw = RawWindowHandle::Wayland(WaylandWindowHandle::new(surface));
        // SAFETY: `surface` is destroyed only in `Drop`.
        Ok(unsafe { WindowHandle::borrow_raw(raw) })
    }
}

/// Borrowed view of the surface-side objects geometry requests go to.
pub struct SurfaceControl<'a> {
    surface: &'a wl_surface::WlSurface,
    viewport: Option<&'a wp_viewport::WpViewport>,
    tearing: Option<&'a wp_tearing_control_v1::WpTearingControlV1>,
}

impl SurfaceSink for SurfaceControl<'_> {
    fn set_buffer_transform(&mut self, transform: OutputTransform) {
        if let Ok(transform) = wl_output::Transform::try_from(transform.to_raw()) {
            self.surface.set_buffer_transform(transform);
        }
    }

    fn set_buffer_scale(&mut self, scale: i32) {
        self.surface.set_buffer_scale(scale);
    }

    fn set_viewport_destination(&mut self, size: RenderSize) {
        if let Some(viewport) = self.viewport {
            viewport.set_destination(size.width as i32, size.height as i32);
        }
    }

    fn set_tearing(&mut self, enabled: bool) -> bool {
        use wp_tearing_control_v1::PresentationHint;
        let Some(tearing) = self.tearing else {
            return false;
        };
        let hint = if enabled {
            PresentationHint::Async
        } else {
            PresentationHint::Vsync
        };
        tearing.set_presentation_hint(hint);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullscreen_takes_precedence_over_maximized() {
        let both = WindowOptions { fullscreen: true, maximized: true, tearing: false };
        assert_eq!(both.startup_state(), StartupState::Fullscreen);

        let max = WindowOptions { maximized: true, ..Default::default() };
        assert_eq!(max.startup_state(), StartupState::Maximized);
        assert_eq!(WindowOptions::default().startup_state(), StartupState::Floating);
    }
}
