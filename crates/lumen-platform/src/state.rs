// SPDX-License-Identifier: CEPL-1.0
use lumen_render::{OutputId, WindowEvent, WindowStates};
use tracing::{debug, info};
use wayland_client::protocol::{
    wl_compositor, wl_keyboard, wl_output, wl_pointer, wl_registry, wl_seat, wl_surface, wl_touch,
};
use wayland_client::{delegate_noop, Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::wp::fractional_scale::v1::client::{
    wp_fractional_scale_manager_v1, wp_fractional_scale_v1,
};
use wayland_protocols::wp::tearing_control::v1::client::{
    wp_tearing_control_manager_v1, wp_tearing_control_v1,
};
use wayland_protocols::wp::viewporter::client::{wp_viewport, wp_viewporter};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::input::{self, KeyAction, BTN_LEFT};

/// Everything the event queue dispatches into.
///
/// Handlers only translate; window-level decisions happen in
/// `lumen_render::WindowState` once the queued events are drained.
#[derive(Default)]
pub(crate) struct ClientState {
    pub compositor: Option<wl_compositor::WlCompositor>,
    pub wm_base: Option<xdg_wm_base::XdgWmBase>,
    pub seat: Option<wl_seat::WlSeat>,
    pub viewporter: Option<wp_viewporter::WpViewporter>,
    pub fractional_manager: Option<wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1>,
    pub tearing_manager: Option<wp_tearing_control_manager_v1::WpTearingControlManagerV1>,
    pub toplevel: Option<xdg_toplevel::XdgToplevel>,
    pointer: Option<wl_pointer::WlPointer>,
    keyboard: Option<wl_keyboard::WlKeyboard>,
    touch: Option<wl_touch::WlTouch>,
    outputs: Vec<(u32, wl_output::WlOutput)>,
    /// Set once the first `xdg_surface.configure` has been acked.
    pub configured: bool,
    fullscreen: bool,
    events: Vec<WindowEvent>,
}

impl ClientState {
    pub fn take_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.events)
    }

    fn push(&mut self, event: WindowEvent) {
        self.events.push(event);
    }

    fn start_move(&self, serial: u32) {
        if let (Some(toplevel), Some(seat)) = (&self.toplevel, &self.seat) {
            toplevel._move(seat, serial);
        }
    }

    fn toggle_fullscreen(&self) {
        let Some(toplevel) = &self.toplevel else {
            return;
        };
        if self.fullscreen {
            toplevel.unset_fullscreen();
        } else {
            toplevel.set_fullscreen(None);
        }
    }

    pub fn release_input(&mut self) {
        self.pointer.take();
        self.keyboard.take();
        self.touch.take();
        self.outputs.clear();
    }
}

fn output_id(output: &wl_output::WlOutput) -> Option<OutputId> {
    output.data::<u32>().map(|name| OutputId(*name))
}

impl Dispatch<wl_registry::WlRegistry, ()> for ClientState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match interface.as_str() {
                "wl_compositor" => {
                    state.compositor = Some(registry.bind(name, version.min(4), qh, ()));
                }
                "xdg_wm_base" => state.wm_base = Some(registry.bind(name, 1, qh, ())),
                "wl_seat" => state.seat = Some(registry.bind(name, 1, qh, ())),
                "wl_output" if version >= 2 => {
                    let output: wl_output::WlOutput = registry.bind(name, 2, qh, name);
                    state.outputs.push((name, output));
                    state.push(WindowEvent::OutputAdded(OutputId(name)));
                }
                "wl_output" => debug!(name, version, "skipping wl_output below version 2"),
                "wp_tearing_control_manager_v1" => {
                    state.tearing_manager = Some(registry.bind(name, 1, qh, ()));
                }
                "wp_viewporter" => state.viewporter = Some(registry.bind(name, 1, qh, ())),
                "wp_fractional_scale_manager_v1" => {
                    state.fractional_manager = Some(registry.bind(name, 1, qh, ()));
                }
                _ => {}
            },
            wl_registry::Event::GlobalRemove { name } => {
                if let Some(pos) = state.outputs.iter().position(|(n, _)| *n == name) {
                    state.outputs.swap_remove(pos);
                    state.push(WindowEvent::OutputRemoved(OutputId(name)));
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_output::WlOutput, u32> for ClientState {
    fn event(
        state: &mut Self,
        _: &wl_output::WlOutput,
        event: wl_output::Event,
        name: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let output = OutputId(*name);
        match event {
            wl_output::Event::Geometry { transform, .. } => {
                let transform = input::output_transform(transform);
                state.push(WindowEvent::OutputGeometryChanged { output, transform });
            }
            wl_output::Event::Scale { factor } => {
                state.push(WindowEvent::OutputScaleChanged {
                    output,
                    scale: factor,
                });
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &wl_surface::WlSurface,
        event: wl_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_surface::Event::Enter { output } => {
                if let Some(id) = output_id(&output) {
                    state.push(WindowEvent::OutputEntered(id));
                }
            }
            wl_surface::Event::Leave { output } => {
                if let Some(id) = output_id(&output) {
                    state.push(WindowEvent::OutputLeft(id));
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ClientState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for ClientState {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            state.configured = true;
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure {
                width,
                height,
                states,
            } => {
                let states = input::toplevel_states(&states);
                state.fullscreen = states.contains(WindowStates::FULLSCREEN);
                state.push(WindowEvent::ToplevelConfigured {
                    width,
                    height,
                    states,
                });
            }
            xdg_toplevel::Event::Close => state.push(WindowEvent::ToplevelClosed),
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for ClientState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(caps),
        } = event
        else {
            return;
        };
        debug!(?caps, "seat capabilities");
        input::track_capability(
            &mut state.pointer,
            caps.contains(wl_seat::Capability::Pointer),
            || seat.get_pointer(qh, ()),
        );
        input::track_capability(
            &mut state.keyboard,
            caps.contains(wl_seat::Capability::Keyboard),
            || seat.get_keyboard(qh, ()),
        );
        input::track_capability(
            &mut state.touch,
            caps.contains(wl_seat::Capability::Touch),
            || seat.get_touch(qh, ()),
        );
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for ClientState {
    fn event(
        state: &mut Self,
        pointer: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            // No cursor theme is loaded; fullscreen just hides the pointer.
            wl_pointer::Event::Enter { serial, .. } if state.fullscreen => {
                pointer.set_cursor(serial, None, 0, 0);
            }
            wl_pointer::Event::Button {
                serial,
                button: BTN_LEFT,
                state: WEnum::Value(wl_pointer::ButtonState::Pressed),
                ..
            } => state.start_move(serial),
            _ => {}
        }
    }
}

impl Dispatch<wl_touch::WlTouch, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &wl_touch::WlTouch,
        event: wl_touch::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_touch::Event::Down { serial, .. } = event {
            state.start_move(serial);
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let wl_keyboard::Event::Key {
            key,
            state: WEnum::Value(wl_keyboard::KeyState::Pressed),
            ..
        } = event
        else {
            return;
        };
        match input::key_action(key) {
            Some(KeyAction::Close) => {
                info!("escape pressed, closing");
                state.push(WindowEvent::ToplevelClosed);
            }
            Some(KeyAction::ToggleFullscreen) => state.toggle_fullscreen(),
            None => {}
        }
    }
}

impl Dispatch<wp_fractional_scale_v1::WpFractionalScaleV1, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &wp_fractional_scale_v1::WpFractionalScaleV1,
        event: wp_fractional_scale_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wp_fractional_scale_v1::Event::PreferredScale { scale } = event {
            state.push(WindowEvent::FractionalScaleChanged {
                scale: input::fractional_from_wire(scale),
            });
        }
    }
}

delegate_noop!(ClientState: wl_compositor::WlCompositor);
delegate_noop!(ClientState: wp_viewporter::WpViewporter);
delegate_noop!(ClientState: wp_viewport::WpViewport);
delegate_noop!(ClientState: wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1);
delegate_noop!(ClientState: wp_tearing_control_manager_v1::WpTearingControlManagerV1);
delegate_noop!(ClientState: wp_tearing_control_v1::WpTearingControlV1);
