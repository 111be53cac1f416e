// SPDX-License-Identifier: CEPL-1.0
//! Pure decoding of wire values, kept apart from the dispatch impls.

use lumen_math::OutputTransform;
use lumen_render::WindowStates;
use wayland_client::protocol::wl_output;
use wayland_client::WEnum;
use wayland_protocols::xdg::shell::client::xdg_toplevel;

// evdev codes
pub(crate) const KEY_ESC: u32 = 1;
pub(crate) const KEY_F11: u32 = 87;
pub(crate) const BTN_LEFT: u32 = 0x110;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Close,
    ToggleFullscreen,
}

pub(crate) fn key_action(key: u32) -> Option<KeyAction> {
    match key {
        KEY_ESC => Some(KeyAction::Close),
        KEY_F11 => Some(KeyAction::ToggleFullscreen),
        _ => None,
    }
}

/// `preferred_scale` arrives in 1/120 units.
pub(crate) fn fractional_from_wire(wire: u32) -> f64 {
    f64::from(wire) / 120.0
}

pub(crate) fn output_transform(transform: WEnum<wl_output::Transform>) -> OutputTransform {
    let raw = match transform {
        WEnum::Value(t) => u32::from(t),
        WEnum::Unknown(raw) => raw,
    };
    OutputTransform::from_raw(raw).unwrap_or_default()
}

/// Bind or drop a seat device so it follows its capability bit.
///
/// Seats are bound at version 1, which has no release request; dropping the
/// proxy is all a lost capability needs.
pub(crate) fn track_capability<P>(slot: &mut Option<P>, advertised: bool, bind: impl FnOnce() -> P) {
    match (advertised, slot.is_some()) {
        (true, false) => *slot = Some(bind()),
        (false, true) => *slot = None,
        _ => {}
    }
}

/// The toplevel state array is a packed list of native-endian u32s.
pub(crate) fn toplevel_states(raw: &[u8]) -> WindowStates {
    let mut states = WindowStates::empty();
    for chunk in raw.chunks_exact(4) {
        let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match xdg_toplevel::State::try_from(value) {
            Ok(xdg_toplevel::State::Fullscreen) => states |= WindowStates::FULLSCREEN,
            Ok(xdg_toplevel::State::Maximized) => states |= WindowStates::MAXIMIZED,
            _ => {}
        }
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn states_pick_out_fullscreen_and_maximized() {
        // 1 maximized, 2 fullscreen, 4 activated
        assert_eq!(toplevel_states(&pack(&[4])), WindowStates::empty());
        assert_eq!(toplevel_states(&pack(&[1, 4])), WindowStates::MAXIMIZED);
        assert_eq!(
            toplevel_states(&pack(&[2, 1])),
            WindowStates::FULLSCREEN | WindowStates::MAXIMIZED
        );
        assert_eq!(toplevel_states(&[]), WindowStates::empty());
    }

    #[test]
    fn fractional_scale_is_in_120ths() {
        assert_eq!(fractional_from_wire(120), 1.0);
        assert_eq!(fractional_from_wire(180), 1.5);
    }

    #[test]
    fn transforms_decode_known_and_unknown_values() {
        assert_eq!(
            output_transform(WEnum::Value(wl_output::Transform::_90)),
            OutputTransform::Rotate90
        );
        assert_eq!(
            output_transform(WEnum::Value(wl_output::Transform::Flipped270)),
            OutputTransform::Flipped270
        );
        assert_eq!(output_transform(WEnum::Unknown(42)), OutputTransform::Normal);
    }

    #[test]
    fn seat_devices_follow_capabilities() {
        let mut slot: Option<u32> = None;
        let mut binds = 0;
        let mut bind = || {
            binds += 1;
            binds
        };

        track_capability(&mut slot, true, &mut bind);
        assert_eq!(slot, Some(1));
        // already held: no rebind
        track_capability(&mut slot, true, &mut bind);
        assert_eq!(slot, Some(1));

        track_capability(&mut slot, false, &mut bind);
        assert_eq!(slot, None);
        track_capability(&mut slot, false, &mut bind);
        assert_eq!(slot, None);

        track_capability(&mut slot, true, &mut bind);
        assert_eq!(slot, Some(2));
    }

    #[test]
    fn only_escape_and_f11_are_bound() {
        assert_eq!(key_action(KEY_ESC), Some(KeyAction::Close));
        assert_eq!(key_action(KEY_F11), Some(KeyAction::ToggleFullscreen));
        assert_eq!(key_action(30), None);
    }
}
