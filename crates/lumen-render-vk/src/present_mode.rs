// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use lumen_render::PresentMode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresentModeError {
    #[error("present mode {requested:?} unsupported (device offers {supported:?})")]
    Unsupported {
        requested: vk::PresentModeKHR,
        supported: Vec<vk::PresentModeKHR>,
    },
}

pub fn to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// Check `requested` against what the device reports for the surface.
/// There is no fallback: an unsupported mode is an error for the caller to
/// treat as fatal.
pub fn validate(
    requested: PresentMode,
    supported: &[vk::PresentModeKHR],
) -> Result<vk::PresentModeKHR, PresentModeError> {
    let mode = to_vk(requested);
    if supported.contains(&mode) {
        Ok(mode)
    } else {
        Err(PresentModeError::Unsupported {
            requested: mode,
            supported: supported.to_vec(),
        })
    }
}

// Info only
pub(crate) fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_mode_passes_through() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(validate(PresentMode::Mailbox, &modes), Ok(vk::PresentModeKHR::MAILBOX));
        assert_eq!(validate(PresentMode::Fifo, &modes), Ok(vk::PresentModeKHR::FIFO));
    }

    #[test]
    fn missing_mode_is_rejected_without_fallback() {
        let modes = [vk::PresentModeKHR::FIFO];
        let err = validate(PresentMode::Immediate, &modes).unwrap_err();
        assert_eq!(
            err,
            PresentModeError::Unsupported {
                requested: vk::PresentModeKHR::IMMEDIATE,
                supported: vec![vk::PresentModeKHR::FIFO],
            }
        );
    }

    #[test]
    fn empty_list_rejects_everything() {
        assert!(validate(PresentMode::Fifo, &[]).is_err());
    }

    #[test]
    fn flag_values_map_to_vulkan_values() {
        for raw in 0..4u32 {
            let mode = PresentMode::try_from(raw).unwrap();
            assert_eq!(to_vk(mode).as_raw(), raw as i32);
        }
    }
}
