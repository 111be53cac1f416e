// SPDX-License-Identifier: CEPL-1.0

/// Rotation/flip a display applies to its content.
///
/// Discriminants match the `wl_output.transform` wire values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutputTransform {
    #[default]
    Normal = 0,
    Rotate90 = 1,
    Rotate180 = 2,
    Rotate270 = 3,
    Flipped = 4,
    Flipped90 = 5,
    Flipped180 = 6,
    Flipped270 = 7,
}

impl OutputTransform {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Normal,
            1 => Self::Rotate90,
            2 => Self::Rotate180,
            3 => Self::Rotate270,
            4 => Self::Flipped,
            5 => Self::Flipped90,
            6 => Self::Flipped180,
            7 => Self::Flipped270,
            _ => return None,
        })
    }

    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// True for the 90°/270° family, where buffer width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::Rotate90 | Self::Rotate270 | Self::Flipped90 | Self::Flipped270
        )
    }

    /// Counter-clockwise quarter turns, ignoring the flip.
    pub fn quarter_turns(self) -> u32 {
        self.to_raw() % 4
    }
}

#[cfg(test)]
mod tests {
    use super::OutputTransform;

    #[test]
    fn raw_values_match_the_wire_protocol() {
        for raw in 0..8 {
            let t = OutputTransform::from_raw(raw).unwrap();
            assert_eq!(t.to_raw(), raw);
        }
        assert_eq!(OutputTransform::from_raw(8), None);
    }

    #[test]
    fn only_quarter_rotations_swap_axes() {
        let swapped: Vec<_> = (0..8)
            .filter_map(OutputTransform::from_raw)
            .filter(|t| t.swaps_axes())
            .collect();
        assert_eq!(
            swapped,
            vec![
                OutputTransform::Rotate90,
                OutputTransform::Rotate270,
                OutputTransform::Flipped90,
                OutputTransform::Flipped270,
            ]
        );
    }

    #[test]
    fn flips_share_quarter_turns_with_their_rotation() {
        assert_eq!(OutputTransform::Flipped.quarter_turns(), 0);
        assert_eq!(OutputTransform::Flipped90.quarter_turns(), 1);
        assert_eq!(OutputTransform::Flipped180.quarter_turns(), 2);
        assert_eq!(OutputTransform::Flipped270.quarter_turns(), 3);
    }
}
