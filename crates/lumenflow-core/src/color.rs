//! Color samples and output channel layouts

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Maximum number of output slots in a channel layout.
pub const MAX_LAYOUT_SLOTS: usize = 4;

/// One entity's color state as carried by the eHuB feed.
///
/// All components are raw 8-bit channel values; `w` is optional on the wire
/// and defaults to 0. Values pass through unmodified (no dimming curves).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSample {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
    /// White component; 0 when the feed omits it.
    #[serde(default)]
    pub w: u8,
}

impl ColorSample {
    /// All channels off.
    pub const BLACK: ColorSample = ColorSample { r: 0, g: 0, b: 0, w: 0 };

    /// Create a sample from explicit components.
    pub fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    /// Create an RGB sample with the white channel off.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: 0 }
    }
}

/// A single source component of a [`ColorSample`].
///
/// Serialized as the single letter used by mapping configurations
/// (`"R"`, `"G"`, `"B"`, `"W"`; lowercase accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorComponent {
    /// Red.
    #[serde(rename = "R", alias = "r")]
    Red,
    /// Green.
    #[serde(rename = "G", alias = "g")]
    Green,
    /// Blue.
    #[serde(rename = "B", alias = "b")]
    Blue,
    /// White.
    #[serde(rename = "W", alias = "w")]
    White,
}

impl ColorComponent {
    /// Project this component out of a color sample.
    pub fn sample(self, color: ColorSample) -> u8 {
        match self {
            ColorComponent::Red => color.r,
            ColorComponent::Green => color.g,
            ColorComponent::Blue => color.b,
            ColorComponent::White => color.w,
        }
    }

    /// The configuration letter for this component.
    pub fn letter(self) -> char {
        match self {
            ColorComponent::Red => 'R',
            ColorComponent::Green => 'G',
            ColorComponent::Blue => 'B',
            ColorComponent::White => 'W',
        }
    }
}

/// Ordered DMX output layout for one entity.
///
/// A layout lists which color components an entity drives and in what
/// channel order, e.g. `[R, G, B]` for a three-channel RGB pixel or
/// `[R, G, B, W]` for a four-channel RGBW fixture. The component set is
/// small and closed, so the slots live inline; resolving and writing a
/// layout never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColorComponent>", into = "Vec<ColorComponent>")]
pub struct ChannelLayout {
    slots: [ColorComponent; MAX_LAYOUT_SLOTS],
    len: u8,
}

impl ChannelLayout {
    /// The standard three-channel `[R, G, B]` layout.
    pub fn rgb() -> Self {
        Self {
            slots: [
                ColorComponent::Red,
                ColorComponent::Green,
                ColorComponent::Blue,
                ColorComponent::Red,
            ],
            len: 3,
        }
    }

    /// The four-channel `[R, G, B, W]` layout.
    pub fn rgbw() -> Self {
        Self {
            slots: [
                ColorComponent::Red,
                ColorComponent::Green,
                ColorComponent::Blue,
                ColorComponent::White,
            ],
            len: 4,
        }
    }

    /// A single-channel layout driving one component.
    pub fn single(component: ColorComponent) -> Self {
        Self {
            slots: [component; MAX_LAYOUT_SLOTS],
            len: 1,
        }
    }

    /// Build a layout from an ordered component list.
    ///
    /// Rejects empty lists and lists longer than [`MAX_LAYOUT_SLOTS`].
    pub fn from_components(components: &[ColorComponent]) -> Result<Self, MappingError> {
        if components.is_empty() || components.len() > MAX_LAYOUT_SLOTS {
            return Err(MappingError::BadLayout {
                count: components.len(),
            });
        }
        let mut slots = [ColorComponent::Red; MAX_LAYOUT_SLOTS];
        slots[..components.len()].copy_from_slice(components);
        Ok(Self {
            slots,
            len: components.len() as u8,
        })
    }

    /// Number of DMX channels one entity occupies under this layout.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Layouts always have at least one slot; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The ordered components of this layout.
    pub fn components(&self) -> &[ColorComponent] {
        &self.slots[..self.len as usize]
    }

    /// Project a color sample onto this layout.
    ///
    /// Fills `out[..self.len()]` with the channel bytes in layout order and
    /// returns that prefix.
    pub fn project<'a>(
        &self,
        color: ColorSample,
        out: &'a mut [u8; MAX_LAYOUT_SLOTS],
    ) -> &'a [u8] {
        for (slot, byte) in self.components().iter().zip(out.iter_mut()) {
            *byte = slot.sample(color);
        }
        &out[..self.len as usize]
    }
}

impl TryFrom<Vec<ColorComponent>> for ChannelLayout {
    type Error = MappingError;

    fn try_from(components: Vec<ColorComponent>) -> Result<Self, Self::Error> {
        Self::from_components(&components)
    }
}

impl From<ChannelLayout> for Vec<ColorComponent> {
    fn from(layout: ChannelLayout) -> Self {
        layout.components().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_projection() {
        let color = ColorSample::new(10, 20, 30, 40);
        assert_eq!(ColorComponent::Red.sample(color), 10);
        assert_eq!(ColorComponent::Green.sample(color), 20);
        assert_eq!(ColorComponent::Blue.sample(color), 30);
        assert_eq!(ColorComponent::White.sample(color), 40);
    }

    #[test]
    fn test_layout_lengths() {
        assert_eq!(ChannelLayout::rgb().len(), 3);
        assert_eq!(ChannelLayout::rgbw().len(), 4);
        assert_eq!(ChannelLayout::single(ColorComponent::White).len(), 1);
    }

    #[test]
    fn test_layout_project() {
        let color = ColorSample::new(255, 128, 64, 7);
        let mut scratch = [0u8; MAX_LAYOUT_SLOTS];

        assert_eq!(
            ChannelLayout::rgb().project(color, &mut scratch),
            &[255, 128, 64]
        );
        assert_eq!(
            ChannelLayout::rgbw().project(color, &mut scratch),
            &[255, 128, 64, 7]
        );
        assert_eq!(
            ChannelLayout::single(ColorComponent::Green).project(color, &mut scratch),
            &[128]
        );
    }

    #[test]
    fn test_layout_rejects_bad_sizes() {
        assert_eq!(
            ChannelLayout::from_components(&[]),
            Err(MappingError::BadLayout { count: 0 })
        );

        let too_long = [ColorComponent::Red; 5];
        assert_eq!(
            ChannelLayout::from_components(&too_long),
            Err(MappingError::BadLayout { count: 5 })
        );
    }

    #[test]
    fn test_layout_json_letters() {
        let layout: ChannelLayout = serde_json::from_str(r#"["R", "G", "B"]"#).unwrap();
        assert_eq!(layout, ChannelLayout::rgb());

        // Lowercase letters come from tabular exports.
        let layout: ChannelLayout = serde_json::from_str(r#"["r", "g", "b", "w"]"#).unwrap();
        assert_eq!(layout, ChannelLayout::rgbw());

        let json = serde_json::to_string(&ChannelLayout::rgb()).unwrap();
        assert_eq!(json, r#"["R","G","B"]"#);

        assert!(serde_json::from_str::<ChannelLayout>("[]").is_err());
        assert!(serde_json::from_str::<ChannelLayout>(r#"["X"]"#).is_err());
    }

    #[test]
    fn test_color_sample_default_white() {
        let color: ColorSample = serde_json::from_str(r#"{"r":1,"g":2,"b":3}"#).unwrap();
        assert_eq!(color, ColorSample::rgb(1, 2, 3));

        let color: ColorSample = serde_json::from_str(r#"{"r":1,"g":2,"b":3,"w":4}"#).unwrap();
        assert_eq!(color.w, 4);
    }
}
