use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::PixelFormat;

/// An 8-bit RGB colour, written as `#RRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const GREEN: Color = Color::new(0, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the leading `#` is optional, digits are
    /// case-insensitive).
    pub fn from_hex(hex: &str) -> Result<Self, FaceScanError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FaceScanError::InvalidParameter(format!(
                "colour must look like #RRGGBB, got '{hex}'"
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| {
                FaceScanError::InvalidParameter(format!("colour '{hex}': {e}"))
            })
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Canonical uppercase `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Channel values in the order `format` stores them.
    ///
    /// Gray targets get the BT.601 luma of the colour.
    pub fn channels_for(self, format: PixelFormat) -> Vec<u8> {
        match format {
            PixelFormat::Rgb => vec![self.r, self.g, self.b],
            PixelFormat::Bgr => vec![self.b, self.g, self.r],
            PixelFormat::Gray => vec![crate::imaging::image_codec::luma(self.r, self.g, self.b)],
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::GREEN
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = FaceScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = FaceScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::green("#00FF00")]
    #[case::black("#000000")]
    #[case::white("#FFFFFF")]
    #[case::mixed("#1A2B3C")]
    #[case::orange("#FF8800")]
    fn test_hex_round_trip(#[case] hex: &str) {
        assert_eq!(Color::from_hex(hex).unwrap().to_hex(), hex);
    }

    #[test]
    fn test_green_channels() {
        let c = Color::from_hex("#00FF00").unwrap();
        assert_eq!(c, Color::GREEN);
    }

    #[test]
    fn test_without_hash_and_lowercase() {
        let c = Color::from_hex("ff8000").unwrap();
        assert_eq!(c, Color::new(255, 128, 0));
        assert_eq!(c.to_hex(), "#FF8000");
    }

    #[rstest]
    #[case::empty("")]
    #[case::short("#FFF")]
    #[case::long("#FFFFFFF")]
    #[case::not_hex("#GG0000")]
    #[case::sign("#+F0000")]
    fn test_malformed_hex_rejected(#[case] hex: &str) {
        assert!(matches!(
            Color::from_hex(hex),
            Err(FaceScanError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_channels_follow_format_order() {
        let c = Color::new(10, 20, 30);
        assert_eq!(c.channels_for(PixelFormat::Rgb), vec![10, 20, 30]);
        assert_eq!(c.channels_for(PixelFormat::Bgr), vec![30, 20, 10]);
        assert_eq!(c.channels_for(PixelFormat::Gray).len(), 1);
    }

    #[test]
    fn test_serde_uses_hex_string() {
        let json = serde_json::to_string(&Color::new(255, 0, 0)).unwrap();
        assert_eq!(json, "\"#FF0000\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::new(255, 0, 0));
        assert!(serde_json::from_str::<Color>("\"red\"").is_err());
    }
}
