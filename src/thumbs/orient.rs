//! EXIF orientation extraction and correction.
//!
//! Cameras record how the sensor was held instead of rotating pixel data;
//! the eight orientation codes map to the transforms below, applied before
//! any scaling so the thumbnail matches what the photographer saw.

use image::DynamicImage;

/// The eight standard EXIF orientation transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    MirroredHorizontal,
    Rotated180,
    MirroredVertical,
    MirroredHorizontalRotated270,
    Rotated90,
    MirroredHorizontalRotated90,
    Rotated270,
}

impl Orientation {
    /// Map an EXIF orientation code to its transform. Codes outside 1..=8
    /// (and the identity code 1) mean no correction.
    pub const fn from_code(code: u32) -> Self {
        match code {
            2 => Self::MirroredHorizontal,
            3 => Self::Rotated180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalRotated270,
            6 => Self::Rotated90,
            7 => Self::MirroredHorizontalRotated90,
            8 => Self::Rotated270,
            _ => Self::Normal,
        }
    }

    /// Apply the correction to a decoded image.
    #[must_use]
    pub fn correct(&self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::MirroredHorizontal => img.fliph(),
            Self::Rotated180 => img.rotate180(),
            Self::MirroredVertical => img.flipv(),
            Self::MirroredHorizontalRotated270 => img.fliph().rotate270(),
            Self::Rotated90 => img.rotate90(),
            Self::MirroredHorizontalRotated90 => img.fliph().rotate90(),
            Self::Rotated270 => img.rotate270(),
        }
    }
}

/// Extract the orientation from raw image bytes. Missing or unreadable
/// metadata yields the identity orientation.
pub fn orientation_from_bytes(data: &[u8]) -> Orientation {
    let mut cursor = std::io::Cursor::new(data);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(meta) => meta
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from_code)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}
