use std::fmt;

/// A memory offset on the target flash
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlashOffset(pub u32);

impl fmt::Display for FlashOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Bootloader offset of the classic ESP32 and of any chip not in `BOOTLOADER_OFFSETS`
pub const LEGACY_BOOTLOADER_OFFSET: FlashOffset = FlashOffset(0x1000);

/// Chip families whose bootloader does not live at `LEGACY_BOOTLOADER_OFFSET`
const BOOTLOADER_OFFSETS: &[(&str, FlashOffset)] = &[
    ("esp32s2", FlashOffset(0x0)),
    ("esp32s3", FlashOffset(0x0)),
    ("esp32c3", FlashOffset(0x0)),
    ("esp32c6", FlashOffset(0x0)),
    ("esp32h2", FlashOffset(0x0)),
];

/// A microcontroller family, identified by its lower-case chip name
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChipProfile {
    id: String,
}

impl ChipProfile {
    pub fn new(id: &str) -> ChipProfile {
        ChipProfile {
            id: id.trim().to_lowercase(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The offset the second stage bootloader is merged at
    ///
    /// Unknown chips get the legacy offset; the merge utility rejects chip names it doesn't know.
    pub fn bootloader_offset(&self) -> FlashOffset {
        BOOTLOADER_OFFSETS
            .iter()
            .find(|(family, _)| *family == self.id)
            .map(|(_, offset)| *offset)
            .unwrap_or(LEGACY_BOOTLOADER_OFFSET)
    }
}
