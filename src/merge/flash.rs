use crate::BoardConfig;

/// Flash parameters in the form the merge utility expects
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlashParameters {
    pub mode: String,
    pub freq: String,
    pub size: String,
}

impl FlashParameters {
    /// Takes mode and size from `board` as-is and normalizes the frequency
    pub fn from_board(board: &BoardConfig) -> FlashParameters {
        FlashParameters {
            mode: board.flash_mode.clone(),
            freq: normalize_flash_freq(&board.flash_freq),
            size: board.flash_size.clone(),
        }
    }
}

/// Converts a board flash frequency into merge utility form
///
/// `40000000L` and `40000000` both become `40m`, values already ending in `m` are kept, and
/// anything else is forwarded lower-cased for the merge utility to judge.
pub fn normalize_flash_freq(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let raw = lowered.strip_suffix('l').unwrap_or(&lowered);

    if raw.ends_with('m') {
        return raw.to_string();
    }

    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(hz) = raw.parse::<u64>() {
            if hz % 1_000_000 == 0 {
                return format!("{}m", hz / 1_000_000);
            }
        }
    }

    raw.to_string()
}
