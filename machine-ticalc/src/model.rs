//! Calculator model catalog.

use serde::{Deserialize, Serialize};

/// Supported calculator models.
///
/// The per-model differences the core cares about are small: LCD contrast
/// base level, glass width, busy-gate policy, clock rate, and how much
/// flash/ROM and RAM the board carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalcModel {
    Ti73,
    Ti81,
    Ti82,
    Ti83,
    Ti83Plus,
    Ti83PlusSe,
    Ti84Plus,
    Ti84PlusSe,
    Ti85,
    Ti86,
}

impl CalcModel {
    /// Base contrast level subtracted from the contrast command operand.
    /// Differing glass interpretations of the same level require this to
    /// vary per model.
    #[must_use]
    pub fn lcd_base_level(self) -> i32 {
        match self {
            Self::Ti82 => 30,
            Self::Ti73
            | Self::Ti83
            | Self::Ti83Plus
            | Self::Ti83PlusSe
            | Self::Ti84Plus
            | Self::Ti84PlusSe => 24,
            Self::Ti81 | Self::Ti85 | Self::Ti86 => 0,
        }
    }

    /// Columns the physical glass shows. The driver RAM is 128 wide on
    /// every model; only the widescreen machines show all of it.
    #[must_use]
    pub fn display_width(self) -> usize {
        match self {
            Self::Ti85 | Self::Ti86 => 128,
            _ => 96,
        }
    }

    /// Whether the LCD rejects port accesses inside the busy window.
    #[must_use]
    pub fn has_lcd_busy_gate(self) -> bool {
        matches!(
            self,
            Self::Ti83Plus | Self::Ti83PlusSe | Self::Ti84Plus | Self::Ti84PlusSe
        )
    }

    /// CPU clock in Hz at boot.
    #[must_use]
    pub fn clock_hz(self) -> u32 {
        match self {
            Self::Ti81 => 2_000_000,
            _ => 6_000_000,
        }
    }

    /// Number of 16 KiB flash (or masked ROM) pages.
    #[must_use]
    pub fn flash_pages(self) -> usize {
        match self {
            Self::Ti81 => 2,
            Self::Ti82 | Self::Ti85 => 8,
            Self::Ti83 | Self::Ti86 => 16,
            Self::Ti73 | Self::Ti83Plus => 32,
            Self::Ti84Plus => 64,
            Self::Ti83PlusSe | Self::Ti84PlusSe => 128,
        }
    }

    /// Number of 16 KiB RAM pages.
    #[must_use]
    pub fn ram_pages(self) -> usize {
        match self {
            Self::Ti81 => 1,
            Self::Ti82 | Self::Ti83 | Self::Ti85 | Self::Ti73 | Self::Ti83Plus => 2,
            Self::Ti86 | Self::Ti83PlusSe | Self::Ti84Plus | Self::Ti84PlusSe => 8,
        }
    }

    /// Expected ROM image size in bytes.
    #[must_use]
    pub fn rom_size(self) -> usize {
        self.flash_pages() * 0x4000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_levels_follow_the_glass() {
        assert_eq!(CalcModel::Ti82.lcd_base_level(), 30);
        assert_eq!(CalcModel::Ti83Plus.lcd_base_level(), 24);
        assert_eq!(CalcModel::Ti85.lcd_base_level(), 0);
    }

    #[test]
    fn busy_gate_starts_with_the_flash_models() {
        assert!(!CalcModel::Ti83.has_lcd_busy_gate());
        assert!(!CalcModel::Ti73.has_lcd_busy_gate());
        assert!(CalcModel::Ti83Plus.has_lcd_busy_gate());
        assert!(CalcModel::Ti84PlusSe.has_lcd_busy_gate());
    }
}
