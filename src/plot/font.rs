//! Embedded text font.
//!
//! Plotters is built without system font lookup. Every label is drawn with the
//! DejaVu Sans bytes bundled in `assets/fonts`, registered under the family the
//! charts ask for.

use std::sync::OnceLock;

use plotters::style::{FontStyle, register_font};

/// Family used by captions, tick labels and legends.
pub const FONT_FAMILY: &str = "sans-serif";

static DEJAVU_SANS: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

static REGISTERED: OnceLock<bool> = OnceLock::new();

/// Register the embedded font once per process.
pub fn ensure_registered() -> Result<(), String> {
    let ok = *REGISTERED.get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, DEJAVU_SANS).is_ok());
    if ok {
        Ok(())
    } else {
        Err("embedded font could not be parsed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_font_registers() {
        assert!(ensure_registered().is_ok());
        assert!(ensure_registered().is_ok());
    }
}
