use throbber_widgets_tui::BRAILLE_SIX;

/// Spinner glyph for the given animation tick.
///
/// Derived from the tick count alone so a frame can be drawn from immutable
/// state.
pub fn spinner_frame(tick: u64) -> &'static str {
    let symbols = BRAILLE_SIX.symbols;
    symbols[(tick % symbols.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_cycles() {
        let len = BRAILLE_SIX.symbols.len() as u64;
        assert_eq!(spinner_frame(0), spinner_frame(len));
        assert_ne!(spinner_frame(0), spinner_frame(1));
    }
}
