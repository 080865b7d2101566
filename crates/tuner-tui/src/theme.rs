//! Palette: cold blues for chrome, a cyan-to-white ramp for the spectrum.

use ratatui::style::{Color, Modifier, Style};

pub const C_ACCENT: Color = Color::Rgb(255, 120, 110);
pub const C_PLAYING: Color = Color::Rgb(90, 210, 200);
pub const C_CONNECTING: Color = Color::Rgb(230, 190, 110);
pub const C_MUTED: Color = Color::Rgb(70, 82, 100);
pub const C_SEPARATOR: Color = Color::Rgb(38, 46, 60);
pub const C_SECONDARY: Color = Color::Rgb(120, 138, 160);
pub const C_PRIMARY: Color = Color::Rgb(215, 228, 240);
pub const C_SELECTION_BG: Color = Color::Rgb(24, 34, 48);
pub const C_PANEL_BORDER: Color = Color::Rgb(38, 46, 60);
pub const C_PANEL_BORDER_FOCUSED: Color = Color::Rgb(80, 150, 220);
pub const C_NUMBER_HINT: Color = Color::Rgb(88, 104, 128);
pub const C_LOCATION: Color = Color::Rgb(110, 170, 210);
/// Spectrum bars, bottom to top.
pub const C_BAR_LOW: Color = Color::Rgb(40, 120, 200);
pub const C_BAR_HIGH: Color = Color::Rgb(225, 245, 255);

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_playing() -> Style {
    Style::default().fg(C_PLAYING)
}

pub fn style_selected_focused() -> Style {
    Style::default()
        .bg(C_SELECTION_BG)
        .fg(C_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

pub fn style_selected() -> Style {
    Style::default().bg(C_SELECTION_BG).fg(C_PRIMARY)
}

pub fn style_focused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER_FOCUSED)
}

pub fn style_unfocused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

/// Linear blend between the low and high bar colors; `t` in 0..=1.
pub fn bar_color(t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    match (C_BAR_LOW, C_BAR_HIGH) {
        (Color::Rgb(r0, g0, b0), Color::Rgb(r1, g1, b1)) => {
            Color::Rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1))
        }
        _ => C_BAR_HIGH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_color_endpoints() {
        assert_eq!(bar_color(0.0), C_BAR_LOW);
        assert_eq!(bar_color(1.0), C_BAR_HIGH);
        assert_eq!(bar_color(7.0), C_BAR_HIGH);
    }
}
