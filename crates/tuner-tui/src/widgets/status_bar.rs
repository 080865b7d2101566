//! Status bar: playback dot, session location, volume, last log line and
//! key hints.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app_state::AppState;
use crate::theme::{C_ACCENT, C_LOCATION, C_MUTED, C_PLAYING, C_SECONDARY, C_SEPARATOR};

pub const KEY_HINTS: &str = "↑↓/jk move  Enter play  s stop  +/- vol  Tab pane  q quit";

/// Top line: state + location + last log; bottom line: key hints.
pub fn draw_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
    if area.height == 0 {
        return;
    }

    let dot = if state.player.is_playing {
        Span::styled("●", Style::default().fg(C_PLAYING))
    } else {
        Span::styled("○", Style::default().fg(C_ACCENT))
    };

    let mut spans = vec![
        Span::raw(" "),
        dot,
        Span::raw(" "),
        Span::styled(
            state.player.location.clone(),
            Style::default().fg(C_LOCATION).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  │  ", Style::default().fg(C_SEPARATOR)),
        Span::styled(
            format!("vol {:>3}%", (state.player.volume * 100.0).round() as i32),
            Style::default().fg(C_SECONDARY),
        ),
    ];
    if let Some(log) = state.last_log.as_deref() {
        spans.push(Span::styled("  │  ", Style::default().fg(C_SEPARATOR)));
        spans.push(Span::styled(log.to_string(), Style::default().fg(C_SECONDARY)));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)),
        Rect { height: 1, ..area },
    );

    if area.height > 1 {
        let keys = Line::from(Span::styled(
            format!(" {}", KEY_HINTS),
            Style::default().fg(C_MUTED),
        ));
        frame.render_widget(
            Paragraph::new(keys),
            Rect {
                y: area.y + 1,
                height: 1,
                ..area
            },
        );
    }
}
