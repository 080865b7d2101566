//! Pane border: `[N] title` on the left, a state badge on the right.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders},
};

use crate::theme::{
    style_focused_border, style_unfocused_border, C_CONNECTING, C_MUTED, C_NUMBER_HINT,
    C_PLAYING, C_PRIMARY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    /// Selected stream is playing.
    Live,
    /// Selected stream is paused or stopped.
    Stopped,
    /// PCM is reaching the analyser.
    Receiving,
    Idle,
    /// Number of listed stations.
    Count(usize),
}

impl Badge {
    pub fn label(self) -> String {
        match self {
            Badge::Live => "LIVE".into(),
            Badge::Stopped => "STOPPED".into(),
            Badge::Receiving => "PCM".into(),
            Badge::Idle => "IDLE".into(),
            Badge::Count(n) => n.to_string(),
        }
    }

    pub fn color(self) -> Color {
        match self {
            Badge::Live | Badge::Receiving => C_PLAYING,
            Badge::Stopped => C_CONNECTING,
            Badge::Idle | Badge::Count(_) => C_MUTED,
        }
    }
}

pub fn pane_chrome(title: &str, number_key: char, focused: bool, badge: Option<Badge>) -> Block<'_> {
    let (border, heading) = if focused {
        (
            style_focused_border(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )
    } else {
        (style_unfocused_border(), Style::default().fg(C_MUTED))
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Line::from(vec![
            Span::styled(format!("[{}] ", number_key), Style::default().fg(C_NUMBER_HINT)),
            Span::styled(title, heading),
        ]));

    if let Some(badge) = badge {
        let label = Span::styled(
            format!(" {} ", badge.label()),
            Style::default().fg(badge.color()).add_modifier(Modifier::BOLD),
        );
        block = block.title_top(Line::from(label).right_aligned());
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_labels() {
        assert_eq!(Badge::Count(12).label(), "12");
        assert_eq!(Badge::Receiving.label(), "PCM");
        assert_eq!(Badge::Live.color(), Badge::Receiving.color());
    }
}
