//! NowPlaying pane: icon path and the title of the selected stream, one
//! line per `" - "` segment.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_muted, style_secondary, C_PRIMARY},
    widgets::pane_chrome::{pane_chrome, Badge},
};

pub struct NowPlayingPane;

impl NowPlayingPane {
    pub fn new() -> Self {
        Self
    }

    /// The lines shown inside the pane, without styling.
    pub fn lines(state: &AppState) -> Vec<String> {
        let player = &state.player;
        let Some(current) = player.current.as_deref() else {
            return vec!["nothing selected".to_string()];
        };

        let mut out = Vec::new();
        out.push(match (&player.icon, state.icon_exists) {
            (Some(path), true) => format!("icon {}", path),
            _ => "no icon".to_string(),
        });
        match &player.now_playing {
            Some(np) => out.extend(np.lines.iter().cloned()),
            None => out.push(current.to_string()),
        }
        out
    }
}

impl Component for NowPlayingPane {
    fn id(&self) -> ComponentId {
        ComponentId::NowPlaying
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let badge = match (&state.player.current, state.player.is_playing) {
            (Some(_), true) => Some(Badge::Live),
            (Some(_), false) => Some(Badge::Stopped),
            (None, _) => None,
        };
        let block = pane_chrome("now playing", '2', focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines = Self::lines(state);
        let styled: Vec<Line> = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let style = match i {
                    0 => style_muted(),
                    1 => Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
                    _ => style_secondary(),
                };
                Line::from(Span::styled(text, style))
            })
            .collect();

        frame.render_widget(Paragraph::new(styled).wrap(Wrap { trim: true }), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_proto::protocol::{NowPlaying, PlayerState};

    #[test]
    fn test_nothing_selected() {
        let state = AppState::default();
        assert_eq!(NowPlayingPane::lines(&state), vec!["nothing selected"]);
    }

    #[test]
    fn test_title_segments_and_missing_icon() {
        let state = AppState {
            player: PlayerState {
                current: Some("jazz".into()),
                icon: Some("icons/jazz.png".into()),
                now_playing: Some(NowPlaying::from_title("Jazz FM - Miles Davis - So What")),
                ..Default::default()
            },
            icon_exists: false,
            ..Default::default()
        };
        assert_eq!(
            NowPlayingPane::lines(&state),
            vec!["no icon", "Jazz FM", "Miles Davis", "So What"]
        );
    }

    #[test]
    fn test_icon_shown_when_present() {
        let state = AppState {
            player: PlayerState {
                current: Some("jazz".into()),
                icon: Some("icons/jazz.png".into()),
                ..Default::default()
            },
            icon_exists: true,
            ..Default::default()
        };
        assert_eq!(
            NowPlayingPane::lines(&state),
            vec!["icon icons/jazz.png", "jazz"]
        );
    }
}
