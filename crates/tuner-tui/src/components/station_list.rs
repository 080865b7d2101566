//! StationList component: left pane, one row per advertised stream.
//!
//! Stands where the icon strip of a web player would: Enter or a click plays
//! the station under the cursor.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use tuner_proto::protocol::Station;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{style_default, style_muted, style_playing, style_selected, style_selected_focused},
    widgets::pane_chrome::{pane_chrome, Badge},
};

pub struct StationList {
    cursor: usize,
    list_state: ListState,
}

/// Cut `s` to at most `width` terminal columns, marking the cut with `…`.
fn truncate_to_width(s: &str, width: usize) -> String {
    let total: usize = s.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

impl StationList {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            list_state: ListState::default(),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn clamp(&mut self, len: usize) {
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
    }

    fn selected<'a>(&self, state: &'a AppState) -> Option<&'a Station> {
        state.player.stations.get(self.cursor)
    }

    /// Put the cursor on the playing station, if it is listed.
    pub fn follow_current(&mut self, state: &AppState) {
        let Some(current) = state.player.current.as_deref() else {
            return;
        };
        if let Some(idx) = state.player.stations.iter().position(|s| s.id == current) {
            self.cursor = idx;
        }
    }

    fn render_item<'a>(
        station: &'a Station,
        is_cursor: bool,
        focused: bool,
        is_current: bool,
        width: usize,
    ) -> ListItem<'a> {
        let marker = if is_current { "▶ " } else { "  " };
        let name = truncate_to_width(&station.name, width.saturating_sub(2));
        let name_style = match (is_cursor, focused, is_current) {
            (true, true, _) => style_selected_focused(),
            (true, false, _) => style_selected(),
            (false, _, true) => style_playing(),
            _ => style_default(),
        };
        let marker_style = if is_current {
            style_playing()
        } else {
            style_muted()
        };
        ListItem::new(Line::from(vec![
            Span::styled(marker, marker_style),
            Span::styled(name, name_style),
        ]))
    }
}

impl Component for StationList {
    fn id(&self) -> ComponentId {
        ComponentId::StationList
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let len = state.player.stations.len();
        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_by(-step, len),
            KeyCode::Down | KeyCode::Char('j') => self.move_by(step, len),
            KeyCode::PageUp => self.move_by(-10, len),
            KeyCode::PageDown => self.move_by(10, len),
            KeyCode::Home | KeyCode::Char('g') => self.cursor = 0,
            KeyCode::End | KeyCode::Char('G') => self.cursor = len.saturating_sub(1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(st) = self.selected(state) {
                    return vec![Action::Select(st.id.clone())];
                }
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, state: &AppState) -> Vec<Action> {
        let len = state.player.stations.len();
        match event.kind {
            MouseEventKind::ScrollUp => self.move_by(-1, len),
            MouseEventKind::ScrollDown => self.move_by(1, len),
            MouseEventKind::Down(MouseButton::Left) => {
                // +1 for the top border
                if event.row <= area.y {
                    return vec![Action::FocusPane(ComponentId::StationList)];
                }
                let row = (event.row - area.y - 1) as usize + self.list_state.offset();
                if row < len {
                    self.cursor = row;
                    return vec![
                        Action::FocusPane(ComponentId::StationList),
                        Action::Select(state.player.stations[row].id.clone()),
                    ];
                }
                return vec![Action::FocusPane(ComponentId::StationList)];
            }
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = pane_chrome(
            "stations",
            '1',
            focused,
            Some(Badge::Count(state.player.stations.len())),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let stations = &state.player.stations;
        if stations.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("  no stations", style_muted())),
                inner,
            );
            return;
        }
        self.clamp(stations.len());

        let current = state.player.current.as_deref();
        let width = inner.width as usize;
        let items: Vec<ListItem> = stations
            .iter()
            .enumerate()
            .map(|(i, st)| {
                Self::render_item(st, i == self.cursor, focused, Some(st.id.as_str()) == current, width)
            })
            .collect();

        let list = List::new(items).highlight_style(Style::default());
        self.list_state.select(Some(self.cursor));
        frame.render_stateful_widget(list, inner, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_proto::protocol::PlayerState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn state_with(ids: &[&str]) -> AppState {
        AppState {
            player: PlayerState {
                stations: ids
                    .iter()
                    .map(|id| Station {
                        id: id.to_string(),
                        name: id.to_uppercase(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_navigation_clamps_and_enter_selects() {
        let state = state_with(&["jazz", "rock", "lofi"]);
        let mut list = StationList::new();

        list.handle_key(key(KeyCode::Up), &state);
        assert_eq!(list.cursor(), 0);
        list.handle_key(key(KeyCode::Down), &state);
        list.handle_key(key(KeyCode::Down), &state);
        list.handle_key(key(KeyCode::Down), &state);
        assert_eq!(list.cursor(), 2);

        let actions = list.handle_key(key(KeyCode::Enter), &state);
        assert_eq!(actions, vec![Action::Select("lofi".into())]);
    }

    #[test]
    fn test_enter_on_empty_list_does_nothing() {
        let state = state_with(&[]);
        let mut list = StationList::new();
        assert!(list.handle_key(key(KeyCode::Enter), &state).is_empty());
    }

    #[test]
    fn test_follow_current() {
        let mut state = state_with(&["jazz", "rock"]);
        state.player.current = Some("rock".into());
        let mut list = StationList::new();
        list.follow_current(&state);
        assert_eq!(list.cursor(), 1);
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("Jazz FM", 10), "Jazz FM");
        assert_eq!(truncate_to_width("Jazz FM Classics", 8), "Jazz FM…");
        assert_eq!(truncate_to_width("ラジオ局", 5), "ラジ…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }
}
