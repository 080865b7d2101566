pub mod now_playing;
pub mod spectrum_panel;
pub mod station_list;
