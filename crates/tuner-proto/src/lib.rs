//! Shared model and logic for icetune: Icecast station directory, playback
//! controller, spectrum binning and the FFT analyser that feeds it.

pub mod analyser;
pub mod config;
pub mod controller;
pub mod directory;
pub mod location;
pub mod platform;
pub mod protocol;
pub mod spectrum;
pub mod state;
