//! Session address: the Icecast base URL plus a `#fragment` naming the
//! selected station.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("server URL must start with http:// or https://: {0}")]
    Scheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    base: String,
    fragment: Option<String>,
}

impl Location {
    /// Parse `http://host:8000/` or `http://host:8000/#station`.
    ///
    /// The base is normalised to end with `/` so `{base}{id}` and
    /// `{base}status-json.xsl` are well formed.
    pub fn parse(url: &str) -> Result<Self, LocationError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LocationError::Scheme(url.to_string()));
        }
        let (base, fragment) = match url.split_once('#') {
            Some((base, frag)) => (base, Some(frag)),
            None => (url, None),
        };
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base,
            fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn set_fragment(&mut self, fragment: &str) {
        self.fragment = Some(fragment.to_string());
    }

    /// Playable media source for a station.
    pub fn stream_url(&self, id: &str) -> String {
        format!("{}{}", self.base, id)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(frag) => write!(f, "{}#{}", self.base, frag),
            None => f.write_str(&self.base),
        }
    }
}

/// `{icons_dir}/{id}.png`.  Existence is not checked here.
pub fn icon_path(icons_dir: &Path, id: &str) -> PathBuf {
    icons_dir.join(format!("{}.png", id))
}
