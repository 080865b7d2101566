//! Station directory: polls the Icecast status document and turns its
//! `source` entries into [`Station`]s.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::protocol::{IcecastSource, StatusDocument, Station, TITLE_SEPARATOR};

/// Path of the status document relative to the server base.
pub const STATUS_PATH: &str = "status-json.xsl";

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed status document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that can produce the current station list.
///
/// The HTTP directory is the real implementation; tests plug in fixed lists.
pub trait StationSource: Send + Sync {
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Station>, DirectoryError>> + Send;
}

/// Last `/`-separated segment of a listen URL.
pub fn station_id(listenurl: &str) -> &str {
    listenurl.rsplit('/').next().unwrap_or(listenurl)
}

/// Text before the first title separator, or `id` when the title has none.
pub fn station_name(title: &str, id: &str) -> String {
    let mut parts = title.split(TITLE_SEPARATOR);
    let first = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        first.to_string()
    } else {
        id.to_string()
    }
}

pub fn station_from_source(source: IcecastSource) -> Station {
    let title = source.title.unwrap_or_default();
    let id = station_id(&source.listenurl).to_string();
    let name = station_name(&title, &id);
    Station {
        id,
        name,
        title,
        listenurl: source.listenurl,
    }
}

pub fn stations_from_status(doc: StatusDocument) -> Vec<Station> {
    doc.icestats
        .source
        .into_vec()
        .into_iter()
        .map(station_from_source)
        .collect()
}

pub fn parse_status(content: &str) -> Result<Vec<Station>, DirectoryError> {
    let doc: StatusDocument = serde_json::from_str(content)?;
    Ok(stations_from_status(doc))
}

/// Fetches `{base}status-json.xsl` over HTTP.  No caching, no retries.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    status_url: String,
}

impl HttpDirectory {
    pub fn new(base: &str) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("icetune/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            status_url: format!("{}{}", base, STATUS_PATH),
        })
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }
}

impl StationSource for HttpDirectory {
    async fn fetch_stations(&self) -> Result<Vec<Station>, DirectoryError> {
        let response = self.client.get(&self.status_url).send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status()));
        }
        let body = response.text().await?;
        let stations = parse_status(&body)?;
        debug!("directory: {} stations from {}", stations.len(), self.status_url);
        Ok(stations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_station_example() {
        let stations = parse_status(
            r#"{"icestats":{"source":[{"listenurl":"http://x/stream1","title":"Jazz FM - Now Playing"}]}}"#,
        )
        .unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, "stream1");
        assert_eq!(stations[0].name, "Jazz FM");
        assert_eq!(stations[0].title, "Jazz FM - Now Playing");
        assert_eq!(stations[0].listenurl, "http://x/stream1");
    }

    #[test]
    fn test_name_falls_back_to_id() {
        let stations = parse_status(
            r#"{"icestats":{"source":[{"listenurl":"http://x:8000/lofi","title":"NoSeparatorHere"}]}}"#,
        )
        .unwrap();
        assert_eq!(stations[0].name, "lofi");
    }

    #[test]
    fn test_missing_title_falls_back_to_id() {
        let stations =
            parse_status(r#"{"icestats":{"source":[{"listenurl":"http://x/ambient"}]}}"#).unwrap();
        assert_eq!(stations[0].name, "ambient");
        assert_eq!(stations[0].title, "");
    }

    #[test]
    fn test_name_is_text_before_first_separator() {
        assert_eq!(station_name("A - B - C", "id"), "A");
        assert_eq!(station_name(" - B", "id"), "");
        assert_eq!(station_name("A-B", "id"), "id");
    }

    #[test]
    fn test_id_is_last_path_segment() {
        assert_eq!(station_id("http://host:8000/a/b/c"), "c");
        assert_eq!(station_id("http://host:8000/"), "");
        assert_eq!(station_id("nopath"), "nopath");
    }

    #[test]
    fn test_order_and_duplicates_are_preserved() {
        let stations = parse_status(
            r#"{"icestats":{"source":[
                {"listenurl":"http://x/b","title":"B - 1"},
                {"listenurl":"http://x/a","title":"A - 1"},
                {"listenurl":"http://y/a","title":"A - 2"}
            ]}}"#,
        )
        .unwrap();
        let ids: Vec<&str> = stations.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "a"]);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            parse_status("{\"icestats\":"),
            Err(DirectoryError::Json(_))
        ));
        assert!(matches!(
            parse_status(r#"{"nope":1}"#),
            Err(DirectoryError::Json(_))
        ));
    }

    #[test]
    fn test_status_url() {
        let dir = HttpDirectory::new("http://radio.local:8000/").unwrap();
        assert_eq!(dir.status_url(), "http://radio.local:8000/status-json.xsl");
    }
}
