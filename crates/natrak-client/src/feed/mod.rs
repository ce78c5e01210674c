// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP clients for the oceanic data feeds.
//!
//! Both feeds are exposed through async traits so the application can run
//! them on its worker pool and tests can substitute canned sources.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use thiserror::Error;

use crate::protocol::{
    FeedParser, FlightDataParser, FlightDataRow, FlightRecord, ParseError, Track, TrackParser,
};

/// Production track feed.
pub const DEFAULT_TRACK_URL: &str = "https://tracks.ganderoceanic.com/data";

/// Event track feed, used during controlled events.
pub const EVENT_TRACK_URL: &str = "https://tracks.ganderoceanic.com/event";

const FLIGHT_DATA_PATH: &str = "flight_data/get.php";

/// Errors that can occur while fetching a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("expected one flight-data row for {callsign}, got {rows}")]
    DataIntegrity { callsign: String, rows: usize },

    #[error("no data for the requested flight")]
    NotFound,
}

/// A source of published tracks.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Fetch and decode the complete track document.
    async fn fetch_tracks(&self) -> Result<Vec<Track>, FetchError>;
}

/// A source of per-flight clearance data.
#[async_trait]
pub trait FlightDataSource: Send + Sync {
    /// Fetch the clearance record for `callsign`.
    async fn fetch_flight_data(&self, callsign: &str) -> Result<FlightRecord, FetchError>;

    /// Fetch the clearance record, folding every failure into an invalid
    /// record.
    async fn fetch_or_invalid(&self, callsign: &str) -> FlightRecord {
        match self.fetch_flight_data(callsign).await {
            Ok(record) => record,
            Err(FetchError::NotFound) => {
                debug!("No flight data for {callsign}");
                FlightRecord::invalid(callsign)
            }
            Err(e) => {
                warn!("Flight data for {callsign} unavailable: {e}");
                FlightRecord::invalid(callsign)
            }
        }
    }
}

/// Reduce an API response to a single record.
///
/// An empty response is [`FetchError::NotFound`]; more than one row breaks
/// the one-row-per-callsign contract and is rejected as a whole.
pub fn record_from_rows(
    callsign: &str,
    mut rows: Vec<FlightDataRow>,
) -> Result<FlightRecord, FetchError> {
    match rows.len() {
        0 => Err(FetchError::NotFound),
        1 => Ok(FlightRecord::from_row(callsign, rows.remove(0))),
        n => Err(FetchError::DataIntegrity {
            callsign: callsign.to_string(),
            rows: n,
        }),
    }
}

fn build_http_client() -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

async fn get_body(request: reqwest::RequestBuilder) -> Result<Vec<u8>, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Client for the NAT track feed.
#[derive(Debug, Clone)]
pub struct TrackFeedClient {
    http: reqwest::Client,
    url: String,
}

impl TrackFeedClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self {
            http: build_http_client()?,
            url: url.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TrackSource for TrackFeedClient {
    async fn fetch_tracks(&self) -> Result<Vec<Track>, FetchError> {
        debug!("Fetching tracks from {}", self.url);
        let body = get_body(self.http.get(&self.url)).await?;
        Ok(TrackParser.parse(&body)?)
    }
}

/// Client for the flight-data API.
#[derive(Debug, Clone)]
pub struct FlightDataClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl FlightDataClient {
    pub fn new(api_base: &str, api_key: Option<String>) -> Result<Self, FetchError> {
        Ok(Self {
            http: build_http_client()?,
            endpoint: format!("{}/{FLIGHT_DATA_PATH}", api_base.trim_end_matches('/')),
            api_key,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FlightDataSource for FlightDataClient {
    async fn fetch_flight_data(&self, callsign: &str) -> Result<FlightRecord, FetchError> {
        let mut request = self.http.get(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apiKey", key.as_str())]);
        }
        request = request.query(&[("callsign", callsign)]);

        let body = get_body(request).await?;
        let rows = FlightDataParser.parse(&body)?;
        record_from_rows(callsign, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedFlightData {
        body: &'static str,
    }

    #[async_trait]
    impl FlightDataSource for CannedFlightData {
        async fn fetch_flight_data(&self, callsign: &str) -> Result<FlightRecord, FetchError> {
            let rows = FlightDataParser.parse(self.body.as_bytes())?;
            record_from_rows(callsign, rows)
        }
    }

    struct Unreachable;

    #[async_trait]
    impl FlightDataSource for Unreachable {
        async fn fetch_flight_data(&self, _callsign: &str) -> Result<FlightRecord, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    fn row(callsign: &str) -> FlightDataRow {
        FlightDataRow {
            callsign: Some(callsign.to_string()),
            route: Some("GISTI 56/20 57/30 LOMSI".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_row_becomes_record() {
        let record = record_from_rows("EIN45", vec![row("EIN45")]).unwrap();
        assert!(record.is_valid);
        assert_eq!(record.route.as_deref(), Some("GISTI 56/20 57/30 LOMSI"));
    }

    #[test]
    fn test_empty_and_duplicate_rows_rejected() {
        assert!(matches!(
            record_from_rows("EIN45", Vec::new()),
            Err(FetchError::NotFound)
        ));
        assert!(matches!(
            record_from_rows("EIN45", vec![row("EIN45"), row("EIN45")]),
            Err(FetchError::DataIntegrity { rows: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_or_invalid_folds_failures() {
        let empty = CannedFlightData { body: "[]" };
        assert!(!empty.fetch_or_invalid("ACA870").await.is_valid);

        let duplicated = CannedFlightData {
            body: r#"[{"callsign":"ACA870"},{"callsign":"ACA870"}]"#,
        };
        let record = duplicated.fetch_or_invalid("ACA870").await;
        assert!(!record.is_valid);
        assert_eq!(record.callsign, "ACA870");

        let malformed = CannedFlightData { body: "[{" };
        assert!(!malformed.fetch_or_invalid("ACA870").await.is_valid);

        assert!(!Unreachable.fetch_or_invalid("ACA870").await.is_valid);
    }

    #[tokio::test]
    async fn test_fetch_or_invalid_passes_record_through() {
        let source = CannedFlightData {
            body: r#"[{"callsign":"ACA870","track":"A","assigned_level":"360"}]"#,
        };
        let record = source.fetch_or_invalid("ACA870").await;
        assert!(record.is_valid);
        assert!(record.is_track_route());
        assert_eq!(record.assigned_level.as_deref(), Some("360"));
    }

    #[test]
    fn test_flight_data_endpoint_joins_base() {
        let client = FlightDataClient::new("https://example.net/api/", None).unwrap();
        assert_eq!(client.endpoint(), "https://example.net/api/flight_data/get.php");
    }
}
