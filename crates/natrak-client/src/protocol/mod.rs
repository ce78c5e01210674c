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

//! Protocol layer for oceanic data feeds.
//!
//! Wire formats are decoded into domain types through the [`FeedParser`]
//! trait. Two feeds are supported: the published NAT track document and the
//! per-flight clearance record served by the flight-data API.

mod flight_data;
mod tracks;

pub use flight_data::{FlightDataParser, FlightDataRow, FlightRecord, RAW_ROUTE_TRACK};
pub use tracks::{Track, TrackDirection, TrackParser};

use thiserror::Error;

/// Errors that can occur while decoding a feed document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Trait for feed document parsers.
///
/// Implement this trait to decode a new feed format. Parsing is all or
/// nothing: a parser never returns a partially decoded document.
pub trait FeedParser {
    /// The decoded document type.
    type Output;

    /// Decode a complete response body.
    fn parse(&self, body: &[u8]) -> Result<Self::Output, ParseError>;
}
