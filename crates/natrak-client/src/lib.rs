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

//! Client library for North Atlantic oceanic data feeds.
//!
//! This library fetches and decodes the two feeds an oceanic radar overlay
//! depends on. It is organized in layers that can be used independently:
//!
//! - **Protocol layer**: wire decoding for the NAT track document and the
//!   per-flight clearance API, behind the [`protocol::FeedParser`] trait
//! - **Feed layer**: async HTTP clients implementing the
//!   [`TrackSource`] and [`FlightDataSource`] traits
//! - **Geo layer**: coordinates, named waypoints and route-token parsing
//!
//! # Quick Start
//!
//! ```no_run
//! use natrak_client::{TrackFeedClient, TrackSource, DEFAULT_TRACK_URL};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), natrak_client::FetchError> {
//!     let client = TrackFeedClient::new(DEFAULT_TRACK_URL)?;
//!     for track in client.fetch_tracks().await? {
//!         println!("{} ({}): {:?}", track.identifier, track.tmi, track.route_names());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! ## Protocol Layer Only
//!
//! ```
//! use natrak_client::protocol::{FeedParser, TrackParser};
//!
//! let body = br#"[{"id":"A","tmi":"284","direction":1,
//!     "route":[{"name":"GISTI","latitude":54.0,"longitude":-15.0}],
//!     "flightLevels":[330,340]}]"#;
//! let tracks = TrackParser.parse(body).unwrap();
//! assert_eq!(tracks[0].route_names(), vec!["GISTI"]);
//! ```
//!
//! ## Route Tokens
//!
//! ```
//! use natrak_client::geo::parse_coordinate_token;
//!
//! let point = parse_coordinate_token("55N020W").unwrap();
//! assert_eq!((point.latitude, point.longitude), (55.0, -20.0));
//! assert!(parse_coordinate_token("DCT").is_none());
//! ```
//!
//! # Failure Model
//!
//! Track fetches report every failure as a [`FetchError`] and never return a
//! partial document. Flight-data fetches can be folded into an invalid
//! [`FlightRecord`] with [`FlightDataSource::fetch_or_invalid`], which is what
//! a refresh loop usually wants.

pub mod feed;
pub mod geo;
pub mod protocol;

pub use feed::{
    FetchError, FlightDataClient, FlightDataSource, TrackFeedClient, TrackSource,
    DEFAULT_TRACK_URL, EVENT_TRACK_URL,
};
pub use geo::{Coordinate, Waypoint};
pub use protocol::{FlightRecord, ParseError, Track, TrackDirection, RAW_ROUTE_TRACK};
