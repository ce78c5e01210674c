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

//! Loaded track publication.
//!
//! The store holds one immutable [`TrackSet`] behind an `Arc`. A successful
//! fetch builds a complete new set and swaps it in; readers keep whatever
//! snapshot they already hold.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::warn;
use natrak_client::{Track, Waypoint};

/// One complete track publication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSet {
    tracks: BTreeMap<String, Track>,
    tmi: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl TrackSet {
    /// Build a set from a fetched document. The publication TMI is taken from
    /// the last track in document order.
    #[must_use]
    pub fn from_tracks(tracks: Vec<Track>, loaded_at: DateTime<Utc>) -> Self {
        let tmi = tracks.last().map(|t| t.tmi.clone());
        let mut by_id = BTreeMap::new();
        for track in tracks {
            if let Some(previous) = by_id.insert(track.identifier.clone(), track) {
                warn!("Duplicate track {} in feed, keeping the later entry", previous.identifier);
            }
        }
        Self {
            tracks: by_id,
            tmi,
            loaded_at: Some(loaded_at),
        }
    }

    /// Look up a track by label. `A`, `NATA` and `NAT-A` all find track `A`,
    /// and the feed's own identifier always matches exactly.
    #[must_use]
    pub fn find(&self, label: &str) -> Option<&Track> {
        let label = label.trim();
        if let Some(track) = self.tracks.get(label) {
            return Some(track);
        }
        let wanted = strip_nat_prefix(label);
        self.tracks
            .values()
            .find(|t| strip_nat_prefix(&t.identifier).eq_ignore_ascii_case(wanted))
    }

    #[must_use]
    pub fn tmi(&self) -> Option<&str> {
        self.tmi.as_deref()
    }

    #[must_use]
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    #[allow(dead_code, reason = "pairs with len")]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Every route point of every track, for seeding the fix database.
    pub fn route_points(&self) -> impl Iterator<Item = &Waypoint> {
        self.tracks.values().flat_map(|t| t.route.iter())
    }
}

fn strip_nat_prefix(label: &str) -> &str {
    let upper_starts = |prefix: &str| {
        label
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    };
    if upper_starts("NAT-") {
        &label[4..]
    } else if upper_starts("NAT") && label.len() > 3 {
        &label[3..]
    } else {
        label
    }
}

/// Shared holder of the current [`TrackSet`].
#[derive(Debug, Default)]
pub struct TrackStore {
    current: RwLock<Arc<TrackSet>>,
}

impl TrackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current publication. Cheap; clones an `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<TrackSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a complete new publication and return it.
    pub fn replace(&self, tracks: Vec<Track>) -> Arc<TrackSet> {
        let set = Arc::new(TrackSet::from_tracks(tracks, Utc::now()));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&set);
        set
    }

    #[must_use]
    pub fn current_tmi(&self) -> Option<String> {
        self.snapshot().tmi().map(str::to_string)
    }
}
