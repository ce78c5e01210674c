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

//! User-visible notifications.
//!
//! Background jobs report outcomes the controller should see (track loads,
//! feed failures) through a broadcast channel. Subscribers that fall behind
//! lose the oldest messages; senders never block.

use std::fmt;

use log::{error, info};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NotificationLevel::Info => write!(f, "{}", self.text),
            NotificationLevel::Error => write!(f, "error: {}", self.text),
        }
    }
}

/// Cloneable sending side of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        self.send(NotificationLevel::Info, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        error!("{text}");
        self.send(NotificationLevel::Error, text);
    }

    fn send(&self, level: NotificationLevel, text: String) {
        // No subscribers is not an error
        let _ = self.tx.send(Notification { level, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_in_order() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.info("first");
        notifier.error("second");

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification {
                level: NotificationLevel::Info,
                text: "first".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap().level, NotificationLevel::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_without_subscribers() {
        Notifier::new().info("nobody listening");
    }
}
