use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::warn;

/// External key-value store for cached settings. The persistence format
/// behind it is not ours to define.
pub trait SettingsStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;
    fn put(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Per-area notification channel preferences.
///
/// The default is push on, email and sms off. Any read that misses or fails
/// to parse falls back to it, the UI never sees an error here.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct NotificationChannels {
    pub push: bool,
    pub email: bool,
    pub sms: bool,
}

impl Default for NotificationChannels {
    fn default() -> Self {
        NotificationChannels {
            push: true,
            email: false,
            sms: false,
        }
    }
}

fn channels_key(area_id: &str) -> String {
    format!("area_notification_channels:{}", area_id)
}

pub async fn channels_for_area<S: SettingsStore>(store: &S, area_id: &str) -> NotificationChannels {
    let cached = match store.get(&channels_key(area_id)).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!(area_id, error = %e, "Settings read failed, using defaults");
            return NotificationChannels::default();
        }
    };
    let Some(cached) = cached else {
        return NotificationChannels::default();
    };
    serde_json::from_str(&cached).unwrap_or_else(|e| {
        warn!(area_id, error = %e, "Malformed cached channels, using defaults");
        NotificationChannels::default()
    })
}

pub async fn set_channels_for_area<S: SettingsStore>(
    store: &S,
    area_id: &str,
    channels: NotificationChannels,
) -> Result<()> {
    store
        .put(&channels_key(area_id), &serde_json::to_string(&channels)?)
        .await
}
