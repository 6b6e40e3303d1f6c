//! Backend selection: channel regime when any channel exists, otherwise
//! the flat round-robin regime over credentials.

use o2o_core::Credential;

use crate::channel_registry::ChannelRegistry;
use crate::credential_registry::CredentialRegistry;

/// The chosen backend for one request, plus the model name to send upstream.
#[derive(Debug, Clone)]
pub struct Selection {
    pub credential: Credential,
    pub channel_id: Option<String>,
    pub resolved_model: String,
}

pub struct Selector;

impl Selector {
    /// Pick a backend for `requested_model`. Returns `None` when the pool
    /// is empty or (in the channel regime) no channel is eligible.
    pub fn select(
        credentials: &CredentialRegistry,
        channels: &ChannelRegistry,
        requested_model: &str,
    ) -> Option<Selection> {
        if channels.has_channels() {
            return Self::select_channel(credentials, channels, requested_model);
        }
        Self::select_flat(credentials, requested_model)
    }

    fn select_flat(credentials: &CredentialRegistry, requested_model: &str) -> Option<Selection> {
        let credential = credentials.get_next_key()?;
        Some(Selection { credential, channel_id: None, resolved_model: requested_model.to_string() })
    }

    /// Picks the channel and acquires its concurrency slot atomically
    /// (see `ChannelRegistry::select_and_acquire`), so the capacity check
    /// and the increment can't race across concurrent requests.
    fn select_channel(
        credentials: &CredentialRegistry,
        channels: &ChannelRegistry,
        requested_model: &str,
    ) -> Option<Selection> {
        let (chosen, credential_id) = channels.select_and_acquire(requested_model)?;

        let pool = credentials.all();
        let Some(credential) = pool.into_iter().find(|c| c.id == credential_id) else {
            // The channel references a credential id that no longer exists
            // in the flat pool (e.g. removed without updating the channel);
            // release the slot `select_and_acquire` already took so it
            // isn't leaked permanently.
            channels.release_slot(&chosen.id);
            return None;
        };

        Some(Selection {
            credential,
            channel_id: Some(chosen.id.clone()),
            resolved_model: chosen.resolve_model(requested_model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use std::collections::HashMap;

    fn make_channel(id: &str, priority: i32, weight: u32, cred_ids: Vec<&str>) -> o2o_core::Channel {
        o2o_core::Channel {
            id: id.to_string(),
            name: id.to_string(),
            base_url: "https://x".to_string(),
            enabled: true,
            healthy: true,
            credential_ids: cred_ids.into_iter().map(str::to_string).collect(),
            models: vec![],
            model_mapping: HashMap::new(),
            priority,
            weight,
            max_concurrent: 0,
            current_concurrent: 0,
            total_requests: 0,
            failed_requests: 0,
            cursor: 0,
        }
    }

    #[test]
    fn flat_regime_used_when_no_channels() {
        let creds = CredentialRegistry::new(Client::new());
        creds.add_key("sk-a", "https://x").unwrap();
        let channels = ChannelRegistry::new();
        let sel = Selector::select(&creds, &channels, "llama3").unwrap();
        assert_eq!(sel.resolved_model, "llama3");
        assert!(sel.channel_id.is_none());
    }

    #[test]
    fn channel_regime_prefers_highest_priority() {
        let creds = CredentialRegistry::new(Client::new());
        let a = creds.add_key("sk-a", "https://x").unwrap().credential;
        let channels = ChannelRegistry::new();
        let mut low = make_channel("low", 0, 10, vec![&a.id]);
        low.current_concurrent = 0;
        let mut high = make_channel("high", 5, 10, vec![&a.id]);
        high.current_concurrent = 0;
        channels.add(low);
        channels.add(high);
        let sel = Selector::select(&creds, &channels, "llama3").unwrap();
        assert_eq!(sel.channel_id.as_deref(), Some("high"));
    }

    #[test]
    fn channel_regime_resolves_model_mapping() {
        let creds = CredentialRegistry::new(Client::new());
        let a = creds.add_key("sk-a", "https://x").unwrap().credential;
        let channels = ChannelRegistry::new();
        let mut ch = make_channel("ch1", 0, 10, vec![&a.id]);
        ch.model_mapping.insert("gpt-4o".to_string(), "llama3.3".to_string());
        channels.add(ch);
        let sel = Selector::select(&creds, &channels, "gpt-4o").unwrap();
        assert_eq!(sel.resolved_model, "llama3.3");
    }

    #[test]
    fn channel_at_capacity_is_excluded() {
        let creds = CredentialRegistry::new(Client::new());
        let a = creds.add_key("sk-a", "https://x").unwrap().credential;
        let channels = ChannelRegistry::new();
        let mut ch = make_channel("ch1", 0, 10, vec![&a.id]);
        ch.max_concurrent = 1;
        ch.current_concurrent = 1;
        channels.add(ch);
        assert!(Selector::select(&creds, &channels, "llama3").is_none());
    }
}
