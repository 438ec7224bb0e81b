use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Sampling/control parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub system_prompt: String,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: crate::api::DEFAULT_TEMPERATURE,
            top_p: None,
            top_k: None,
            max_output_tokens: None,
        }
    }
}

/// Shared store for the generation settings read by every panel.
///
/// Panels never hold a live reference: each dispatch captures a
/// [`snapshot`](SettingsStore::snapshot), so edits made while a stream is in
/// flight only affect subsequent requests.
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: GenerationSettings,
}

impl SettingsStore {
    pub fn new(initial: GenerationSettings) -> Self {
        Self { current: initial }
    }

    pub fn snapshot(&self) -> GenerationSettings {
        self.current.clone()
    }

    pub fn current(&self) -> &GenerationSettings {
        &self.current
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.current.system_prompt = prompt.into();
    }

    /// Temperature is clamped to the documented 0..=1 range.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.current.temperature = temperature.clamp(0.0, 1.0);
    }

    pub fn set_top_p(&mut self, top_p: Option<f64>) {
        self.current.top_p = top_p.map(|v| v.clamp(0.0, 1.0));
    }

    pub fn set_top_k(&mut self, top_k: Option<f64>) {
        self.current.top_k = top_k.map(|v| v.clamp(0.0, 1.0));
    }

    pub fn set_max_output_tokens(&mut self, max: Option<u32>) {
        self.current.max_output_tokens = max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_do_not_track_later_edits() {
        let mut store = SettingsStore::default();
        let snapshot = store.snapshot();
        store.set_temperature(0.2);
        store.set_system_prompt("Answer in French.");
        assert_eq!(snapshot.temperature, crate::api::DEFAULT_TEMPERATURE);
        assert_eq!(snapshot.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(store.current().temperature, 0.2);
    }

    #[test]
    fn sampling_values_are_clamped() {
        let mut store = SettingsStore::default();
        store.set_temperature(4.2);
        assert_eq!(store.current().temperature, 1.0);
        store.set_top_p(Some(-0.5));
        assert_eq!(store.current().top_p, Some(0.0));
        store.set_top_k(None);
        assert_eq!(store.current().top_k, None);
    }
}
