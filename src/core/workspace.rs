use std::fmt;

use tracing::debug;

use crate::api::events::StreamEvent;
use crate::core::catalog;
use crate::core::input::InputCoordinator;
use crate::core::message::Message;
use crate::core::panel::{PanelSession, SubmitError};
use crate::core::settings::{GenerationSettings, SettingsStore};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    UnknownModel(String),
    LastPanel,
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceError::UnknownModel(id) => write!(f, "model '{id}' is not in the catalog"),
            WorkspaceError::LastPanel => write!(f, "the last panel cannot be removed"),
        }
    }
}

impl std::error::Error for WorkspaceError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyActive,
}

/// Registry mapping panel identity to its submit capability.
///
/// A panel is registered exactly while its session exists; "send to all"
/// fans out through the registry instead of reaching into any panel
/// directly, so a removed panel can never be triggered again.
#[derive(Debug, Default)]
pub struct SubmitRegistry {
    entries: Vec<String>,
}

impl SubmitRegistry {
    pub fn register(&mut self, panel_id: &str) {
        if !self.contains(panel_id) {
            self.entries.push(panel_id.to_string());
        }
    }

    pub fn unregister(&mut self, panel_id: &str) {
        self.entries.retain(|id| id != panel_id);
    }

    pub fn contains(&self, panel_id: &str) -> bool {
        self.entries.iter().any(|id| id == panel_id)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.clone()
    }
}

/// One submission ready for the stream dispatcher: the transcript snapshot,
/// the settings captured at dispatch time, and the stream id that guards
/// against superseded events.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub panel_id: String,
    pub model_id: String,
    pub stream_id: u64,
    pub history: Vec<Message>,
    pub settings: GenerationSettings,
}

/// The active panel set plus everything the panels share: the input
/// coordinator, the settings store, and the submit registry.
pub struct Workspace {
    panels: Vec<PanelSession>,
    registry: SubmitRegistry,
    pub input: InputCoordinator,
    pub settings: SettingsStore,
}

impl Workspace {
    pub fn new(
        initial_models: &[String],
        linked_inputs: bool,
        settings: GenerationSettings,
    ) -> Result<Self, WorkspaceError> {
        let mut workspace = Self {
            panels: Vec::new(),
            registry: SubmitRegistry::default(),
            input: InputCoordinator::new(linked_inputs),
            settings: SettingsStore::new(settings),
        };
        for model_id in initial_models {
            workspace.add_panel(model_id)?;
        }
        if workspace.panels.is_empty() {
            for model in catalog::featured_models() {
                workspace.add_panel(model.id)?;
            }
        }
        Ok(workspace)
    }

    pub fn panels(&self) -> &[PanelSession] {
        &self.panels
    }

    pub fn panel(&self, panel_id: &str) -> Option<&PanelSession> {
        self.panels.iter().find(|p| p.model_id == panel_id)
    }

    pub fn registry(&self) -> &SubmitRegistry {
        &self.registry
    }

    /// Add a panel for a catalog model. Adding an id that is already active
    /// is a no-op: no duplicate panel is created.
    pub fn add_panel(&mut self, model_id: &str) -> Result<AddOutcome, WorkspaceError> {
        let model = catalog::find_model(model_id)
            .ok_or_else(|| WorkspaceError::UnknownModel(model_id.to_string()))?;
        if self.panel(model.id).is_some() {
            return Ok(AddOutcome::AlreadyActive);
        }
        self.panels.push(PanelSession::new(model.id));
        self.registry.register(model.id);
        Ok(AddOutcome::Added)
    }

    /// Remove a panel and unregister its submit capability. Removing the
    /// sole remaining panel is rejected.
    pub fn remove_panel(&mut self, panel_id: &str) -> Result<PanelSession, WorkspaceError> {
        if self.panels.len() <= 1 {
            return Err(WorkspaceError::LastPanel);
        }
        let index = self
            .panels
            .iter()
            .position(|p| p.model_id == panel_id)
            .ok_or_else(|| WorkspaceError::UnknownModel(panel_id.to_string()))?;
        self.registry.unregister(panel_id);
        self.input.forget_panel(panel_id);
        Ok(self.panels.remove(index))
    }

    /// The single submission path: read the panel's input, append the user
    /// turn, clear the owning buffer, and capture the settings snapshot.
    /// Empty input and in-flight panels dispatch nothing.
    pub fn submit_panel(&mut self, panel_id: &str) -> Option<DispatchRequest> {
        let value = self.input.value_for(panel_id).to_string();
        let panel = self.panels.iter_mut().find(|p| p.model_id == panel_id)?;
        let model_id = panel.model_id.clone();

        let ticket = match panel.begin_submission(&value) {
            Ok(ticket) => ticket,
            Err(SubmitError::EmptyInput) => return None,
            Err(SubmitError::Busy) => {
                debug!(panel = %panel_id, "submission ignored while a response is in flight");
                return None;
            }
        };

        self.input.clear_after_dispatch(panel_id);

        Some(DispatchRequest {
            panel_id: panel_id.to_string(),
            model_id,
            stream_id: ticket.stream_id,
            history: ticket.history,
            settings: self.settings.snapshot(),
        })
    }

    /// "Send to all": fan out through the submit registry, routing every
    /// panel through the same `submit_panel` contract as an individual
    /// submission.
    pub fn submit_all(&mut self) -> Vec<DispatchRequest> {
        // In linked mode the first dispatch clears the shared buffer, so the
        // broadcast value is captured up front and restored per panel.
        let registered = self.registry.snapshot();
        let mut dispatched = Vec::new();
        let broadcast = if self.input.linked() {
            Some(self.input.value_for("").to_string())
        } else {
            None
        };
        for panel_id in registered {
            if let Some(value) = &broadcast {
                self.input.set_value(&panel_id, value.clone());
            }
            if let Some(request) = self.submit_panel(&panel_id) {
                dispatched.push(request);
            }
        }
        if self.input.linked() && !dispatched.is_empty() {
            self.input.clear_after_dispatch("");
        }
        dispatched
    }

    /// Route one stream event to its panel. Events for panels that have been
    /// removed belong to abandoned streams and are discarded.
    pub fn apply_stream_event(&mut self, panel_id: &str, stream_id: u64, event: StreamEvent) {
        match self.panels.iter_mut().find(|p| p.model_id == panel_id) {
            Some(panel) => panel.apply_event(stream_id, event),
            None => {
                debug!(panel = %panel_id, "discarding event for removed panel");
            }
        }
    }
}
