use std::collections::HashMap;

/// Decides whether one shared input value feeds all panels ("linked") or
/// each panel owns an independent local value.
///
/// The shared value and the local values are independent buffers: toggling
/// `linked` switches which one a panel reads, it never merges or splits
/// text. The one exception is spelled out on [`set_linked`]: the panel that
/// unlinks keeps the shared text as its local buffer so the words under the
/// cursor do not vanish.
///
/// [`set_linked`]: InputCoordinator::set_linked
#[derive(Debug, Default)]
pub struct InputCoordinator {
    linked: bool,
    shared: String,
    local: HashMap<String, String>,
}

impl InputCoordinator {
    pub fn new(linked: bool) -> Self {
        Self {
            linked,
            shared: String::new(),
            local: HashMap::new(),
        }
    }

    pub fn linked(&self) -> bool {
        self.linked
    }

    pub fn value_for(&self, panel_id: &str) -> &str {
        if self.linked {
            &self.shared
        } else {
            self.local.get(panel_id).map(String::as_str).unwrap_or("")
        }
    }

    pub fn set_value(&mut self, panel_id: &str, value: String) {
        if self.linked {
            self.shared = value;
        } else {
            self.local.insert(panel_id.to_string(), value);
        }
    }

    /// Switch between the shared and per-panel buffers. `owner` is the panel
    /// that performed the toggle: on unlink it inherits the shared text as
    /// its local buffer; every other panel keeps its own (initially empty)
    /// local buffer. The shared buffer itself is retained for re-linking.
    pub fn set_linked(&mut self, linked: bool, owner: &str) {
        if self.linked == linked {
            return;
        }
        if !linked {
            self.local.insert(owner.to_string(), self.shared.clone());
        }
        self.linked = linked;
    }

    /// Clear the buffer that fed a successful dispatch. In linked mode the
    /// shared value clears for every panel at once.
    pub fn clear_after_dispatch(&mut self, panel_id: &str) {
        if self.linked {
            self.shared.clear();
        } else if let Some(value) = self.local.get_mut(panel_id) {
            value.clear();
        }
    }

    pub fn forget_panel(&mut self, panel_id: &str) {
        self.local.remove(panel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_mode_shares_one_value() {
        let mut input = InputCoordinator::new(true);
        input.set_value("a", "hello".into());
        assert_eq!(input.value_for("a"), "hello");
        assert_eq!(input.value_for("b"), "hello");
    }

    #[test]
    fn unlinking_hands_the_shared_text_to_the_toggling_panel() {
        let mut input = InputCoordinator::new(true);
        input.set_value("a", "draft".into());
        input.set_linked(false, "a");

        assert_eq!(input.value_for("a"), "draft");
        assert_eq!(input.value_for("b"), "");

        // Buffers stay independent after the switch.
        input.set_value("b", "other".into());
        assert_eq!(input.value_for("a"), "draft");

        // Re-linking switches everyone back to the retained shared buffer.
        input.set_linked(true, "a");
        assert_eq!(input.value_for("b"), "draft");
    }

    #[test]
    fn linked_dispatch_clears_the_value_for_all_panels() {
        let mut input = InputCoordinator::new(true);
        input.set_value("a", "ship it".into());
        input.clear_after_dispatch("a");
        assert_eq!(input.value_for("a"), "");
        assert_eq!(input.value_for("b"), "");
    }

    #[test]
    fn unlinked_dispatch_clears_only_the_submitting_panel() {
        let mut input = InputCoordinator::new(false);
        input.set_value("a", "one".into());
        input.set_value("b", "two".into());
        input.clear_after_dispatch("a");
        assert_eq!(input.value_for("a"), "");
        assert_eq!(input.value_for("b"), "two");
    }
}
