use crate::api::models::ModelCatalog;
use crate::api::PromptSummary;
use crate::core::config::{RagConfig, RagMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
    pub id: String,
    pub label: String,
    pub detail: String,
}

/// A selectable list with wrap-around cursor movement.
#[derive(Debug, Clone, Default)]
pub struct PickerState {
    pub items: Vec<PickerItem>,
    pub selected: usize,
}

impl PickerState {
    /// Build a picker with the cursor on `current` when it is listed.
    pub fn new(items: Vec<PickerItem>, current: Option<&str>) -> Self {
        let selected = current
            .and_then(|id| items.iter().position(|item| item.id == id))
            .unwrap_or(0);
        Self { items, selected }
    }

    pub fn from_models(catalog: &ModelCatalog, free_only: bool, current: &str) -> Self {
        let items = catalog
            .filtered(free_only)
            .into_iter()
            .map(|model| PickerItem {
                id: model.id.clone(),
                label: model.display_name().to_string(),
                detail: model.describe(),
            })
            .collect();
        Self::new(items, Some(current))
    }

    pub fn from_prompts(prompts: &[PromptSummary], current: Option<&str>) -> Self {
        let items = prompts
            .iter()
            .map(|prompt| PickerItem {
                id: prompt.id.clone(),
                label: prompt.display_title().to_string(),
                detail: prompt.description.clone().unwrap_or_default(),
            })
            .collect();
        Self::new(items, current)
    }

    /// One entry per retrieval mode, each showing where that mode would point.
    pub fn from_rag_modes(rag: &RagConfig) -> Self {
        let items = RagMode::ALL
            .into_iter()
            .map(|mode| {
                let label = match mode {
                    RagMode::Local => "Local",
                    RagMode::Server => "Server",
                    RagMode::Cloud => "Cloud",
                };
                let candidate = RagConfig {
                    mode,
                    ..rag.clone()
                };
                PickerItem {
                    id: mode.as_str().to_string(),
                    label: label.to_string(),
                    detail: candidate.target(),
                }
            })
            .collect();
        Self::new(items, Some(rag.mode.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected_item(&self) -> Option<&PickerItem> {
        self.items.get(self.selected)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_item().map(|i| i.id.as_str())
    }

    pub fn move_up(&mut self) {
        if !self.items.is_empty() {
            if self.selected == 0 {
                self.selected = self.items.len() - 1;
            } else {
                self.selected -= 1;
            }
        }
    }

    pub fn move_down(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }
}
