//! Built-in model catalog.
//!
//! Pure display data for the models a panel can be bound to. Model ids use
//! the `provider/modelId` form routed by the relay endpoint.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogModel {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    /// Accent color keyword mapped to a terminal color by the UI theme.
    pub accent: &'static str,
    pub description: &'static str,
    pub capabilities: &'static [&'static str],
    pub featured: bool,
}

const ACCENT_OPENAI: &str = "green";
const ACCENT_ANTHROPIC: &str = "purple";
const ACCENT_GOOGLE: &str = "blue";

static MODELS: &[CatalogModel] = &[
    CatalogModel {
        id: "openai/gpt-4o",
        name: "GPT-4o",
        provider: "OpenAI",
        accent: ACCENT_OPENAI,
        description: "Broad general knowledge and domain expertise, following complex instructions accurately at GPT-4 Turbo quality with a faster, cheaper API.",
        capabilities: &["Reasoning", "Code", "Analysis", "General Knowledge"],
        featured: true,
    },
    CatalogModel {
        id: "openai/gpt-4o-mini",
        name: "GPT-4o Mini",
        provider: "OpenAI",
        accent: ACCENT_OPENAI,
        description: "Cost-efficient small multi-modal model, faster than gpt-3.5-turbo with higher intelligence.",
        capabilities: &["Multi-modal", "Image Analysis", "Code", "Reasoning"],
        featured: false,
    },
    CatalogModel {
        id: "openai/o3",
        name: "o3",
        provider: "OpenAI",
        accent: ACCENT_OPENAI,
        description: "Powerful reasoning model with state-of-the-art results in coding, math, science, and visual perception.",
        capabilities: &["Advanced Reasoning", "Math", "Science", "Code"],
        featured: false,
    },
    CatalogModel {
        id: "openai/o4-mini",
        name: "o4 Mini",
        provider: "OpenAI",
        accent: ACCENT_OPENAI,
        description: "Fast, cost-efficient reasoning with strong math, coding, and visual performance for its size.",
        capabilities: &["Math", "Code", "Visual Analysis", "Reasoning"],
        featured: false,
    },
    CatalogModel {
        id: "openai/gpt-4.1",
        name: "GPT-4.1",
        provider: "OpenAI",
        accent: ACCENT_OPENAI,
        description: "Flagship model for complex tasks, well suited for problem solving across domains.",
        capabilities: &["Complex Problem Solving", "Reasoning", "Code", "Analysis"],
        featured: false,
    },
    CatalogModel {
        id: "anthropic/claude-sonnet-4",
        name: "Claude Sonnet 4",
        provider: "Anthropic",
        accent: ACCENT_ANTHROPIC,
        description: "Balances performance and efficiency with enhanced steerability, excelling at coding and software engineering.",
        capabilities: &["Code", "Software Engineering", "Steerability", "Reasoning"],
        featured: true,
    },
    CatalogModel {
        id: "anthropic/claude-3.5-sonnet",
        name: "Claude 3.5 Sonnet",
        provider: "Anthropic",
        accent: ACCENT_ANTHROPIC,
        description: "Ideal balance of intelligence and speed for enterprise workloads at lower cost than its peers.",
        capabilities: &["Enterprise", "Speed", "Reasoning", "Code"],
        featured: false,
    },
    CatalogModel {
        id: "anthropic/claude-3.5-haiku",
        name: "Claude 3.5 Haiku",
        provider: "Anthropic",
        accent: ACCENT_ANTHROPIC,
        description: "Next generation of the fastest Claude tier, surpassing much larger previous-generation models on many benchmarks.",
        capabilities: &["Speed", "Intelligence", "Reasoning", "Code"],
        featured: false,
    },
    CatalogModel {
        id: "google/gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        provider: "Google",
        accent: ACCENT_GOOGLE,
        description: "Advanced reasoning model with a 2M token context window and multimodal input support.",
        capabilities: &["Advanced Reasoning", "Multimodal", "Long Context", "Code"],
        featured: false,
    },
    CatalogModel {
        id: "google/gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        provider: "Google",
        accent: ACCENT_GOOGLE,
        description: "Thinking model balancing price and performance, with multimodal support and a 1M token context window.",
        capabilities: &["Thinking", "Multimodal", "Long Context", "Reasoning"],
        featured: true,
    },
];

pub fn all_models() -> &'static [CatalogModel] {
    MODELS
}

pub fn find_model(id: &str) -> Option<&'static CatalogModel> {
    MODELS.iter().find(|m| m.id.eq_ignore_ascii_case(id))
}

/// Default panel selection when neither CLI flags nor config name models.
pub fn featured_models() -> Vec<&'static CatalogModel> {
    MODELS.iter().filter(|m| m.featured).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_routable() {
        for (i, model) in MODELS.iter().enumerate() {
            assert!(model.id.contains('/'), "{} lacks provider prefix", model.id);
            assert!(
                MODELS[i + 1..].iter().all(|other| other.id != model.id),
                "duplicate id {}",
                model.id
            );
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(find_model("OpenAI/GPT-4o").is_some());
        assert!(find_model("openai/nonexistent").is_none());
    }

    #[test]
    fn featured_selection_is_nonempty() {
        assert!(!featured_models().is_empty());
    }
}
