use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub max_tokens: u32,
    pub context_window: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelCatalog {
    pub models: &'static [ModelInfo],
}

pub const SUPPORTED_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "llama-3.1-8b-instant",
        name: "Llama 3.1 8B Instant",
        description: "Fastest model, ideal for real-time applications",
        max_tokens: 8192,
        context_window: 8192,
    },
    ModelInfo {
        id: "llama-3.1-70b-versatile",
        name: "Llama 3.1 70B Versatile",
        description: "Most capable model for complex tasks",
        max_tokens: 8192,
        context_window: 8192,
    },
    ModelInfo {
        id: "mixtral-8x7b-32768",
        name: "Mixtral 8x7B",
        description: "Excellent for coding and complex reasoning",
        max_tokens: 4096,
        context_window: 32768,
    },
    ModelInfo {
        id: "gemma2-9b-it",
        name: "Gemma 2 9B",
        description: "Great balance of speed and quality",
        max_tokens: 8192,
        context_window: 8192,
    },
];

pub fn catalog() -> ModelCatalog {
    ModelCatalog { models: SUPPORTED_MODELS }
}

/// Informational only: the relay forwards unknown ids untouched.
pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    SUPPORTED_MODELS.iter().find(|m| m.id == id)
}
