pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Groq,
    OpenAI,
    Ollama,
}

impl LlmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmType::Groq => "groq",
            LlmType::OpenAI => "openai",
            LlmType::Ollama => "ollama",
        }
    }

    /// Whether the provider refuses calls without a bearer key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmType::Ollama)
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(LlmType::Groq),
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

/// Sampling settings sent with every completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub params: GenerationParams,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Groq,
            api_key: None,
            base_url: None,
            params: GenerationParams::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names_case_insensitively() {
        assert_eq!("GROQ".parse::<LlmType>(), Ok(LlmType::Groq));
        assert_eq!("openai".parse::<LlmType>(), Ok(LlmType::OpenAI));
        assert_eq!("Ollama".parse::<LlmType>(), Ok(LlmType::Ollama));
        assert!("anthropic".parse::<LlmType>().is_err());
    }

    #[test]
    fn only_local_provider_runs_without_key() {
        assert!(LlmType::Groq.requires_api_key());
        assert!(LlmType::OpenAI.requires_api_key());
        assert!(!LlmType::Ollama.requires_api_key());
    }
}
