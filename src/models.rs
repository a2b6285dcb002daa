use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Backend routes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    // server-sent events, one event per chunk
    Stream,
    // single JSON body
    Complete,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Stream => "/generate-stream",
            Endpoint::Complete => "/generate",
        }
    }
}

// Backend model family
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Rnn,
    Transformer,
}

impl ModelKind {
    /// Map a UI model id onto the backend family. Unknown ids fall back to
    /// the transformer backend.
    pub fn from_model_id(id: &str) -> Self {
        match id {
            "virtue-v1" | "rnn" => ModelKind::Rnn,
            _ => ModelKind::Transformer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Rnn => "rnn",
            ModelKind::Transformer => "transformer",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rnn" => Ok(ModelKind::Rnn),
            "transformer" => Ok(ModelKind::Transformer),
            other => Err(format!("unknown model family: {}", other)),
        }
    }
}

// Generation request, sent as the JSON body. Unset fields are left out of
// the body entirely.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_repetition_penalty(mut self, penalty: f64) -> Self {
        self.repetition_penalty = Some(penalty);
        self
    }
}

// Full generated text. For streamed requests this starts with the prompt.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GenerationResponse {
    pub generated: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_are_left_out_of_the_body() {
        let req = GenerationRequest::new("Hi")
            .with_temperature(0.5)
            .with_model(ModelKind::Rnn);

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({ "prompt": "Hi", "temperature": 0.5, "model": "rnn" })
        );
    }

    #[test]
    fn every_field_uses_its_wire_name() {
        let req = GenerationRequest::new("p")
            .with_length(64)
            .with_temperature(0.7)
            .with_model(ModelKind::Transformer)
            .with_top_k(40)
            .with_top_p(0.9)
            .with_repetition_penalty(1.2);

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["length"], 64);
        assert_eq!(body["model"], "transformer");
        assert_eq!(body["top_k"], 40);
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["repetition_penalty"], 1.2);
    }

    #[test]
    fn model_ids_map_to_backend_family() {
        assert_eq!(ModelKind::from_model_id("virtue-v1"), ModelKind::Rnn);
        assert_eq!(ModelKind::from_model_id("virtue-v2"), ModelKind::Transformer);
        assert_eq!(
            ModelKind::from_model_id("llama-transformer"),
            ModelKind::Transformer
        );
        assert_eq!(ModelKind::from_model_id("something-else"), ModelKind::Transformer);
        assert_eq!(ModelKind::from_model_id("rnn"), ModelKind::Rnn);
    }

    #[test]
    fn model_kind_parses_strictly() {
        assert_eq!("rnn".parse::<ModelKind>(), Ok(ModelKind::Rnn));
        assert!("virtue-v1".parse::<ModelKind>().is_err());
    }
}
