//! Gemini explanation client
//!
//! Thin wrapper over the generateContent REST endpoint. The API key comes
//! from `GEMINI_API_KEY`; without it every call fails with an integration
//! error rather than at startup, so the classification surface keeps working
//! with no key configured.

use crate::error::{ExoError, Result};
use crate::query::{GeneralEntry, PredictionResult};
use crate::registry::ModelSummary;
use serde_json::json;
use tracing::debug;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Client for the Gemini generateContent API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    /// Build a client from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: GEMINI_MODEL.to_string(),
        }
    }

    /// Send one prompt and return the generated text.
    pub async fn explain(&self, prompt: &str) -> Result<String> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ExoError::Integration("GEMINI_API_KEY is not configured".to_string())
        })?;

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_ENDPOINT, self.model, key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting explanation");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExoError::Integration(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExoError::Integration(format!("Gemini response unreadable: {}", e)))?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ExoError::Integration(format!(
                "Gemini returned {}: {}",
                status, message
            )));
        }

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExoError::Integration("Gemini response carried no text candidate".to_string())
            })
    }
}

/// Spanish prompt explaining the overall evaluation of the current model.
pub fn build_general_prompt(summary: &ModelSummary) -> String {
    let gist = serde_json::to_string_pretty(summary).unwrap_or_default();
    format!(
        "Eres un comunicador científico experto. Explica de forma corta pero sencilla \
         los resultados de un modelo de clasificación entrenado con datos de Kepler.\n\n\
         Datos resumidos del modelo:\n\
         - Accuracy: {}\n\
         - Número de características: {}\n\
         - Número de muestras: {}\n\n\
         También incluye este resumen técnico (no muy largo): {}\n\n\
         Por favor, responde en español y entrega una explicación corta pero simple \
         dividida en estas tres secciones claramente marcadas:\n\
         1) Overview\n2) Key Details\n3) Conclusion\n\n\
         Cada sección debe desarrollarse en profundidad sin usar jerga técnica innecesaria. \
         Solo devuelve esas tres secciones y nada más.\n\
         No te despegues de estos datos, no inventes nada.",
        summary.accuracy, summary.n_features, summary.n_samples, gist
    )
}

/// Spanish prompt explaining one KOI entry plus its prediction when available.
pub fn build_specific_prompt(entry: &GeneralEntry, prediction: Option<&PredictionResult>) -> String {
    let entry_json = serde_json::to_string_pretty(entry).unwrap_or_default();
    let pred_json = prediction
        .and_then(|p| serde_json::to_string_pretty(p).ok())
        .unwrap_or_else(|| "Sin predicción disponible".to_string());

    format!(
        "Eres un comunicador científico experto. Explica de forma larga pero sencilla \
         la información sobre este candidato a exoplaneta y, si existe, la predicción \
         del modelo.\n\n\
         Datos del objeto:\n{}\n\n\
         Predicción del modelo:\n{}\n\n\
         Por favor, responde en español y entrega una explicación larga pero simple \
         dividida en estas tres secciones claramente marcadas:\n\
         1) Overview\n2) Key Details\n3) Conclusion\n\n\
         Cada sección debe desarrollarse en profundidad sin usar jerga técnica innecesaria. \
         Solo devuelve esas tres secciones y nada más.\n\
         No te despegues de estos datos, no inventes nada.",
        entry_json, pred_json
    )
}
