//! Exoplanet image generation via the Hugging Face inference API
//!
//! Sends a text prompt to a hosted diffusion model and stores the returned
//! PNG under `exoplanets/<sanitized-name>.png`. The token comes from
//! `HF_TOKEN` (or `HF_HUGGINGFACE_TOKEN`); calls without one fail with an
//! integration error.

use crate::error::{ExoError, Result};
use crate::query::GeneralEntry;
use serde_json::json;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

const DEFAULT_API_URL: &str =
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0";

/// Directory where generated planet renders are stored
pub const IMAGE_DIR: &str = "exoplanets";

/// Client for the hosted diffusion model.
#[derive(Debug, Clone)]
pub struct ImageGenClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    output_dir: PathBuf,
}

impl ImageGenClient {
    /// Build a client from `HF_TOKEN` / `HF_HUGGINGFACE_TOKEN`.
    pub fn from_env() -> Self {
        let token = std::env::var("HF_TOKEN")
            .ok()
            .or_else(|| std::env::var("HF_HUGGINGFACE_TOKEN").ok())
            .filter(|t| !t.is_empty());
        Self {
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            token,
            output_dir: PathBuf::from(IMAGE_DIR),
        }
    }

    /// Generate an image for `prompt` and save it as `<name>.png` in the
    /// output directory. Returns the saved path.
    pub async fn generate(&self, prompt: &str, name: &str) -> Result<PathBuf> {
        let token = self.token.as_deref().ok_or_else(|| {
            ExoError::Integration("HF_TOKEN is not configured".to_string())
        })?;

        let payload = json!({
            "inputs": prompt,
            "options": { "wait_for_model": true }
        });

        debug!(prompt_len = prompt.len(), name, "Requesting image generation");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ExoError::Integration(format!("Image request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExoError::Integration(format!(
                "Model call failed (status {}): {}",
                status, detail
            )));
        }

        // Anything but image bytes is a model-side error payload
        if !content_type.contains("image") {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExoError::Integration(format!(
                "Unexpected content type '{}': {}",
                content_type, detail
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExoError::Integration(format!("Image body unreadable: {}", e)))?;

        fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.png", sanitize_name(name)));
        fs::write(&path, &bytes).await?;

        info!(path = %path.display(), bytes = bytes.len(), "Saved generated image");
        Ok(path)
    }

    /// Locate a previously generated image for `name`, preferring `.png` but
    /// accepting the other common extensions, then a case-insensitive prefix.
    pub async fn find_image(&self, name: &str) -> Option<PathBuf> {
        let safe = sanitize_name(name);
        for ext in ["png", "jpg", "jpeg"] {
            let candidate = self.output_dir.join(format!("{}.{}", safe, ext));
            if fs::metadata(&candidate).await.is_ok() {
                return Some(candidate);
            }
        }

        let mut entries = fs::read_dir(&self.output_dir).await.ok()?;
        let prefix = safe.to_lowercase();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name().to_string_lossy().to_lowercase();
            if file_name.starts_with(&prefix) {
                return Some(entry.path());
            }
        }
        None
    }
}

/// Restrict a name to filename-safe characters; spaces become underscores.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Descriptive rendering prompt built from a KOI entry's known properties.
pub fn build_planet_prompt(entry: &GeneralEntry, extra: Option<&str>) -> String {
    let mut parts: Vec<String> = vec![
        "Photorealistic full-disc rendering of an exoplanet, centered in frame, whole planet \
         visible (not a surface close-up)."
            .to_string(),
        "Background: deep black space, subtle distant stars, no text or UI elements.".to_string(),
        "Lighting: cinematic, realistic star lighting with soft atmospheric scattering on the \
         limb."
            .to_string(),
        "Style: high detail, high resolution, realistic planetary textures, natural color \
         palette, no signatures or watermarks."
            .to_string(),
    ];

    if let Some(srad) = entry.koi_srad {
        parts.push(format!(
            "Apparent host star radius (relative units): approximately {}; adjust star \
             brightness accordingly.",
            srad
        ));
    }
    if let Some(steff) = entry.koi_steff {
        parts.push(format!(
            "Host star effective temperature: {} K; choose star color and lighting consistent \
             with this temperature.",
            steff
        ));
    }
    if let Some(depth) = entry.koi_depth {
        parts.push(format!(
            "Transit depth indicator: {} (use to suggest the planet's relative size vs star).",
            depth
        ));
    }
    if let Some(period) = entry.koi_period {
        parts.push(format!(
            "Orbital period: {} days (can suggest proximity to host and atmospheric appearance).",
            period
        ));
    }
    if let Some(slogg) = entry.koi_slogg {
        parts.push(format!(
            "Surface gravity proxy (log g): {}; influence cloud cover and atmospheric thickness \
             accordingly.",
            slogg
        ));
    }
    if let Some(disposition) = &entry.koi_disposition {
        parts.push(format!(
            "Disposition: {}. Render as a plausible planet consistent with this label.",
            disposition
        ));
    }
    if let Some(extra) = extra {
        parts.push(extra.to_string());
    }

    parts.push(
        "Focus on the whole spherical planet centered in the image; black background; do not \
         include spacecraft, people, or UI; produce a single PNG image."
            .to_string(),
    );

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("K00001.01"), "K00001.01");
        assert_eq!(sanitize_name("Kepler-227 b"), "Kepler-227_b");
        assert_eq!(sanitize_name("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_name("  "), "image");
    }

    #[test]
    fn test_prompt_includes_known_fields() {
        let entry = GeneralEntry {
            kepid: Some(1),
            kepler_name: None,
            kepoi_name: Some("K00001.01".to_string()),
            name: Some("K00001.01".to_string()),
            koi_disposition: Some("CONFIRMED".to_string()),
            koi_period: Some(9.49),
            koi_duration: None,
            koi_depth: Some(615.8),
            koi_model_snr: None,
            koi_steff: Some(5455.0),
            koi_srad: None,
            koi_slogg: None,
        };
        let prompt = build_planet_prompt(&entry, Some("teal rings"));
        assert!(prompt.contains("5455 K"));
        assert!(prompt.contains("9.49 days"));
        assert!(prompt.contains("Disposition: CONFIRMED"));
        assert!(prompt.contains("teal rings"));
        assert!(!prompt.contains("log g"));
    }

    #[tokio::test]
    async fn test_missing_token_is_integration_error() {
        let client = ImageGenClient {
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            output_dir: PathBuf::from(IMAGE_DIR),
        };
        let err = client.generate("a planet", "K00001.01").await.unwrap_err();
        assert!(matches!(err, ExoError::Integration(_)));
    }

    #[tokio::test]
    async fn test_find_image_prefers_png() {
        let dir = tempfile::tempdir().unwrap();
        let client = ImageGenClient {
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            output_dir: dir.path().to_path_buf(),
        };
        tokio::fs::write(dir.path().join("K00001.01.png"), b"png").await.unwrap();
        tokio::fs::write(dir.path().join("K00001.01.jpg"), b"jpg").await.unwrap();

        let found = client.find_image("K00001.01").await.unwrap();
        assert_eq!(found, dir.path().join("K00001.01.png"));
        assert!(client.find_image("K99999.99").await.is_none());
    }
}
