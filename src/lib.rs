//! Exoserve - Kepler exoplanet classification service
//!
//! A single-process HTTP service that trains a random-forest classifier on
//! the Kepler Objects of Interest catalog and serves predictions, listings,
//! and model metrics. Retraining replaces the current model generation
//! atomically while readers keep using the previous one.
//!
//! # Modules
//!
//! ## Core pipeline
//! - [`dataset`] - CSV loading, disposition filtering, feature derivation
//! - [`preprocessing`] - Standard scaling fit on the training partition
//! - [`training`] - Stratified split, random forest, evaluation metrics
//!
//! ## Lifecycle
//! - [`config`] - Hyperparameter store with atomic partial updates
//! - [`registry`] - Single-slot registry of the current model generation
//! - [`query`] - Predictions and listings against one generation snapshot
//!
//! ## Integrations
//! - [`gemini`] - Text explanations via the Gemini API
//! - [`imagegen`] - Planet renders via the Hugging Face inference API
//!
//! ## Service
//! - [`server`] - axum HTTP server with the REST surface

pub mod error;

pub mod config;
pub mod dataset;
pub mod preprocessing;
pub mod training;

pub mod query;
pub mod registry;

pub mod gemini;
pub mod imagegen;

pub mod server;

pub use error::{ExoError, Result};
