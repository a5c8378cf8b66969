//! Watermark operations and their server-side option records.
//!
//! Callers only ever choose *which* operation runs (the `{operation}` path
//! segment). Everything the external tool sees (script, options record,
//! suggested download name) comes from the [`OperationSpec`] registered
//! under that name. Nothing in the multipart body can change it.

use crate::error::WatermarkError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// The options record handed to the external transformer as `--options <json>`.
///
/// Field names on the wire follow the tool's JSON contract. Size and shift
/// values are fractions of the detected page content box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkOptions {
    /// Stamp text.
    pub text: String,

    /// Rotation in degrees; negative tilts clockwise.
    pub rotate: f64,

    /// Stamp opacity, 0..=1.
    pub opacity: f64,

    /// Stamp width as a fraction of the content width, 0..=1.
    #[serde(rename = "wmWidthPctOfContent")]
    pub width_pct_of_content: f64,

    #[serde(rename = "shiftXPctOfContent")]
    pub shift_x_pct_of_content: f64,

    #[serde(rename = "shiftYPctOfContent")]
    pub shift_y_pct_of_content: f64,
}

impl WatermarkOptions {
    /// An upright, fully centred stamp with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rotate: 0.0,
            opacity: 1.0,
            width_pct_of_content: 0.25,
            shift_x_pct_of_content: 0.0,
            shift_y_pct_of_content: 0.0,
        }
    }

    /// The "LUNAS" (paid) stamp applied to invoices.
    pub fn lunas() -> Self {
        Self::new("LUNAS")
            .rotate(-20.0)
            .opacity(0.18)
            .width_pct_of_content(0.40)
            .shift(0.065, -0.020)
    }

    pub fn rotate(mut self, degrees: f64) -> Self {
        self.rotate = degrees;
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn width_pct_of_content(mut self, pct: f64) -> Self {
        self.width_pct_of_content = pct.clamp(0.0, 1.0);
        self
    }

    pub fn shift(mut self, x_pct: f64, y_pct: f64) -> Self {
        self.shift_x_pct_of_content = x_pct;
        self.shift_y_pct_of_content = y_pct;
        self
    }

    /// Serialise to the compact JSON passed on the command line.
    pub fn to_json(&self) -> Result<String, WatermarkError> {
        serde_json::to_string(self)
            .map_err(|e| WatermarkError::Internal(format!("Failed to serialise options: {e}")))
    }
}

/// Everything needed to run one named watermark operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    /// Script path, relative to the configured tools directory (or absolute).
    pub script: PathBuf,
    pub options: WatermarkOptions,
    /// Suggested filename in `Content-Disposition`.
    pub download_name: String,
}

impl OperationSpec {
    pub fn new(
        script: impl Into<PathBuf>,
        options: WatermarkOptions,
        download_name: impl Into<String>,
    ) -> Self {
        Self {
            script: script.into(),
            options,
            download_name: download_name.into(),
        }
    }

    pub fn lunas() -> Self {
        Self::new(
            "watermark_lunas.py",
            WatermarkOptions::lunas(),
            "invoice-LUNAS.pdf",
        )
    }
}

/// Operations reachable under `POST /watermark/{operation}`.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Arc<OperationSpec>>,
}

impl OperationRegistry {
    /// An empty registry; every request would 404.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The operations shipped with the server.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert("lunas", OperationSpec::lunas());
        registry
    }

    /// Register (or replace) an operation.
    pub fn insert(&mut self, name: impl Into<String>, spec: OperationSpec) {
        self.operations.insert(name.into(), Arc::new(spec));
    }

    pub fn get(&self, name: &str) -> Option<Arc<OperationSpec>> {
        self.operations.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
