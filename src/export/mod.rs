//! Structured JSON export of a measurement collection, shaped for the
//! downstream catalog tooling that consumes these documents.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::measure::Measurement;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize export document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write export document: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level export payload. Field names are part of the wire contract and
/// stay camelCase regardless of the in-memory names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub image_name: String,
    pub image_url: String,
    pub measurements: Vec<MeasurementRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub pixel_length: f64,
    pub start: ExportPoint,
    pub end: ExportPoint,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExportPoint {
    pub x: f64,
    pub y: f64,
}

impl ExportDocument {
    pub fn new(
        image_name: impl Into<String>,
        image_url: impl Into<String>,
        measurements: &[Measurement],
    ) -> Self {
        Self {
            image_name: image_name.into(),
            image_url: image_url.into(),
            measurements: measurements.iter().map(MeasurementRecord::from).collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl From<&Measurement> for MeasurementRecord {
    fn from(m: &Measurement) -> Self {
        Self {
            label: m.label.clone(),
            value: m.actual_value.clone(),
            pixel_length: m.pixel_length,
            start: ExportPoint {
                x: m.start.x,
                y: m.start.y,
            },
            end: ExportPoint {
                x: m.end.x,
                y: m.end.y,
            },
        }
    }
}

/// Suggested download name for an export: the image name with its final
/// extension replaced by a `_measurements.json` suffix.
pub fn export_file_name(image_name: &str) -> String {
    let stem = match image_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => image_name,
    };
    format!("{stem}_measurements.json")
}
