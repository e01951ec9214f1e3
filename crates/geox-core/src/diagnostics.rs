// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Diagnostics schema version for run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Provenance captured alongside a generated dataset or analysis run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunDiagnostics {
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub seed: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for RunDiagnostics {
    fn default() -> Self {
        Self {
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            seed: None,
            notes: vec![],
            warnings: vec![],
        }
    }
}

impl RunDiagnostics {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
