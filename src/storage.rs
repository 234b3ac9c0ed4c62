//! Durable JSON artifacts. One file per (document type, content hash),
//! named `{hash}.json` for balance sheets, `{hash}_eri.json` for income
//! statements and `{hash}_efe.json` for cash-flow statements. The store only
//! writes; downstream aggregation reads the files by naming convention.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::header::HeaderMeta;
use crate::kpi::KpiReport;
use crate::schema::{DocumentType, ExtractionResult};

/// Type flag pair serialized under the key names downstream readers expect
/// for each statement type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum TypeSignal {
    Balance {
        is_balance: bool,
        balance_confidence: f64,
    },
    Income {
        is_eri: bool,
        eri_confidence: f64,
    },
    CashFlow {
        is_cashflow: bool,
        cashflow_confidence: f64,
    },
}

/// Extraction quality signals carried alongside the fields.
#[derive(Debug, Clone, Serialize)]
pub struct DataQuality {
    pub markers_hits: usize,
    pub scale_factor: f64,
    pub non_null_ratio: f64,
}

/// The persisted shape of one extraction. Every wire key of the statement's
/// field set appears in `fields` and `field_confidence`, null when absent;
/// `kpis` is present on balance artifacts only.
#[derive(Debug, Clone, Serialize)]
pub struct StatementArtifact {
    #[serde(skip)]
    document_type: DocumentType,
    pub doc_hash: String,
    #[serde(flatten)]
    type_signal: TypeSignal,
    pub fields: BTreeMap<String, Option<f64>>,
    pub field_confidence: BTreeMap<String, Option<f64>>,
    pub evidence_pages: BTreeMap<String, Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpis: Option<KpiReport>,
    /// Strategy label, so readers can tell a code-indexed extraction from a
    /// retrieval-backed one.
    pub extraction_model: String,
    pub header_meta: HeaderMeta,
    pub data_quality: DataQuality,
    pub notes: Vec<String>,
}

impl StatementArtifact {
    /// Flatten an extraction result into the persisted shape. Balance
    /// results embed their KPI report; the other types stay scoreable
    /// through [`crate::kpi::score_fields`] on read.
    pub fn from_result(result: &ExtractionResult) -> Self {
        let type_signal = match result.document_type {
            DocumentType::Balance => TypeSignal::Balance {
                is_balance: result.is_type,
                balance_confidence: result.type_confidence,
            },
            DocumentType::Income => TypeSignal::Income {
                is_eri: result.is_type,
                eri_confidence: result.type_confidence,
            },
            DocumentType::CashFlow => TypeSignal::CashFlow {
                is_cashflow: result.is_type,
                cashflow_confidence: result.type_confidence,
            },
        };
        let kpis = match result.document_type {
            DocumentType::Balance => Some(crate::kpi::score_fields(&result.fields)),
            _ => None,
        };
        let extraction_model = match result.document_type {
            DocumentType::Balance | DocumentType::Income => "retrieval+completion",
            DocumentType::CashFlow => "code-index+completion-fallback",
        };

        Self {
            document_type: result.document_type,
            doc_hash: result.doc_hash.clone(),
            type_signal,
            fields: result
                .fields
                .iter()
                .map(|(k, f)| (k.clone(), f.value))
                .collect(),
            field_confidence: result
                .fields
                .iter()
                .map(|(k, f)| (k.clone(), f.confidence))
                .collect(),
            evidence_pages: result
                .fields
                .iter()
                .map(|(k, f)| (k.clone(), f.evidence_pages.iter().copied().collect()))
                .collect(),
            kpis,
            extraction_model: extraction_model.to_string(),
            header_meta: result.header.clone(),
            data_quality: DataQuality {
                markers_hits: result.markers_hits,
                scale_factor: result.header.scale_factor,
                non_null_ratio: result.non_null_ratio(),
            },
            notes: result.notes.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}.json",
            self.doc_hash,
            self.document_type.artifact_suffix()
        )
    }
}

/// Write-once artifact directory. Two writers racing on the same hash both
/// write the full file; last write wins, which is acceptable because the
/// deterministic stages produce identical content for identical input.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one artifact, creating the directory on first use. Returns
    /// the path written.
    pub fn save(&self, artifact: &StatementArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(artifact.file_name());
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&path, json)?;
        info!("saved {:?} artifact to {}", artifact.document_type, path.display());
        Ok(path)
    }
}
