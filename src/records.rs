use log::{error, info};
use serde::Serialize;

use crate::err::NfcomxError;
use crate::extract::{FilterSpec, extract_filtered_tag_values, extract_tag_values};
use crate::source::DocumentSource;

/// Placeholder for a source handle that could not be opened or read.
pub const VALUE_INVALID_SOURCE: &str = "[ARQUIVO INVÁLIDO]";
/// Placeholder for a file that parsed fine but produced zero matches.
pub const VALUE_NO_MATCHES: &str = "[NENHUM VALOR ENCONTRADO COM ESTES CRITÉRIOS]";
/// Placeholder for a document the recovery mode could not salvage.
pub const VALUE_PARSE_ERROR: &str = "[ERRO AO PROCESSAR XML]";
/// Description used when no filter is active.
pub const FILTER_NONE: &str = "Nenhum";

/// One row of extraction output: a distinct value of `tag` observed in
/// `source_name`, or a sentinel placeholder with zero occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub source_name: String,
    pub tag: String,
    pub filter: String,
    pub value: String,
    pub occurrences: u64,
}

/// A multi-file extraction request. Filtering activates only when context
/// tag, filter tag and filter value are all supplied and non-empty; blank
/// strings are treated as absent, mirroring empty form fields.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub tag_name: String,
    pub context_tag: Option<String>,
    pub filter_path: Option<String>,
    pub filter_tag: Option<String>,
    pub filter_value: Option<String>,
}

impl ExtractionRequest {
    pub fn unfiltered(tag_name: impl Into<String>) -> Self {
        ExtractionRequest {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    /// The active filter, if the request supplies all mandatory parts.
    pub fn filter_spec(&self) -> Option<FilterSpec> {
        let spec = FilterSpec {
            context_tag: self.context_tag.clone().unwrap_or_default(),
            filter_path: self.filter_path.clone(),
            filter_tag: self.filter_tag.clone().unwrap_or_default(),
            filter_value: self.filter_value.clone().unwrap_or_default(),
            target_tag: self.tag_name.clone(),
        };

        spec.is_active().then_some(spec)
    }

    pub fn filter_description(&self) -> String {
        match self.filter_spec() {
            Some(spec) => spec.description(),
            None => FILTER_NONE.to_owned(),
        }
    }
}

/// Runs the extraction over every source in input order, never failing: a
/// bad file is logged and reduced to a single placeholder record with zero
/// occurrences so the remaining files still get processed.
pub fn process_files(sources: &[DocumentSource], request: &ExtractionRequest) -> Vec<ResultRecord> {
    let mut records = Vec::new();
    let filter_spec = request.filter_spec();
    let filter_description = request.filter_description();

    for source in sources {
        let source_name = source.name();
        info!(
            "extracting `{}` from `{source_name}` (filter: {filter_description})",
            request.tag_name
        );

        let extracted = match &filter_spec {
            Some(spec) => extract_filtered_tag_values(source, spec),
            None => extract_tag_values(source, &request.tag_name),
        };

        let record = |value: String, occurrences: u64| ResultRecord {
            source_name: source_name.clone(),
            tag: request.tag_name.clone(),
            filter: filter_description.clone(),
            value,
            occurrences,
        };

        match extracted {
            Ok(counts) if counts.is_empty() => {
                records.push(record(VALUE_NO_MATCHES.to_owned(), 0));
            }
            Ok(counts) => {
                for (value, count) in counts.iter() {
                    records.push(record(value.to_owned(), count));
                }
            }
            Err(e) => {
                error!("failed to process `{source_name}`: {e}");
                records.push(record(placeholder_for(&e), 0));
            }
        }
    }

    records
}

fn placeholder_for(error: &NfcomxError) -> String {
    if error.is_invalid_source() {
        VALUE_INVALID_SOURCE.to_owned()
    } else if error.is_syntax() {
        VALUE_PARSE_ERROR.to_owned()
    } else {
        format!("[ERRO INESPERADO: {error}]")
    }
}

/// The grand total shown under the result table.
pub fn total_occurrences(records: &[ResultRecord]) -> u64 {
    records.iter().map(|r| r.occurrences).sum()
}
