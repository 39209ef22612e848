use hashbrown::HashSet;
use log::{info, warn};
use quick_xml::events::{BytesDecl, Event};
use quick_xml::{Reader, Writer};

use crate::element::Element;
use crate::err::{NfcomxError, Result};
use crate::path_expr::QueryPath;
use crate::records::ResultRecord;
use crate::source::DocumentSource;
use crate::walker::walk_matching_subtrees;

/// The record container selected wholesale into a batch.
pub const RECORD_TAG: &str = "Fatura";
/// Root element of a consolidated batch document.
pub const BATCH_ROOT_TAG: &str = "loteNFCom";

pub const BATCH_NUMBER_ATTR: &str = "NUMERO_LOTE";
pub const BATCH_CREATED_ATTR: &str = "DATA_CRIACAO";
pub const BATCH_COUNT_ATTR: &str = "QUANTIDADE_NFCOM_NO_LOTE";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Candidate locations of the UF inside a record, most specific first. The
/// container's internal layout is not uniform across input documents, so the
/// record is kept when any candidate path holds the target UF.
const UF_PATH_CANDIDATES: [&str; 4] = [
    "infNFCom/emit/enderEmit/UF",
    "emit/enderEmit/UF",
    "dest/enderDest/UF",
    "UF",
];

/// A consolidated batch document. `record_count` always equals the number of
/// record fragments wrapped inside `xml`; an empty batch is still a valid,
/// well-formed document with count 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedBatch {
    pub batch_number: String,
    pub created_at: String,
    pub record_count: u64,
    pub xml: String,
}

/// Consolidates every record whose UF equals `target_uf` (case-insensitive)
/// into a new batch document. Unreadable or unsalvageable source files are
/// logged and skipped; this never fails.
pub fn consolidate_by_uf(
    sources: &[DocumentSource],
    target_uf: &str,
    batch_number: &str,
) -> ConsolidatedBatch {
    let target = target_uf.trim().to_uppercase();
    let candidates: Vec<QueryPath> = UF_PATH_CANDIDATES.iter().map(|p| QueryPath::parse(p)).collect();

    let fragments = collect_matching_records(sources, |record| {
        candidates.iter().any(|path| {
            record
                .find_descendant_path(path.segments())
                .is_some_and(|uf| uf.trimmed_text().to_uppercase() == target)
        })
    });

    assemble_batch(fragments, batch_number)
}

/// Consolidates every record whose target tag value appears in a prior
/// extraction result set. The target tag comes from the first result record;
/// placeholder records (zero occurrences) do not contribute to the accept-set.
pub fn consolidate_by_results(
    sources: &[DocumentSource],
    results: &[ResultRecord],
    batch_number: &str,
) -> ConsolidatedBatch {
    let Some(target_tag) = results.first().map(|r| r.tag.clone()) else {
        warn!("result-driven consolidation called with no prior results");
        return assemble_batch(Vec::new(), batch_number);
    };

    let accept_set: HashSet<String> = results
        .iter()
        .filter(|r| r.occurrences > 0)
        .map(|r| r.value.to_uppercase())
        .collect();

    let fragments = collect_matching_records(sources, |record| {
        record
            .find_descendant(&target_tag)
            .is_some_and(|target| accept_set.contains(&target.trimmed_text().to_uppercase()))
    });

    assemble_batch(fragments, batch_number)
}

/// Streams the record containers of every source, serializing each one the
/// predicate accepts. A failing file forfeits only its own remaining records.
fn collect_matching_records<P>(sources: &[DocumentSource], predicate: P) -> Vec<String>
where
    P: Fn(&Element) -> bool,
{
    let mut fragments = Vec::new();

    for source in sources {
        let name = source.name();
        info!("consolidating records from `{name}`");

        let reader = match source.open() {
            Ok(reader) => reader,
            Err(e) => {
                warn!("skipping `{name}` during consolidation: {e}");
                continue;
            }
        };

        let walked = walk_matching_subtrees(reader, RECORD_TAG, |record| {
            if predicate(record) {
                fragments.push(serialize_record(record)?);
            }
            Ok(())
        });

        if let Err(e) = walked {
            warn!("skipping remainder of `{name}` during consolidation: {e}");
        }
    }

    fragments
}

fn serialize_record(record: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    record.write_into(&mut writer)?;

    String::from_utf8(writer.into_inner()).map_err(|e| NfcomxError::Unexpected {
        detail: format!("serialized record is not valid UTF-8: {e}"),
    })
}

fn assemble_batch(fragments: Vec<String>, batch_number: &str) -> ConsolidatedBatch {
    let created_at = jiff::Zoned::now()
        .strftime("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let record_count = fragments.len() as u64;
    let number = quick_xml::escape::escape(batch_number);

    let open_root = format!(
        "<{BATCH_ROOT_TAG} {BATCH_NUMBER_ATTR}=\"{number}\" {BATCH_CREATED_ATTR}=\"{created_at}\" {BATCH_COUNT_ATTR}=\"{record_count}\">"
    );

    if fragments.is_empty() {
        info!("no matching records; emitting an empty batch");
        return ConsolidatedBatch {
            batch_number: batch_number.to_owned(),
            created_at,
            record_count: 0,
            xml: format!("{XML_DECLARATION}\n{open_root}</{BATCH_ROOT_TAG}>"),
        };
    }

    let raw = format!(
        "{open_root}\n{}\n</{BATCH_ROOT_TAG}>",
        fragments.join("\n")
    );

    let xml = match normalize_document(&raw) {
        Ok(normalized) => normalized,
        Err(e) => {
            // The batch is still usable; hand back the raw concatenation.
            warn!("failed to re-indent consolidated batch, returning it unnormalized: {e}");
            if raw.trim_start().starts_with("<?xml") {
                raw
            } else {
                format!("{XML_DECLARATION}\n{raw}")
            }
        }
    };

    info!("consolidated {record_count} record(s) into batch {batch_number}");

    ConsolidatedBatch {
        batch_number: batch_number.to_owned(),
        created_at,
        record_count,
        xml,
    }
}

/// Re-parses the joined document once, dropping inter-element whitespace and
/// re-emitting with consistent indentation and a single XML declaration.
fn normalize_document(raw: &str) -> Result<String> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Decl(_)) => {}
            Ok(event) => writer.write_event(event)?,
            Err(e) => {
                return Err(NfcomxError::Syntax {
                    offset: reader.buffer_position(),
                    message: format!("{e}"),
                });
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| NfcomxError::Unexpected {
        detail: format!("normalized batch is not valid UTF-8: {e}"),
    })
}
