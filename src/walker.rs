use std::io::BufRead;

use log::{trace, warn};
use quick_xml::Reader;
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};

use crate::element::Element;
use crate::err::{NfcomxError, Result};

/// Recovery gives up once a document produced this many salvageable errors;
/// past that point it is noise, not a document with a few mangled fragments.
const MAX_RECOVERED_ERRORS: u64 = 1024;

/// Counters collected over one walk.
///
/// `peak_buffered_bytes` approximates the largest subtree held in memory at
/// any point, which is what bounds the walker's footprint: everything outside
/// a matching subtree is dropped as the events stream past, so the peak must
/// track the largest matching element, never the document size.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkStats {
    pub matched_subtrees: u64,
    pub recovered_errors: u64,
    pub peak_buffered_bytes: usize,
}

struct Frame {
    element: Element,
}

/// Single forward pass over `reader`, invoking `on_subtree` with the fully
/// captured subtree of every element whose local name equals `tag_name`.
///
/// Nested same-named elements are delivered once, inside their outermost
/// occurrence; callers that need every occurrence walk the captured tree with
/// [`Element::descendants_named`].
///
/// Ill-formed fragments are skipped in a best-effort fashion: the fragment
/// (and any capture in progress) is dropped with a warning and the walk
/// resumes, aborting only when the reader stops making progress or the error
/// is not a well-formedness problem.
pub fn walk_matching_subtrees<R, F>(reader: R, tag_name: &str, mut on_subtree: F) -> Result<WalkStats>
where
    R: BufRead,
    F: FnMut(&Element) -> Result<()>,
{
    let mut reader = Reader::from_reader(reader);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut stats = WalkStats::default();
    let mut capture: Vec<Frame> = Vec::new();
    let mut buffered_bytes = 0usize;
    let mut last_error_position = u64::MAX;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if !capture.is_empty() {
                    buffered_bytes += e.len();
                    capture.push(Frame {
                        element: element_from_start(e),
                    });
                } else if local_name_of(e) == tag_name {
                    trace!(
                        "opening capture of `{tag_name}` at byte {}",
                        reader.buffer_position()
                    );
                    buffered_bytes = e.len();
                    capture.push(Frame {
                        element: element_from_start(e),
                    });
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(frame) = capture.last_mut() {
                    buffered_bytes += e.len();
                    frame.element.children.push(element_from_start(e));
                } else if local_name_of(e) == tag_name {
                    stats.matched_subtrees += 1;
                    stats.peak_buffered_bytes = stats.peak_buffered_bytes.max(e.len());
                    on_subtree(&element_from_start(e))?;
                }
            }
            Ok(Event::End(_)) => {
                if let Some(frame) = capture.pop() {
                    match capture.last_mut() {
                        Some(parent) => parent.element.children.push(frame.element),
                        None => {
                            stats.matched_subtrees += 1;
                            stats.peak_buffered_bytes =
                                stats.peak_buffered_bytes.max(buffered_bytes);
                            buffered_bytes = 0;
                            on_subtree(&frame.element)?;
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(frame) = capture.last_mut() {
                    buffered_bytes += e.len();
                    match e.unescape() {
                        Ok(text) => frame.element.text.push_str(&text),
                        Err(err) => {
                            warn!("unescapable text node, keeping raw bytes: {err}");
                            frame
                                .element
                                .text
                                .push_str(&String::from_utf8_lossy(e.as_ref()));
                        }
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(frame) = capture.last_mut() {
                    buffered_bytes += e.len();
                    frame
                        .element
                        .text
                        .push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => {
                if !capture.is_empty() {
                    // EOF inside a matched subtree: the document is truncated.
                    return Err(NfcomxError::Syntax {
                        offset: reader.buffer_position(),
                        message: format!(
                            "document ended inside an unclosed `{}` element",
                            capture[0].element.name
                        ),
                    });
                }
                break;
            }
            Ok(_) => {}
            Err(quick_xml::Error::IllFormed(err @ IllFormedError::MissingEndTag(_))) => {
                // Truncated document; nothing left to resume from.
                return Err(NfcomxError::Syntax {
                    offset: reader.buffer_position(),
                    message: format!("{err}"),
                });
            }
            Err(err @ (quick_xml::Error::IllFormed(_) | quick_xml::Error::Syntax(_))) => {
                let position = reader.buffer_position();
                if position == last_error_position {
                    return Err(NfcomxError::Syntax {
                        offset: position,
                        message: format!("unrecoverable ill-formed XML: {err}"),
                    });
                }
                last_error_position = position;

                stats.recovered_errors += 1;
                if stats.recovered_errors > MAX_RECOVERED_ERRORS {
                    return Err(NfcomxError::Syntax {
                        offset: position,
                        message: format!("too many ill-formed fragments, last: {err}"),
                    });
                }

                warn!("skipping ill-formed XML fragment at byte {position}: {err}");
                if !capture.is_empty() {
                    // The subtree being captured is structurally broken.
                    capture.clear();
                    buffered_bytes = 0;
                }
            }
            Err(err) => {
                return Err(NfcomxError::Syntax {
                    offset: reader.buffer_position(),
                    message: format!("{err}"),
                });
            }
        }

        buf.clear();
    }

    trace!(
        "walk for `{tag_name}` done: {} subtree(s), {} recovered error(s), peak {} buffered byte(s)",
        stats.matched_subtrees, stats.recovered_errors, stats.peak_buffered_bytes
    );

    Ok(stats)
}

fn local_name_of(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned()
}

fn element_from_start(e: &BytesStart) -> Element {
    let mut element = Element::new(local_name_of(e));

    for attr in e.attributes().filter_map(|a| a.ok()) {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.attributes.push((key, value));
    }

    element
}
