use hashbrown::HashMap;
use log::debug;

use crate::err::Result;
use crate::path_expr::QueryPath;
use crate::source::DocumentSource;
use crate::walker::walk_matching_subtrees;

/// Placeholder counted when a context matched the filter but the target tag
/// is absent or empty inside it.
pub const VALUE_TARGET_MISSING: &str = "[TAG ALVO NÃO ENCONTRADA/VAZIA NO CONTEXTO DO FILTRO]";

/// Occurrence counts keyed by observed trimmed text value.
///
/// Iteration follows first-occurrence order, which is what downstream result
/// records are ordered by. The empty string is a valid key (elements with
/// missing or whitespace-only text).
#[derive(Debug, Default, Clone)]
pub struct ValueCounts {
    counts: HashMap<String, u64>,
    order: Vec<String>,
}

impl ValueCounts {
    pub fn increment(&mut self, value: &str) {
        match self.counts.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(value.to_owned(), 1);
                self.order.push(value.to_owned());
            }
        }
    }

    pub fn get(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all occurrence counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Distinct values with their counts, in first-occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.order
            .iter()
            .map(|value| (value.as_str(), self.counts[value]))
    }
}

/// A conditional extraction: iterate `context_tag` subtrees, keep those where
/// the filter condition holds, and extract `target_tag` from each kept one.
///
/// Filtering is considered active only when `context_tag`, `filter_tag` and
/// `filter_value` are all non-empty; `filter_path` optionally pins the filter
/// tag to a relative location inside the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub context_tag: String,
    pub filter_path: Option<String>,
    pub filter_tag: String,
    pub filter_value: String,
    pub target_tag: String,
}

impl FilterSpec {
    pub fn is_active(&self) -> bool {
        !self.context_tag.is_empty()
            && !self.filter_tag.is_empty()
            && !self.filter_value.is_empty()
    }

    /// The relative path, if one was actually supplied (empty strings count
    /// as absent, mirroring blank form fields).
    pub fn filter_path(&self) -> Option<&str> {
        self.filter_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
    }

    /// Human-readable description used in result records, e.g.
    /// `Contexto: infNFCom, Tag Filtro: xNome, Caminho Filtro: dest, Valor Filtro: X`.
    pub fn description(&self) -> String {
        let mut parts = Vec::new();
        if !self.context_tag.is_empty() {
            parts.push(format!("Contexto: {}", self.context_tag));
        }
        if !self.filter_tag.is_empty() {
            parts.push(format!("Tag Filtro: {}", self.filter_tag));
        }
        if let Some(path) = self.filter_path() {
            parts.push(format!("Caminho Filtro: {path}"));
        }
        if !self.filter_value.is_empty() {
            parts.push(format!("Valor Filtro: {}", self.filter_value));
        }
        parts.join(", ")
    }
}

/// Counts the text values of every element named `tag_name` in the document.
///
/// Nested same-named occurrences each count once, with their own direct text.
pub fn extract_tag_values(source: &DocumentSource, tag_name: &str) -> Result<ValueCounts> {
    let reader = source.open()?;
    let mut counts = ValueCounts::default();

    walk_matching_subtrees(reader, tag_name, |elem| {
        counts.increment(elem.trimmed_text());

        let mut nested = Vec::new();
        elem.descendants_named(tag_name, &mut nested);
        for inner in nested {
            counts.increment(inner.trimmed_text());
        }

        Ok(())
    })?;

    debug!(
        "extracted `{tag_name}` from `{}`: {} distinct value(s), {} occurrence(s)",
        source.name(),
        counts.len(),
        counts.total()
    );

    Ok(counts)
}

/// Counts `target_tag` values across context subtrees accepted by `spec`.
pub fn extract_filtered_tag_values(source: &DocumentSource, spec: &FilterSpec) -> Result<ValueCounts> {
    let reader = source.open()?;
    let mut counts = ValueCounts::default();

    let query = QueryPath::resolve(spec.filter_path().unwrap_or(""), &spec.filter_tag);

    walk_matching_subtrees(reader, &spec.context_tag, |context| {
        // Strict child-path lookup first; the unrestricted descendant search
        // is only a fallback when no relative path was pinned.
        let mut candidates = context.find_child_path(query.segments());
        if candidates.is_empty() && spec.filter_path().is_none() {
            context.descendants_named(&spec.filter_tag, &mut candidates);
        }

        let matched = candidates
            .iter()
            .any(|elem| elem.trimmed_text() == spec.filter_value);
        if !matched {
            return Ok(());
        }

        match context.find_descendant(&spec.target_tag) {
            Some(target) if !target.trimmed_text().is_empty() => {
                counts.increment(target.trimmed_text());
            }
            _ => counts.increment(VALUE_TARGET_MISSING),
        }

        Ok(())
    })?;

    debug!(
        "filtered extraction of `{}` from `{}` ({}): {} occurrence(s)",
        spec.target_tag,
        source.name(),
        spec.description(),
        counts.total()
    );

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NESTED_SAMPLE: &str = r#"
    <documento>
        <infNFCom id="1">
            <ide><nNF>1001</nNF></ide>
            <dest>
                <xNome>CLUBE DE CAMPO MOEMA</xNome>
                <enderDest><UF>SP</UF></enderDest>
            </dest>
            <outro><xNome>NAO FILTRAR ESTE</xNome></outro>
        </infNFCom>
        <infNFCom id="2">
            <ide><nNF>1002</nNF></ide>
            <dest>
                <xNome>OUTRO CLIENTE</xNome>
                <enderDest><UF>RJ</UF></enderDest>
            </dest>
        </infNFCom>
        <infNFCom id="3">
            <ide><nNF>1003</nNF></ide>
            <dest>
                <enderDest><UF>SP</UF></enderDest>
            </dest>
        </infNFCom>
        <infNFCom id="4">
            <ide><nNF>1004</nNF></ide>
            <dest>
                <xNome>CLUBE DE CAMPO MOEMA</xNome>
                <enderDest><UF>MG</UF></enderDest>
            </dest>
        </infNFCom>
    </documento>
    "#;

    fn sample_source() -> DocumentSource {
        DocumentSource::from_buffer("nested.xml", NESTED_SAMPLE.as_bytes().to_vec())
    }

    fn spec(path: Option<&str>, value: &str) -> FilterSpec {
        FilterSpec {
            context_tag: "infNFCom".to_owned(),
            filter_path: path.map(str::to_owned),
            filter_tag: "xNome".to_owned(),
            filter_value: value.to_owned(),
            target_tag: "nNF".to_owned(),
        }
    }

    #[test]
    fn counts_every_occurrence_and_distinct_value_once() {
        let counts = extract_tag_values(&sample_source(), "UF").unwrap();

        assert_eq!(counts.get("SP"), 2);
        assert_eq!(counts.get("RJ"), 1);
        assert_eq!(counts.get("MG"), 1);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn insertion_order_follows_first_occurrence() {
        let counts = extract_tag_values(&sample_source(), "UF").unwrap();
        let values: Vec<_> = counts.iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec!["SP", "RJ", "MG"]);
    }

    #[test]
    fn whitespace_only_text_counts_as_the_empty_string() {
        let source = DocumentSource::from_buffer(
            "ws.xml",
            b"<r><t>  </t><t>a</t><t></t></r>".to_vec(),
        );
        let counts = extract_tag_values(&source, "t").unwrap();

        assert_eq!(counts.get(""), 2);
        assert_eq!(counts.get("a"), 1);
    }

    #[test]
    fn pinned_filter_path_selects_matching_contexts_only() {
        let counts =
            extract_filtered_tag_values(&sample_source(), &spec(Some("dest"), "CLUBE DE CAMPO MOEMA"))
                .unwrap();

        assert_eq!(counts.get("1001"), 1);
        assert_eq!(counts.get("1004"), 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn pinned_path_does_not_fall_back_to_descendant_search() {
        // `NAO FILTRAR ESTE` lives under `outro`, not `dest`.
        let counts =
            extract_filtered_tag_values(&sample_source(), &spec(Some("dest"), "NAO FILTRAR ESTE"))
                .unwrap();
        assert!(counts.is_empty());

        // Without a pinned path the descendant fallback finds it.
        let counts =
            extract_filtered_tag_values(&sample_source(), &spec(None, "NAO FILTRAR ESTE")).unwrap();
        assert_eq!(counts.get("1001"), 1);
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn messy_filter_path_behaves_like_the_clean_one() {
        let clean =
            extract_filtered_tag_values(&sample_source(), &spec(Some("dest"), "CLUBE DE CAMPO MOEMA"))
                .unwrap();
        let messy =
            extract_filtered_tag_values(&sample_source(), &spec(Some("/dest//"), "CLUBE DE CAMPO MOEMA"))
                .unwrap();

        assert_eq!(clean.total(), messy.total());
        assert_eq!(clean.get("1001"), messy.get("1001"));
        assert_eq!(clean.get("1004"), messy.get("1004"));
    }

    #[test]
    fn nonexistent_filter_path_matches_nothing() {
        let counts = extract_filtered_tag_values(
            &sample_source(),
            &spec(Some("caminho/inexistente"), "CLUBE DE CAMPO MOEMA"),
        )
        .unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn missing_target_counts_the_sentinel() {
        let mut s = spec(None, "OUTRO CLIENTE");
        s.target_tag = "naoExiste".to_owned();

        let counts = extract_filtered_tag_values(&sample_source(), &s).unwrap();
        assert_eq!(counts.get(VALUE_TARGET_MISSING), 1);
    }

    #[test]
    fn filter_description_lists_supplied_parts() {
        let s = spec(Some("dest"), "X");
        assert_eq!(
            s.description(),
            "Contexto: infNFCom, Tag Filtro: xNome, Caminho Filtro: dest, Valor Filtro: X"
        );

        let s = spec(None, "X");
        assert_eq!(
            s.description(),
            "Contexto: infNFCom, Tag Filtro: xNome, Valor Filtro: X"
        );
    }
}
