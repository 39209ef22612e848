/// A normalized relative element path, e.g. `dest/enderDest/UF`.
///
/// User-supplied paths arrive with arbitrary leading/trailing/duplicated
/// separators (`"/dest//"`); normalization drops the empty segments so the
/// query layer only ever sees clean segment lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPath {
    segments: Vec<String>,
}

impl QueryPath {
    /// Builds the query path for `leaf_tag` under the (possibly messy)
    /// relative path `raw_path`. An empty or separator-only `raw_path`
    /// resolves to just the leaf.
    pub fn resolve(raw_path: &str, leaf_tag: &str) -> Self {
        let mut segments: Vec<String> = raw_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        segments.push(leaf_tag.to_owned());

        QueryPath { segments }
    }

    /// Parses an already-joined path such as `infNFCom/emit/enderEmit/UF`.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();

        QueryPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_joined(&self) -> String {
        self.segments.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_path_is_joined_with_the_leaf() {
        let path = QueryPath::resolve("dest", "UF");
        assert_eq!(path.as_joined(), "dest/UF");
    }

    #[test]
    fn redundant_separators_resolve_like_the_clean_form() {
        let clean = QueryPath::resolve("dest", "UF");

        for messy in ["/dest//", "//dest", "dest/", "/dest/"] {
            assert_eq!(QueryPath::resolve(messy, "UF"), clean, "raw path: {messy:?}");
        }
    }

    #[test]
    fn empty_path_resolves_to_the_bare_leaf() {
        for raw in ["", "/", "//"] {
            let path = QueryPath::resolve(raw, "xNome");
            assert_eq!(path.as_joined(), "xNome");
        }
    }

    #[test]
    fn multi_segment_paths_keep_their_order() {
        let path = QueryPath::resolve("ide/total", "vNF");
        assert_eq!(path.segments(), &["ide", "total", "vNF"]);
    }
}
