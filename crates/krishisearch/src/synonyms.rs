// Synonym Expansion
//
// Produce query variants by substituting table synonyms for query words.

use std::collections::BTreeMap;

/// Canonical term -> ordered alternates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynonymTable {
    terms: BTreeMap<String, Vec<String>>,
}

impl SynonymTable {
    /// Build from a term map
    pub fn new(terms: BTreeMap<String, Vec<String>>) -> Self {
        Self { terms }
    }

    /// Alternates for a term, if it is a canonical key
    pub fn get(&self, term: &str) -> Option<&[String]> {
        self.terms.get(term).map(Vec::as_slice)
    }

    /// Number of canonical terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Expand a normalized query into matching variants.
    ///
    /// The query itself is always first. For every whitespace-separated
    /// word that is a canonical key (repeated words are visited again) and
    /// for every alternate of that key, one variant is emitted with all
    /// occurrences of the word replaced in the whole string. Replacement is
    /// plain substring replacement, so it also hits the word inside longer
    /// words.
    pub fn expand(&self, query: &str) -> Vec<String> {
        let mut variants = vec![query.to_string()];

        for word in query.split_whitespace() {
            if let Some(alternates) = self.get(word) {
                variants.extend(alternates.iter().map(|alt| query.replace(word, alt)));
            }
        }

        variants
    }
}

impl From<BTreeMap<String, Vec<String>>> for SynonymTable {
    fn from(terms: BTreeMap<String, Vec<String>>) -> Self {
        Self::new(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SynonymTable {
        let mut terms = BTreeMap::new();
        terms.insert("pest".to_string(), vec!["insect".to_string(), "bug".to_string()]);
        terms.insert("control".to_string(), vec!["manage".to_string()]);
        SynonymTable::new(terms)
    }

    #[test]
    fn test_original_first() {
        let variants = table().expand("pest control");
        assert_eq!(variants[0], "pest control");
    }

    #[test]
    fn test_expansion_order_follows_query_words() {
        let variants = table().expand("pest control");
        assert_eq!(
            variants,
            vec!["pest control", "insect control", "bug control", "pest manage"]
        );
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let variants = table().expand("pest and pest");
        // "pest" appears twice as a word, so its alternates are emitted twice
        assert_eq!(
            variants,
            vec![
                "pest and pest",
                "insect and insect",
                "bug and bug",
                "insect and insect",
                "bug and bug"
            ]
        );
    }

    #[test]
    fn test_replacement_hits_substrings() {
        let variants = table().expand("pest pesticide");
        assert_eq!(variants[1], "insect insecticide");
    }

    #[test]
    fn test_no_synonyms() {
        assert_eq!(table().expand("wheat rust"), vec!["wheat rust"]);
        assert_eq!(SynonymTable::default().expand("pest"), vec!["pest"]);
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(table().expand(""), vec![""]);
    }
}
