use std::collections::HashMap;

/// Upper bound on variants produced for one query
pub const MAX_VARIANTS: usize = 12;

/// Query expander with domain synonyms for operational content
pub struct QueryExpander {
    /// Synonym dictionary: term -> [substitutes]
    synonyms: HashMap<String, Vec<String>>,
}

impl QueryExpander {
    /// Create new query expander with the built-in synonym table
    pub fn new() -> Self {
        let mut synonyms = HashMap::new();

        // Billing and orders
        synonyms.insert(
            "refund".to_string(),
            vec!["return", "reimbursement", "credit"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "return".to_string(),
            vec!["refund", "reimbursement"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "payment".to_string(),
            vec!["billing", "invoice", "charge"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "invoice".to_string(),
            vec!["bill", "receipt", "statement"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "order".to_string(),
            vec!["purchase", "transaction"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "cancel".to_string(),
            vec!["cancellation", "terminate", "void"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "customer".to_string(),
            vec!["client", "account", "user"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "shipping".to_string(),
            vec!["delivery", "freight", "dispatch"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        // Infrastructure and operations
        synonyms.insert(
            "error".to_string(),
            vec!["failure", "exception", "fault"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "config".to_string(),
            vec!["configuration", "settings", "setup"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "deploy".to_string(),
            vec!["deployment", "release", "rollout"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "database".to_string(),
            vec!["db", "sql", "storage"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "server".to_string(),
            vec!["host", "instance", "machine"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "backup".to_string(),
            vec!["snapshot", "restore", "archive"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "monitor".to_string(),
            vec!["monitoring", "alert", "observability"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        // Access and accounts
        synonyms.insert(
            "login".to_string(),
            vec!["signin", "authentication", "auth"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "password".to_string(),
            vec!["credential", "secret"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        synonyms.insert(
            "api".to_string(),
            vec!["endpoint", "interface", "service"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        Self { synonyms }
    }

    /// Expand a query into variants by substituting known synonyms.
    ///
    /// The original query is always the first variant. Each substitution
    /// replaces one token (all of its occurrences) in the lowercased query,
    /// duplicates are dropped, and the list is capped at [`MAX_VARIANTS`].
    pub fn expand(&self, query: &str) -> Vec<String> {
        let original = query.trim();
        let mut variants = vec![original.to_string()];

        let lowered = original.to_lowercase();
        let tokens: Vec<String> = lowered.split_whitespace().map(String::from).collect();

        for token in &tokens {
            let key = token.trim_matches(|c: char| !c.is_alphanumeric());
            if let Some(subs) = self.synonyms.get(key) {
                for sub in subs {
                    let variant = tokens
                        .iter()
                        .map(|t| if t == token { sub.as_str() } else { t.as_str() })
                        .collect::<Vec<_>>()
                        .join(" ");
                    if !variants.contains(&variant) {
                        variants.push(variant);
                    }
                }
            }
        }

        // Cap the variant list to keep retrieval bounded
        variants.truncate(MAX_VARIANTS);

        variants
    }
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_single_term() {
        let expander = QueryExpander::new();

        let variants = expander.expand("refund");
        assert_eq!(variants.len(), 4);
        assert_eq!(variants[0], "refund");
        assert!(variants.contains(&"return".to_string()));
        assert!(variants.contains(&"reimbursement".to_string()));
        assert!(variants.contains(&"credit".to_string()));
    }

    #[test]
    fn test_expand_keeps_phrase_shape() {
        let expander = QueryExpander::new();

        let variants = expander.expand("refund policy");
        assert_eq!(variants[0], "refund policy");
        assert!(variants.contains(&"return policy".to_string()));
        assert!(variants.contains(&"reimbursement policy".to_string()));
        assert!(variants.contains(&"credit policy".to_string()));
    }

    #[test]
    fn test_expand_unknown_term_is_identity() {
        let expander = QueryExpander::new();

        let variants = expander.expand("flurble");
        assert_eq!(variants, vec!["flurble".to_string()]);
    }

    #[test]
    fn test_expand_deduplicates() {
        let expander = QueryExpander::new();

        // Both occurrences of the token are substituted together, so each
        // synonym yields exactly one variant
        let variants = expander.expand("refund refund");
        assert!(variants.contains(&"return return".to_string()));
        let unique: std::collections::HashSet<_> = variants.iter().collect();
        assert_eq!(unique.len(), variants.len());
    }

    #[test]
    fn test_expand_caps_variant_count() {
        let expander = QueryExpander::new();

        let variants = expander.expand("refund payment error deploy backup login");
        assert!(variants.len() <= MAX_VARIANTS);
        assert_eq!(variants[0], "refund payment error deploy backup login");
    }

    #[test]
    fn test_expand_is_case_insensitive_for_lookup() {
        let expander = QueryExpander::new();

        let variants = expander.expand("Refund");
        assert_eq!(variants[0], "Refund");
        assert!(variants.contains(&"reimbursement".to_string()));
    }

    #[test]
    fn test_adding_synonym_terms_never_shrinks_expansion() {
        let expander = QueryExpander::new();

        let narrow = expander.expand("policy");
        let wide = expander.expand("refund policy");
        assert!(wide.len() >= narrow.len());
    }
}
