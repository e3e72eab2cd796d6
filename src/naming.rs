//! Template filename parsing for the `NNN-Label` convention.
//!
//! A template file stem is an optional numeric tier prefix (`NNN-`) followed
//! by the rarity label. Dashes in the label become spaces:
//!
//! - `010-Common` → tier 10, "Common"
//! - `040-Ultra-Rare` → tier 40, "Ultra Rare"
//! - `Promo` → no tier, "Promo"
//! - `050` → tier 50, no label (ignored by discovery)

/// Result of parsing a template stem like `040-Ultra-Rare`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Tier prefix if present (e.g., `40` from `040-Ultra-Rare`)
    pub tier: Option<u32>,
    /// Rarity label with dashes converted to spaces. Empty if number-only.
    pub label: String,
}

/// Parse a template file stem.
pub fn parse_template_stem(stem: &str) -> ParsedName {
    if let Some((prefix, rest)) = stem.split_once('-')
        && let Ok(tier) = prefix.parse::<u32>()
    {
        return ParsedName {
            tier: Some(tier),
            label: rest.replace('-', " ").trim().to_string(),
        };
    }
    if let Ok(tier) = stem.parse::<u32>() {
        return ParsedName {
            tier: Some(tier),
            label: String::new(),
        };
    }
    ParsedName {
        tier: None,
        label: stem.replace('-', " ").trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_single_word() {
        let p = parse_template_stem("010-Common");
        assert_eq!(p.tier, Some(10));
        assert_eq!(p.label, "Common");
    }

    #[test]
    fn numbered_multi_word() {
        let p = parse_template_stem("040-Ultra-Rare");
        assert_eq!(p.tier, Some(40));
        assert_eq!(p.label, "Ultra Rare");
    }

    #[test]
    fn unnumbered_label() {
        let p = parse_template_stem("Promo");
        assert_eq!(p.tier, None);
        assert_eq!(p.label, "Promo");
    }

    #[test]
    fn number_only_has_no_label() {
        assert_eq!(parse_template_stem("050").label, "");
        assert_eq!(parse_template_stem("050-").label, "");
    }

    #[test]
    fn non_numeric_prefix_is_part_of_label() {
        let p = parse_template_stem("old-Common");
        assert_eq!(p.tier, None);
        assert_eq!(p.label, "old Common");
    }
}
