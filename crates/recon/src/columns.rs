//! Column resolution: match header names first, fall back to a fixed position.

use crate::config::ColumnSelector;

/// How a column index was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    Name,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub by: ResolvedBy,
}

/// One stage of the resolver.
pub trait ColumnStrategy {
    fn resolve(&self, header: Option<&[String]>) -> Option<usize>;
}

/// Case-insensitive substring match of any keyword against the header.
/// The first matching column (left to right) wins.
pub struct NameMatch<'a> {
    pub keywords: &'a [String],
}

impl ColumnStrategy for NameMatch<'_> {
    fn resolve(&self, header: Option<&[String]>) -> Option<usize> {
        let header = header?;
        if self.keywords.is_empty() {
            return None;
        }
        let keywords: Vec<String> = self.keywords.iter().map(|k| k.to_lowercase()).collect();
        header.iter().position(|name| {
            let name = name.to_lowercase();
            keywords.iter().any(|k| !k.is_empty() && name.contains(k.as_str()))
        })
    }
}

/// Fixed zero-based position. Always resolves.
pub struct Positional(pub usize);

impl ColumnStrategy for Positional {
    fn resolve(&self, _header: Option<&[String]>) -> Option<usize> {
        Some(self.0)
    }
}

/// Run the name stage, then the positional stage.
pub fn resolve_column(selector: &ColumnSelector, header: Option<&[String]>) -> ResolvedColumn {
    let by_name = NameMatch { keywords: &selector.keywords };
    if let Some(index) = by_name.resolve(header) {
        return ResolvedColumn { index, by: ResolvedBy::Name };
    }
    let index = Positional(selector.position)
        .resolve(header)
        .unwrap_or(selector.position);
    ResolvedColumn { index, by: ResolvedBy::Position }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn name_match_is_case_insensitive_substring() {
        let sel = ColumnSelector::named(&["meter"], 0);
        let h = header(&["Date", "Description", "METER NO"]);
        assert_eq!(
            resolve_column(&sel, Some(&h)),
            ResolvedColumn { index: 2, by: ResolvedBy::Name }
        );
    }

    #[test]
    fn first_matching_column_wins() {
        let sel = ColumnSelector::named(&["amount", "total"], 2);
        let h = header(&["Meter", "Total Units", "Amount Paid"]);
        assert_eq!(resolve_column(&sel, Some(&h)).index, 1);
    }

    #[test]
    fn falls_back_to_position_without_match() {
        let sel = ColumnSelector::named(&["amount"], 2);
        let h = header(&["Meter", "Desc", "Value"]);
        assert_eq!(
            resolve_column(&sel, Some(&h)),
            ResolvedColumn { index: 2, by: ResolvedBy::Position }
        );
    }

    #[test]
    fn falls_back_to_position_without_header() {
        let sel = ColumnSelector::named(&["meter"], 14);
        assert_eq!(
            resolve_column(&sel, None),
            ResolvedColumn { index: 14, by: ResolvedBy::Position }
        );
    }

    #[test]
    fn no_keywords_means_positional() {
        let sel = ColumnSelector::at(13);
        let h = header(&["anything"]);
        assert_eq!(resolve_column(&sel, Some(&h)).by, ResolvedBy::Position);
    }
}
