use crate::types::{ContentItem, MatchResult};

/// Score items against a user's interest keywords. Case-insensitive substring
/// match over title and body; score is the count of distinct matched keywords.
/// Items matching nothing are excluded rather than scored zero. Pure and
/// deterministic: identical input always produces identical output.
pub fn match_items(items: Vec<ContentItem>, interests: &[String]) -> Vec<MatchResult> {
    items
        .into_iter()
        .filter_map(|item| score_item(item, interests))
        .collect()
}

fn score_item(item: ContentItem, interests: &[String]) -> Option<MatchResult> {
    let haystack = format!("{}\n{}", item.title, item.body).to_lowercase();

    let mut matched: Vec<String> = interests
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .filter(|kw| haystack.contains(kw.as_str()))
        .collect();
    matched.sort();
    matched.dedup();

    if matched.is_empty() {
        return None;
    }

    let score = matched.len() as f64;
    Some(MatchResult {
        item,
        score,
        matched_keywords: matched,
    })
}
