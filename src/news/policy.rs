//! Content policy checks applied during merge/filter.
//!
//! Pure functions: a language-script heuristic telling Ukrainian text
//! apart from close neighbours, and a configurable topic denylist.

/// Characters that appear in Ukrainian but not in Russian or Belarusian.
const UKRAINIAN_MARKERS: &[char] = &['ґ', 'є', 'і', 'ї', 'Ґ', 'Є', 'І', 'Ї'];

/// Characters that appear in Russian or Belarusian but not in Ukrainian.
const FOREIGN_MARKERS: &[char] = &['ё', 'ў', 'ъ', 'ы', 'э', 'Ё', 'Ў', 'Ъ', 'Ы', 'Э'];

/// Heuristic: the text either contains a distinctly Ukrainian letter, or
/// contains no letter exclusive to a neighbouring Cyrillic orthography.
pub fn looks_ukrainian(text: &str) -> bool {
    text.contains(UKRAINIAN_MARKERS) || !text.contains(FOREIGN_MARKERS)
}

/// Case-insensitive scan of title and description against the configured
/// topic denylist.
pub fn matches_denylist(title: &str, description: &str, denylist: &[String]) -> bool {
    if denylist.is_empty() {
        return false;
    }
    let title = title.to_lowercase();
    let description = description.to_lowercase();
    denylist.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        title.contains(&keyword) || description.contains(&keyword)
    })
}
