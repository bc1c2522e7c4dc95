//! String normalization and fuzzy matching used to grade free-text answers.
//!
//! See §4.1 of the spec: everything here is a pure function over `&str`, with
//! no knowledge of rooms, players, or scoring.

use unicode_normalization::UnicodeNormalization;

pub const FUZZY_THRESHOLD: f64 = 0.75;

const LEADING_ARTICLES: &[&str] = &["le", "la", "les", "l", "un", "une", "des", "the", "a", "an"];

const ARTIST_SEPARATORS: &[&str] = &[
    " feat ", " ft ", " & ", " et ", " vs ", " x ", " con ", " with ", ",",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeConfig {
    pub strip_leading_article: bool,
}

/// Lowercase, strip accents (NFD + combining-mark removal), replace
/// punctuation with spaces, optionally drop a leading article, collapse
/// whitespace, and trim.
pub fn normalize(s: &str, cfg: NormalizeConfig) -> String {
    let lowered = s.to_lowercase();
    let stripped_accents: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut cleaned = String::with_capacity(stripped_accents.len());
    for c in stripped_accents.chars() {
        if c.is_alphanumeric() {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    if cfg.strip_leading_article
        && let Some(first) = words.first()
        && LEADING_ARTICLES.contains(first)
    {
        words.remove(0);
    }

    words.join(" ").trim().to_string()
}

/// Combining diacritical marks live in a handful of Unicode blocks; NFD
/// decomposes e.g. "é" into "e" + U+0301, and this filters the latter out.
fn is_combining_mark(c: char) -> bool {
    matches!(
        c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F
    )
}

/// Standard edit distance with unit insert/delete/substitute costs.
/// O(|a|·|b|) time, O(min(|a|,|b|)) space.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let (a, b) = (a.chars().collect::<Vec<_>>(), b.chars().collect::<Vec<_>>());
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut prev: Vec<usize> = (0..=shorter.len()).collect();
    let mut curr = vec![0usize; shorter.len() + 1];

    for (i, &lc) in longer.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &sc) in shorter.iter().enumerate() {
            let cost = if lc == sc { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[shorter.len()]
}

/// `1 - distance / max(len)`, defined as 1 when both strings are empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Remove "feat."/"ft."/"featuring" credits from a track title: parenthetical
/// or bracketed segments first, then a trailing "- feat. …", then a bare
/// trailing "feat. …".
pub fn strip_featuring(title: &str) -> String {
    let lower = title.to_lowercase();

    let mut result = String::new();
    let mut depth_paren = 0i32;
    let mut depth_brack = 0i32;
    let mut skipping_segment = false;
    let mut segment_start = 0usize;
    let chars: Vec<char> = title.chars().collect();
    let lower_chars: Vec<char> = lower.chars().collect();

    let mentions_feat = |chars: &[char], start: usize, end: usize| -> bool {
        let segment: String = chars[start..end].iter().collect();
        segment.contains("feat") || segment.contains(" ft") || segment.contains("(ft")
    };

    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '(' => {
                if depth_paren == 0 && depth_brack == 0 {
                    segment_start = i;
                }
                depth_paren += 1;
            }
            '[' => {
                if depth_paren == 0 && depth_brack == 0 {
                    segment_start = i;
                }
                depth_brack += 1;
            }
            ')' if depth_paren > 0 => {
                depth_paren -= 1;
                if depth_paren == 0 && depth_brack == 0 {
                    if mentions_feat(&lower_chars, segment_start, i + 1) {
                        skipping_segment = true;
                    }
                    if !skipping_segment {
                        result.extend(&chars[segment_start..=i]);
                    }
                    skipping_segment = false;
                    i += 1;
                    continue;
                }
            }
            ']' if depth_brack > 0 => {
                depth_brack -= 1;
                if depth_paren == 0 && depth_brack == 0 {
                    if mentions_feat(&lower_chars, segment_start, i + 1) {
                        skipping_segment = true;
                    }
                    if !skipping_segment {
                        result.extend(&chars[segment_start..=i]);
                    }
                    skipping_segment = false;
                    i += 1;
                    continue;
                }
            }
            _ => {}
        }
        if depth_paren == 0 && depth_brack == 0 {
            result.push(chars[i]);
        }
        i += 1;
    }

    let collapsed = result.split_whitespace().collect::<Vec<_>>().join(" ");

    strip_trailing_feat(&collapsed)
}

/// After parenthetical removal, strip a trailing "- feat. X" or bare
/// "feat. X" suffix that wasn't bracketed.
fn strip_trailing_feat(title: &str) -> String {
    let lower = title.to_lowercase();
    for marker in ["- feat.", "- feat", "- ft.", "- ft", "-feat.", "-ft."] {
        if let Some(idx) = lower.find(marker) {
            return title[..idx].trim().to_string();
        }
    }
    for marker in ["feat.", "featuring", "feat ", "ft."] {
        if let Some(idx) = lower.find(marker) {
            return title[..idx].trim().to_string();
        }
    }
    title.trim().to_string()
}

/// Split a (possibly multi-artist) credit string on the common separators.
pub fn split_artists(artist: &str) -> Vec<String> {
    let lower = artist.to_lowercase();
    let mut boundaries = vec![0usize];
    for sep in ARTIST_SEPARATORS {
        let mut start = 0;
        while let Some(rel) = lower[start..].find(sep) {
            boundaries.push(start + rel);
            boundaries.push(start + rel + sep.len());
            start += rel + sep.len();
        }
    }
    boundaries.push(artist.len());
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut parts = Vec::new();
    for w in boundaries.windows(2) {
        let (start, end) = (w[0], w[1]);
        if start >= end || start >= artist.len() {
            continue;
        }
        let end = end.min(artist.len());
        let slice = artist[start..end].trim();
        let is_separator = ARTIST_SEPARATORS.iter().any(|s| slice.eq_ignore_ascii_case(s.trim()));
        if !slice.is_empty() && !is_separator {
            parts.push(slice.to_string());
        }
    }
    if parts.is_empty() {
        vec![artist.trim().to_string()]
    } else {
        parts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Title,
    Artist,
    Both,
    None,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CheckResult {
    pub correct: bool,
    pub match_type: MatchType,
    pub similarity: f64,
}

/// Grade a free-text answer against a track's title and artist.
pub fn check(
    answer: &str,
    title: &str,
    artist: &str,
    accept_artist_only: bool,
    accept_title_only: bool,
) -> CheckResult {
    let cfg = NormalizeConfig {
        strip_leading_article: true,
    };
    let norm_answer = normalize(answer, cfg);
    let norm_title = normalize(&strip_featuring(title), cfg);
    let norm_artist = normalize(artist, cfg);

    let title_artist = format!("{norm_title} {norm_artist}");
    let artist_title = format!("{norm_artist} {norm_title}");

    let sim_title = similarity(&norm_answer, &norm_title);
    let sim_artist_base = similarity(&norm_answer, &norm_artist);
    let sim_full_ta = similarity(&norm_answer, &title_artist);
    let sim_full_at = similarity(&norm_answer, &artist_title);
    let sim_full = sim_full_ta.max(sim_full_at);

    let mut sim_artist = sim_artist_base;
    if sim_artist < FUZZY_THRESHOLD {
        for part in split_artists(artist) {
            let norm_part = normalize(&part, cfg);
            let s = similarity(&norm_answer, &norm_part);
            if s > sim_artist {
                sim_artist = s;
            }
        }
    }

    let best_similarity = sim_title.max(sim_artist).max(sim_full);

    let artist_ok = sim_artist >= FUZZY_THRESHOLD;
    let title_ok = sim_title >= FUZZY_THRESHOLD;
    let full_ok = sim_full >= FUZZY_THRESHOLD;

    let match_type = if accept_artist_only {
        if artist_ok { MatchType::Artist } else { MatchType::None }
    } else if accept_title_only {
        if title_ok { MatchType::Title } else { MatchType::None }
    } else if full_ok {
        MatchType::Both
    } else if artist_ok {
        MatchType::Artist
    } else if title_ok {
        MatchType::Title
    } else {
        MatchType::None
    };

    CheckResult {
        correct: !matches!(match_type, MatchType::None),
        match_type,
        similarity: best_similarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_strips_accents_and_articles() {
        let cfg = NormalizeConfig {
            strip_leading_article: true,
        };
        assert_eq!(normalize("Les Étoiles!", cfg), "etoiles");
        assert_eq!(normalize("  The   Beatles  ", cfg), "beatles");
    }

    #[test]
    fn levenshtein_identity_and_symmetry() {
        assert_eq!(levenshtein("billie jean", "billie jean"), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("abc", "xyz"), levenshtein("xyz", "abc"));
    }

    #[test]
    fn levenshtein_triangle_inequality_holds_for_sample() {
        let (a, b, c) = ("billie jean", "billy jeans", "michael jackson");
        assert!(levenshtein(a, c) <= levenshtein(a, b) + levenshtein(b, c));
    }

    #[test]
    fn similarity_of_identical_strings_is_one() {
        assert_eq!(similarity("abba", "abba"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn strip_featuring_removes_parenthetical_credit() {
        assert_eq!(
            strip_featuring("Blinding Lights (feat. Someone)"),
            "Blinding Lights"
        );
        assert_eq!(strip_featuring("Starboy - feat. Daft Punk"), "Starboy");
        assert_eq!(strip_featuring("No Role Modelz"), "No Role Modelz");
    }

    #[test]
    fn strip_featuring_is_idempotent() {
        for title in [
            "Blinding Lights (feat. Someone)",
            "Starboy - feat. Daft Punk",
            "No Role Modelz",
            "Under Pressure (with David Bowie)",
        ] {
            let once = strip_featuring(title);
            let twice = strip_featuring(&once);
            assert_eq!(once, twice, "not idempotent for {title:?}");
        }
    }

    #[test]
    fn split_artists_handles_common_separators() {
        assert_eq!(
            split_artists("Daft Punk & The Weeknd"),
            vec!["Daft Punk", "The Weeknd"]
        );
        assert_eq!(
            split_artists("Queen feat David Bowie"),
            vec!["Queen", "David Bowie"]
        );
        assert_eq!(split_artists("Solo Artist"), vec!["Solo Artist"]);
    }

    #[test]
    fn check_accepts_title_or_artist_matches() {
        let result = check("billie jean", "Billie Jean", "Michael Jackson", false, false);
        assert_eq!(result.match_type, MatchType::Title);
        assert!(result.correct);

        let result = check(
            "michael jackson",
            "Billie Jean",
            "Michael Jackson",
            false,
            false,
        );
        assert_eq!(result.match_type, MatchType::Artist);

        let result = check(
            "billie jean michael jackson",
            "Billie Jean",
            "Michael Jackson",
            false,
            false,
        );
        assert_eq!(result.match_type, MatchType::Both);
    }

    #[test]
    fn check_respects_accept_only_modes() {
        let result = check("michael jackson", "Billie Jean", "Michael Jackson", true, false);
        assert_eq!(result.match_type, MatchType::Artist);

        let result = check("queen", "Billie Jean", "Michael Jackson", true, false);
        assert_eq!(result.match_type, MatchType::None);

        let result = check("billie jean", "Billie Jean", "Michael Jackson", false, true);
        assert_eq!(result.match_type, MatchType::Title);
    }

    #[test]
    fn check_correct_implies_a_candidate_crosses_threshold() {
        let cfg = NormalizeConfig {
            strip_leading_article: true,
        };
        let (answer, title, artist) = ("billie jean", "Billie Jean", "Michael Jackson");
        let result = check(answer, title, artist, false, false);
        if result.correct {
            let norm_answer = normalize(answer, cfg);
            let candidates = [
                normalize(&strip_featuring(title), cfg),
                normalize(artist, cfg),
                format!("{} {}", normalize(&strip_featuring(title), cfg), normalize(artist, cfg)),
                format!("{} {}", normalize(artist, cfg), normalize(&strip_featuring(title), cfg)),
            ];
            assert!(
                candidates
                    .iter()
                    .any(|c| similarity(&norm_answer, c) >= FUZZY_THRESHOLD)
            );
        }
    }
}
