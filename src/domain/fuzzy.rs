/// Ranking key for a fuzzy match. Every field is "lower is better" and the
/// fields compare lexicographically in declaration order.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct MatchScore {
    /// Index of the first matched character.
    pub first: usize,
    /// Total count of unmatched characters between consecutive matches.
    pub gap: usize,
    /// 1 when the match stops right before a space followed by another word.
    pub continuation: usize,
    /// Characters after the last match.
    pub trailing: usize,
    /// Candidate length in characters.
    pub length: usize,
}

/// True when every character of `filter` occurs in `candidate` in order.
pub fn fuzzy_match(candidate: &str, filter: &str) -> bool {
    let mut wanted = filter.chars().peekable();
    for ch in candidate.chars() {
        match wanted.peek() {
            Some(next) if *next == ch => {
                wanted.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    wanted.peek().is_none()
}

/// Scores `candidate` against `filter` with one forward scan. Both inputs are
/// expected to be lowercase already.
pub fn fuzzy_score(candidate: &str, filter: &str) -> Option<MatchScore> {
    if !fuzzy_match(candidate, filter) {
        return None;
    }
    let chars: Vec<char> = candidate.chars().collect();
    let length = chars.len();
    let wanted: Vec<char> = filter.chars().collect();
    if wanted.is_empty() {
        return Some(MatchScore {
            first: 0,
            gap: 0,
            continuation: 0,
            trailing: length,
            length,
        });
    }

    let mut filter_index = 0;
    let mut first = None;
    let mut last = 0;
    let mut gap = 0;
    for (index, ch) in chars.iter().enumerate() {
        if filter_index == wanted.len() {
            break;
        }
        if *ch != wanted[filter_index] {
            continue;
        }
        match first {
            None => first = Some(index),
            Some(_) => gap += index - last - 1,
        }
        last = index;
        filter_index += 1;
    }

    if filter_index < wanted.len() {
        return None;
    }

    let continuation = match (chars.get(last + 1), chars.get(last + 2)) {
        (Some(' '), Some(next)) if next.is_alphanumeric() => 1,
        _ => 0,
    };

    Some(MatchScore {
        first: first.unwrap_or(0),
        gap,
        continuation,
        trailing: length - last - 1,
        length,
    })
}

/// Returns indices of matching candidates, best first. Equal scores keep their
/// input order. An empty filter keeps every candidate in input order.
pub fn rank<'a, I>(candidates: I, filter: &str) -> Vec<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let filter = filter.to_lowercase();
    if filter.is_empty() {
        return candidates.into_iter().enumerate().map(|(i, _)| i).collect();
    }

    let mut scored: Vec<(usize, MatchScore)> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            fuzzy_score(&candidate.to_lowercase(), &filter).map(|score| (index, score))
        })
        .collect();
    // Stable sort: ties retain catalog order.
    scored.sort_by_key(|(_, score)| *score);
    scored.into_iter().map(|(index, _)| index).collect()
}
