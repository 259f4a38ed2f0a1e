/// Placeholder names (`<name>`) in order of first appearance, without duplicates.
pub fn extract_placeholders<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for arg in args {
        for name in placeholders_in(arg.as_ref()) {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Replaces every known `<name>` inside each argument. Arguments are never
/// re-split, so a value containing spaces stays one argument.
pub fn substitute_placeholders<S: AsRef<str>>(args: &[S], values: &[(String, String)]) -> Vec<String> {
    args.iter()
        .map(|arg| substitute_one(arg.as_ref(), values))
        .collect()
}

fn substitute_one(arg: &str, values: &[(String, String)]) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some((start, end)) = next_placeholder(rest) {
        let name = &rest[start + 1..end];
        out.push_str(&rest[..start]);
        match values.iter().find(|(key, _)| key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn placeholders_in(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some((start, end)) = next_placeholder(rest) {
        names.push(&rest[start + 1..end]);
        rest = &rest[end + 1..];
    }
    names
}

/// Byte offsets of the next `<identifier>`'s angle brackets.
fn next_placeholder(text: &str) -> Option<(usize, usize)> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('<') {
        let start = search_from + offset;
        let body_start = start + 1;
        let body_len = text[body_start..]
            .find(|ch: char| !is_identifier_char(ch))
            .unwrap_or(text.len() - body_start);
        let end = body_start + body_len;
        if body_len > 0 && text[end..].starts_with('>') {
            return Some((start, end));
        }
        search_from = body_start;
    }
    None
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}
