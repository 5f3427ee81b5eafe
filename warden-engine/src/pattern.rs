use regex::Regex;

use crate::error::CheckError;

/// Compile a policy phrase into an anchored regex.
///
/// Text outside `start_tag`…`end_tag` sections is escaped; section
/// interiors are spliced in verbatim and the whole expression is anchored
/// at both ends, so a match must cover the entire inquiry value.
/// `"book:<.+>"` with the default tags compiles to `^book:(.+)$`.
pub fn compile_phrase(phrase: &str, start_tag: &str, end_tag: &str) -> Result<Regex, CheckError> {
    let mut pattern = String::with_capacity(phrase.len() + 2);
    pattern.push('^');

    let mut rest = phrase;
    while let Some(start) = rest.find(start_tag) {
        let (literal, tail) = rest.split_at(start);
        pattern.push_str(&regex::escape(literal));

        let tail = &tail[start_tag.len()..];
        let Some(end) = tail.find(end_tag) else {
            return Err(CheckError::UnbalancedTags(phrase.to_owned()));
        };
        let (interior, after) = tail.split_at(end);
        pattern.push('(');
        pattern.push_str(interior);
        pattern.push(')');

        rest = &after[end_tag.len()..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    Regex::new(&pattern).map_err(|source| CheckError::InvalidPattern {
        pattern: phrase.to_owned(),
        source,
    })
}
