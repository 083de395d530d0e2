/// Matches `text` against a SQL `LIKE` pattern: `%` matches any run of
/// characters (including none), `_` exactly one. Matching is case-sensitive
/// and has no escape character.
pub fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // position after the last `%` seen and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(&c) if c == '_' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::like;

    #[test]
    fn literal_patterns() {
        assert!(like("AB01", "AB01"));
        assert!(!like("AB01", "AB02"));
        assert!(!like("AB", "ab"));
        assert!(like("", ""));
        assert!(!like("", "A"));
    }

    #[test]
    fn percent_matches_any_run() {
        assert!(like("AB%", "AB"));
        assert!(like("AB%", "AB0042"));
        assert!(like("%42", "AB0042"));
        assert!(like("A%4%", "AB0042"));
        assert!(like("%", ""));
        assert!(!like("AB%", "XAB01"));
        assert!(!like("%43", "AB0042"));
    }

    #[test]
    fn underscore_matches_one() {
        assert!(like("A_01", "AB01"));
        assert!(!like("A_01", "A01"));
        assert!(like("__%", "Å1"));
        assert!(!like("__", "Å"));
    }
}
