use crate::DateCodeKind;

/// Opening and closing delimiters of a placeholder.
const OPEN: &str = "{@";
const CLOSE: char = '}';

/// One parsed piece of a select template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Text copied into the predicate unchanged.
    Literal(String),
    /// `{@KEY.SUBSTRING(start[,len])}`: a character slice of the tile prefix.
    Substring { start: usize, len: Option<usize> },
    /// `{@TILEPREFIX}`: the whole tile prefix.
    Prefix,
    /// `{@YC}`, `{@YEAR_CODE}` and the month and day equivalents.
    DateCode(DateCodeKind),
    /// A key holding `yyyy`, `yy`, `MM`, `dd` or `WW` markers.
    DatePattern(String),
    /// Any other key, looked up in the date code tables.
    Lookup(String),
    /// A placeholder that could not be parsed.
    Empty,
}

/// Splits `src` into literal text and placeholders.
///
/// An opening `{@` without a closing `}` is kept as literal text.
pub fn parse(src: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = src;

    while let Some(open) = rest.find(OPEN) {
        let after = &rest[open + OPEN.len()..];
        let Some(close) = after.find(CLOSE) else {
            break;
        };
        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(core::mem::take(&mut literal)));
        }
        segments.push(classify(&after[..close]));
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Resolves a placeholder key. Precedence: substring, tile prefix, date code,
/// date pattern, then table lookup.
fn classify(key: &str) -> Segment {
    if let Some((_, call)) = key.split_once(".SUBSTRING") {
        return substring(call).unwrap_or(Segment::Empty);
    }
    match key {
        "TILEPREFIX" => return Segment::Prefix,
        "YC" | "YEAR_CODE" => return Segment::DateCode(DateCodeKind::Year),
        "MC" | "MONTH_CODE" => return Segment::DateCode(DateCodeKind::Month),
        "DC" | "DAY_CODE" => return Segment::DateCode(DateCodeKind::Day),
        _ => {}
    }
    if ["yy", "MM", "dd", "WW"].iter().any(|m| key.contains(m)) {
        return Segment::DatePattern(key.to_owned());
    }
    if key.is_empty() {
        return Segment::Empty;
    }
    Segment::Lookup(key.to_owned())
}

/// Parses `(start)` or `(start,len)`.
fn substring(call: &str) -> Option<Segment> {
    let args = call.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (start, len) = match args.split_once(',') {
        Some((start, len)) => (start, Some(len)),
        None => (args, None),
    };
    let start = start.trim().parse().ok()?;
    let len = match len {
        Some(len) => Some(len.trim().parse().ok()?),
        None => None,
    };
    Some(Segment::Substring { start, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_literals_and_placeholders() {
        assert_eq!(
            parse("A{@TILEPREFIX}%"),
            vec![
                Segment::Literal("A".into()),
                Segment::Prefix,
                Segment::Literal("%".into()),
            ]
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(
            parse("X{@YC}{@MC"),
            vec![
                Segment::Literal("X".into()),
                Segment::DateCode(DateCodeKind::Year),
                Segment::Literal("{@MC".into()),
            ]
        );
    }

    #[test]
    fn substring_forms() {
        assert_eq!(
            classify("TILEPREFIX.SUBSTRING(2)"),
            Segment::Substring { start: 2, len: None }
        );
        assert_eq!(
            classify("TILEPREFIX.SUBSTRING( 0 , 3 )"),
            Segment::Substring {
                start: 0,
                len: Some(3)
            }
        );
        assert_eq!(classify("TILEPREFIX.SUBSTRING(a,3)"), Segment::Empty);
        assert_eq!(classify("TILEPREFIX.SUBSTRING(1,-3)"), Segment::Empty);
        assert_eq!(classify("TILEPREFIX.SUBSTRING"), Segment::Empty);
    }

    #[test]
    fn substring_wins_over_date_markers() {
        // `yy` appears in the key but the substring rule is checked first
        assert_eq!(
            classify("yy.SUBSTRING(1)"),
            Segment::Substring { start: 1, len: None }
        );
    }

    #[test]
    fn date_code_keys_win_over_lookup() {
        assert_eq!(classify("DAY_CODE"), Segment::DateCode(DateCodeKind::Day));
        assert_eq!(classify("yyMM"), Segment::DatePattern("yyMM".into()));
        assert_eq!(classify("LINE"), Segment::Lookup("LINE".into()));
        assert_eq!(classify(""), Segment::Empty);
    }
}
