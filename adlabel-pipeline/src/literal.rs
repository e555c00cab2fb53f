//! Reader for stringified list cells such as `['Now or never', 'Donate']`.
//!
//! Some exported ad columns hold a bracketed list literal instead of a
//! plain string. Only flat lists of strings, numbers and the `True` /
//! `False` / `None` constants are understood; anything else is reported as
//! not-a-list so the caller keeps the raw text.

use std::iter::Peekable;
use std::str::Chars;

/// First element of a list literal, rendered as text.
///
/// Returns `None` when `raw` is not a well-formed list literal or the list is
/// empty.
///
/// ```
/// use adlabel_pipeline::literal::first_list_element;
///
/// assert_eq!(first_list_element("['Now or never']").as_deref(), Some("Now or never"));
/// assert_eq!(first_list_element(r#"["a", 'b']"#).as_deref(), Some("a"));
/// assert_eq!(first_list_element("[]"), None);
/// assert_eq!(first_list_element("[not quoted]"), None);
/// ```
pub fn first_list_element(raw: &str) -> Option<String> {
    if !(raw.starts_with('[') && raw.ends_with(']')) {
        return None;
    }
    let mut items = parse_list(raw)?;
    if items.is_empty() {
        None
    } else {
        Some(items.swap_remove(0))
    }
}

fn parse_list(raw: &str) -> Option<Vec<String>> {
    let mut chars = raw.trim().chars().peekable();
    if chars.next()? != '[' {
        return None;
    }
    let mut items = Vec::new();
    loop {
        skip_ws(&mut chars);
        match chars.peek()? {
            ']' => {
                chars.next();
                break;
            }
            _ => items.push(parse_item(&mut chars)?),
        }
        skip_ws(&mut chars);
        match chars.next()? {
            ',' => continue,
            ']' => break,
            _ => return None,
        }
    }
    skip_ws(&mut chars);
    if chars.next().is_some() {
        return None;
    }
    Some(items)
}

fn skip_ws(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn parse_item(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    match *chars.peek()? {
        quote @ ('\'' | '"') => {
            chars.next();
            parse_quoted(chars, quote)
        }
        c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => parse_number(chars),
        c if c.is_ascii_alphabetic() => {
            let mut word = String::new();
            while let Some(c) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
                word.push(c);
            }
            match word.as_str() {
                "True" | "False" | "None" => Some(word),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) -> Option<String> {
    let mut out = String::new();
    loop {
        match chars.next()? {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                c @ ('\\' | '\'' | '"') => out.push(c),
                '\n' => {}
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            '\n' => return None,
            c if c == quote => return Some(out),
            c => out.push(c),
        }
    }
}

fn parse_number(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut text = String::new();
    while let Some(c) = chars.next_if(|c| {
        c.is_ascii_digit() || matches!(*c, '-' | '+' | '.' | 'e' | 'E' | '_')
    }) {
        if c != '_' {
            text.push(c);
        }
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(int.to_string());
    }
    let float = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if float.fract() == 0.0 && float.abs() < 1e16 {
        Some(format!("{float:.1}"))
    } else {
        Some(float.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_of_several_strings() {
        assert_eq!(
            first_list_element("['Paid for by X', 'Other byline']").as_deref(),
            Some("Paid for by X")
        );
    }

    #[test]
    fn handles_escapes_and_mixed_quotes() {
        assert_eq!(
            first_list_element(r#"['It\'s time', "b"]"#).as_deref(),
            Some("It's time")
        );
        assert_eq!(
            first_list_element(r#"["say \"vote\""]"#).as_deref(),
            Some("say \"vote\"")
        );
        assert_eq!(first_list_element(r"['a\nb']").as_deref(), Some("a\nb"));
    }

    #[test]
    fn renders_scalars_like_their_source_text() {
        assert_eq!(first_list_element("[42, 'x']").as_deref(), Some("42"));
        assert_eq!(first_list_element("[-1.50]").as_deref(), Some("-1.5"));
        assert_eq!(first_list_element("[2.0]").as_deref(), Some("2.0"));
        assert_eq!(first_list_element("[None]").as_deref(), Some("None"));
        assert_eq!(first_list_element("[ True , False ]").as_deref(), Some("True"));
    }

    #[test]
    fn trailing_comma_and_whitespace_are_accepted() {
        assert_eq!(first_list_element("[ 'a' , ]").as_deref(), Some("a"));
    }

    #[test]
    fn malformed_lists_are_rejected() {
        for raw in [
            "[",
            "['unterminated]",
            "['a' 'b']",
            "['a'; 'b']",
            "[['nested']]",
            "[undefined_name]",
            "['a'] trailing]",
            "[1 + 2]",
            "plain text",
        ] {
            assert_eq!(first_list_element(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn empty_list_yields_nothing() {
        assert_eq!(first_list_element("[]"), None);
        assert_eq!(first_list_element("[  ]"), None);
    }
}
