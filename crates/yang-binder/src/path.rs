//! Path grammar: schema node-ids and data paths with predicates.
//!
//! This module only *parses* path text into segments — resolving those
//! segments against a compiled schema tree is `schema_tree::resolve_node_id`
//! (generic over `SchemaTreeView`) plus, for predicates, the final
//! validation pass in `yang-checker` (which has the compiled types needed
//! to typecheck a key's literal value).

use yang_common::{Diagnostic, DiagnosticKind, Interner, Atom};

/// Whether a prefix is required on every segment (XML instance-identifier)
/// or may be omitted when unambiguous (schema-tree module paths), 
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixPolicy {
    Optional,
    Mandatory,
}

/// One `[prefix ":"] name` segment of a schema node-id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawSegment {
    pub prefix: Option<Atom>,
    pub name: Atom,
}

/// A parsed schema node-id: `("/" node-id)+` absolute or
/// `node-id ("/" node-id)*` descendant.
#[derive(Clone, Debug)]
pub struct ParsedNodeId {
    pub absolute: bool,
    pub segments: Vec<RawSegment>,
}

pub fn parse_node_id(text: &str, interner: &mut Interner) -> Result<ParsedNodeId, Diagnostic> {
    let text = text.trim();
    if text.is_empty() {
        return Err(syntax_error(text, "empty node-id"));
    }
    let absolute = text.starts_with('/');
    let body = text.trim_start_matches('/');
    if body.is_empty() {
        return Err(syntax_error(text, "node-id has no segments"));
    }
    let mut segments = Vec::new();
    for part in body.split('/') {
        if part.is_empty() {
            return Err(syntax_error(text, "empty segment (repeated '/')"));
        }
        segments.push(parse_qname_segment(part, interner)?);
    }
    Ok(ParsedNodeId { absolute, segments })
}

fn parse_qname_segment(text: &str, interner: &mut Interner) -> Result<RawSegment, Diagnostic> {
    match text.split_once(':') {
        Some((prefix, name)) if !prefix.is_empty() && !name.is_empty() => Ok(RawSegment {
            prefix: Some(interner.intern(prefix)),
            name: interner.intern(name),
        }),
        Some(_) => Err(syntax_error(text, "malformed prefixed name")),
        None => Ok(RawSegment {
            prefix: None,
            name: interner.intern(text),
        }),
    }
}

/// A predicate attached to a data-path segment: list-key, position,
/// or leaf-list value form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// `[N]`, 1-based.
    Position(u32),
    /// `[pfx:key='v'][...]`, all keys required, order irrelevant at the
    /// grammar level (order is validated against the list's declared key
    /// order later, during C9, not here).
    ListKeys(Vec<(Option<Atom>, Atom, String)>),
    /// `[.='v']`.
    LeafListValue(String),
}

/// One segment of a leafref/instance-identifier data path.
#[derive(Clone, Debug)]
pub struct DataPathSegment {
    /// `".."` ascent (leafref paths only).
    pub ascend: bool,
    /// `current()` at the path head (leafref paths only).
    pub current: bool,
    pub prefix: Option<Atom>,
    pub name: Option<Atom>,
    pub predicates: Vec<Predicate>,
}

#[derive(Clone, Debug)]
pub struct ParsedDataPath {
    pub absolute: bool,
    pub segments: Vec<DataPathSegment>,
}

pub fn parse_data_path(
    text: &str,
    interner: &mut Interner,
    policy: PrefixPolicy,
) -> Result<ParsedDataPath, Diagnostic> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(syntax_error(text, "empty path"));
    }
    let raw_segments = split_top_level(trimmed, '/')?;
    let absolute = trimmed.starts_with('/');
    let mut segments = Vec::new();
    for (i, raw) in raw_segments.iter().enumerate() {
        if raw.is_empty() {
            if i == 0 && absolute {
                continue;
            }
            return Err(syntax_error(text, "empty segment (repeated '/')"));
        }
        segments.push(parse_data_segment(raw, interner, policy, i == 0)?);
    }
    if segments.is_empty() {
        return Err(syntax_error(text, "path has no segments"));
    }
    Ok(ParsedDataPath { absolute, segments })
}

fn parse_data_segment(
    text: &str,
    interner: &mut Interner,
    policy: PrefixPolicy,
    is_first: bool,
) -> Result<DataPathSegment, Diagnostic> {
    let bracket_start = find_top_level(text, '[');
    let (head, predicate_text) = match bracket_start {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    };
    let head = head.trim();

    if head == ".." {
        return Ok(DataPathSegment {
            ascend: true,
            current: false,
            prefix: None,
            name: None,
            predicates: Vec::new(),
        });
    }
    if head == "current()" {
        if !is_first {
            return Err(syntax_error(text, "current() only allowed at the path head"));
        }
        return Ok(DataPathSegment {
            ascend: false,
            current: true,
            prefix: None,
            name: None,
            predicates: Vec::new(),
        });
    }

    let segment = parse_qname_segment(head, interner)?;
    if policy == PrefixPolicy::Mandatory && segment.prefix.is_none() {
        return Err(syntax_error(text, "prefix required on every segment"));
    }

    let predicates = parse_predicates(predicate_text, interner)?;

    Ok(DataPathSegment {
        ascend: false,
        current: false,
        prefix: segment.prefix,
        name: Some(segment.name),
        predicates,
    })
}

fn parse_predicates(text: &str, interner: &mut Interner) -> Result<Vec<Predicate>, Diagnostic> {
    let mut predicates = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(syntax_error(text, "expected '['"));
        }
        let Some(end) = find_matching_bracket(rest) else {
            return Err(syntax_error(text, "unbalanced '['"));
        };
        let inner = &rest[1..end];
        predicates.push(parse_one_predicate(inner, interner)?);
        rest = &rest[end + 1..];
    }
    Ok(predicates)
}

fn parse_one_predicate(inner: &str, interner: &mut Interner) -> Result<Predicate, Diagnostic> {
    let inner = inner.trim();
    if let Ok(position) = inner.parse::<u32>() {
        return Ok(Predicate::Position(position));
    }
    if let Some(rest) = inner.strip_prefix('.') {
        let rest = rest.trim_start();
        let Some(value) = extract_equals_literal(rest) else {
            return Err(syntax_error(inner, "expected `.='value'`"));
        };
        return Ok(Predicate::LeafListValue(value));
    }
    // list-key predicate: "[pfx:key='v'][...]" may also be written as a
    // single bracket with one key at a time per RFC grammar; accept that.
    let Some(eq_pos) = inner.find('=') else {
        return Err(syntax_error(inner, "expected `key='value'`"));
    };
    let key_text = inner[..eq_pos].trim();
    let value_text = inner[eq_pos..].trim_start_matches('=').trim();
    let value = strip_quotes(value_text).ok_or_else(|| syntax_error(inner, "expected quoted value"))?;
    let key = parse_qname_segment(key_text, interner)?;
    Ok(Predicate::ListKeys(vec![(key.prefix, key.name, value)]))
}

fn extract_equals_literal(text: &str) -> Option<String> {
    let rest = text.strip_prefix('=')?.trim();
    strip_quotes(rest)
}

fn strip_quotes(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[bytes.len() - 1] == bytes[0] {
        Some(text[1..text.len() - 1].to_string())
    } else {
        None
    }
}

fn find_matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    for (i, ch) in text.char_indices() {
        if let Some(q) = in_quote {
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => in_quote = Some(ch),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut in_quote: Option<char> = None;
    let mut depth = 0i32;
    for (i, ch) in text.char_indices() {
        if let Some(q) = in_quote {
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => in_quote = Some(ch),
            '[' => depth += 1,
            ']' => depth -= 1,
            c if c == needle && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split `text` on top-level occurrences of `sep`, ignoring `sep` inside
/// `[...]` predicates or quoted literals.
fn split_top_level(text: &str, sep: char) -> Result<Vec<String>, Diagnostic> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    for ch in text.chars() {
        if let Some(q) = in_quote {
            current.push(ch);
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                in_quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(syntax_error(text, "unbalanced ']'"));
                }
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if depth != 0 {
        return Err(syntax_error(text, "unbalanced '['"));
    }
    if in_quote.is_some() {
        return Err(syntax_error(text, "unterminated quote"));
    }
    parts.push(current);
    Ok(parts)
}

fn syntax_error(text: &str, message: &str) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Syntax, text.to_string(), message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_schema_node_id() {
        let mut interner = Interner::new();
        let parsed = parse_node_id("/if:interfaces/if:interface", &mut interner).unwrap();
        assert!(parsed.absolute);
        assert_eq!(parsed.segments.len(), 2);
    }

    #[test]
    fn parses_descendant_schema_node_id_without_prefix() {
        let mut interner = Interner::new();
        let parsed = parse_node_id("interface/name", &mut interner).unwrap();
        assert!(!parsed.absolute);
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].prefix, None);
    }

    #[test]
    fn rejects_empty_segment() {
        let mut interner = Interner::new();
        assert!(parse_node_id("/if:interfaces//if:interface", &mut interner).is_err());
    }

    #[test]
    fn parses_list_key_predicate_s2_style() {
        let mut interner = Interner::new();
        let parsed =
            parse_data_path("/if:interfaces/if:interface[if:name='eth0']", &mut interner, PrefixPolicy::Optional)
                .unwrap();
        assert_eq!(parsed.segments.len(), 2);
        match &parsed.segments[1].predicates[0] {
            Predicate::ListKeys(keys) => {
                assert_eq!(keys.len(), 1);
                assert_eq!(keys[0].2, "eth0");
            }
            other => panic!("expected ListKeys, got {other:?}"),
        }
    }

    #[test]
    fn parses_position_predicate() {
        let mut interner = Interner::new();
        let parsed = parse_data_path("a/b[3]", &mut interner, PrefixPolicy::Optional).unwrap();
        assert_eq!(parsed.segments[1].predicates[0], Predicate::Position(3));
    }

    #[test]
    fn parses_leaflist_value_predicate() {
        let mut interner = Interner::new();
        let parsed = parse_data_path("a/b[.='x']", &mut interner, PrefixPolicy::Optional).unwrap();
        assert_eq!(
            parsed.segments[1].predicates[0],
            Predicate::LeafListValue("x".to_string())
        );
    }

    #[test]
    fn leafref_path_allows_ascents_and_current() {
        let mut interner = Interner::new();
        let parsed = parse_data_path("current()/../../if:name", &mut interner, PrefixPolicy::Optional).unwrap();
        assert!(parsed.segments[0].current);
        assert!(parsed.segments[1].ascend);
        assert!(parsed.segments[2].ascend);
    }

    #[test]
    fn mandatory_prefix_policy_rejects_bare_name() {
        let mut interner = Interner::new();
        let result = parse_data_path("/interfaces/interface", &mut interner, PrefixPolicy::Mandatory);
        assert!(result.is_err());
    }
}
