//! Name validity predicates for serialized program members.
//!
//! The closure serializer (external to this crate) needs to know whether a
//! captured name can be emitted verbatim as a Lyre identifier. Only the
//! predicates live here.

/// Reserved words of the Lyre dialect.
const RESERVED_WORDS: &[&str] = &[
    "and", "break", "continue", "else", "export", "false", "fn", "for", "if", "import", "in",
    "let", "loop", "match", "nil", "not", "or", "return", "true", "while",
];

/// Whether `name` has legal member-name shape: a leading letter or
/// underscore followed by letters, digits, or underscores.
pub fn is_legal_member_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `name` can be emitted as a function name: member-name shape and
/// not a reserved word. `new` is allowed (constructor position).
pub fn is_legal_function_name(name: &str) -> bool {
    if !is_legal_member_name(name) {
        return false;
    }
    name == "new" || !RESERVED_WORDS.contains(&name)
}
