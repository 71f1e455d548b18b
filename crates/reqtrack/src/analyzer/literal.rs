//! Literal-only value resolution.
//!
//! Only values spelled out in the source resolve. Identifiers, arithmetic and
//! call results yield nothing; no expression is ever evaluated.

use boa_ast::expression::literal::{ObjectLiteral, PropertyDefinition};
use boa_ast::expression::Expression;
use boa_ast::property::PropertyName;
use boa_interner::{Interner, Sym, ToInternedString};

/// Constructions whose source text is kept as a body so the content type can
/// be inferred from it.
const BODY_CONSTRUCTORS: &[&str] = &[
    "new FormData",
    "new URLSearchParams",
    "new Blob",
    "new File",
];

pub(super) fn resolve_sym(interner: &Interner, sym: Sym) -> String {
    interner
        .resolve_expect(sym)
        .join(|s: &str| s.to_string(), String::from_utf16_lossy, true)
}

/// The value of a string literal.
pub(super) fn string_literal(expr: &Expression, interner: &Interner) -> Option<String> {
    let Expression::Literal(literal) = expr else {
        return None;
    };
    let rendered = literal.to_interned_string(interner);
    rendered
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
}

/// A string or template literal. Template substitutions stay as `${...}` so
/// the URL normalizer can recognize them as unresolved.
pub(super) fn string_like(expr: &Expression, interner: &Interner) -> String {
    match expr {
        Expression::TemplateLiteral(template) => {
            let rendered = template.to_interned_string(interner);
            rendered.trim_matches('`').to_string()
        }
        other => string_literal(other, interner).unwrap_or_default(),
    }
}

/// A request body: string-like literals by value, object and array literals
/// and recognized payload constructions by source text.
pub(super) fn body_value(expr: &Expression, interner: &Interner) -> String {
    match expr {
        Expression::Literal(_) | Expression::TemplateLiteral(_) => string_like(expr, interner),
        Expression::ObjectLiteral(_) | Expression::ArrayLiteral(_) => {
            expr.to_interned_string(interner)
        }
        Expression::Call(_) => {
            let rendered = expr.to_interned_string(interner);
            if rendered.starts_with("JSON.stringify(") {
                rendered
            } else {
                String::new()
            }
        }
        Expression::New(_) => {
            let rendered = expr.to_interned_string(interner);
            if BODY_CONSTRUCTORS.iter().any(|c| rendered.starts_with(c)) {
                rendered
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

pub(super) fn as_object(expr: &Expression) -> Option<&ObjectLiteral> {
    match expr {
        Expression::ObjectLiteral(object) => Some(object),
        _ => None,
    }
}

fn property_key(name: &PropertyName, interner: &Interner) -> Option<String> {
    match name {
        PropertyName::Literal(sym) => Some(resolve_sym(interner, *sym)),
        PropertyName::Computed(expr) => string_literal(expr, interner),
    }
}

/// The value expression of `name` in an object literal (case-insensitive).
pub(super) fn property<'o>(
    object: &'o ObjectLiteral,
    name: &str,
    interner: &Interner,
) -> Option<&'o Expression> {
    object.properties().iter().find_map(|definition| match definition {
        PropertyDefinition::Property(key, value) => property_key(key, interner)
            .filter(|key| key.eq_ignore_ascii_case(name))
            .map(|_| value),
        _ => None,
    })
}

/// The string value of `name` in an object literal.
pub(super) fn string_property(object: &ObjectLiteral, name: &str, interner: &Interner) -> String {
    property(object, name, interner)
        .map(|value| string_like(value, interner))
        .unwrap_or_default()
}

/// The body under `name` in an object literal.
pub(super) fn body_property(object: &ObjectLiteral, name: &str, interner: &Interner) -> String {
    property(object, name, interner)
        .map(|value| body_value(value, interner))
        .unwrap_or_default()
}

/// A header value set directly on a config object or inside its nested
/// `headers` object.
pub(super) fn header_property(object: &ObjectLiteral, name: &str, interner: &Interner) -> String {
    let direct = string_property(object, name, interner);
    if !direct.is_empty() {
        return direct;
    }
    property(object, "headers", interner)
        .and_then(as_object)
        .map(|headers| string_property(headers, name, interner))
        .unwrap_or_default()
}
