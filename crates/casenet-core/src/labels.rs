//! Node label and relationship type inference.

use crate::model::{keys, Attributes, NodeKind};

pub const CASE_LABEL: &str = "NUNC";
pub const PERSON_LABEL: &str = "Persona";
pub const ENTITY_LABEL: &str = "Entidad";
pub const FALLBACK_LABEL: &str = "Nodo";
pub const DEFAULT_RELATIONSHIP_TYPE: &str = "RELACIONADO";

/// Edge keys consulted for the relationship type, in priority order.
const TYPE_KEYS: &[&str] = &["type", keys::TIPO, keys::LINK_QUALITY, "accion"];

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn text<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    attrs
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Label of a node: `entity_type` first, then `tipo`, then the shape of the
/// identifier.
pub fn node_label(id: &str, attrs: &Attributes) -> String {
    if let Some(entity_type) = text(attrs, keys::ENTITY_TYPE) {
        return capitalize(entity_type);
    }
    if let Some(tipo) = text(attrs, keys::TIPO) {
        return match tipo.to_lowercase().as_str() {
            "nunc" | "case" => CASE_LABEL.to_string(),
            "persona" | "person" => PERSON_LABEL.to_string(),
            "entidad" | "entity" => ENTITY_LABEL.to_string(),
            _ => capitalize(tipo),
        };
    }
    if looks_like_case_id(id) {
        CASE_LABEL.to_string()
    } else {
        FALLBACK_LABEL.to_string()
    }
}

/// Purely numeric, or a quote followed by digits and dashes.
fn looks_like_case_id(id: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if all_digits(id) {
        return true;
    }
    match id.strip_prefix('\'') {
        Some(rest) => all_digits(&rest.replace('-', "")),
        None => false,
    }
}

/// Relationship type of an edge: first non-empty of `type`, `tipo`,
/// `calidad_vinculo`, `accion`, upper-cased with spaces as underscores.
pub fn relationship_type(attrs: &Attributes) -> String {
    TYPE_KEYS
        .iter()
        .find_map(|key| text(attrs, key))
        .map(|value| value.replace(' ', "_").to_uppercase())
        .unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string())
}

/// Label used when loading into the graph backend. Case and person nodes get
/// their fixed labels; entities get their inferred label.
pub fn backend_label(id: &str, attrs: &Attributes) -> String {
    match NodeKind::of(attrs) {
        NodeKind::Case => CASE_LABEL.to_string(),
        NodeKind::Person => PERSON_LABEL.to_string(),
        NodeKind::Entity => sanitize_label(&node_label(id, attrs)),
    }
}

/// Reduce a label to `[A-Za-z0-9_]`, never starting with a digit.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    match cleaned.chars().next() {
        None => ENTITY_LABEL.to_string(),
        Some(c) if c.is_ascii_digit() => format!("L_{cleaned}"),
        Some(_) => cleaned.to_string(),
    }
}
