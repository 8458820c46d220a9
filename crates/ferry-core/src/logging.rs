//! Per-type logging context

use tracing::Span;

/// Span tagging events with the object type they concern
pub fn object_span(type_name: &str) -> Span {
    tracing::debug_span!("object", object_type = type_name)
}
