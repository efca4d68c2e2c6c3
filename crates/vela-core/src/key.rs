//! # Natural Keys and Normalization
//!
//! Every lifecycle-managed entity is identified to humans by a natural key
//! (a brand name, a table number, a product code, a username). Uniqueness is
//! never enforced on the raw value the operator typed; it is enforced on a
//! canonical *normalized* form so that "Coca Cola", "coca  cola" and
//! "Coca-Cola"-without-diacritics variants like "Café"/"Cafe" collide.
//!
//! ## Normalization Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  raw: "  Café   Río "                                           │
//! │       │                                                         │
//! │       ▼  NFD decomposition + strip combining marks              │
//! │  "  Cafe   Rio "                                                │
//! │       │                                                         │
//! │       ▼  lowercase                                              │
//! │  "  cafe   rio "                                                │
//! │       │                                                         │
//! │       ▼  collapse + trim whitespace                             │
//! │  "cafe rio"   ← the stored normalized_key                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Numeric keys (bar table numbers, product codes) skip the text pipeline:
//! they compare on the numeric value, rendered canonically in decimal.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// =============================================================================
// Key Shape
// =============================================================================

/// The shape of an entity's natural key.
///
/// Configured once per entity kind in the registry; payloads are expected to
/// match (a `BarTable` key is always a number, a `Brand` key always text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    /// Free text: names, usernames. Normalized through the text pipeline.
    Text,
    /// Numeric: table numbers, product codes. Compared on the value.
    Number,
}

// =============================================================================
// Natural Key
// =============================================================================

/// A typed natural-key value supplied by the caller.
///
/// Callers hand the engine already-validated primitives, never raw form
/// strings. The engine derives the normalized form; it is recomputed on every
/// key write and never directly mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NaturalKey {
    Number(i64),
    Text(String),
}

impl NaturalKey {
    /// Returns the canonical comparison form of this key.
    ///
    /// Deterministic, total, pure: the same input always produces the same
    /// output and no input fails.
    pub fn normalized(&self) -> String {
        match self {
            NaturalKey::Text(raw) => normalize(raw),
            // Identity after numeric parsing: uniqueness is on the value.
            NaturalKey::Number(n) => n.to_string(),
        }
    }

    /// The shape of this key value.
    pub fn shape(&self) -> KeyShape {
        match self {
            NaturalKey::Text(_) => KeyShape::Text,
            NaturalKey::Number(_) => KeyShape::Number,
        }
    }
}

impl From<&str> for NaturalKey {
    fn from(raw: &str) -> Self {
        NaturalKey::Text(raw.to_string())
    }
}

impl From<i64> for NaturalKey {
    fn from(n: i64) -> Self {
        NaturalKey::Number(n)
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Produces the canonical comparison form of a text natural key.
///
/// ## Steps
/// 1. Unicode NFD decomposition, dropping combining marks ("é" → "e")
/// 2. Lowercasing
/// 3. Whitespace collapse and trim
///
/// ## Example
/// ```rust
/// use vela_core::key::normalize;
///
/// assert_eq!(normalize("  Café   Río "), "cafe rio");
/// assert_eq!(normalize("NIKE"), "nike");
/// ```
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();

    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Unit Tests
// =============================================================================
