use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, LiteralRef, NamedNode, NamedNodeRef, Term};
use oxsdatatypes::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Immutable description of a SHACL node shape and the property
/// constraints declared under it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    identifier: Term,
    /// `sh:targetClass` values in document order.
    target_classes: Vec<NamedNode>,
    properties: Vec<PropertyConstraint>,
}

impl NodeShape {
    pub fn new(
        identifier: Term,
        target_classes: Vec<NamedNode>,
        properties: Vec<PropertyConstraint>,
    ) -> Self {
        NodeShape {
            identifier,
            target_classes,
            properties,
        }
    }

    pub fn identifier(&self) -> &Term {
        &self.identifier
    }

    pub fn target_classes(&self) -> &[NamedNode] {
        &self.target_classes
    }

    pub fn properties(&self) -> &[PropertyConstraint] {
        &self.properties
    }
}

/// The constraints a property shape places on one predicate path.
///
/// Every feature is optional; an absent feature never licenses a rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyConstraint {
    pub(crate) path: NamedNode,
    pub(crate) min_count: Option<u64>,
    pub(crate) max_count: Option<u64>,
    pub(crate) datatype: Option<NamedNode>,
    pub(crate) lang_matches: Option<String>,
    pub(crate) language_in: Vec<String>,
    pub(crate) min_exclusive: Option<Literal>,
    pub(crate) min_inclusive: Option<Literal>,
    pub(crate) max_exclusive: Option<Literal>,
    pub(crate) max_inclusive: Option<Literal>,
}

impl PropertyConstraint {
    pub fn new(path: NamedNode) -> Self {
        PropertyConstraint {
            path,
            min_count: None,
            max_count: None,
            datatype: None,
            lang_matches: None,
            language_in: Vec::new(),
            min_exclusive: None,
            min_inclusive: None,
            max_exclusive: None,
            max_inclusive: None,
        }
    }

    pub fn path(&self) -> &NamedNode {
        &self.path
    }

    pub fn min_count(&self) -> Option<u64> {
        self.min_count
    }

    pub fn max_count(&self) -> Option<u64> {
        self.max_count
    }

    pub fn datatype(&self) -> Option<&NamedNode> {
        self.datatype.as_ref()
    }

    /// The declared `sh:langMatches` range.
    pub fn lang_matches(&self) -> Option<&str> {
        self.lang_matches.as_deref()
    }

    /// The range every value's language tag is known to match: the declared
    /// `sh:langMatches`, or the only range of `sh:languageIn`.
    pub fn lang_guarantee(&self) -> Option<&str> {
        match (self.lang_matches(), self.language_in.as_slice()) {
            (Some(range), _) => Some(range),
            (None, [only]) => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn language_in(&self) -> &[String] {
        &self.language_in
    }

    pub fn range(&self, kind: RangeKind) -> Option<&Literal> {
        match kind {
            RangeKind::MinExclusive => self.min_exclusive.as_ref(),
            RangeKind::MinInclusive => self.min_inclusive.as_ref(),
            RangeKind::MaxExclusive => self.max_exclusive.as_ref(),
            RangeKind::MaxInclusive => self.max_inclusive.as_ref(),
        }
    }

    /// True when a declared lower bound exceeds a declared upper bound.
    pub(crate) fn is_contradictory(&self) -> bool {
        if let (Some(min), Some(max)) = (self.min_count, self.max_count) {
            if min > max {
                return true;
            }
        }
        let lower = self.min_inclusive.as_ref().or(self.min_exclusive.as_ref());
        let upper = self.max_inclusive.as_ref().or(self.max_exclusive.as_ref());
        match (lower, upper) {
            (Some(lo), Some(hi)) => compare_numeric(lo, hi) == Some(Ordering::Greater),
            _ => false,
        }
    }
}

/// The four value-range features of a property constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RangeKind {
    MinExclusive,
    MinInclusive,
    MaxExclusive,
    MaxInclusive,
}

impl RangeKind {
    pub const ALL: [RangeKind; 4] = [
        RangeKind::MinExclusive,
        RangeKind::MinInclusive,
        RangeKind::MaxExclusive,
        RangeKind::MaxInclusive,
    ];
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RangeKind::MinExclusive => "minExclusive",
            RangeKind::MinInclusive => "minInclusive",
            RangeKind::MaxExclusive => "maxExclusive",
            RangeKind::MaxInclusive => "maxInclusive",
        };
        f.write_str(name)
    }
}

const INTEGER_TYPES: [NamedNodeRef<'static>; 13] = [
    xsd::INTEGER,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::LONG,
    xsd::INT,
    xsd::SHORT,
    xsd::BYTE,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

/// Largest number of fractional digits `Decimal` holds without rounding.
const DECIMAL_DIGITS: usize = 18;

fn decimal_from_literal(lit: LiteralRef<'_>) -> Option<Decimal> {
    let datatype = lit.datatype();
    if datatype != xsd::DECIMAL && !INTEGER_TYPES.contains(&datatype) {
        return None;
    }
    let lexical = lit.value().trim();
    let fraction = lexical
        .split_once('.')
        .map_or("", |(_, f)| f.trim_end_matches('0'));
    if fraction.len() > DECIMAL_DIGITS {
        return None;
    }
    Decimal::from_str(lexical).ok()
}

fn float_from_literal(lit: LiteralRef<'_>) -> Option<f64> {
    let datatype = lit.datatype();
    if datatype == xsd::FLOAT || datatype == xsd::DOUBLE {
        lit.value()
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| !value.is_nan())
    } else {
        None
    }
}

/// Exact ordering of two numeric literals of the same family.
///
/// Integers and decimals compare as decimals, floats and doubles as doubles.
/// Anything else, including a mix of the two families, has no ordering.
pub(crate) fn compare_numeric(left: &Literal, right: &Literal) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (
        decimal_from_literal(left.as_ref()),
        decimal_from_literal(right.as_ref()),
    ) {
        return l.partial_cmp(&r);
    }
    if let (Some(l), Some(r)) = (
        float_from_literal(left.as_ref()),
        float_from_literal(right.as_ref()),
    ) {
        return l.partial_cmp(&r);
    }
    None
}
