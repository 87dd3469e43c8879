use oxigraph::model::NamedNodeRef;

pub struct SHACL {
    pub node_shape: NamedNodeRef<'static>,
    pub property: NamedNodeRef<'static>,
    pub path: NamedNodeRef<'static>,
    pub target_class: NamedNodeRef<'static>,

    pub min_count: NamedNodeRef<'static>,
    pub max_count: NamedNodeRef<'static>,
    pub datatype: NamedNodeRef<'static>,
    /// Not part of SHACL core; a single language range every value must match.
    pub lang_matches: NamedNodeRef<'static>,
    pub language_in: NamedNodeRef<'static>,
    pub min_exclusive: NamedNodeRef<'static>,
    pub min_inclusive: NamedNodeRef<'static>,
    pub max_exclusive: NamedNodeRef<'static>,
    pub max_inclusive: NamedNodeRef<'static>,

    // Constraint components, used as sh:sourceConstraintComponent in reports
    pub min_count_component: NamedNodeRef<'static>,
    pub max_count_component: NamedNodeRef<'static>,
    pub datatype_component: NamedNodeRef<'static>,
    pub language_in_component: NamedNodeRef<'static>,
    pub lang_matches_component: NamedNodeRef<'static>,
    pub min_exclusive_component: NamedNodeRef<'static>,
    pub min_inclusive_component: NamedNodeRef<'static>,
    pub max_exclusive_component: NamedNodeRef<'static>,
    pub max_inclusive_component: NamedNodeRef<'static>,
}

impl SHACL {
    pub fn new() -> Self {
        SHACL {
            node_shape: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#NodeShape"),
            property: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#property"),
            path: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#path"),
            target_class: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#targetClass"),
            min_count: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#minCount"),
            max_count: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#maxCount"),
            datatype: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#datatype"),
            lang_matches: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#langMatches"),
            language_in: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#languageIn"),
            min_exclusive: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#minExclusive"),
            min_inclusive: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#minInclusive"),
            max_exclusive: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#maxExclusive"),
            max_inclusive: NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#maxInclusive"),
            min_count_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#MinCountConstraintComponent",
            ),
            max_count_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#MaxCountConstraintComponent",
            ),
            datatype_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#DatatypeConstraintComponent",
            ),
            language_in_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#LanguageInConstraintComponent",
            ),
            lang_matches_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#LangMatchesConstraintComponent",
            ),
            min_exclusive_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#MinExclusiveConstraintComponent",
            ),
            min_inclusive_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#MinInclusiveConstraintComponent",
            ),
            max_exclusive_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#MaxExclusiveConstraintComponent",
            ),
            max_inclusive_component: NamedNodeRef::new_unchecked(
                "http://www.w3.org/ns/shacl#MaxInclusiveConstraintComponent",
            ),
        }
    }
}

pub struct RDF {
    pub type_: NamedNodeRef<'static>,
    pub first: NamedNodeRef<'static>,
    pub rest: NamedNodeRef<'static>,
    pub nil: NamedNodeRef<'static>,
}

impl RDF {
    pub fn new() -> Self {
        RDF {
            type_: NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
            first: NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#first"),
            rest: NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#rest"),
            nil: NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#nil"),
        }
    }
}

/// Returns the local name of an IRI: the part after the last `#`, or after the
/// last `/` when there is no `#`.
pub(crate) fn local_name(iri: &str) -> &str {
    if let Some(hash_idx) = iri.rfind('#') {
        &iri[hash_idx + 1..]
    } else if let Some(slash_idx) = iri.rfind('/') {
        &iri[slash_idx + 1..]
    } else {
        iri
    }
}
