//! Well-known vocabulary constants.

/// [RDF](https://www.w3.org/TR/rdf11-concepts/) vocabulary
pub mod rdf {
    use crate::model::NamedNode;
    use std::sync::LazyLock;

    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    /// `rdf:type`
    pub static TYPE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}type")));
    /// `rdf:Statement`
    pub static STATEMENT: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}Statement")));
    /// `rdf:subject`
    pub static SUBJECT: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}subject")));
    /// `rdf:predicate`
    pub static PREDICATE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}predicate")));
    /// `rdf:object`
    pub static OBJECT: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}object")));
    /// `rdf:first`
    pub static FIRST: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}first")));
    /// `rdf:rest`
    pub static REST: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}rest")));
    /// `rdf:nil`
    pub static NIL: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}nil")));
    /// `rdf:langString`
    pub static LANG_STRING: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}langString")));
}

/// [XML Schema](https://www.w3.org/TR/xmlschema11-2/) datatypes
pub mod xsd {
    use crate::model::NamedNode;
    use std::sync::LazyLock;

    pub const NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";

    /// `xsd:string`
    pub static STRING: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}string")));
    /// `xsd:boolean`
    pub static BOOLEAN: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}boolean")));
    /// `xsd:integer`
    pub static INTEGER: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}integer")));
    /// `xsd:decimal`
    pub static DECIMAL: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}decimal")));
    /// `xsd:double`
    pub static DOUBLE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}double")));
}
