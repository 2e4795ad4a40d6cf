//! SPARQL-star expression evaluation for FILTER and BIND.
//!
//! Expressions evaluate against a single solution binding and either produce
//! a term or raise an evaluation error. Per SPARQL semantics an error is not
//! fatal: FILTER treats it as false, BIND leaves the target unbound.

use crate::model::{Literal, StarTerm, StarTriple};
use crate::vocab;
use crate::{StarError, StarResult};

use super::Binding;

/// A SPARQL-star expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant term
    Term(StarTerm),
    /// A variable reference
    Variable(String),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    FunctionCall {
        function: Function,
        args: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Bound,
    IsIri,
    IsBlank,
    IsLiteral,
    IsTriple,
    Subject,
    Predicate,
    Object,
    /// `TRIPLE(s, p, o)` and the `<< s p o >>` expression form
    Triple,
    Str,
    Datatype,
    Lang,
}

impl Function {
    /// Resolves a function keyword, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        Some(match upper.as_str() {
            "BOUND" => Function::Bound,
            "ISIRI" | "ISURI" => Function::IsIri,
            "ISBLANK" => Function::IsBlank,
            "ISLITERAL" => Function::IsLiteral,
            "ISTRIPLE" => Function::IsTriple,
            "SUBJECT" => Function::Subject,
            "PREDICATE" => Function::Predicate,
            "OBJECT" => Function::Object,
            "TRIPLE" => Function::Triple,
            "STR" => Function::Str,
            "DATATYPE" => Function::Datatype,
            "LANG" => Function::Lang,
            _ => return None,
        })
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Triple => 3,
            _ => 1,
        }
    }
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn term(term: StarTerm) -> Self {
        Expression::Term(term)
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op: CompareOp::Equal,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn subject(arg: Expression) -> Self {
        Expression::FunctionCall {
            function: Function::Subject,
            args: vec![arg],
        }
    }

    pub fn object(arg: Expression) -> Self {
        Expression::FunctionCall {
            function: Function::Object,
            args: vec![arg],
        }
    }

    pub fn is_triple(arg: Expression) -> Self {
        Expression::FunctionCall {
            function: Function::IsTriple,
            args: vec![arg],
        }
    }

    /// Evaluates to a term, or an evaluation error.
    pub fn evaluate(&self, binding: &Binding) -> StarResult<StarTerm> {
        match self {
            Expression::Term(term) => Ok(term.clone()),
            Expression::Variable(name) => binding
                .get(name)
                .cloned()
                .ok_or_else(|| StarError::semantic_error(format!("unbound variable ?{name}"))),
            Expression::Not(inner) => {
                let value = inner.evaluate(binding)?;
                Ok(StarTerm::Literal(Literal::boolean(!effective_boolean_value(
                    &value,
                )?)))
            }
            Expression::And(left, right) => {
                let l = effective_boolean_value(&left.evaluate(binding)?)?;
                if !l {
                    return Ok(StarTerm::Literal(Literal::boolean(false)));
                }
                let r = effective_boolean_value(&right.evaluate(binding)?)?;
                Ok(StarTerm::Literal(Literal::boolean(r)))
            }
            Expression::Or(left, right) => {
                let l = effective_boolean_value(&left.evaluate(binding)?)?;
                if l {
                    return Ok(StarTerm::Literal(Literal::boolean(true)));
                }
                let r = effective_boolean_value(&right.evaluate(binding)?)?;
                Ok(StarTerm::Literal(Literal::boolean(r)))
            }
            Expression::Compare { op, left, right } => {
                let l = left.evaluate(binding)?;
                let r = right.evaluate(binding)?;
                Ok(StarTerm::Literal(Literal::boolean(compare(*op, &l, &r)?)))
            }
            Expression::FunctionCall { function, args } => {
                evaluate_function(*function, args, binding)
            }
        }
    }

    /// Evaluates as a FILTER condition. Errors collapse to false.
    pub fn evaluate_boolean(&self, binding: &Binding) -> bool {
        self.evaluate(binding)
            .and_then(|term| effective_boolean_value(&term))
            .unwrap_or(false)
    }
}

fn evaluate_function(
    function: Function,
    args: &[Expression],
    binding: &Binding,
) -> StarResult<StarTerm> {
    if args.len() != function.arity() {
        return Err(StarError::semantic_error(format!(
            "{function:?} expects {} argument(s), found {}",
            function.arity(),
            args.len()
        )));
    }

    // BOUND inspects the binding directly rather than evaluating its
    // argument, since evaluating an unbound variable is itself an error.
    if function == Function::Bound {
        return match args.first() {
            Some(Expression::Variable(name)) => Ok(StarTerm::Literal(Literal::boolean(
                binding.get(name).is_some(),
            ))),
            _ => Err(StarError::semantic_error("BOUND requires a variable argument")),
        };
    }

    if function == Function::Triple {
        let subject = args[0].evaluate(binding)?;
        let predicate = args[1].evaluate(binding)?;
        let object = args[2].evaluate(binding)?;
        let triple = StarTriple::new(subject, predicate, object);
        triple.validate()?;
        return Ok(StarTerm::quoted_triple(triple));
    }

    let value = args[0].evaluate(binding)?;
    match function {
        Function::IsIri => Ok(StarTerm::Literal(Literal::boolean(value.is_named_node()))),
        Function::IsBlank => Ok(StarTerm::Literal(Literal::boolean(value.is_blank_node()))),
        Function::IsLiteral => Ok(StarTerm::Literal(Literal::boolean(value.is_literal()))),
        Function::IsTriple => Ok(StarTerm::Literal(Literal::boolean(value.is_quoted_triple()))),
        Function::Subject => quoted_component(&value, |t| &t.subject),
        Function::Predicate => quoted_component(&value, |t| &t.predicate),
        Function::Object => quoted_component(&value, |t| &t.object),
        Function::Str => match &value {
            StarTerm::NamedNode(n) => Ok(StarTerm::literal(n.as_str())),
            StarTerm::Literal(l) => Ok(StarTerm::literal(&l.value)),
            other => Err(StarError::semantic_error(format!(
                "STR is not defined for {other}"
            ))),
        },
        Function::Datatype => match &value {
            StarTerm::Literal(l) => StarTerm::iri(l.datatype_iri()),
            other => Err(StarError::semantic_error(format!(
                "DATATYPE is not defined for {other}"
            ))),
        },
        Function::Lang => match &value {
            StarTerm::Literal(l) => Ok(StarTerm::literal(l.language.as_deref().unwrap_or(""))),
            other => Err(StarError::semantic_error(format!(
                "LANG is not defined for {other}"
            ))),
        },
        Function::Bound | Function::Triple => unreachable!("handled above"),
    }
}

fn quoted_component(
    value: &StarTerm,
    component: impl Fn(&StarTriple) -> &StarTerm,
) -> StarResult<StarTerm> {
    value
        .as_quoted_triple()
        .map(|t| component(t).clone())
        .ok_or_else(|| {
            StarError::semantic_error(format!("expected a quoted triple, found {value}"))
        })
}

fn compare(op: CompareOp, left: &StarTerm, right: &StarTerm) -> StarResult<bool> {
    match op {
        CompareOp::Equal | CompareOp::NotEqual => {
            let equal = terms_equal(left, right);
            Ok(if op == CompareOp::Equal { equal } else { !equal })
        }
        _ => {
            let ordering = term_ordering(left, right)?;
            Ok(match op {
                CompareOp::Less => ordering.is_lt(),
                CompareOp::LessOrEqual => ordering.is_le(),
                CompareOp::Greater => ordering.is_gt(),
                CompareOp::GreaterOrEqual => ordering.is_ge(),
                CompareOp::Equal | CompareOp::NotEqual => unreachable!(),
            })
        }
    }
}

/// Value equality: numeric literals compare by value across the XSD numeric
/// types, everything else compares structurally.
fn terms_equal(left: &StarTerm, right: &StarTerm) -> bool {
    if let (StarTerm::Literal(l), StarTerm::Literal(r)) = (left, right) {
        if let (Some(lv), Some(rv)) = (l.as_f64(), r.as_f64()) {
            return lv == rv;
        }
    }
    left == right
}

fn term_ordering(left: &StarTerm, right: &StarTerm) -> StarResult<std::cmp::Ordering> {
    match (left, right) {
        (StarTerm::Literal(l), StarTerm::Literal(r)) => {
            if let (Some(lv), Some(rv)) = (l.as_f64(), r.as_f64()) {
                return lv.partial_cmp(&rv).ok_or_else(|| {
                    StarError::semantic_error("numeric comparison is undefined for NaN")
                });
            }
            if l.language.is_none()
                && r.language.is_none()
                && !l.is_numeric()
                && !r.is_numeric()
            {
                return Ok(l.value.cmp(&r.value));
            }
            Err(StarError::semantic_error(format!(
                "cannot order literals {l} and {r}"
            )))
        }
        _ => Err(StarError::semantic_error(format!(
            "cannot order {left} and {right}"
        ))),
    }
}

/// SPARQL effective boolean value.
fn effective_boolean_value(term: &StarTerm) -> StarResult<bool> {
    match term {
        StarTerm::Literal(literal) => {
            if literal.datatype_iri() == vocab::xsd::BOOLEAN.as_str() {
                return match literal.value.as_str() {
                    "true" | "1" => Ok(true),
                    "false" | "0" => Ok(false),
                    other => Err(StarError::semantic_error(format!(
                        "invalid boolean lexical form: {other}"
                    ))),
                };
            }
            if let Some(value) = literal.as_f64() {
                return Ok(value != 0.0);
            }
            if literal.language.is_some()
                || literal.datatype_iri() == vocab::xsd::STRING.as_str()
            {
                return Ok(!literal.value.is_empty());
            }
            Err(StarError::semantic_error(format!(
                "no effective boolean value for {literal}"
            )))
        }
        other => Err(StarError::semantic_error(format!(
            "no effective boolean value for {other}"
        ))),
    }
}
