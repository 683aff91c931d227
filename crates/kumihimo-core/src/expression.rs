//! Condition expressions as data.
//!
//! Conditions inside step config are a small tagged expression tree,
//! evaluated recursively against the execution's variable bag. Nothing is
//! ever compiled or eval'd, so definitions can safely come from
//! configuration files or over the wire.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::definition::VariableMap;

/// Error produced while evaluating an [`Expr`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// A variable lookup found nothing.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    /// Ordering comparison between values with no defined order.
    #[error("cannot order {left} against {right}")]
    Incomparable {
        /// JSON type name of the left operand.
        left: &'static str,
        /// JSON type name of the right operand.
        right: &'static str,
    },
    /// A boolean was required but something else was produced.
    #[error("expected a boolean, got {0}")]
    NotABoolean(&'static str),
}

/// A boolean/value expression over the execution's variables.
///
/// The serialized form tags each node with `op`, so a condition inside a
/// step config document reads naturally:
///
/// ```
/// use kumihimo_core::{Expr, VariableMap};
///
/// let expr: Expr = serde_json::from_value(serde_json::json!({
///     "op": "lt",
///     "left": { "op": "var", "name": "count" },
///     "right": { "op": "literal", "value": 3 }
/// })).expect("valid expression document");
///
/// let mut variables = VariableMap::new();
/// variables.insert("count".into(), serde_json::json!(1));
/// assert_eq!(expr.eval_bool(&variables), Ok(true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    /// A literal JSON value.
    Literal {
        /// The value itself.
        value: Value,
    },
    /// Looks up a variable by name; unknown names are an error.
    Var {
        /// Variable name in the bag.
        name: String,
    },
    /// Tests whether a variable exists at all.
    Defined {
        /// Variable name in the bag.
        name: String,
    },
    /// Deep equality.
    Eq {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Deep inequality.
    Ne {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Strictly greater than; numbers and strings only.
    Gt {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Greater than or equal; numbers and strings only.
    Ge {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Strictly less than; numbers and strings only.
    Lt {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Less than or equal; numbers and strings only.
    Le {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Short-circuit conjunction; empty is `true`.
    And {
        /// Operands, all of which must be boolean.
        exprs: Vec<Expr>,
    },
    /// Short-circuit disjunction; empty is `false`.
    Or {
        /// Operands, all of which must be boolean.
        exprs: Vec<Expr>,
    },
    /// Boolean negation.
    Not {
        /// Operand, which must be boolean.
        expr: Box<Expr>,
    },
}

impl Expr {
    /// A literal value node.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// A variable lookup node.
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var { name: name.into() }
    }

    /// A variable presence test.
    pub fn defined(name: impl Into<String>) -> Self {
        Expr::Defined { name: name.into() }
    }

    /// `left == right`.
    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::Eq {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left != right`.
    pub fn ne(left: Expr, right: Expr) -> Self {
        Expr::Ne {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left > right`.
    pub fn gt(left: Expr, right: Expr) -> Self {
        Expr::Gt {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left >= right`.
    pub fn ge(left: Expr, right: Expr) -> Self {
        Expr::Ge {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left < right`.
    pub fn lt(left: Expr, right: Expr) -> Self {
        Expr::Lt {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left <= right`.
    pub fn le(left: Expr, right: Expr) -> Self {
        Expr::Le {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Conjunction over `exprs`.
    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And { exprs }
    }

    /// Disjunction over `exprs`.
    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or { exprs }
    }

    /// Negation of `expr`.
    pub fn not(expr: Expr) -> Self {
        Expr::Not {
            expr: Box::new(expr),
        }
    }

    /// Evaluates the expression to a JSON value.
    pub fn eval(&self, variables: &VariableMap) -> Result<Value, ExpressionError> {
        match self {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Var { name } => variables
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnknownVariable(name.clone())),
            Expr::Defined { name } => Ok(Value::Bool(variables.contains_key(name))),
            Expr::Eq { left, right } => {
                Ok(Value::Bool(left.eval(variables)? == right.eval(variables)?))
            }
            Expr::Ne { left, right } => {
                Ok(Value::Bool(left.eval(variables)? != right.eval(variables)?))
            }
            Expr::Gt { left, right } => Self::order(left, right, variables)
                .map(|ordering| Value::Bool(ordering == Ordering::Greater)),
            Expr::Ge { left, right } => Self::order(left, right, variables)
                .map(|ordering| Value::Bool(ordering != Ordering::Less)),
            Expr::Lt { left, right } => Self::order(left, right, variables)
                .map(|ordering| Value::Bool(ordering == Ordering::Less)),
            Expr::Le { left, right } => Self::order(left, right, variables)
                .map(|ordering| Value::Bool(ordering != Ordering::Greater)),
            Expr::And { exprs } => {
                for expr in exprs {
                    if !expr.eval_bool(variables)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Or { exprs } => {
                for expr in exprs {
                    if expr.eval_bool(variables)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expr::Not { expr } => Ok(Value::Bool(!expr.eval_bool(variables)?)),
        }
    }

    /// Evaluates the expression, requiring a boolean result.
    pub fn eval_bool(&self, variables: &VariableMap) -> Result<bool, ExpressionError> {
        match self.eval(variables)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExpressionError::NotABoolean(json_type_name(&other))),
        }
    }

    fn order(
        left: &Expr,
        right: &Expr,
        variables: &VariableMap,
    ) -> Result<Ordering, ExpressionError> {
        let left = left.eval(variables)?;
        let right = right.eval(variables)?;
        match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => l
                .as_f64()
                .zip(r.as_f64())
                .and_then(|(l, r)| l.partial_cmp(&r))
                .ok_or(ExpressionError::Incomparable {
                    left: "number",
                    right: "number",
                }),
            (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
            _ => Err(ExpressionError::Incomparable {
                left: json_type_name(&left),
                right: json_type_name(&right),
            }),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => write!(f, "{value}"),
            Expr::Var { name } => write!(f, "${name}"),
            Expr::Defined { name } => write!(f, "defined(${name})"),
            Expr::Eq { left, right } => write!(f, "({left} == {right})"),
            Expr::Ne { left, right } => write!(f, "({left} != {right})"),
            Expr::Gt { left, right } => write!(f, "({left} > {right})"),
            Expr::Ge { left, right } => write!(f, "({left} >= {right})"),
            Expr::Lt { left, right } => write!(f, "({left} < {right})"),
            Expr::Le { left, right } => write!(f, "({left} <= {right})"),
            Expr::And { exprs } => {
                write!(f, "and(")?;
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{expr}")?;
                }
                write!(f, ")")
            }
            Expr::Or { exprs } => {
                write!(f, "or(")?;
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{expr}")?;
                }
                write!(f, ")")
            }
            Expr::Not { expr } => write!(f, "not({expr})"),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
