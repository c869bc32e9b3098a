//! Watch expressions.
//!
//! An [`Expr`] is the source form of a lookup. Two expressions that are
//! structurally equal are the same lookup, no matter where in the template
//! they appear, so `Expr` derives `Hash` and `Eq` and the lookup table is
//! keyed by it.

use crate::runtime::Scope;
use crate::types::{Path, Value};

/// Constant operand. Floats are left out so that literals stay hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => Value::Int(*n),
            Literal::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(value as i64)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),
    /// Member of the instance's props.
    Prop(Path),
    /// Member of the instance's state.
    State(Path),
    Not(Box<Expr>),
    Equals(Box<Expr>, Box<Expr>),
    LessThan(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Len(Box<Expr>),
    Concat(Vec<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Call a method from the instance's method table.
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn lit(value: impl Into<Literal>) -> Self {
        Expr::Literal(value.into())
    }

    /// The whole props value.
    pub fn props() -> Self {
        Expr::Prop(Path::root())
    }

    pub fn prop(path: &str) -> Self {
        Expr::Prop(Path::parse(path))
    }

    pub fn state(path: &str) -> Self {
        Expr::State(Path::parse(path))
    }

    pub fn negate(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn equals(self, other: Expr) -> Self {
        Expr::Equals(Box::new(self), Box::new(other))
    }

    pub fn less_than(self, other: Expr) -> Self {
        Expr::LessThan(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn len(self) -> Self {
        Expr::Len(Box::new(self))
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Concat(parts.into_iter().collect())
    }

    pub fn cond(test: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Cond(Box::new(test), Box::new(then), Box::new(otherwise))
    }

    pub fn call(method: &str, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Call(method.to_string(), args.into_iter().collect())
    }

    pub fn eval(&self, scope: &Scope<'_>) -> Value {
        match self {
            Expr::Literal(literal) => literal.to_value(),
            Expr::Prop(path) => scope.props().get_path(path),
            Expr::State(path) => scope.state().get_path(path),
            Expr::Not(inner) => Value::Bool(!inner.eval(scope).is_truthy()),
            Expr::Equals(a, b) => Value::Bool(a.eval(scope) == b.eval(scope)),
            Expr::LessThan(a, b) => Value::Bool(less_than(&a.eval(scope), &b.eval(scope))),
            Expr::And(a, b) => {
                let left = a.eval(scope);
                if left.is_truthy() { b.eval(scope) } else { left }
            }
            Expr::Or(a, b) => {
                let left = a.eval(scope);
                if left.is_truthy() { left } else { b.eval(scope) }
            }
            Expr::Len(inner) => Value::from(inner.eval(scope).len()),
            Expr::Concat(parts) => {
                Value::from(parts.iter().map(|p| p.eval(scope).to_text()).collect::<String>())
            }
            Expr::Cond(test, then, otherwise) => {
                if test.eval(scope).is_truthy() {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Expr::Call(method, args) => {
                let args: Vec<Value> = args.iter().map(|a| a.eval(scope)).collect();
                scope.call(method, &args)
            }
        }
    }
}

fn less_than(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x < y,
        (Value::Int(x), Value::Float(y)) => (*x as f64) < *y,
        (Value::Float(x), Value::Int(y)) => *x < (*y as f64),
        (Value::Float(x), Value::Float(y)) => x < y,
        (Value::Str(x), Value::Str(y)) => x < y,
        _ => false,
    }
}
