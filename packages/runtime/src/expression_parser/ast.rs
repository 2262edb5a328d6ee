/*
 * Binding Expression AST
 *
 * Immutable, stateless expression nodes shared across scopes. Every node
 * implements `evaluate` and `connect` against a caller-supplied scope;
 * assignable nodes additionally implement `assign`. Nodes never store the
 * scope they were last evaluated with.
 */

use serde::{Deserialize, Serialize};

use crate::binding::scope::{ancestor_override, get_context, Scope};
use crate::binding::Connectable;
use crate::error::EvalError;
use crate::values::Value;

/// Source span of a node within its expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSpan {
    pub start: usize,
    pub end: usize,
}

impl ParseSpan {
    pub fn new(start: usize, end: usize) -> Self {
        ParseSpan { start, end }
    }
}

/// A literal primitive embedded in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl LiteralValue {
    pub fn to_value(&self) -> Value {
        match self {
            LiteralValue::Undefined => Value::Undefined,
            LiteralValue::Null => Value::Null,
            LiteralValue::Boolean(b) => Value::Boolean(*b),
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(s) => Value::string(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    pub fn from_operator(op: &str) -> Option<BinaryOp> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Modulo,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "===" => BinaryOp::StrictEqual,
            "!==" => BinaryOp::StrictNotEqual,
            "<" => BinaryOp::LessThan,
            ">" => BinaryOp::GreaterThan,
            "<=" => BinaryOp::LessOrEqual,
            ">=" => BinaryOp::GreaterOrEqual,
            "&&" => BinaryOp::LogicalAnd,
            "||" => BinaryOp::LogicalOr,
            _ => return None,
        })
    }
}

/// Main AST enum containing all node types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Expression {
    Literal(Literal),
    ArrayLiteral(ArrayLiteral),
    AccessThis(AccessThis),
    AccessScope(AccessScope),
    AccessMember(AccessMember),
    AccessKeyed(AccessKeyed),
    CallScope(CallScope),
    CallMember(CallMember),
    Unary(Unary),
    Binary(Binary),
    Conditional(Conditional),
    Assign(Assign),
    Interpolation(Interpolation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub span: ParseSpan,
    pub value: LiteralValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLiteral {
    pub span: ParseSpan,
    pub elements: Vec<Expression>,
}

/// `$this` or a `$parent` chain: the binding context `ancestor` hops up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessThis {
    pub span: ParseSpan,
    pub ancestor: usize,
}

/// A bare identifier resolved against the scope chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessScope {
    pub span: ParseSpan,
    pub name: String,
    pub ancestor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessMember {
    pub span: ParseSpan,
    pub object: Box<Expression>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKeyed {
    pub span: ParseSpan,
    pub object: Box<Expression>,
    pub key: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallScope {
    pub span: ParseSpan,
    pub name: String,
    pub args: Vec<Expression>,
    pub ancestor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMember {
    pub span: ParseSpan,
    pub object: Box<Expression>,
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unary {
    pub span: ParseSpan,
    pub operator: UnaryOp,
    pub expr: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binary {
    pub span: ParseSpan,
    pub operator: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub span: ParseSpan,
    pub condition: Box<Expression>,
    pub yes: Box<Expression>,
    pub no: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub span: ParseSpan,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}

/// A split interpolation: `parts` always has one more element than
/// `expressions`, and output interleaves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    pub span: ParseSpan,
    pub parts: Vec<String>,
    pub expressions: Vec<Expression>,
}

impl Expression {
    pub fn span(&self) -> ParseSpan {
        match self {
            Expression::Literal(e) => e.span,
            Expression::ArrayLiteral(e) => e.span,
            Expression::AccessThis(e) => e.span,
            Expression::AccessScope(e) => e.span,
            Expression::AccessMember(e) => e.span,
            Expression::AccessKeyed(e) => e.span,
            Expression::CallScope(e) => e.span,
            Expression::CallMember(e) => e.span,
            Expression::Unary(e) => e.span,
            Expression::Binary(e) => e.span,
            Expression::Conditional(e) => e.span,
            Expression::Assign(e) => e.span,
            Expression::Interpolation(e) => e.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Literal(_) => "literal",
            Expression::ArrayLiteral(_) => "array literal",
            Expression::AccessThis(_) => "$this",
            Expression::AccessScope(_) => "scope access",
            Expression::AccessMember(_) => "member access",
            Expression::AccessKeyed(_) => "keyed access",
            Expression::CallScope(_) => "scope call",
            Expression::CallMember(_) => "member call",
            Expression::Unary(_) => "unary",
            Expression::Binary(_) => "binary",
            Expression::Conditional(_) => "conditional",
            Expression::Assign(_) => "assignment",
            Expression::Interpolation(_) => "interpolation",
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::AccessScope(_) | Expression::AccessMember(_) | Expression::AccessKeyed(_)
        )
    }

    /// Evaluate against a scope. Missing names and properties yield
    /// `undefined`; calling a non-function is the one error that propagates.
    pub fn evaluate(&self, scope: &Scope) -> Result<Value, EvalError> {
        match self {
            Expression::Literal(e) => Ok(e.value.to_value()),
            Expression::ArrayLiteral(e) => {
                let mut elements = Vec::with_capacity(e.elements.len());
                for element in &e.elements {
                    elements.push(element.evaluate(scope)?);
                }
                Ok(Value::array(elements))
            }
            Expression::AccessThis(e) => Ok(match ancestor_override(scope, e.ancestor) {
                Some(oc) => oc.binding_context().clone(),
                None => Value::Undefined,
            }),
            Expression::AccessScope(e) => {
                let context = get_context(scope, &e.name, e.ancestor);
                Ok(match context {
                    Value::Object(obj) => obj.get(&e.name),
                    _ => Value::Undefined,
                })
            }
            Expression::AccessMember(e) => {
                let object = e.object.evaluate(scope)?;
                Ok(read_member(&object, &e.name))
            }
            Expression::AccessKeyed(e) => {
                let object = e.object.evaluate(scope)?;
                let key = e.key.evaluate(scope)?;
                Ok(read_keyed(&object, &key))
            }
            Expression::CallScope(e) => {
                let context = get_context(scope, &e.name, e.ancestor);
                let callee = match &context {
                    Value::Object(obj) => obj.get(&e.name),
                    _ => Value::Undefined,
                };
                let args = self.evaluate_args(&e.args, scope)?;
                match callee {
                    Value::Function(f) => Ok(f.call(&context, &args)),
                    _ => Err(EvalError::NotAFunction {
                        name: e.name.clone(),
                    }),
                }
            }
            Expression::CallMember(e) => {
                let object = e.object.evaluate(scope)?;
                let callee = read_member(&object, &e.name);
                let args = self.evaluate_args(&e.args, scope)?;
                match callee {
                    Value::Function(f) => Ok(f.call(&object, &args)),
                    _ => Err(EvalError::NotAFunction {
                        name: e.name.clone(),
                    }),
                }
            }
            Expression::Unary(e) => {
                let operand = e.expr.evaluate(scope)?;
                Ok(match e.operator {
                    UnaryOp::Not => Value::Boolean(!operand.is_truthy()),
                    UnaryOp::Negate => Value::Number(-operand.to_number()),
                })
            }
            Expression::Binary(e) => match e.operator {
                BinaryOp::LogicalAnd => {
                    let left = e.left.evaluate(scope)?;
                    if !left.is_truthy() {
                        Ok(left)
                    } else {
                        e.right.evaluate(scope)
                    }
                }
                BinaryOp::LogicalOr => {
                    let left = e.left.evaluate(scope)?;
                    if left.is_truthy() {
                        Ok(left)
                    } else {
                        e.right.evaluate(scope)
                    }
                }
                operator => {
                    let left = e.left.evaluate(scope)?;
                    let right = e.right.evaluate(scope)?;
                    Ok(evaluate_binary(operator, &left, &right))
                }
            },
            Expression::Conditional(e) => {
                if e.condition.evaluate(scope)?.is_truthy() {
                    e.yes.evaluate(scope)
                } else {
                    e.no.evaluate(scope)
                }
            }
            Expression::Assign(e) => {
                let value = e.value.evaluate(scope)?;
                e.target.assign(scope, value.clone())?;
                Ok(value)
            }
            Expression::Interpolation(e) => {
                let mut out = String::new();
                if let Some(first) = e.parts.first() {
                    out.push_str(first);
                }
                for (index, expr) in e.expressions.iter().enumerate() {
                    let value = expr.evaluate(scope)?;
                    match value {
                        Value::Undefined | Value::Null => {}
                        other => out.push_str(&other.to_string_value()),
                    }
                    if let Some(part) = e.parts.get(index + 1) {
                        out.push_str(part);
                    }
                }
                Ok(Value::string(out))
            }
        }
    }

    /// Write through an assignable node. Assigning into a non-object context
    /// is a tolerated no-op, mirroring permissive missing-property reads.
    pub fn assign(&self, scope: &Scope, value: Value) -> Result<(), EvalError> {
        match self {
            Expression::AccessScope(e) => {
                let context = get_context(scope, &e.name, e.ancestor);
                if let Value::Object(obj) = context {
                    obj.set(&e.name, value);
                }
                Ok(())
            }
            Expression::AccessMember(e) => {
                let object = e.object.evaluate(scope)?;
                if let Value::Object(obj) = object {
                    obj.set(&e.name, value);
                }
                Ok(())
            }
            Expression::AccessKeyed(e) => {
                let object = e.object.evaluate(scope)?;
                let key = e.key.evaluate(scope)?;
                write_keyed(&object, &key, value);
                Ok(())
            }
            other => Err(EvalError::NotAssignable {
                kind: other.kind_name(),
            }),
        }
    }

    /// Resolve the observers this node reads and subscribe the binding to
    /// them. Composite nodes connect every child, because any operand change
    /// must be able to invalidate the composite's result.
    pub fn connect(&self, binding: &dyn Connectable, scope: &Scope) {
        match self {
            Expression::Literal(_) | Expression::AccessThis(_) => {}
            Expression::ArrayLiteral(e) => {
                for element in &e.elements {
                    element.connect(binding, scope);
                }
            }
            Expression::AccessScope(e) => {
                let context = get_context(scope, &e.name, e.ancestor);
                if let Value::Object(obj) = context {
                    binding.observe_property(&obj, &e.name);
                }
            }
            Expression::AccessMember(e) => {
                e.object.connect(binding, scope);
                if let Ok(Value::Object(obj)) = e.object.evaluate(scope) {
                    binding.observe_property(&obj, &e.name);
                }
            }
            Expression::AccessKeyed(e) => {
                e.object.connect(binding, scope);
                e.key.connect(binding, scope);
                if let (Ok(Value::Object(obj)), Ok(Value::Str(key))) =
                    (e.object.evaluate(scope), e.key.evaluate(scope))
                {
                    binding.observe_property(&obj, &key);
                }
            }
            Expression::CallScope(e) => {
                for arg in &e.args {
                    arg.connect(binding, scope);
                }
            }
            Expression::CallMember(e) => {
                e.object.connect(binding, scope);
                for arg in &e.args {
                    arg.connect(binding, scope);
                }
            }
            Expression::Unary(e) => e.expr.connect(binding, scope),
            Expression::Binary(e) => {
                e.left.connect(binding, scope);
                e.right.connect(binding, scope);
            }
            Expression::Conditional(e) => {
                e.condition.connect(binding, scope);
                e.yes.connect(binding, scope);
                e.no.connect(binding, scope);
            }
            Expression::Assign(_) => {}
            Expression::Interpolation(e) => {
                for expr in &e.expressions {
                    expr.connect(binding, scope);
                }
            }
        }
    }

    fn evaluate_args(&self, args: &[Expression], scope: &Scope) -> Result<Vec<Value>, EvalError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(arg.evaluate(scope)?);
        }
        Ok(out)
    }
}

fn read_member(object: &Value, name: &str) -> Value {
    match object {
        Value::Object(obj) => obj.get(name),
        Value::Array(elements) if name == "length" => {
            Value::Number(elements.borrow().len() as f64)
        }
        Value::Str(s) if name == "length" => Value::Number(s.chars().count() as f64),
        _ => Value::Undefined,
    }
}

fn read_keyed(object: &Value, key: &Value) -> Value {
    match (object, key) {
        (Value::Object(obj), _) => obj.get(&key.to_string_value()),
        (Value::Array(elements), Value::Number(n)) => {
            let elements = elements.borrow();
            let index = *n;
            if index.fract() == 0.0 && index >= 0.0 && (index as usize) < elements.len() {
                elements[index as usize].clone()
            } else {
                Value::Undefined
            }
        }
        _ => Value::Undefined,
    }
}

fn write_keyed(object: &Value, key: &Value, value: Value) {
    match (object, key) {
        (Value::Object(obj), _) => obj.set(&key.to_string_value(), value),
        (Value::Array(elements), Value::Number(n)) => {
            let index = *n;
            if index.fract() == 0.0 && index >= 0.0 {
                let index = index as usize;
                let mut elements = elements.borrow_mut();
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
            }
        }
        _ => {}
    }
}

fn evaluate_binary(operator: BinaryOp, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::string(left.to_string_value() + &right.to_string_value())
            }
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Modulo => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Equal => Value::Boolean(left.loose_eq(right)),
        BinaryOp::NotEqual => Value::Boolean(!left.loose_eq(right)),
        BinaryOp::StrictEqual => Value::Boolean(left == right),
        BinaryOp::StrictNotEqual => Value::Boolean(left != right),
        BinaryOp::LessThan => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::GreaterThan => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::LessOrEqual => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::GreaterOrEqual => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            // Short-circuit forms are handled in `evaluate`.
            Value::Undefined
        }
    }
}

fn compare(left: &Value, right: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Value::Boolean(test(a.cmp(b))),
        _ => {
            let (a, b) = (left.to_number(), right.to_number());
            match a.partial_cmp(&b) {
                Some(ordering) => Value::Boolean(test(ordering)),
                None => Value::Boolean(false),
            }
        }
    }
}
