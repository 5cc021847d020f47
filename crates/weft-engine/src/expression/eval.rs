//! Tree-walking evaluation of parsed expressions.

use serde_json::{Map, Value};

use super::parser::{AssignOp, BinaryOp, Expr, UnaryOp};
use crate::context::{Callable, Context, State};
use crate::value::{member, number, strict_equals, to_display, to_number, truthy, type_name};
use crate::ExpressionError;

/// Name under which invocation arguments are visible.
const ARGS: &str = "args";

/// Variables visible to one evaluation, in lookup order: `args`, state,
/// context values, context callables.
pub(crate) struct Scope<'a> {
    pub context: &'a Context,
    pub state: Option<&'a State>,
    pub args: Option<&'a [Value]>,
}

/// Result of evaluating an expression.
pub(crate) enum Evaluated {
    Value(Value),
    Function(Callable, String),
}

pub(crate) fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Evaluated, ExpressionError> {
    match expr {
        Expr::Ident(name) => read(name, &[], scope),
        Expr::Member { object, property } => match path(expr, scope)? {
            Some((root, keys)) => read(&root, &keys, scope),
            None => {
                let object = value(object, scope)?;
                let key = key(property, scope)?;
                Ok(Evaluated::Value(member(&object, &key)))
            }
        },
        Expr::Call { callee, args } => call(callee, args, scope).map(Evaluated::Value),
        Expr::Assign { op, target, value } => assign(*op, target, value, scope).map(Evaluated::Value),
        other => value(other, scope).map(Evaluated::Value),
    }
}

/// Evaluate to a plain value. Functions are a type error here.
pub(crate) fn value(expr: &Expr, scope: &Scope<'_>) -> Result<Value, ExpressionError> {
    Ok(match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| value(item, scope))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, entry) in entries {
                map.insert(key.clone(), value(entry, scope)?);
            }
            Value::Object(map)
        }
        Expr::Unary { op, operand } => {
            let operand = value(operand, scope)?;
            match op {
                UnaryOp::Not => Value::Bool(!truthy(&operand)),
                UnaryOp::Negate => number(-to_number(&operand)),
                UnaryOp::Plus => number(to_number(&operand)),
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, scope)?,
        Expr::Conditional {
            test,
            then,
            otherwise,
        } => {
            if truthy(&value(test, scope)?) {
                value(then, scope)?
            } else {
                value(otherwise, scope)?
            }
        }
        Expr::Sequence(items) => {
            let mut last = Value::Null;
            for item in items {
                last = value(item, scope)?;
            }
            last
        }
        Expr::Ident(_) | Expr::Member { .. } | Expr::Call { .. } | Expr::Assign { .. } => {
            match evaluate(expr, scope)? {
                Evaluated::Value(value) => value,
                Evaluated::Function(_, name) => {
                    return Err(ExpressionError::Type(format!(
                        "{name} is a function, not a value"
                    )));
                }
            }
        }
    })
}

fn key(property: &Expr, scope: &Scope<'_>) -> Result<String, ExpressionError> {
    match property {
        Expr::Literal(Value::String(key)) => Ok(key.clone()),
        other => Ok(to_display(&value(other, scope)?)),
    }
}

/// Root variable and member keys of an identifier or member chain, or `None`
/// when the chain starts from a computed value.
fn path(expr: &Expr, scope: &Scope<'_>) -> Result<Option<(String, Vec<String>)>, ExpressionError> {
    match expr {
        Expr::Ident(name) => Ok(Some((name.clone(), Vec::new()))),
        Expr::Member { object, property } => {
            let Some((root, mut keys)) = path(object, scope)? else {
                return Ok(None);
            };
            keys.push(key(property, scope)?);
            Ok(Some((root, keys)))
        }
        _ => Ok(None),
    }
}

fn navigate(mut value: Value, keys: &[String]) -> Value {
    for key in keys {
        value = member(&value, key);
    }
    value
}

fn read(root: &str, keys: &[String], scope: &Scope<'_>) -> Result<Evaluated, ExpressionError> {
    if root == ARGS
        && let Some(args) = scope.args
    {
        return Ok(Evaluated::Value(navigate(Value::Array(args.to_vec()), keys)));
    }
    if let Some(value) = scope.state.and_then(|state| state.get(root)) {
        return Ok(Evaluated::Value(navigate(value.clone(), keys)));
    }
    if scope.context.contains(root) {
        // Read the whole chain as one path so dependency tracking sees it
        let value = if keys.iter().any(|key| key.contains('.')) {
            navigate(scope.context.get(root).unwrap_or_default(), keys)
        } else {
            let path = std::iter::once(root)
                .chain(keys.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(".");
            scope.context.get(&path).unwrap_or_default()
        };
        return Ok(Evaluated::Value(value));
    }
    if let Some(callable) = scope.context.callable(root) {
        if keys.is_empty() {
            return Ok(Evaluated::Function(callable, root.to_owned()));
        }
        return Ok(Evaluated::Value(Value::Null));
    }
    // Still observed, so that defining the variable later can trigger a render
    scope.context.get(root);
    Err(ExpressionError::Reference(root.to_owned()))
}

fn call(callee: &Expr, args: &[Expr], scope: &Scope<'_>) -> Result<Value, ExpressionError> {
    let name = match path(callee, scope)? {
        Some((root, keys)) if keys.is_empty() => root,
        Some((root, keys)) => format!("{root}.{}", keys.join(".")),
        None => "expression".to_owned(),
    };
    let Evaluated::Function(function, _) = evaluate(callee, scope)? else {
        return Err(ExpressionError::NotCallable(name));
    };
    let args = args
        .iter()
        .map(|arg| value(arg, scope))
        .collect::<Result<Vec<_>, _>>()?;
    function(&args)
}

fn assign(
    op: AssignOp,
    target: &Expr,
    rhs: &Expr,
    scope: &Scope<'_>,
) -> Result<Value, ExpressionError> {
    let Some((root, keys)) = path(target, scope)? else {
        return Err(ExpressionError::Type("invalid assignment target".to_owned()));
    };
    if scope.state.is_some_and(|state| state.contains(&root)) || (root == ARGS && scope.args.is_some()) {
        return Err(ExpressionError::Type(format!(
            "cannot assign to non-reactive variable {root}"
        )));
    }
    if keys.iter().any(|key| key.contains('.')) {
        return Err(ExpressionError::Type(format!(
            "cannot assign to a key containing '.' below {root}"
        )));
    }

    let rhs = value(rhs, scope)?;
    let result = match op {
        AssignOp::Set => rhs,
        AssignOp::Add | AssignOp::Sub => {
            let current = match read(&root, &keys, scope) {
                Ok(Evaluated::Value(value)) => value,
                Ok(Evaluated::Function(..)) | Err(ExpressionError::Reference(_)) => Value::Null,
                Err(err) => return Err(err),
            };
            if op == AssignOp::Add {
                add(&current, &rhs)
            } else {
                number(to_number(&current) - to_number(&rhs))
            }
        }
    };

    let path = std::iter::once(root.as_str())
        .chain(keys.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(".");
    scope.context.set(&path, result.clone())?;
    Ok(result)
}

fn add(left: &Value, right: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if stringy(left) || stringy(right) {
        Value::String(format!("{}{}", to_display(left), to_display(right)))
    } else {
        number(to_number(left) + to_number(right))
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &Scope<'_>) -> Result<Value, ExpressionError> {
    let lhs = value(left, scope)?;
    // Logical operators only evaluate the right side when needed
    match op {
        BinaryOp::And if !truthy(&lhs) => Ok(lhs),
        BinaryOp::Or if truthy(&lhs) => Ok(lhs),
        BinaryOp::Coalesce if !lhs.is_null() => Ok(lhs),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => value(right, scope),
        _ => arithmetic(op, &lhs, &value(right, scope)?),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ExpressionError> {
    Ok(match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => number(to_number(lhs) - to_number(rhs)),
        BinaryOp::Mul => number(to_number(lhs) * to_number(rhs)),
        BinaryOp::Div => number(to_number(lhs) / to_number(rhs)),
        BinaryOp::Rem => number(to_number(lhs) % to_number(rhs)),
        BinaryOp::Eq => Value::Bool(strict_equals(lhs, rhs)),
        BinaryOp::Ne => Value::Bool(!strict_equals(lhs, rhs)),
        _ => Value::Bool(compare(op, lhs, rhs)?),
    })
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<bool, ExpressionError> {
    let ordering = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            return Err(ExpressionError::Type(format!(
                "cannot compare {} with {}",
                type_name(lhs),
                type_name(rhs)
            )));
        }
        _ => to_number(lhs).partial_cmp(&to_number(rhs)),
    };
    // NaN compares false both ways
    Ok(ordering.is_some_and(|ordering| match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}
