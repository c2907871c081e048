use super::ast::{BinOp, Callee, Expr, LogicalOp, UnaryOp};
use super::value::Value;
use crate::error::FormulaError;

/// Name resolution for formula evaluation.
///
/// Variables and helper functions are looked up by name. Returning `None`
/// means "not defined here", which the evaluator reports as an unknown
/// identifier or function.
pub trait FormulaScope {
    fn variable(&self, name: &str) -> Option<Value>;

    fn call(&self, _name: &str, _args: &[Value]) -> Option<Result<Value, FormulaError>> {
        None
    }
}

/// Scope that layers `top` over `base`: variables and functions in `top` win.
pub struct Layered<'a, A: ?Sized, B: ?Sized> {
    pub top: &'a A,
    pub base: &'a B,
}

impl<A: FormulaScope + ?Sized, B: FormulaScope + ?Sized> FormulaScope for Layered<'_, A, B> {
    fn variable(&self, name: &str) -> Option<Value> {
        self.top.variable(name).or_else(|| self.base.variable(name))
    }

    fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value, FormulaError>> {
        self.top
            .call(name, args)
            .or_else(|| self.base.call(name, args))
    }
}

impl FormulaScope for std::collections::HashMap<String, Value> {
    fn variable(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl FormulaScope for std::collections::HashMap<String, f64> {
    fn variable(&self, name: &str) -> Option<Value> {
        self.get(name).copied().map(Value::Number)
    }
}

/// Evaluate a parsed expression against a scope.
pub fn eval_expr<S: FormulaScope + ?Sized>(expr: &Expr, scope: &S) -> Result<Value, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Undefined => Ok(Value::Undefined),
        Expr::Ident(name) => scope
            .variable(name)
            .ok_or_else(|| FormulaError::UnknownIdentifier(name.clone())),
        Expr::Member { object, property } => member(object, property),
        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, scope)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-v.to_number()),
                UnaryOp::Plus => Value::Number(v.to_number()),
                UnaryOp::Not => Value::Bool(!v.truthy()),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval_expr(lhs, scope)?;
            let r = eval_expr(rhs, scope)?;
            Ok(binary(*op, &l, &r))
        }
        Expr::Logical { op, lhs, rhs } => {
            let l = eval_expr(lhs, scope)?;
            match (op, l.truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                _ => eval_expr(rhs, scope),
            }
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if eval_expr(cond, scope)?.truthy() {
                eval_expr(then, scope)
            } else {
                eval_expr(otherwise, scope)
            }
        }
        Expr::Call { callee, args } => {
            let values = args
                .iter()
                .map(|a| eval_expr(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            match callee {
                Callee::Method { object, method } if object == "Math" => math_call(method, &values),
                Callee::Method { object, method } => {
                    Err(FormulaError::UnknownFunction(format!("{}.{}", object, method)))
                }
                Callee::Function(name) => scope
                    .call(name, &values)
                    .unwrap_or_else(|| Err(FormulaError::UnknownFunction(name.clone()))),
            }
        }
    }
}

fn member(object: &str, property: &str) -> Result<Value, FormulaError> {
    match (object, property) {
        ("Math", "PI") => Ok(Value::Number(std::f64::consts::PI)),
        ("Math", "E") => Ok(Value::Number(std::f64::consts::E)),
        _ => Err(FormulaError::UnknownIdentifier(format!(
            "{}.{}",
            object, property
        ))),
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> Value {
    match op {
        BinOp::Add => match (l, r) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{}{}", l, r)),
            _ => Value::Number(l.to_number() + r.to_number()),
        },
        BinOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinOp::Rem => Value::Number(l.to_number() % r.to_number()),
        BinOp::Pow => Value::Number(l.to_number().powf(r.to_number())),
        BinOp::Eq => Value::Bool(l.loose_eq(r)),
        BinOp::NotEq => Value::Bool(!l.loose_eq(r)),
        BinOp::StrictEq => Value::Bool(l.strict_eq(r)),
        BinOp::StrictNotEq => Value::Bool(!l.strict_eq(r)),
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let ordering = match (l, r) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => l.to_number().partial_cmp(&r.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::LtEq => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

/// Members of `Math` callable from formulas.
pub const MATH_FUNCTIONS: [&str; 14] = [
    "abs", "floor", "ceil", "round", "sqrt", "cbrt", "log", "log10", "exp", "trunc", "sign", "min",
    "max", "pow",
];

fn math_call(method: &str, args: &[Value]) -> Result<Value, FormulaError> {
    let nums: Vec<f64> = args.iter().map(Value::to_number).collect();
    let one = |f: fn(f64) -> f64| -> Result<Value, FormulaError> {
        match nums.as_slice() {
            [x, ..] => Ok(Value::Number(f(*x))),
            [] => Ok(Value::Number(f64::NAN)),
        }
    };
    match method {
        "abs" => one(f64::abs),
        "floor" => one(f64::floor),
        "ceil" => one(f64::ceil),
        "round" => one(|x| (x + 0.5).floor()),
        "sqrt" => one(f64::sqrt),
        "cbrt" => one(f64::cbrt),
        "log" => one(f64::ln),
        "log10" => one(f64::log10),
        "exp" => one(f64::exp),
        "trunc" => one(f64::trunc),
        "sign" => one(|x| {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }),
        "min" => Ok(Value::Number(
            nums.iter().copied().fold(f64::INFINITY, nan_min),
        )),
        "max" => Ok(Value::Number(
            nums.iter().copied().fold(f64::NEG_INFINITY, nan_max),
        )),
        "pow" => match nums.as_slice() {
            [b, e, ..] => Ok(Value::Number(b.powf(*e))),
            _ => Err(FormulaError::Arity {
                name: "Math.pow".to_string(),
                expected: "2".to_string(),
                got: nums.len(),
            }),
        },
        other => Err(FormulaError::UnknownFunction(format!("Math.{}", other))),
    }
}

fn nan_min(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() {
        f64::NAN
    } else {
        acc.min(x)
    }
}

fn nan_max(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() {
        f64::NAN
    } else {
        acc.max(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::Parser;
    use std::collections::HashMap;

    fn eval(src: &str, vars: &HashMap<String, Value>) -> Result<Value, FormulaError> {
        let expr = Parser::new(src)?.parse()?;
        eval_expr(&expr, vars)
    }

    fn vars() -> HashMap<String, Value> {
        let mut vars = HashMap::new();
        vars.insert("level".to_string(), Value::Number(10.0));
        vars.insert("is_final_pass".to_string(), Value::Bool(true));
        vars.insert("zone".to_string(), Value::Str("forest".into()));
        vars
    }

    #[test]
    fn test_every_math_function_dispatches() {
        let args = [Value::Number(4.0), Value::Number(2.0)];
        for name in MATH_FUNCTIONS {
            assert!(math_call(name, &args).is_ok(), "Math.{}", name);
        }
        assert!(matches!(
            math_call("hypot", &args),
            Err(FormulaError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("level * 2 + 1", &vars()).unwrap(), Value::Number(21.0));
        assert_eq!(eval("7 % 4", &vars()).unwrap(), Value::Number(3.0));
        assert_eq!(eval("(-2) ** 2", &vars()).unwrap(), Value::Number(4.0));
        assert_eq!(eval("-(2 ** 2)", &vars()).unwrap(), Value::Number(-4.0));
        assert!(matches!(eval("-2 ** 2", &vars()), Err(FormulaError::Parse { .. })));
    }

    #[test]
    fn test_bool_arithmetic_coercion() {
        assert_eq!(
            eval("(level > 5) * 10", &vars()).unwrap(),
            Value::Number(10.0)
        );
    }

    #[test]
    fn test_logical_returns_operand() {
        assert_eq!(eval("0 || 7", &vars()).unwrap(), Value::Number(7.0));
        assert_eq!(eval("3 && 4", &vars()).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_short_circuit_skips_unknown() {
        assert_eq!(
            eval("is_final_pass || missing_name", &vars()).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_string_comparison() {
        assert_eq!(
            eval("zone == 'forest' ? 5 : 0", &vars()).unwrap(),
            Value::Number(5.0)
        );
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(
            eval("Math.max(1, level, 3)", &vars()).unwrap(),
            Value::Number(10.0)
        );
        assert_eq!(eval("Math.floor(2.7)", &vars()).unwrap(), Value::Number(2.0));
        assert_eq!(eval("Math.round(-2.5)", &vars()).unwrap(), Value::Number(-2.0));
        assert_eq!(eval("Math.pow(2, 10)", &vars()).unwrap(), Value::Number(1024.0));
    }

    #[test]
    fn test_unknown_identifier_errors() {
        assert_eq!(
            eval("nope + 1", &vars()),
            Err(FormulaError::UnknownIdentifier("nope".into()))
        );
    }

    #[test]
    fn test_unknown_math_member_errors() {
        assert!(eval("Math.random()", &vars()).is_err());
        assert!(eval("Console.log(1)", &vars()).is_err());
    }

    #[test]
    fn test_layered_scope_prefers_top() {
        let mut top: HashMap<String, f64> = HashMap::new();
        top.insert("level".to_string(), 99.0);
        let base = vars();
        let scope = Layered {
            top: &top,
            base: &base,
        };
        let expr = Parser::new("level + (zone == 'forest')").unwrap().parse().unwrap();
        assert_eq!(eval_expr(&expr, &scope).unwrap(), Value::Number(100.0));
    }
}
