//! Tree-walking evaluation of compiled lambdas.

use super::library;
use super::ops;
use super::parser::{BinaryOp, Expr, Lambda, UnaryOp};
use super::value::{EvalError, EvalResult, SourceSpan, Value};
use crate::environment::ValueEnvironment;

/// Evaluate `lambda` with its parameter bound to `env`.
pub fn eval_lambda(lambda: &Lambda, env: &dyn ValueEnvironment) -> EvalResult<Value> {
    let ctx = Context {
        param: &lambda.param,
        env,
    };
    ctx.eval(&lambda.body)
}

struct Context<'a> {
    param: &'a str,
    env: &'a dyn ValueEnvironment,
}

impl Context<'_> {
    fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Ident { name, span } => {
                if name == self.param {
                    Err(EvalError::invalid_op(format!(
                        "'{}' is the environment and has no value of its own",
                        name
                    ))
                    .with_span(*span))
                } else {
                    Err(EvalError::undefined(name.clone()).with_span(*span))
                }
            }

            Expr::Member { target, name, span } => {
                if self.is_param(target) {
                    return Ok(self.env.try_get(name).unwrap_or(Value::Null));
                }
                let receiver = self.eval(target)?;
                library::member(&receiver, name).map_err(|err| at(err, *span))
            }

            Expr::Call {
                target,
                method,
                args,
                span,
            } => self.eval_call(target, method, args, *span),

            Expr::Index {
                target,
                index,
                span,
            } => {
                let receiver = self.eval(target)?;
                let index = self.eval(index)?.as_int().map_err(|err| at(err, *span))?;
                receiver.index(index).map_err(|err| at(err, *span))
            }

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => ops::not(value),
                    UnaryOp::Neg => ops::neg(value),
                }
            }

            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),

            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn is_param(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident { name, .. } if name == self.param)
    }

    fn eval_args(&self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn eval_call(
        &self,
        target: &Expr,
        method: &str,
        args: &[Expr],
        span: SourceSpan,
    ) -> EvalResult<Value> {
        if let Expr::Ident { name, .. } = target {
            let args = self.eval_args(args)?;
            if name == self.param {
                return self
                    .env
                    .invoke_method(method, args)
                    .map_err(|err| at(err, span));
            }
            return match library::call_static(name, method, args) {
                Some(result) => result.map_err(|err| at(err, span)),
                None => Err(EvalError::undefined(name.clone()).with_span(span)),
            };
        }

        let receiver = self.eval(target)?;
        let args = self.eval_args(args)?;
        library::call_method(&receiver, method, args).map_err(|err| at(err, span))
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> EvalResult<Value> {
        // Short-circuiting operators evaluate the right side lazily
        match op {
            BinaryOp::And => {
                let result = self.eval(lhs)?.as_bool()? && self.eval(rhs)?.as_bool()?;
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval(lhs)?.as_bool()? || self.eval(rhs)?.as_bool()?;
                return Ok(Value::Bool(result));
            }
            BinaryOp::Coalesce => {
                let value = self.eval(lhs)?;
                return if value.is_null() {
                    self.eval(rhs)
                } else {
                    Ok(value)
                };
            }
            _ => {}
        }

        let a = self.eval(lhs)?;
        let b = self.eval(rhs)?;
        match op {
            BinaryOp::Add => ops::add(a, b),
            BinaryOp::Sub => ops::sub(a, b),
            BinaryOp::Mul => ops::mul(a, b),
            BinaryOp::Div => ops::div(a, b),
            BinaryOp::Rem => ops::rem(a, b),
            BinaryOp::Eq => Ok(Value::Bool(ops::equals(&a, &b))),
            BinaryOp::NotEq => Ok(Value::Bool(!ops::equals(&a, &b))),
            BinaryOp::Lt => Ok(Value::Bool(ops::compare(&a, &b)?.is_lt())),
            BinaryOp::LtEq => Ok(Value::Bool(ops::compare(&a, &b)?.is_le())),
            BinaryOp::Gt => Ok(Value::Bool(ops::compare(&a, &b)?.is_gt())),
            BinaryOp::GtEq => Ok(Value::Bool(ops::compare(&a, &b)?.is_ge())),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => {
                unreachable!("short-circuit operators handled above")
            }
        }
    }
}

/// Attach `span` unless a more precise one is already present.
fn at(err: EvalError, span: SourceSpan) -> EvalError {
    if err.span.is_some() {
        err
    } else {
        err.with_span(span)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse_lambda;
    use super::*;
    use crate::environment::Variables;

    fn eval(text: &str, env: &Variables) -> EvalResult<Value> {
        eval_lambda(&parse_lambda(text).unwrap(), env)
    }

    #[test]
    fn test_counter_arithmetic() {
        let env = Variables::new().with("counter", "2");
        assert_eq!(
            eval("x => int.Parse(x.counter) + 1", &env).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            eval("x => int.Parse(x.counter) < 3", &env).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unset_member_is_null() {
        let env = Variables::new();
        assert_eq!(eval("x => x.missing", &env).unwrap(), Value::Null);
        assert_eq!(
            eval(r#"x => x.missing ?? "fallback""#, &env).unwrap(),
            Value::from("fallback")
        );
    }

    #[test]
    fn test_split_and_index() {
        let env = Variables::new().with("list", "a,b,c");
        assert_eq!(
            eval(r#"x => x.list.Split(",")[1]"#, &env).unwrap(),
            Value::from("b")
        );
        assert_eq!(
            eval(r#"x => x.list.Split(",").Count"#, &env).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let env = Variables::new();
        assert_eq!(
            eval("x => false && int.Parse(\"nope\") > 0", &env).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval("x => true || int.Parse(\"nope\") > 0", &env).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_host_method_invocation() {
        let mut env = Variables::new();
        env.register_method("twice", |args| {
            let n = args.first().ok_or_else(|| EvalError::argument("n"))?.as_int()?;
            Ok(Value::Int(n * 2))
        });
        assert_eq!(eval("x => x.twice(21)", &env).unwrap(), Value::Int(42));
        assert!(eval("x => x.thrice(1)", &env).is_err());
    }

    #[test]
    fn test_errors() {
        let env = Variables::new();
        let err = eval("x => y.a", &env).unwrap_err();
        assert_eq!(err.kind, super::super::value::EvalErrorKind::UndefinedVariable("y".into()));
        assert!(eval("x => x", &env).is_err());
        assert!(eval("x => 1 / 0", &env).is_err());
        assert!(eval("x => Nope.Parse(1)", &env).is_err());
        assert!(eval("x => 1 ? 2 : 3", &env).is_err());
    }

    #[test]
    fn test_conditional() {
        let env = Variables::new().with("name", "me");
        assert_eq!(
            eval(r#"x => x.name == "me" ? "yes" : "no""#, &env).unwrap(),
            Value::from("yes")
        );
    }
}
