//! Tree-walking evaluator.

use crate::ast::{BinaryOp, CompareOp, Expr, Stmt, Target, UnaryOp};
use crate::builtins;
use crate::parser::{parse_expression, parse_statements};
use crate::value::{Map, Value};
use crate::ScriptError;

/// Upper bound on loop iterations per block.
const MAX_ITERATIONS: u64 = 1_000_000;

/// Environment a script runs against.
///
/// Names that are not assigned locally are resolved through [`Host::lookup`];
/// calls to unknown functions go through [`Host::call`] before the builtin
/// function table.
pub trait Host<'a> {
    /// Resolve a free variable.
    fn lookup(&self, name: &str) -> Option<Value<'a>>;

    /// Call a host function. `None` means the host has no function of that name.
    fn call(
        &self,
        name: &str,
        args: &[Value<'a>],
        kwargs: &Map<'a>,
    ) -> Option<Result<Value<'a>, ScriptError>> {
        let _ = (name, args, kwargs);
        None
    }
}

impl<'a> Host<'a> for Map<'a> {
    fn lookup(&self, name: &str) -> Option<Value<'a>> {
        self.get(name).cloned()
    }
}

/// Evaluate a single expression.
pub fn eval_expression<'a>(src: &str, host: &dyn Host<'a>) -> Result<Value<'a>, ScriptError> {
    let expr = parse_expression(src)?;
    Interpreter::new(host).eval(&expr)
}

/// Execute statements and return what they printed.
///
/// The common indentation of the block is removed first, and a single
/// trailing newline is stripped from the captured output.
pub fn exec_statements<'a>(src: &str, host: &dyn Host<'a>) -> Result<String, ScriptError> {
    let source = strip_common_indent(src);
    let stmts = parse_statements(&source)?;
    let mut interp = Interpreter::new(host);
    match interp.exec_block(&stmts)? {
        Flow::Normal => {}
        Flow::Break => return Err(ScriptError::OutsideLoop("break")),
        Flow::Continue => return Err(ScriptError::OutsideLoop("continue")),
    }
    let mut output = interp.output;
    if output.ends_with('\n') {
        output.pop();
    }
    Ok(output)
}

/// Remove the indentation shared by all non-blank lines.
///
/// Line endings are normalized to `\n`; blank lines become empty.
pub fn strip_common_indent(src: &str) -> String {
    let normalized = src.replace("\r\n", "\n");
    let indent = normalized
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    normalized
        .split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

struct Interpreter<'h, 'a> {
    host: &'h dyn Host<'a>,
    locals: Map<'a>,
    output: String,
    iterations: u64,
}

impl<'h, 'a> Interpreter<'h, 'a> {
    fn new(host: &'h dyn Host<'a>) -> Self {
        Self {
            host,
            locals: Map::new(),
            output: String::new(),
            iterations: 0,
        }
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        self.iterations += 1;
        if self.iterations > MAX_ITERATIONS {
            return Err(ScriptError::Value(format!(
                "loop limit of {MAX_ITERATIONS} iterations exceeded"
            )));
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in stmts {
            let flow = self.exec(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Assign(target, expr) => {
                let value = self.eval(expr)?;
                self.assign(target, value)?;
            }
            Stmt::AugAssign(name, expr) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(expr)?;
                let value = binary(BinaryOp::Add, current, rhs)?;
                self.locals.insert(name.clone(), value);
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(otherwise);
            }
            Stmt::For { target, iter, body } => {
                let items = self.eval(iter)?.iter_items()?;
                for item in items {
                    self.tick()?;
                    self.assign(target, item)?;
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.is_truthy() {
                    self.tick()?;
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Pass => {}
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Target, value: Value<'a>) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => {
                self.locals.insert(name.clone(), value);
            }
            Target::Tuple(names) => {
                let items = value.iter_items()?;
                if items.len() != names.len() {
                    return Err(ScriptError::Value(format!(
                        "expected {} values to unpack, got {}",
                        names.len(),
                        items.len()
                    )));
                }
                for (name, item) in names.iter().zip(items) {
                    self.locals.insert(name.clone(), item);
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value<'a>, ScriptError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        self.host
            .lookup(name)
            .ok_or_else(|| ScriptError::Name(name.to_owned()))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value<'a>, ScriptError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(s) => s,
                        other => {
                            return Err(ScriptError::type_error(format!(
                                "map keys must be strings, not '{}'",
                                other.type_name()
                            )));
                        }
                    };
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            Expr::Attribute(target, name) => {
                let target = self.eval(target)?;
                target.field(name).ok_or_else(|| {
                    ScriptError::Key(format!("'{}' has no field '{name}'", target.type_name()))
                })
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(&target, &index)
            }
            Expr::Slice { target, start, end } => {
                let target = self.eval(target)?;
                let start = self.eval_bound(start.as_deref())?;
                let end = self.eval_bound(end.as_deref())?;
                slice(&target, start, end)
            }
            Expr::Call { func, args, kwargs } => self.call(func, args, kwargs),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }
            Expr::Binary(left, op, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Comprehension {
                element,
                target,
                iter,
                cond,
            } => self.comprehension(element, target, iter, cond.as_deref()),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value<'a>>, ScriptError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval_bound(&mut self, bound: Option<&Expr>) -> Result<Option<i64>, ScriptError> {
        match bound.map(|expr| self.eval(expr)).transpose()? {
            None | Some(Value::None) => Ok(None),
            Some(Value::Int(i)) => Ok(Some(i)),
            Some(other) => Err(ScriptError::type_error(format!(
                "slice indices must be integers, not '{}'",
                other.type_name()
            ))),
        }
    }

    fn comprehension(
        &mut self,
        element: &Expr,
        target: &Target,
        iter: &Expr,
        cond: Option<&Expr>,
    ) -> Result<Value<'a>, ScriptError> {
        let items = self.eval(iter)?.iter_items()?;
        let names: Vec<String> = match target {
            Target::Name(name) => vec![name.clone()],
            Target::Tuple(names) => names.clone(),
        };
        let saved: Vec<(String, Option<Value<'a>>)> = names
            .iter()
            .map(|name| (name.clone(), self.locals.get(name).cloned()))
            .collect();

        let result = self.collect_items(element, target, items, cond);

        for (name, previous) in saved {
            match previous {
                Some(value) => self.locals.insert(name, value),
                None => self.locals.remove(&name),
            };
        }
        result
    }

    fn collect_items(
        &mut self,
        element: &Expr,
        target: &Target,
        items: Vec<Value<'a>>,
        cond: Option<&Expr>,
    ) -> Result<Value<'a>, ScriptError> {
        let mut out = Vec::new();
        for item in items {
            self.tick()?;
            self.assign(target, item)?;
            if let Some(cond) = cond
                && !self.eval(cond)?.is_truthy()
            {
                continue;
            }
            out.push(self.eval(element)?);
        }
        Ok(Value::List(out))
    }

    fn call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Value<'a>, ScriptError> {
        let arg_values = self.eval_all(args)?;
        let mut kwarg_values = Map::new();
        for (name, expr) in kwargs {
            let value = self.eval(expr)?;
            kwarg_values.insert(name.clone(), value);
        }

        match func {
            Expr::Name(name) => {
                if let Some(value) = self.locals.get(name) {
                    return Err(ScriptError::type_error(format!(
                        "'{}' object is not callable",
                        value.type_name()
                    )));
                }
                if let Some(result) = self.host.call(name, &arg_values, &kwarg_values) {
                    return result;
                }
                builtins::call(name, arg_values, &kwarg_values, &mut self.output)
                    .unwrap_or_else(|| Err(ScriptError::Name(name.clone())))
            }
            Expr::Attribute(receiver, method) => {
                if !kwarg_values.is_empty() {
                    return Err(ScriptError::type_error(format!(
                        "{method}() takes no keyword arguments"
                    )));
                }
                if method == "append"
                    && let Expr::Name(name) = receiver.as_ref()
                    && let Some(Value::List(items)) = self.locals.get_mut(name)
                {
                    let [item] = <[Value<'a>; 1]>::try_from(arg_values).map_err(|args| {
                        ScriptError::type_error(format!(
                            "append() takes exactly one argument ({} given)",
                            args.len()
                        ))
                    })?;
                    items.push(item);
                    return Ok(Value::None);
                }
                let receiver = self.eval(receiver)?;
                builtins::call_method(&receiver, method, arg_values)
            }
            other => {
                let value = self.eval(other)?;
                Err(ScriptError::type_error(format!(
                    "'{}' object is not callable",
                    value.type_name()
                )))
            }
        }
    }
}

fn unary<'a>(op: UnaryOp, value: Value<'a>) -> Result<Value<'a>, ScriptError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(ScriptError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, value @ (Value::Int(_) | Value::Float(_))) => Ok(value),
        (_, value) => Err(ScriptError::type_error(format!(
            "bad operand type for unary operator: '{}'",
            value.type_name()
        ))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_float(value: &Value<'_>) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn repeat_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn binary<'a>(op: BinaryOp, left: Value<'a>, right: Value<'a>) -> Result<Value<'a>, ScriptError> {
    use BinaryOp::{Add, Div, FloorDiv, Mod, Mul, Sub};

    match (op, left, right) {
        (Add, Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or(ScriptError::Overflow),
        (Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(b).map(Value::Int).ok_or(ScriptError::Overflow),
        (Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(b).map(Value::Int).ok_or(ScriptError::Overflow),
        (FloorDiv, Value::Int(a), Value::Int(b)) => floor_div(a, b).map(Value::Int),
        (Mod, Value::Int(a), Value::Int(b)) => floor_mod(a, b).map(Value::Int),
        (Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Mul, Value::Str(s), Value::Int(n)) | (Mul, Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat_count(n))))
        }
        (Mul, Value::List(items), Value::Int(n)) | (Mul, Value::Int(n), Value::List(items)) => {
            let count = repeat_count(n);
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        (Mod, Value::Str(template), args) => format_percent(&template, args).map(Value::Str),
        (op, left, right) => {
            let (Some(a), Some(b)) = (as_float(&left), as_float(&right)) else {
                return Err(ScriptError::type_error(format!(
                    "unsupported operand types for {}: '{}' and '{}'",
                    symbol(op),
                    left.type_name(),
                    right.type_name()
                )));
            };
            let result = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div | FloorDiv | Mod if b == 0.0 => return Err(ScriptError::DivisionByZero),
                Div => a / b,
                FloorDiv => (a / b).floor(),
                Mod => a - b * (a / b).floor(),
            };
            Ok(Value::Float(result))
        }
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
    }
}

fn floor_div(a: i64, b: i64) -> Result<i64, ScriptError> {
    if b == 0 {
        return Err(ScriptError::DivisionByZero);
    }
    let q = a.checked_div(b).ok_or(ScriptError::Overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, ScriptError> {
    if b == 0 {
        return Err(ScriptError::DivisionByZero);
    }
    let r = a.checked_rem(b).ok_or(ScriptError::Overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// `template % args` with `%s`, `%d` and `%%`.
fn format_percent(template: &str, args: Value<'_>) -> Result<String, ScriptError> {
    let args = match args {
        Value::List(items) => items,
        other => vec![other],
    };
    let mut args = args.into_iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(spec @ ('s' | 'd')) => {
                let arg = args.next().ok_or_else(|| {
                    ScriptError::type_error("not enough arguments for format string")
                })?;
                if spec == 's' {
                    out.push_str(&arg.to_string());
                } else {
                    out.push_str(&builtins::to_int(&arg)?.to_string());
                }
            }
            Some(other) => {
                return Err(ScriptError::Value(format!(
                    "unsupported format character '{other}'"
                )));
            }
            None => return Err(ScriptError::Value("incomplete format".to_owned())),
        }
    }

    if args.next().is_some() {
        return Err(ScriptError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

fn compare(op: CompareOp, left: &Value<'_>, right: &Value<'_>) -> Result<bool, ScriptError> {
    use std::cmp::Ordering::{Greater, Less};

    Ok(match op {
        CompareOp::Eq => left == right,
        CompareOp::Ne => left != right,
        CompareOp::Lt => left.compare(right)? == Less,
        CompareOp::Le => left.compare(right)? != Greater,
        CompareOp::Gt => left.compare(right)? == Greater,
        CompareOp::Ge => left.compare(right)? != Less,
        CompareOp::In => right.contains(left)?,
        CompareOp::NotIn => !right.contains(left)?,
        CompareOp::Is => identical(left, right),
        CompareOp::IsNot => !identical(left, right),
    })
}

fn identical(left: &Value<'_>, right: &Value<'_>) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Object(_), Value::Object(_)) => left == right,
        _ => false,
    }
}

fn normalize_index(index: i64, len: usize) -> Result<usize, ScriptError> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len_i } else { index };
    usize::try_from(resolved)
        .ok()
        .filter(|&i| i < len)
        .ok_or(ScriptError::Index { index, len })
}

fn subscript<'a>(target: &Value<'a>, index: &Value<'a>) -> Result<Value<'a>, ScriptError> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => {
            let idx = normalize_index(*i, items.len())?;
            Ok(items[idx].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = normalize_index(*i, chars.len())?;
            Ok(Value::Str(chars[idx].to_string()))
        }
        (Value::Map(_) | Value::Object(_), Value::Str(key)) => target
            .field(key)
            .ok_or_else(|| ScriptError::Key(format!("'{key}'"))),
        (target, index) => Err(ScriptError::type_error(format!(
            "'{}' indices must be compatible, not '{}'",
            target.type_name(),
            index.type_name()
        ))),
    }
}

fn clamp_bound(bound: Option<i64>, len: usize, default: usize) -> usize {
    let Some(bound) = bound else { return default };
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if bound < 0 { bound + len_i } else { bound };
    usize::try_from(resolved.clamp(0, len_i)).unwrap_or(0)
}

fn slice<'a>(
    target: &Value<'a>,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Value<'a>, ScriptError> {
    match target {
        Value::List(items) => {
            let from = clamp_bound(start, items.len(), 0);
            let to = clamp_bound(end, items.len(), items.len());
            Ok(Value::List(items.get(from..to.max(from)).unwrap_or_default().to_vec()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let from = clamp_bound(start, chars.len(), 0);
            let to = clamp_bound(end, chars.len(), chars.len());
            Ok(Value::Str(
                chars.get(from..to.max(from)).unwrap_or_default().iter().collect(),
            ))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not sliceable",
            other.type_name()
        ))),
    }
}
