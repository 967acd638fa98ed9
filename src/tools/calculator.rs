//! Arithmetic and statistics calculator.
//!
//! A small recursive-descent evaluator. Operator precedence follows the usual
//! conventions: `**` binds tighter than unary minus (`-2 ** 2 == -4`) and is
//! right associative.

use super::{parse_args, Tool, ToolOutput};
use crate::context::TurnContext;
use crate::error::Result;
use crate::llm::ToolSpec;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Calculator tool.
pub struct CalculatorTool;

#[derive(Deserialize)]
struct CalculatorArgs {
    expression: String,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "calculator".to_string(),
            description: "Evaluate mathematical and statistical expressions. Use this whenever a \
                precise numerical result is needed. Supports + - * / % ** and parentheses, \
                sqrt, sin, cos, tan, log, log10, exp, abs, the constants pi and e, and the \
                statistics mean, median, mode, std, var, min, max over lists, \
                e.g. \"mean([1, 2, 3]) + std([4, 5, 6])\"."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Expression to evaluate, e.g. \"(2 + 3) * 4\" or \"median([1, 2, 3])\""
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    fn usage_notice(&self) -> String {
        "Using the Calculator".to_string()
    }

    async fn call(&self, arguments: &Value, _ctx: &TurnContext) -> Result<ToolOutput> {
        let args: CalculatorArgs = parse_args("calculator", arguments)?;
        let content = match evaluate(&args.expression) {
            Ok(value) => format_number(value),
            Err(reason) => format!("Error: {}. Please check your expression format.", reason),
        };
        Ok(ToolOutput::text(content))
    }
}

/// Evaluate an expression to a number.
pub fn evaluate(expression: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!("unexpected token '{}'", parser.tokens[parser.pos]));
    }
    match value {
        Operand::Number(n) if n.is_finite() => Ok(n),
        Operand::Number(_) => Err("result is not a finite number".to_string()),
        Operand::List(_) => Err("expression evaluates to a list, not a number".to_string()),
    }
}

/// Integers print without a fractional part; everything else uses shortest float form.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Op(op) => write!(f, "{}", op),
        }
    }
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent only when followed by digits; a bare "2e" is rejected by the parser.
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| format!("invalid number '{}'", text))?;
            tokens.push(Token::Number(number));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            let op = match c {
                '*' if chars.get(i + 1) == Some(&'*') => {
                    i += 1;
                    "**"
                }
                '+' => "+",
                '-' => "-",
                '*' => "*",
                '/' => "/",
                '%' => "%",
                '(' => "(",
                ')' => ")",
                '[' => "[",
                ']' => "]",
                ',' => ",",
                other => return Err(format!("unexpected character '{}'", other)),
            };
            tokens.push(Token::Op(op));
            i += 1;
        }
    }

    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Operand {
    Number(f64),
    List(Vec<f64>),
}

impl Operand {
    fn number(self) -> std::result::Result<f64, String> {
        match self {
            Operand::Number(n) => Ok(n),
            Operand::List(_) => Err("lists are only valid as statistics arguments".to_string()),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn expect(&mut self, op: &str) -> std::result::Result<(), String> {
        match self.peek_op() {
            Some(found) if found == op => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(format!("expected '{}'", op)),
        }
    }

    fn expression(&mut self) -> std::result::Result<Operand, String> {
        let first = self.term()?;
        if !matches!(self.peek_op(), Some("+") | Some("-")) {
            return Ok(first);
        }

        let mut acc = first.number()?;
        while let Some(op @ ("+" | "-")) = self.peek_op() {
            self.pos += 1;
            let rhs = self.term()?.number()?;
            acc = if op == "+" { acc + rhs } else { acc - rhs };
        }
        Ok(Operand::Number(acc))
    }

    fn term(&mut self) -> std::result::Result<Operand, String> {
        let first = self.unary()?;
        if !matches!(self.peek_op(), Some("*") | Some("/") | Some("%")) {
            return Ok(first);
        }

        let mut acc = first.number()?;
        while let Some(op @ ("*" | "/" | "%")) = self.peek_op() {
            self.pos += 1;
            let rhs = self.unary()?.number()?;
            acc = match op {
                "*" => acc * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_string()),
                "/" => acc / rhs,
                // Floored modulo, matching the sign of the divisor.
                _ => acc - rhs * (acc / rhs).floor(),
            };
        }
        Ok(Operand::Number(acc))
    }

    fn unary(&mut self) -> std::result::Result<Operand, String> {
        match self.peek_op() {
            Some("-") => {
                self.pos += 1;
                Ok(Operand::Number(-self.unary()?.number()?))
            }
            Some("+") => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<Operand, String> {
        let base = self.primary()?;
        if self.peek_op() == Some("**") {
            self.pos += 1;
            let exponent = self.unary()?.number()?;
            return Ok(Operand::Number(base.number()?.powf(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> std::result::Result<Operand, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;

        match token {
            Token::Number(n) => Ok(Operand::Number(n)),
            Token::Op("(") => {
                let inner = self.expression()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Op("[") => {
                let mut items = Vec::new();
                if self.peek_op() != Some("]") {
                    loop {
                        items.push(self.expression()?.number()?);
                        if self.peek_op() == Some(",") {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect("]")?;
                Ok(Operand::List(items))
            }
            Token::Ident(name) => {
                if self.peek_op() == Some("(") {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek_op() != Some(")") {
                        loop {
                            args.push(self.expression()?);
                            if self.peek_op() == Some(",") {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(")")?;
                    call_function(&name, args).map(Operand::Number)
                } else {
                    match name.as_str() {
                        "pi" => Ok(Operand::Number(std::f64::consts::PI)),
                        "e" => Ok(Operand::Number(std::f64::consts::E)),
                        other => Err(format!("name '{}' is not defined", other)),
                    }
                }
            }
            Token::Op(op) => Err(format!("unexpected token '{}'", op)),
        }
    }
}

fn call_function(name: &str, args: Vec<Operand>) -> std::result::Result<f64, String> {
    match name {
        "mean" | "median" | "mode" | "std" | "var" | "min" | "max" => {
            let data = flatten(args)?;
            if data.is_empty() {
                return Err(format!("{}() of an empty list", name));
            }
            Ok(match name {
                "mean" => mean(&data),
                "median" => median(&data),
                "mode" => mode(&data),
                "std" => variance(&data).sqrt(),
                "var" => variance(&data),
                "min" => data.iter().cloned().fold(f64::INFINITY, f64::min),
                _ => data.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            })
        }
        "sqrt" | "sin" | "cos" | "tan" | "log" | "log10" | "exp" | "abs" => {
            let [arg] = <[Operand; 1]>::try_from(args)
                .map_err(|_| format!("{}() takes exactly one argument", name))?;
            let x = arg.number()?;
            Ok(match name {
                "sqrt" => x.sqrt(),
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "log" => x.ln(),
                "log10" => x.log10(),
                "exp" => x.exp(),
                _ => x.abs(),
            })
        }
        other => Err(format!("name '{}' is not defined", other)),
    }
}

fn flatten(args: Vec<Operand>) -> std::result::Result<Vec<f64>, String> {
    let mut data = Vec::new();
    for arg in args {
        match arg {
            Operand::Number(n) => data.push(n),
            Operand::List(items) => data.extend(items),
        }
    }
    Ok(data)
}

fn mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

fn median(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value; ties resolve to the smallest.
fn mode(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let (mut best, mut best_count) = (sorted[0], 0);
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best_count {
            best = sorted[i];
            best_count = j - i;
        }
        i = j;
    }
    best
}

/// Population variance.
fn variance(data: &[f64]) -> f64 {
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(expr: &str, expected: f64) {
        let value = evaluate(expr).unwrap_or_else(|e| panic!("{}: {}", expr, e));
        assert!((value - expected).abs() < 1e-9, "{} = {} (expected {})", expr, value, expected);
    }

    #[test]
    fn test_arithmetic_precedence() {
        approx("2 + 3 * 4", 14.0);
        approx("(2 + 3) * 4", 20.0);
        approx("2 ** 8", 256.0);
        approx("2 ** 3 ** 2", 512.0);
        approx("-2 ** 2", -4.0);
        approx("7 % 3", 1.0);
        approx("-7 % 3", 2.0);
        approx("1.5e2 / 3", 50.0);
    }

    #[test]
    fn test_functions_and_constants() {
        approx("sqrt(16)", 4.0);
        approx("abs(-3.5)", 3.5);
        approx("log(e)", 1.0);
        approx("log10(1000)", 3.0);
        approx("cos(pi)", -1.0);
        approx("2 * e", 2.0 * std::f64::consts::E);
        assert!(evaluate("2e").is_err());
    }

    #[test]
    fn test_statistics() {
        approx("mean([1, 2, 3, 4, 5])", 3.0);
        approx("median([5, 1, 3, 2])", 2.5);
        approx("mode([1, 2, 2, 3, 3])", 2.0);
        approx("std([1, 2, 3, 4, 5])", 2.0_f64.sqrt());
        approx("var([2, 4, 4, 4, 5, 5, 7, 9])", 4.0);
        approx("max([3, 9, 1]) - min([3, 9, 1])", 8.0);
        approx("mean([1, 2, 3]) + std([4, 5, 6])", 2.0 + (2.0_f64 / 3.0).sqrt());
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("1 / 0").unwrap_err().contains("division by zero"));
        assert!(evaluate("foo(2)").unwrap_err().contains("not defined"));
        assert!(evaluate("(1 + 2").unwrap_err().contains("expected ')'"));
        assert!(evaluate("mean([])").is_err());
        assert!(evaluate("[1, 2]").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("2 $ 3").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(14.0), "14");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[tokio::test]
    async fn test_tool_reports_errors_as_text() {
        let ctx = TurnContext::resolve(&crate::config::Settings::default(), None, None).unwrap();
        let output = CalculatorTool
            .call(&json!({"expression": "10 / 0"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            output.content,
            "Error: division by zero. Please check your expression format."
        );

        let output = CalculatorTool
            .call(&json!({"expression": "(2 + 3) * 4"}), &ctx)
            .await
            .unwrap();
        assert_eq!(output.content, "20");
    }
}
