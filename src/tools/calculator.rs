//! Calculator tool
//!
//! A restricted arithmetic evaluator: decimal numbers, `+ - * / ( )`, unary
//! minus and a small function whitelist. Deliberately not a general
//! interpreter; chat input never reaches anything that can execute code.

use super::ToolProvider;
use crate::llm::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// Tool name registered with the agent
pub const TOOL_NAME: &str = "calculadora";

/// Fixed error string returned for any evaluation failure
pub const EVAL_ERROR: &str = "Error: no pude calcular la expresión matemática proporcionada.";

/// Errors raised while evaluating an expression
#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    /// A character outside the restricted grammar
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    /// Expression ended where a value or operator was expected
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A token that does not fit the grammar at its position
    #[error("unexpected token")]
    UnexpectedToken,
    /// Function name outside the whitelist
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,
    /// A literal that failed to parse as a number
    #[error("invalid number literal")]
    InvalidNumber,
    /// Evaluation produced a non-finite value
    #[error("non-finite result")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal.parse::<f64>().map_err(|_| CalcError::InvalidNumber)?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' => {
                let mut ident = String::new();
                while let Some(&l) = chars.peek() {
                    if l.is_ascii_alphabetic() {
                        ident.push(l);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_ascii_lowercase()));
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token) -> Result<(), CalcError> {
        match self.next() {
            Some(ref t) if t == token => Ok(()),
            Some(_) => Err(CalcError::UnexpectedToken),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // factor := ('-' | '+') factor | primary
    fn factor(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.factor()
            }
            _ => self.primary(),
        }
    }

    // primary := Number | Ident '(' expr ')' | '(' expr ')'
    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                self.expect(&Token::LParen)?;
                let arg = self.expr()?;
                self.expect(&Token::RParen)?;
                apply_function(&name, arg)
            }
            Some(_) => Err(CalcError::UnexpectedToken),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

fn apply_function(name: &str, arg: f64) -> Result<f64, CalcError> {
    match name {
        "sqrt" => Ok(arg.sqrt()),
        "abs" => Ok(arg.abs()),
        "round" => Ok(arg.round()),
        _ => Err(CalcError::UnknownFunction(name.to_string())),
    }
}

/// Evaluate an arithmetic expression within the restricted grammar.
///
/// # Errors
///
/// Returns a `CalcError` for anything outside the grammar, division by zero
/// or a non-finite result.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(CalcError::UnexpectedEnd);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.peek().is_some() {
        return Err(CalcError::UnexpectedToken);
    }
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(value)
}

/// Render a result the way a person would write it: integral values without
/// a fractional part.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Tool provider exposing the restricted evaluator
pub struct CalculatorProvider;

/// Arguments for the calculator tool
#[derive(Debug, Deserialize)]
struct CalculatorArgs {
    expresion: String,
}

#[async_trait]
impl ToolProvider for CalculatorProvider {
    fn name(&self) -> &'static str {
        "calculator"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Evalúa una expresión matemática y devuelve el resultado. Útil para cálculos, ej: '5 * (10 + 2)'. Soporta + - * / ( ) y las funciones sqrt, abs y round.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expresion": {
                        "type": "string",
                        "description": "La expresión aritmética a evaluar"
                    }
                },
                "required": ["expresion"]
            }),
        }]
    }

    fn can_handle(&self, tool_name: &str) -> bool {
        tool_name == TOOL_NAME
    }

    async fn execute(&self, _tool_name: &str, arguments: &str) -> Result<String> {
        let args: CalculatorArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return Ok(format!("Error al interpretar los argumentos: {e}")),
        };

        match evaluate(&args.expresion) {
            Ok(value) => Ok(format_result(value)),
            Err(e) => {
                warn!(expresion = %args.expresion, error = %e, "Calculator evaluation failed");
                Ok(EVAL_ERROR.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() -> Result<(), CalcError> {
        assert_eq!(evaluate("2 + 2")?, 4.0);
        assert_eq!(evaluate("5 * (10 + 2)")?, 60.0);
        assert_eq!(evaluate("10 / 4")?, 2.5);
        Ok(())
    }

    #[test]
    fn test_precedence_and_unary() -> Result<(), CalcError> {
        assert_eq!(evaluate("2 + 3 * 4")?, 14.0);
        assert_eq!(evaluate("-(2 + 3)")?, -5.0);
        assert_eq!(evaluate("--4")?, 4.0);
        assert_eq!(evaluate("2 * -3")?, -6.0);
        Ok(())
    }

    #[test]
    fn test_function_whitelist() -> Result<(), CalcError> {
        assert_eq!(evaluate("sqrt(16)")?, 4.0);
        assert_eq!(evaluate("abs(-7.5)")?, 7.5);
        assert_eq!(evaluate("round(2.6)")?, 3.0);
        assert_eq!(
            evaluate("pow(2, 3)"),
            Err(CalcError::UnexpectedChar(',')) // comma is not in the grammar
        );
        assert_eq!(
            evaluate("exp(1)"),
            Err(CalcError::UnknownFunction("exp".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_rejects_injection_shaped_input() {
        assert!(evaluate("invalid$$expr").is_err());
        assert!(evaluate("__import__('os')").is_err());
        assert!(evaluate("2; 3").is_err());
        assert!(evaluate("x + 1").is_err());
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(2 + 3").is_err());
        assert!(evaluate("2 + 2 hola").is_err());
        assert_eq!(evaluate("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("sqrt(-1)"), Err(CalcError::NonFinite));
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result(4.0), "4");
        assert_eq!(format_result(-60.0), "-60");
        assert_eq!(format_result(2.5), "2.5");
    }

    #[tokio::test]
    async fn test_tool_boundary_never_errors() -> anyhow::Result<()> {
        let provider = CalculatorProvider;

        let ok = provider
            .execute(TOOL_NAME, "{\"expresion\": \"2 + 2\"}")
            .await?;
        assert_eq!(ok, "4");

        let bad = provider
            .execute(TOOL_NAME, "{\"expresion\": \"invalid$$expr\"}")
            .await?;
        assert_eq!(bad, EVAL_ERROR);

        let malformed_args = provider.execute(TOOL_NAME, "not json").await?;
        assert!(malformed_args.starts_with("Error al interpretar los argumentos"));
        Ok(())
    }
}
