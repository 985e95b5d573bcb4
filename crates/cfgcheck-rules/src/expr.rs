//! Restricted expression parser using a pest PEG grammar + Pratt parser.
//!
//! Parses `validate` expressions like:
//! - `"src1.opSch.x >= src2.opSch.y * 2"`
//! - `"group0.opSch.mode == '1' and group1.opSch.mode == '1'"`
//! - `"not (src1.dmaCfg.burst > 8)"`
//!
//! The grammar admits comparisons, arithmetic, boolean connectives,
//! parentheses, numeric/string/boolean literals, and role-qualified
//! attribute paths. Anything else — function calls, indexing, assignment —
//! is unrepresentable and rejected at parse time. This is a security
//! boundary for rule authoring, not a style choice.

use std::fmt;

use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;
use serde::Serialize;

use crate::error::{Result, RuleParseError};

// ---------------------------------------------------------------------------
// Pest parser (generated from cfgcheck.pest grammar)
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[grammar = "src/cfgcheck.pest"]
struct ExprParser;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Parsed expression AST, restricted to the closed grammar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// Role-qualified attribute path: `role` is the first segment,
    /// `field` the remaining dotted chain (a prefixed field name).
    Path { role: String, field: String },
    /// Unary operation (`not`, unary minus).
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Str(s) => write!(f, "'{s}'"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Path { role, field } => write!(f, "{role}.{field}"),
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => write!(f, "not {expr}"),
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => write!(f, "-{expr}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse an expression string into an [`Expr`] AST.
///
/// # Examples
///
/// ```
/// use cfgcheck_rules::parse_expr;
///
/// let expr = parse_expr("src1.opSch.x >= src2.opSch.y * 2").unwrap();
/// println!("{expr}");
/// ```
pub fn parse_expr(input: &str) -> Result<Expr> {
    let pairs = ExprParser::parse(Rule::expression, input)
        .map_err(|e| RuleParseError::ExpressionSyntax(e.to_string()))?;

    let pratt = PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::eq_op, Assoc::Left)
            | Op::infix(Rule::ne_op, Assoc::Left)
            | Op::infix(Rule::lt_op, Assoc::Left)
            | Op::infix(Rule::le_op, Assoc::Left)
            | Op::infix(Rule::gt_op, Assoc::Left)
            | Op::infix(Rule::ge_op, Assoc::Left))
        .op(Op::infix(Rule::add_op, Assoc::Left) | Op::infix(Rule::sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left) | Op::infix(Rule::div_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op) | Op::prefix(Rule::neg_op));

    // expression = { SOI ~ expr ~ EOI }
    let expression_pair = pairs.into_iter().next().unwrap();
    let expr_pair = expression_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .unwrap();

    parse_pratt(expr_pair, &pratt)
}

// ---------------------------------------------------------------------------
// Internal parsing helpers
// ---------------------------------------------------------------------------

fn parse_pratt(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<Expr> {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::number => primary
                .as_str()
                .parse::<f64>()
                .map(Expr::Num)
                .map_err(|_| RuleParseError::ExpressionSyntax(primary.as_str().to_string())),
            Rule::string => Ok(parse_string(primary)),
            Rule::boolean => Ok(Expr::Bool(primary.as_str() == "true")),
            Rule::path => Ok(parse_path(primary.as_str())),
            Rule::expr => parse_pratt(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::not_op => UnaryOp::Not,
                Rule::neg_op => UnaryOp::Neg,
                other => unreachable!("unexpected prefix rule: {other:?}"),
            };
            Ok(Expr::Unary {
                op,
                expr: Box::new(rhs?),
            })
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or_op => BinaryOp::Or,
                Rule::and_op => BinaryOp::And,
                Rule::eq_op => BinaryOp::Eq,
                Rule::ne_op => BinaryOp::Ne,
                Rule::lt_op => BinaryOp::Lt,
                Rule::le_op => BinaryOp::Le,
                Rule::gt_op => BinaryOp::Gt,
                Rule::ge_op => BinaryOp::Ge,
                Rule::add_op => BinaryOp::Add,
                Rule::sub_op => BinaryOp::Sub,
                Rule::mul_op => BinaryOp::Mul,
                Rule::div_op => BinaryOp::Div,
                other => unreachable!("unexpected infix rule: {other:?}"),
            };
            Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            })
        })
        .parse(pair.into_inner())
}

fn parse_string(pair: Pair<'_, Rule>) -> Expr {
    // string = ${ "\"" ~ dq_inner ~ "\"" | "'" ~ sq_inner ~ "'" }
    let inner = pair
        .into_inner()
        .next()
        .expect("string literal must have inner content");
    Expr::Str(inner.as_str().to_string())
}

fn parse_path(s: &str) -> Expr {
    // First segment is the role, the rest is the prefixed field name.
    let (role, field) = s.split_once('.').expect("path has at least two segments");
    Expr::Path {
        role: role.to_string(),
        field: field.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn path(role: &str, field: &str) -> Expr {
        Expr::Path {
            role: role.to_string(),
            field: field.to_string(),
        }
    }

    #[test]
    fn test_comparison() {
        let expr = parse_expr("src1.opSch.x >= 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Ge,
                lhs: Box::new(path("src1", "opSch.x")),
                rhs: Box::new(Expr::Num(3.0)),
            }
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        // a + b * 2 parses as a + (b * 2)
        let expr = parse_expr("src1.a.x + src1.a.y * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(path("src1", "a.x")),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(path("src1", "a.y")),
                    rhs: Box::new(Expr::Num(2.0)),
                }),
            }
        );
    }

    #[test]
    fn test_boolean_precedence() {
        // a or not b and c parses as a or ((not b) and c)
        let expr = parse_expr("src1.a.p == 1 or not src1.a.q == 1 and src1.a.r == 1").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Or, ..
            } => {}
            other => panic!("expected top-level or, got {other:?}"),
        }
    }

    #[test]
    fn test_parentheses() {
        let expr = parse_expr("(src1.a.x + src1.a.y) * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    lhs: Box::new(path("src1", "a.x")),
                    rhs: Box::new(path("src1", "a.y")),
                }),
                rhs: Box::new(Expr::Num(2.0)),
            }
        );
    }

    #[test]
    fn test_string_literals() {
        let expr = parse_expr("src1.opSch.mode == '1'").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Eq,
                lhs: Box::new(path("src1", "opSch.mode")),
                rhs: Box::new(Expr::Str("1".to_string())),
            }
        );

        let expr = parse_expr(r#"src1.opSch.mode != "dma""#).unwrap();
        match expr {
            Expr::Binary { rhs, .. } => assert_eq!(*rhs, Expr::Str("dma".to_string())),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn test_unary_minus() {
        let expr = parse_expr("src1.a.x > -1").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Gt,
                lhs: Box::new(path("src1", "a.x")),
                rhs: Box::new(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(Expr::Num(1.0)),
                }),
            }
        );
    }

    #[test]
    fn test_not() {
        let expr = parse_expr("not (src1.a.x > 8)").unwrap();
        match expr {
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => {}
            other => panic!("expected not, got {other:?}"),
        }
    }

    #[test]
    fn test_occurrence_index_path() {
        // Repeated sub-sections flatten to section.N.field
        let expr = parse_expr("group0.dmaCfg.0.channelId == group1.dmaCfg.0.channelId").unwrap();
        match expr {
            Expr::Binary { lhs, .. } => {
                assert_eq!(*lhs, path("group0", "dmaCfg.0.channelId"));
            }
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_function_calls() {
        assert!(parse_expr("len(src1.a.x) > 2").is_err());
        assert!(parse_expr("src1.a.x.method()").is_err());
    }

    #[test]
    fn test_rejects_subscripts() {
        assert!(parse_expr("src1.a[0] == 1").is_err());
    }

    #[test]
    fn test_rejects_assignment() {
        assert!(parse_expr("src1.a.x = 1").is_err());
    }

    #[test]
    fn test_rejects_bare_identifier() {
        // A path needs at least role.field
        assert!(parse_expr("src1 == 1").is_err());
    }

    #[test]
    fn test_keyword_prefix_identifiers() {
        // "notable" must not be lexed as "not" + "able"
        let expr = parse_expr("src1.notable.x == 1").unwrap();
        match expr {
            Expr::Binary { lhs, .. } => assert_eq!(*lhs, path("src1", "notable.x")),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn test_display_roundtrip_readable() {
        let expr = parse_expr("src1.opSch.x >= src2.opSch.y * 2").unwrap();
        assert_eq!(expr.to_string(), "(src1.opSch.x >= (src2.opSch.y * 2))");
    }
}
