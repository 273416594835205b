//! Text rendering of expressions in backend syntax

use crate::ast::{BinOp, Expr, NEG_PRECEDENCE};

const ATOM_PRECEDENCE: u8 = u8::MAX;

/// Renders expressions with the fewest parentheses that keep the tree shape.
#[derive(Debug, Clone)]
pub struct ExprRenderer {
    power_sign: String,
    /// Spelled with surrounding spaces
    not_equal: String,
}

impl Default for ExprRenderer {
    fn default() -> Self {
        Self::new("^")
    }
}

impl ExprRenderer {
    pub fn new(power_sign: impl Into<String>) -> Self {
        Self {
            power_sign: power_sign.into(),
            not_equal: " != ".to_string(),
        }
    }

    /// Override the `!=` spelling, e.g. `~=` for MATLAB
    pub fn with_not_equal(mut self, sign: &str) -> Self {
        self.not_equal = format!(" {} ", sign);
        self
    }

    pub fn render(&self, expr: &Expr) -> String {
        let mut out = String::new();
        self.write(expr, &mut out);
        out
    }

    fn write(&self, expr: &Expr, out: &mut String) {
        match expr {
            Expr::Number(text) => out.push_str(text),
            Expr::Ident(name) => out.push_str(name),
            Expr::Neg(inner) => {
                out.push('-');
                self.write_operand(inner, precedence(inner) < NEG_PRECEDENCE, out);
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                let (lhs_parens, rhs_parens) = if op.is_right_assoc() {
                    (precedence(lhs) <= prec, precedence(rhs) < prec)
                } else {
                    (precedence(lhs) < prec, precedence(rhs) <= prec)
                };
                self.write_operand(lhs, lhs_parens, out);
                out.push_str(self.operator(*op));
                self.write_operand(rhs, rhs_parens, out);
            }
            Expr::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write(arg, out);
                }
                out.push(')');
            }
        }
    }

    fn write_operand(&self, expr: &Expr, parens: bool, out: &mut String) {
        if parens {
            out.push('(');
            self.write(expr, out);
            out.push(')');
        } else {
            self.write(expr, out);
        }
    }

    fn operator(&self, op: BinOp) -> &str {
        match op {
            BinOp::Add => " + ",
            BinOp::Sub => " - ",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => &self.power_sign,
            BinOp::Less => " < ",
            BinOp::LessEq => " <= ",
            BinOp::Greater => " > ",
            BinOp::GreaterEq => " >= ",
            BinOp::Equal => " == ",
            BinOp::NotEqual => &self.not_equal,
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(_) | Expr::Ident(_) | Expr::Call { .. } => ATOM_PRECEDENCE,
        Expr::Neg(_) => NEG_PRECEDENCE,
        Expr::Binary { op, .. } => op.precedence(),
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&ExprRenderer::default().render(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(source: &str) -> String {
        Expr::parse(source).unwrap().to_string()
    }

    #[test]
    fn test_canonical_spacing() {
        assert_eq!(round_trip("a*x + b*y"), "a*x + b*y");
        assert_eq!(round_trip("b * x-a*y"), "b*x - a*y");
        assert_eq!(round_trip("f( x,y )"), "f(x, y)");
    }

    #[test]
    fn test_redundant_parentheses_dropped() {
        assert_eq!(round_trip("((a*b)) + (c)"), "a*b + c");
    }

    #[test]
    fn test_needed_parentheses_kept() {
        assert_eq!(round_trip("a - (b - c)"), "a - (b - c)");
        assert_eq!(round_trip("a/(b*c)"), "a/(b*c)");
        assert_eq!(round_trip("(a + b)*c"), "(a + b)*c");
        assert_eq!(round_trip("(x^2)^3"), "(x^2)^3");
        assert_eq!(round_trip("-(a + b)"), "-(a + b)");
        assert_eq!(round_trip("(-x)^2"), "(-x)^2");
        assert_eq!(round_trip("2^-t"), "2^(-t)");
    }

    #[test]
    fn test_rendering_reparses_to_same_tree() {
        for source in ["a - (b + c)*d^-2", "-x^2/(1 + exp(-k*t))", "(a < b) == (c >= d)"] {
            let expr = Expr::parse(source).unwrap();
            assert_eq!(Expr::parse(&expr.to_string()).unwrap(), expr);
        }
    }

    #[test]
    fn test_backend_not_equal_sign() {
        let expr = Expr::parse("(x != 1)*x").unwrap();
        assert_eq!(ExprRenderer::default().render(&expr), "(x != 1)*x");
        assert_eq!(
            ExprRenderer::new("^").with_not_equal("~=").render(&expr),
            "(x ~= 1)*x"
        );
    }

    #[test]
    fn test_backend_power_sign() {
        let expr = Expr::parse("x^2 + y**3").unwrap();
        assert_eq!(ExprRenderer::new("**").render(&expr), "x**2 + y**3");
    }
}
