//! Abstract syntax tree for symbolic right-hand sides

use indexmap::{IndexMap, IndexSet};

use crate::error::CodegenResult;
use crate::parser::Parser;

/// Ordered mapping from spec entry name to its expression.
///
/// Insertion order is emission order unless the caller supplies an explicit one.
pub type Spec = IndexMap<String, Expr>;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
}

impl BinOp {
    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Less
            | BinOp::LessEq
            | BinOp::Greater
            | BinOp::GreaterEq
            | BinOp::Equal
            | BinOp::NotEqual => 1,
            BinOp::Add | BinOp::Sub => 2,
            BinOp::Mul | BinOp::Div => 3,
            BinOp::Pow => 5,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        matches!(self, BinOp::Pow)
    }
}

/// Precedence of unary minus, between multiplicative and power
pub const NEG_PRECEDENCE: u8 = 4;

/// Expression types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Numeric literal, verbatim source text
    Number(String),

    /// Name reference: parameter, variable, argument or reused term
    Ident(String),

    /// Unary minus: `-e`
    Neg(Box<Expr>),

    /// Binary operation: `a + b`, `a^b`, `a < b`
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Function call: `f(a, b)`, `sin(x)`, `if(c, a, b)`
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Parse expression text
    pub fn parse(source: &str) -> CodegenResult<Expr> {
        Parser::new(source).parse_expression()
    }

    pub fn number(text: impl Into<String>) -> Self {
        Expr::Number(text.into())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// Bare numbers and names are never worth hoisting
    pub fn is_trivial(&self) -> bool {
        matches!(self, Expr::Number(_) | Expr::Ident(_))
    }

    /// Direct children, left to right
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Number(_) | Expr::Ident(_) => Vec::new(),
            Expr::Neg(inner) => vec![inner.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Expr::size).sum::<usize>()
    }

    /// Visit every node in pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Distinct identifiers in order of first appearance
    pub fn identifiers(&self) -> IndexSet<String> {
        let mut names = IndexSet::new();
        self.walk(&mut |node| {
            if let Expr::Ident(name) = node {
                names.insert(name.clone());
            }
        });
        names
    }

    /// Number of call sites whose callee is in `names`
    pub fn count_calls(&self, names: &IndexSet<String>) -> usize {
        let mut count = 0;
        self.walk(&mut |node| {
            if let Expr::Call { name, .. } = node {
                if names.contains(name) {
                    count += 1;
                }
            }
        });
        count
    }

    /// First call to `callee`, searching in pre-order
    pub fn find_call(&self, callee: &str) -> Option<&Expr> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() {
                if let Expr::Call { name, .. } = node {
                    if name == callee {
                        found = Some(node);
                    }
                }
            }
        });
        found
    }
}

/// Whether `name` is a valid identifier in the expression language
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse every entry of a `name -> text` table into a [`Spec`], keeping order
pub fn parse_spec<'a, I>(entries: I) -> CodegenResult<Spec>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    entries
        .into_iter()
        .map(|(name, text)| Ok((name.to_string(), Expr::parse(text)?)))
        .collect()
}
