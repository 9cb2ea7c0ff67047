//! Source-level expressions of a model.
//!
//! Guards, rates, probabilities, assignment right-hand sides and initial
//! predicates are all stored as [`Expr`] trees that refer to variables and
//! constants by name. They are compiled to slot-indexed form by `pmc-eval`.

use std::fmt;

/// A model expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Real literal.
    Real(f64),
    /// Variable or constant reference.
    Ident(String),
    /// Unary operation.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation.
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// If-then-else.
    Ite {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Logical
    And,
    Or,
    Implies,
    Iff,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Arithmetic
    Add,
    Sub,
    Mul,
    /// Real division.
    Div,
    /// Integer division, rounding towards negative infinity.
    IntDiv,
    Mod,
    Min,
    Max,
    Pow,
}

impl BinOp {
    /// Whether the operator is `and`, `or`, `=>` or `<=>`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or | BinOp::Implies | BinOp::Iff)
    }

    /// Whether the operator yields a boolean from two numbers.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Implies => "=>",
            BinOp::Iff => "<=>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntDiv => "div",
            BinOp::Mod => "%",
            BinOp::Min => "min",
            BinOp::Max => "max",
            BinOp::Pow => "pow",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Floor,
    Ceil,
    Abs,
}

impl Expr {
    pub fn bool(b: bool) -> Self {
        Expr::Bool(b)
    }

    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn real(r: f64) -> Self {
        Expr::Real(r)
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn ite(cond: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Expr::Ite {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    pub fn not(operand: Expr) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Or, left, right)
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Eq, left, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Lt, left, right)
    }

    pub fn le(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Le, left, right)
    }

    pub fn ge(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Ge, left, right)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Mul, left, right)
    }

    /// Conjunction of all given expressions; `true` if empty.
    pub fn conjunction(exprs: impl IntoIterator<Item = Expr>) -> Self {
        exprs
            .into_iter()
            .reduce(Expr::and)
            .unwrap_or(Expr::Bool(true))
    }

    /// Whether this is the literal `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Bool(true))
    }

    /// Call `f` on every identifier in the expression.
    pub fn for_each_ident<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Bool(_) | Expr::Int(_) | Expr::Real(_) => {}
            Expr::Ident(name) => f(name),
            Expr::Unary { operand, .. } => operand.for_each_ident(f),
            Expr::Binary { left, right, .. } => {
                left.for_each_ident(f);
                right.for_each_ident(f);
            }
            Expr::Ite {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.for_each_ident(f);
                then_branch.for_each_ident(f);
                else_branch.for_each_ident(f);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Real(r) => write!(f, "{:?}", r),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!({})", operand),
                UnaryOp::Neg => write!(f, "-({})", operand),
                UnaryOp::Floor => write!(f, "floor({})", operand),
                UnaryOp::Ceil => write!(f, "ceil({})", operand),
                UnaryOp::Abs => write!(f, "abs({})", operand),
            },
            Expr::Binary { op, left, right } => match op {
                BinOp::Min | BinOp::Max | BinOp::Pow => {
                    write!(f, "{}({}, {})", op.symbol(), left, right)
                }
                _ => write!(f, "({} {} {})", left, op.symbol(), right),
            },
            Expr::Ite {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "({} ? {} : {})", cond, then_branch, else_branch),
        }
    }
}
