//! Go syntax tree.
//!
//! Produced by lowering the tree-sitter concrete tree. Only the shapes the
//! checker needs survive: comments, parentheses around types and most token
//! positions are dropped. Every node keeps its byte [`Span`].

pub use crate::parser::positions::Span;

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// `import name "path"`
#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub name: Option<ImportName>,
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ImportName {
    /// `import . "pkg"`
    Dot(Span),
    /// `import _ "pkg"`
    Blank(Span),
    /// `import name "pkg"`
    Named(Ident),
}

#[derive(Debug, Clone)]
pub enum Decl {
    Const(Vec<ValueSpec>),
    Var(Vec<ValueSpec>),
    Type(Vec<TypeSpec>),
    Func(FuncDecl),
}

/// Const or var specification.
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    /// Index of the spec inside its group; the value of `iota`.
    pub iota: u64,
    /// Const specs without values repeat the previous spec's type and values.
    pub implicit: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub alias: bool,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeParam {
    pub names: Vec<Ident>,
    pub constraint: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub recv: Option<Receiver>,
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub sig: Signature,
    pub body: Option<Block>,
    pub span: Span,
}

/// Method receiver: `(l *List[T])`.
#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub pointer: bool,
    pub base: Ident,
    pub type_params: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `T`
    Name(Ident),
    /// `pkg.T`
    Qualified { package: Ident, name: Ident },
    /// `T[A, B]`
    Generic { base: Box<TypeExpr>, args: Vec<TypeExpr> },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    /// `[N]T`; `len` is `None` for `[...]T`.
    Array { len: Option<Box<Expr>>, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Func(Box<Signature>),
    Struct(Vec<FieldDecl>),
    Interface(Vec<InterfaceElem>),
    /// `A | ~B` in constraint position.
    Union(Vec<TypeExpr>),
    /// `~T`
    Tilde(Box<TypeExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Struct field; embedded when `names` is empty.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub embedded_pointer: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub enum InterfaceElem {
    Method { name: Ident, sig: Signature },
    Embed(TypeExpr),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Decl(Decl),
    /// `a, b := x, y`
    ShortVar { names: Vec<Ident>, values: Vec<Expr>, span: Span },
    /// `a = b`, `a += b` (`op` is `None` for plain assignment)
    Assign { lhs: Vec<Expr>, op: Option<BinaryOp>, rhs: Vec<Expr> },
    IncDec(Expr),
    Send { chan: Expr, value: Expr },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    /// break / continue / goto / fallthrough
    Branch,
    Labeled(Box<Stmt>),
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    TypeSwitch {
        init: Option<Box<Stmt>>,
        binding: Option<Ident>,
        subject: Expr,
        clauses: Vec<TypeClause>,
    },
    Select(Vec<CommClause>),
    /// Statement form the lowering does not model; its expressions are kept.
    Opaque(Vec<Expr>),
}

/// `case a, b:` / `default:` (empty `exprs`).
#[derive(Debug, Clone)]
pub struct CaseClause {
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// `case int, nil:` in a type switch. `nil` is kept as a plain name.
#[derive(Debug, Clone)]
pub struct TypeClause {
    pub types: Vec<TypeExpr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CommClause {
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(Ident),
    BasicLit { kind: LitKind, raw: String },
    Composite { ty: Option<TypeExpr>, elems: Vec<Element> },
    FuncLit { sig: Box<Signature>, body: Block },
    Paren(Box<Expr>),
    Selector { operand: Box<Expr>, field: Ident },
    Index { operand: Box<Expr>, indices: Vec<Expr> },
    Slice {
        operand: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    /// `x.(T)`; `ty` is `None` for `x.(type)`.
    TypeAssert { operand: Box<Expr>, ty: Option<TypeExpr> },
    Call {
        func: Box<Expr>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        spread: bool,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// A type in expression position: conversions, `make` arguments.
    Type(TypeExpr),
    Opaque(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Rune,
    String,
}

/// Element of a composite literal: `[key:] value`.
#[derive(Debug, Clone)]
pub struct Element {
    pub key: Option<ElementValue>,
    pub value: ElementValue,
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    Expr(Expr),
    /// Nested literal with elided type: `{1, 2}`
    Literal(Vec<Element>, Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Add,   // +
    Sub,   // -
    Not,   // !
    Xor,   // ^
    Deref, // *
    Addr,  // &
    Recv,  // <-
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,    // +
    Sub,    // -
    Mul,    // *
    Div,    // /
    Mod,    // %
    And,    // &
    Or,     // |
    Xor,    // ^
    Shl,    // <<
    Shr,    // >>
    AndNot, // &^
    LAnd,   // &&
    LOr,    // ||
    Eq,     // ==
    Ne,     // !=
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "&" => Self::And,
            "|" => Self::Or,
            "^" => Self::Xor,
            "<<" => Self::Shl,
            ">>" => Self::Shr,
            "&^" => Self::AndNot,
            "&&" => Self::LAnd,
            "||" => Self::LOr,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::LAnd | Self::LOr)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr)
    }
}

impl UnaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "!" => Self::Not,
            "^" => Self::Xor,
            "*" => Self::Deref,
            "&" => Self::Addr,
            "<-" => Self::Recv,
            _ => return None,
        })
    }
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Plain identifier `T`, if this is one.
    pub fn as_name(&self) -> Option<&Ident> {
        match &self.kind {
            TypeExprKind::Name(ident) => Some(ident),
            _ => None,
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            ExprKind::Paren(inner) => inner.as_ident(),
            _ => None,
        }
    }
}
