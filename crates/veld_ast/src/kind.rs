//! The closed set of AST node tags.

use serde::{Deserialize, Serialize};

/// The tag of an [`AstNode`](crate::AstNode).
///
/// Child positions are significant per kind; the conventions are listed
/// on the variants that have them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum AstKind {
    /// A module; children are its declarations and items.
    Module,
    /// A net or variable declaration; an optional first `Range` child
    /// gives the bit range.
    Wire,
    /// A wire synthesized for an otherwise-undeclared identifier.
    AutoWire,
    /// A memory declaration; children `[0]` and `[1]` are the data
    /// range and the address range.
    Memory,
    /// An overridable compile-time constant; child `[0]` is the value,
    /// an optional child `[1]` the declared range.
    Parameter,
    /// A non-overridable compile-time constant; children as `Parameter`.
    LocalParam,
    /// A `defparam` override; the dotted target is in `name`, child
    /// `[0]` the value, an optional child `[1]` a range.
    DefParam,
    /// A parameter override attached to a cell; `name` is the
    /// parameter, child `[0]` the value.
    ParaSet,
    /// A generate loop variable.
    GenVar,
    /// A bit range; child `[0]` is the left (MSB) bound, optional child
    /// `[1]` the right (LSB) bound.
    Range,
    /// A generate-scope member reference `prefix[index].member`; child
    /// `[0]` is the index, child `[1]` the member identifier.
    Prefix,
    /// A reference to a named object; optional range children select
    /// bits or words.
    Identifier,
    /// A bit-precise constant.
    Constant,
    /// A real-valued constant.
    RealValue,
    /// An `always` process; edge/sensitivity children precede the body
    /// `Block`.
    Always,
    /// An `initial` process; child `[0]` is the body `Block`.
    Initial,
    /// A statement block; a named block introduces a scope.
    Block,
    /// An expanded-generate container block.
    GenBlock,
    /// A generate conditional; children are condition, then-branch,
    /// optional else-branch.
    GenIf,
    /// A generate case; child `[0]` is the discriminant, the rest are
    /// `Cond` arms.
    GenCase,
    /// A generate loop; children are init, condition, step, body.
    GenFor,
    /// A procedural loop; children are init, condition, step, body.
    For,
    /// A procedural while loop (constant functions only).
    While,
    /// A procedural repeat loop (constant functions only).
    Repeat,
    /// A case statement; child `[0]` is the discriminant, the rest are
    /// `Cond` arms.
    Case,
    /// A case arm; match-value children (or a `Default`) precede the
    /// body `Block`/`GenBlock`.
    Cond,
    /// The default marker inside a `Cond` arm.
    Default,
    /// A continuous assignment; children are lhs, rhs.
    Assign,
    /// A blocking procedural assignment; children are lhs, rhs.
    AssignEq,
    /// A non-blocking procedural assignment; children are lhs, rhs.
    AssignLe,
    /// A function call; children are the arguments.
    FCall,
    /// A task call; children are the arguments.
    TCall,
    /// A function declaration; children are ports/locals and the body.
    Function,
    /// A task declaration; children are ports/locals and the body.
    Task,
    /// A cell connection; `name` is the port, child `[0]` the actual.
    Argument,
    /// A module instantiation; child `[0]` is the `CellType`, then
    /// `ParaSet`s, then `Argument`s.
    Cell,
    /// The type reference inside a `Cell`.
    CellType,
    /// An array of cells; child `[0]` is the array range, child `[1]`
    /// the template `Cell`.
    CellArray,
    /// A gate primitive instantiation; children are `Argument`s.
    Primitive,
    /// A memory read port; child `[0]` is the address.
    MemRd,
    /// A memory write port; children are address, data, enable
    /// identifiers.
    MemWr,
    /// An assertion; lowered form has check and enable children.
    Assert,
    /// A positive edge event; child `[0]` is the signal.
    Posedge,
    /// A negative edge event; child `[0]` is the signal.
    Negedge,
    /// Bit-width coercion; children are width, value.
    ToBits,
    /// Signedness cast to signed; child `[0]` is the value.
    ToSigned,
    /// Signedness cast to unsigned; child `[0]` is the value.
    ToUnsigned,
    /// Concatenation; children are ordered LSB part first.
    Concat,
    /// Replication; child `[0]` is the count, child `[1]` the value.
    Replicate,
    /// Conditional expression; children are condition, then, else.
    Ternary,

    /// Unary minus.
    Neg,
    /// Unary plus.
    Pos,
    /// Bitwise NOT.
    BitNot,
    /// Bitwise AND.
    BitAnd,
    /// Bitwise OR.
    BitOr,
    /// Bitwise XOR.
    BitXor,
    /// Bitwise XNOR.
    BitXnor,
    /// Reduction AND.
    ReduceAnd,
    /// Reduction OR.
    ReduceOr,
    /// Reduction XOR.
    ReduceXor,
    /// Reduction XNOR.
    ReduceXnor,
    /// Boolean reduction (any bit set).
    ReduceBool,
    /// Logical AND.
    LogicAnd,
    /// Logical OR.
    LogicOr,
    /// Logical NOT.
    LogicNot,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Modulo.
    Mod,
    /// Logical shift left.
    ShiftLeft,
    /// Logical shift right.
    ShiftRight,
    /// Arithmetic shift left.
    ShiftSLeft,
    /// Arithmetic shift right.
    ShiftSRight,
    /// Exponentiation.
    Pow,
    /// Less-than.
    Lt,
    /// Less-or-equal.
    Le,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Case equality (4-state exact).
    Eqx,
    /// Case inequality (4-state exact).
    Nex,
    /// Greater-or-equal.
    Ge,
    /// Greater-than.
    Gt,
}

impl AstKind {
    /// Kinds whose `name` keys the ambient module scope.
    pub fn names_scope_object(self) -> bool {
        matches!(
            self,
            AstKind::Parameter
                | AstKind::LocalParam
                | AstKind::Wire
                | AstKind::AutoWire
                | AstKind::GenVar
                | AstKind::Memory
                | AstKind::Function
                | AstKind::Task
                | AstKind::Cell
        )
    }

    /// Declaration kinds renamed when a generate block is expanded.
    pub fn renamed_in_genblock(self) -> bool {
        matches!(
            self,
            AstKind::Wire
                | AstKind::Memory
                | AstKind::Parameter
                | AstKind::LocalParam
                | AstKind::Function
                | AstKind::Task
                | AstKind::Cell
        )
    }

    /// Any of the three assignment kinds.
    pub fn is_assign(self) -> bool {
        matches!(
            self,
            AstKind::Assign | AstKind::AssignEq | AstKind::AssignLe
        )
    }

    /// Any procedural (blocking or non-blocking) assignment.
    pub fn is_proc_assign(self) -> bool {
        matches!(self, AstKind::AssignEq | AstKind::AssignLe)
    }

    /// Generate constructs that must be eliminated by elaboration.
    pub fn is_gen_construct(self) -> bool {
        matches!(
            self,
            AstKind::GenBlock | AstKind::GenIf | AstKind::GenCase | AstKind::GenFor
        )
    }

    /// The constant kinds (`Constant` and `RealValue`).
    pub fn is_const(self) -> bool {
        matches!(self, AstKind::Constant | AstKind::RealValue)
    }
}
