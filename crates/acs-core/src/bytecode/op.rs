//! Internal opcodes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of operand words following an opcode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` operand words.
    Fixed(u8),
    /// `n` leading words, the last of which is a count `c`, then `c` words.
    Trailing(u8),
    /// A count `c` then `c` `(value, target)` pairs.
    Pairs,
}

impl Arity {
    /// Operand words of one instruction, given the words that follow the opcode.
    ///
    /// Returns `None` when the count word itself is missing.
    pub fn operand_words(self, following: &[u32]) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(n as usize),
            Self::Trailing(n) => {
                let count = *following.get(n as usize)? as usize;
                Some(n as usize + 1 + count)
            }
            Self::Pairs => {
                let count = *following.first()? as usize;
                count.checked_mul(2)?.checked_add(1)
            }
        }
    }
}

macro_rules! define_ops {
    ($( $(#[$doc:meta])* $name:ident = $arity:expr ),* $(,)?) => {
        /// Opcode of the translated instruction stream.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[repr(u32)]
        pub enum Op {
            $( $(#[$doc])* $name, )*
        }

        impl Op {
            /// Every opcode, indexed by its numeric value.
            pub const ALL: &'static [Self] = &[$(Self::$name),*];

            /// Operand layout.
            pub const fn arity(self) -> Arity {
                match self { $(Self::$name => $arity,)* }
            }

            /// Mnemonic.
            pub const fn name(self) -> &'static str {
                match self { $(Self::$name => stringify!($name),)* }
            }
        }
    };
}

define_ops! {
    /// Stops the thread; sentinel at both ends of every stream.
    Halt = Arity::Fixed(0),
    Nop = Arity::Fixed(0),

    Terminate = Arity::Fixed(0),
    Suspend = Arity::Fixed(0),
    Restart = Arity::Fixed(0),

    PushImm = Arity::Fixed(1),
    /// `count, value×count`
    PushImms = Arity::Trailing(0),

    /// `spec, argc`; arguments on the stack.
    LineSpec = Arity::Fixed(2),
    /// `spec, argc, arg×argc`
    LineSpecImm = Arity::Trailing(1),
    /// `spec, argc`; pushes the special's result.
    LineSpecResult = Arity::Fixed(2),

    SetLocalVar = Arity::Fixed(1),
    GetLocalVar = Arity::Fixed(1),
    AddLocalVar = Arity::Fixed(1),
    SubLocalVar = Arity::Fixed(1),
    MulLocalVar = Arity::Fixed(1),
    DivLocalVar = Arity::Fixed(1),
    ModLocalVar = Arity::Fixed(1),
    IncLocalVar = Arity::Fixed(1),
    DecLocalVar = Arity::Fixed(1),

    SetMapVar = Arity::Fixed(1),
    GetMapVar = Arity::Fixed(1),
    AddMapVar = Arity::Fixed(1),
    SubMapVar = Arity::Fixed(1),
    MulMapVar = Arity::Fixed(1),
    DivMapVar = Arity::Fixed(1),
    ModMapVar = Arity::Fixed(1),
    IncMapVar = Arity::Fixed(1),
    DecMapVar = Arity::Fixed(1),

    SetWorldVar = Arity::Fixed(1),
    GetWorldVar = Arity::Fixed(1),
    AddWorldVar = Arity::Fixed(1),
    SubWorldVar = Arity::Fixed(1),
    MulWorldVar = Arity::Fixed(1),
    DivWorldVar = Arity::Fixed(1),
    ModWorldVar = Arity::Fixed(1),
    IncWorldVar = Arity::Fixed(1),
    DecWorldVar = Arity::Fixed(1),

    SetGlobalVar = Arity::Fixed(1),
    GetGlobalVar = Arity::Fixed(1),
    AddGlobalVar = Arity::Fixed(1),
    SubGlobalVar = Arity::Fixed(1),
    MulGlobalVar = Arity::Fixed(1),
    DivGlobalVar = Arity::Fixed(1),
    ModGlobalVar = Arity::Fixed(1),
    IncGlobalVar = Arity::Fixed(1),
    DecGlobalVar = Arity::Fixed(1),

    SetMapArr = Arity::Fixed(1),
    GetMapArr = Arity::Fixed(1),
    AddMapArr = Arity::Fixed(1),
    SubMapArr = Arity::Fixed(1),
    MulMapArr = Arity::Fixed(1),
    DivMapArr = Arity::Fixed(1),
    ModMapArr = Arity::Fixed(1),
    IncMapArr = Arity::Fixed(1),
    DecMapArr = Arity::Fixed(1),

    SetWorldArr = Arity::Fixed(1),
    GetWorldArr = Arity::Fixed(1),
    AddWorldArr = Arity::Fixed(1),
    SubWorldArr = Arity::Fixed(1),
    MulWorldArr = Arity::Fixed(1),
    DivWorldArr = Arity::Fixed(1),
    ModWorldArr = Arity::Fixed(1),
    IncWorldArr = Arity::Fixed(1),
    DecWorldArr = Arity::Fixed(1),

    SetGlobalArr = Arity::Fixed(1),
    GetGlobalArr = Arity::Fixed(1),
    AddGlobalArr = Arity::Fixed(1),
    SubGlobalArr = Arity::Fixed(1),
    MulGlobalArr = Arity::Fixed(1),
    DivGlobalArr = Arity::Fixed(1),
    ModGlobalArr = Arity::Fixed(1),
    IncGlobalArr = Arity::Fixed(1),
    DecGlobalArr = Arity::Fixed(1),

    Add = Arity::Fixed(0),
    Sub = Arity::Fixed(0),
    Mul = Arity::Fixed(0),
    Div = Arity::Fixed(0),
    Mod = Arity::Fixed(0),
    MulFixed = Arity::Fixed(0),
    DivFixed = Arity::Fixed(0),
    And = Arity::Fixed(0),
    Or = Arity::Fixed(0),
    Xor = Arity::Fixed(0),
    Lsh = Arity::Fixed(0),
    Rsh = Arity::Fixed(0),
    Neg = Arity::Fixed(0),
    LogAnd = Arity::Fixed(0),
    LogOr = Arity::Fixed(0),
    LogNot = Arity::Fixed(0),
    CmpEq = Arity::Fixed(0),
    CmpNe = Arity::Fixed(0),
    CmpLt = Arity::Fixed(0),
    CmpGt = Arity::Fixed(0),
    CmpLe = Arity::Fixed(0),
    CmpGe = Arity::Fixed(0),

    Drop = Arity::Fixed(0),
    Dup = Arity::Fixed(0),
    Swap = Arity::Fixed(0),

    /// `target`
    Branch = Arity::Fixed(1),
    /// `target`; pops, branches when non-zero.
    BranchTrue = Arity::Fixed(1),
    /// `target`; pops, branches when zero.
    BranchFalse = Arity::Fixed(1),
    /// `value, target`; compares with the top of the stack.
    BranchCase = Arity::Fixed(2),
    /// `count, (value, target)×count`, sorted by value.
    BranchTable = Arity::Pairs,
    /// Branches to an instruction index popped from the stack.
    BranchStack = Arity::Fixed(0),

    Delay = Arity::Fixed(0),
    DelayImm = Arity::Fixed(1),
    ScriptWait = Arity::Fixed(0),
    ScriptWaitImm = Arity::Fixed(1),

    StartPrint = Arity::Fixed(0),
    PrintString = Arity::Fixed(0),
    PrintInt = Arity::Fixed(0),
    PrintChar = Arity::Fixed(0),
    PrintFixed = Arity::Fixed(0),
    PrintName = Arity::Fixed(0),

    TagString = Arity::Fixed(0),
    StrLen = Arity::Fixed(0),
    SetResult = Arity::Fixed(0),

    /// `function` (module-local index)
    Call = Arity::Fixed(1),
    CallDiscard = Arity::Fixed(1),
    ReturnVoid = Arity::Fixed(0),
    ReturnVal = Arity::Fixed(0),

    /// `argc, function`; arguments on the stack.
    CallFunc = Arity::Fixed(2),
    /// `function, argc, arg×argc`
    CallFuncImm = Arity::Trailing(1),

    /// `property`; actor TID on the stack.
    GetThingVar = Arity::Fixed(1),
}

impl Op {
    /// Decodes an opcode word.
    pub fn from_u32(v: u32) -> Option<Self> { Self::ALL.get(v as usize).copied() }

    /// Opcode word.
    pub const fn word(self) -> u32 { self as u32 }

    /// True for opcodes that carry instruction-index operands.
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Self::Branch | Self::BranchTrue | Self::BranchFalse | Self::BranchCase | Self::BranchTable
        )
    }
}
