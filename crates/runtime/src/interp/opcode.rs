//! Opcodes
//!
//! `spec.md` §4.4 gives a non-exhaustive overview of the opcode set;
//! `spec.md` §6 notes "the precise opcode numbering is an implementation
//! choice; producers and consumers must agree" and explicitly places
//! bytecode binary-format compatibility out of scope. We enumerate every
//! opcode `spec.md` names, as a Rust enum rather than as raw bytes — the
//! producer side (the compiler) is out of scope (`spec.md` §1), so nothing
//! here needs to match any historical encoding.

use alore_core::Value;

/// Operands are fixed-width immediates embedded after the opcode
/// (`spec.md` §4.4). We model that as typed fields on each variant instead
/// of a separate immediate stream, since the producer/consumer format
/// itself isn't specified.
#[derive(Debug, Clone)]
pub enum Opcode {
    // -- Moves --------------------------------------------------------
    ConstToLocal { dst: u32, value: Value },
    LocalToLocal { dst: u32, src: u32 },
    GlobalToLocal { dst: u32, global: u32 },
    LocalToGlobal { global: u32, src: u32, barriered: bool },
    NilToLocal { dst: u32 },
    MemberToLocal { dst: u32, receiver: u32, member: u32 },
    LocalToMember { receiver: u32, member: u32, src: u32 },
    JumpOffsetToLocal { dst: u32, offset: i32 },

    // -- Arithmetic -----------------------------------------------------
    Add { dst: u32, lhs: u32, rhs: u32 },
    Sub { dst: u32, lhs: u32, rhs: u32 },
    Mul { dst: u32, lhs: u32, rhs: u32 },
    Div { dst: u32, lhs: u32, rhs: u32 },
    IDiv { dst: u32, lhs: u32, rhs: u32 },
    Mod { dst: u32, lhs: u32, rhs: u32 },
    Pow { dst: u32, lhs: u32, rhs: u32 },
    Neg { dst: u32, src: u32 },

    // -- Comparisons and branches ----------------------------------------
    Eq { dst: u32, lhs: u32, rhs: u32 },
    Neq { dst: u32, lhs: u32, rhs: u32 },
    Lt { dst: u32, lhs: u32, rhs: u32 },
    Lte { dst: u32, lhs: u32, rhs: u32 },
    Gt { dst: u32, lhs: u32, rhs: u32 },
    Gte { dst: u32, lhs: u32, rhs: u32 },
    In { dst: u32, lhs: u32, rhs: u32 },
    Is { dst: u32, lhs: u32, rhs: u32 },
    IsNot { dst: u32, lhs: u32, rhs: u32 },
    BranchIfTrue { cond: u32, offset: i32 },

    // -- Container ops ----------------------------------------------------
    ArrayGet { dst: u32, array: u32, index: u32 },
    ArraySet { array: u32, index: u32, value: u32 },
    Slice { dst: u32, base: u32, start: u32, stop: u32 },

    // -- Calls ------------------------------------------------------------
    CallLocal { dst: u32, callee: u32, args: Vec<u32> },
    CallGlobal { dst: u32, global: u32, args: Vec<u32> },
    CallMember { dst: u32, receiver: u32, member: u32, args: Vec<u32> },

    // -- Flow ---------------------------------------------------------------
    Jump { offset: i32 },
    ForInit { dst_iter: u32, iterable: u32 },
    ForLoop { iter: u32, dst_item: u32, offset: i32 },
    Try { handler_offset: i32 },
    TryEnd,
    LeaveFinally { state_slot: u32 },
    RaiseLocal { exc: u32 },
    Ret,
    RetLocal { src: u32 },

    // -- Sequence construction -----------------------------------------
    CreateArray { dst: u32, elements: Vec<u32> },
    CreateTuple { dst: u32, elements: Vec<u32> },
    Expand { sources: u32, dsts: Vec<u32> },

    // -- Closures -----------------------------------------------------
    CreateExposed { dst: u32, src: u32 },
    CreateAnon { dst: u32, function_global: u32, captured_cells: Vec<u32> },
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Opcode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_constructs_and_matches() {
        let i = Instruction {
            op: Opcode::Add { dst: 0, lhs: 1, rhs: 2 },
        };
        match i.op {
            Opcode::Add { dst, lhs, rhs } => {
                assert_eq!((dst, lhs, rhs), (0, 1, 2));
            }
            _ => panic!("wrong variant"),
        }
    }
}
