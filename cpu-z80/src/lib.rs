//! Z80 CPU emulator.
//!
//! Each call to `step()` executes exactly one instruction and returns its
//! T-state cost. Guest software on the calculator boards counts on exact
//! costs (grayscale is produced by timed LCD flicker), so every handler
//! returns the documented cycle count for the decoded operand form.

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, X3F, X5F, ZF};
pub use registers::Registers;
