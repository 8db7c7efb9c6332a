//! The primitive component library.
//!
//! Every primitive is a constructor that registers a component, its ports
//! and its value functions into a [`Design`](crate::design::Design) and
//! returns a small struct of public keys for wiring. The engine itself only
//! sees the resulting graph; nothing here is special-cased by the
//! propagation algorithm beyond the clocked capability set.

pub use arith::{Adder, Subtractor};
pub use gates::{And, Nand, Nor, Not, Or, Xnor, Xor};
pub use memory::{MemoryAsyncRd, MemorySyncRd, RdMemory, Rom, WrMemory};
pub use muxes::{EnumMultiplexer, Multiplexer, SelectEnum};
pub use register::Register;
pub use wiring::Constant;

pub mod arith;
pub mod gates;
pub mod memory;
pub mod muxes;
pub mod register;
pub mod wiring;
