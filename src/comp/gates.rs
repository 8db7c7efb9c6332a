//! Logic gates.

use crate::bits::mask;
use crate::design::Design;
use crate::graph::{ComponentKey, PortKey};

/// Minimum number of inputs for multi-input logic gates.
pub const MIN_GATE_INPUTS: u32 = 2;
/// Maximum number of inputs for multi-input logic gates.
pub const MAX_GATE_INPUTS: u32 = 64;

macro_rules! gates {
    ($($(#[$m:meta])* $Id:ident: $fold:expr, $invert:literal),*$(,)?) => {
        $(
            $(#[$m])*
            #[derive(Debug, Clone)]
            pub struct $Id {
                pub comp: ComponentKey,
                pub ins: Vec<PortKey>,
                pub out: PortKey,
            }
            impl $Id {
                /// Creates the gate with the given number of inputs and width.
                pub fn new(
                    d: &mut Design,
                    parent: ComponentKey,
                    name: &str,
                    n_inputs: u32,
                    width: u32,
                ) -> Self {
                    let n_inputs = n_inputs.clamp(MIN_GATE_INPUTS, MAX_GATE_INPUTS);
                    let comp = d.add_component(parent, name);
                    let ins: Vec<_> = (0..n_inputs)
                        .map(|i| d.add_input(comp, &format!("in_{i}"), width))
                        .collect();
                    let keys = ins.clone();
                    let out = d.add_output_with(comp, "out", width, move |s| {
                        let fold: fn(u64, u64) -> u64 = $fold;
                        let value = keys.iter()
                            .map(|&k| s.uvalue(k))
                            .reduce(fold)
                            .unwrap_or(0);
                        Ok(if $invert { !value & mask(width) } else { value })
                    });
                    Self { comp, ins, out }
                }
            }
        )*
    }
}

gates! {
    /// An N-input AND gate.
    And:  |a, b| a & b, false,
    /// An N-input OR gate.
    Or:   |a, b| a | b, false,
    /// An N-input XOR gate.
    Xor:  |a, b| a ^ b, false,
    /// An N-input NAND gate.
    Nand: |a, b| a & b, true,
    /// An N-input NOR gate.
    Nor:  |a, b| a | b, true,
    /// An N-input XNOR gate.
    Xnor: |a, b| a ^ b, true,
}

/// An inverter.
#[derive(Debug, Clone, Copy)]
pub struct Not {
    pub comp: ComponentKey,
    pub input: PortKey,
    pub out: PortKey,
}

impl Not {
    pub fn new(d: &mut Design, parent: ComponentKey, name: &str, width: u32) -> Self {
        let comp = d.add_component(parent, name);
        let input = d.add_input(comp, "in", width);
        let out = d.add_output_with(comp, "out", width, move |s| {
            Ok(!s.uvalue(input) & mask(width))
        });
        Self { comp, input, out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::wiring::Constant;

    fn gate_output(
        build: impl FnOnce(&mut Design, ComponentKey) -> (Vec<PortKey>, PortKey),
        inputs: &[u64],
        width: u32,
    ) -> u64 {
        let mut d = Design::new("gates");
        let root = d.root();
        let (ins, out) = build(&mut d, root);
        for (i, (&port, &value)) in std::iter::zip(&ins, inputs).enumerate() {
            let c = Constant::new(&mut d, root, &format!("c{i}"), value, width).unwrap();
            d.connect(c.out, port).unwrap();
        }
        d.verify().unwrap();
        d.uvalue(out)
    }

    #[test]
    fn test_and_or_xor() {
        let a = 0b1100;
        let b = 0b1010;
        let and = gate_output(|d, r| { let g = And::new(d, r, "and", 2, 4); (g.ins, g.out) }, &[a, b], 4);
        let or = gate_output(|d, r| { let g = Or::new(d, r, "or", 2, 4); (g.ins, g.out) }, &[a, b], 4);
        let xor = gate_output(|d, r| { let g = Xor::new(d, r, "xor", 2, 4); (g.ins, g.out) }, &[a, b], 4);
        assert_eq!(and, a & b);
        assert_eq!(or, a | b);
        assert_eq!(xor, a ^ b);
    }

    #[test]
    fn test_inverted_gates_mask_to_width() {
        let a = 0b1100;
        let b = 0b1010;
        let nand = gate_output(|d, r| { let g = Nand::new(d, r, "g", 2, 4); (g.ins, g.out) }, &[a, b], 4);
        let nor = gate_output(|d, r| { let g = Nor::new(d, r, "g", 2, 4); (g.ins, g.out) }, &[a, b], 4);
        let xnor = gate_output(|d, r| { let g = Xnor::new(d, r, "g", 2, 4); (g.ins, g.out) }, &[a, b], 4);
        assert_eq!(nand, !(a & b) & 0xF, "Inversion must not leak past the width");
        assert_eq!(nor, !(a | b) & 0xF);
        assert_eq!(xnor, !(a ^ b) & 0xF);
    }

    #[test]
    fn test_wide_fan_in() {
        let inputs = [0b0001, 0b0011, 0b0111];
        let and = gate_output(|d, r| { let g = And::new(d, r, "g", 3, 4); (g.ins, g.out) }, &inputs, 4);
        let or = gate_output(|d, r| { let g = Or::new(d, r, "g", 3, 4); (g.ins, g.out) }, &inputs, 4);
        assert_eq!(and, 0b0001, "AND folds across all three inputs");
        assert_eq!(or, 0b0111);
    }

    #[test]
    fn test_not() {
        let mut d = Design::new("not");
        let root = d.root();
        let n = Not::new(&mut d, root, "n", 8);
        let c = Constant::new(&mut d, root, "c", 0x0F, 8).unwrap();
        d.connect(c.out, n.input).unwrap();
        d.verify().unwrap();
        assert_eq!(d.uvalue(n.out), 0xF0);
        assert!(d.diagnostics().is_empty(), "Inversion is masked inside the gate");
    }

    #[test]
    fn test_gate_input_count_is_clamped() {
        let mut d = Design::new("clamp");
        let root = d.root();
        let g = And::new(&mut d, root, "g", 1, 4);
        assert_eq!(g.ins.len(), MIN_GATE_INPUTS as usize);
    }
}
