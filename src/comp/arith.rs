//! Arithmetic components. Results wrap and are masked to the port width, so
//! none of these produce overflow diagnostics in normal operation.

use crate::bits::mask;
use crate::design::Design;
use crate::graph::{ComponentKey, PortKey};

/// A wrapping adder.
#[derive(Debug, Clone, Copy)]
pub struct Adder {
    pub comp: ComponentKey,
    pub a: PortKey,
    pub b: PortKey,
    pub out: PortKey,
}

impl Adder {
    pub fn new(d: &mut Design, parent: ComponentKey, name: &str, width: u32) -> Self {
        let comp = d.add_component(parent, name);
        let a = d.add_input(comp, "a", width);
        let b = d.add_input(comp, "b", width);
        let out = d.add_output_with(comp, "out", width, move |s| {
            Ok(s.uvalue(a).wrapping_add(s.uvalue(b)) & mask(width))
        });
        Self { comp, a, b, out }
    }
}

/// A wrapping subtractor.
#[derive(Debug, Clone, Copy)]
pub struct Subtractor {
    pub comp: ComponentKey,
    pub a: PortKey,
    pub b: PortKey,
    pub out: PortKey,
}

impl Subtractor {
    pub fn new(d: &mut Design, parent: ComponentKey, name: &str, width: u32) -> Self {
        let comp = d.add_component(parent, name);
        let a = d.add_input(comp, "a", width);
        let b = d.add_input(comp, "b", width);
        let out = d.add_output_with(comp, "out", width, move |s| {
            Ok(s.uvalue(a).wrapping_sub(s.uvalue(b)) & mask(width))
        });
        Self { comp, a, b, out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::wiring::Constant;

    fn eval2(
        build: impl FnOnce(&mut Design, ComponentKey) -> (PortKey, PortKey, PortKey),
        a: u64,
        b: u64,
        width: u32,
    ) -> u64 {
        let mut d = Design::new("arith");
        let root = d.root();
        let (pa, pb, out) = build(&mut d, root);
        let ca = Constant::new(&mut d, root, "a", a, width).unwrap();
        let cb = Constant::new(&mut d, root, "b", b, width).unwrap();
        d.connect(ca.out, pa).unwrap();
        d.connect(cb.out, pb).unwrap();
        d.verify().unwrap();
        d.uvalue(out)
    }

    #[test]
    fn test_adder_exhaustive() {
        // All 4-bit pairs.
        for a in 0..16 {
            for b in 0..16 {
                let sum = eval2(
                    |d, r| { let g = Adder::new(d, r, "add", 4); (g.a, g.b, g.out) },
                    a, b, 4,
                );
                assert_eq!(sum, (a + b) & 0xF, "Adder failed for A={a}, B={b}");
            }
        }
    }

    #[test]
    fn test_subtractor_exhaustive() {
        for a in 0..16 {
            for b in 0..16 {
                let diff = eval2(
                    |d, r| { let g = Subtractor::new(d, r, "sub", 4); (g.a, g.b, g.out) },
                    a, b, 4,
                );
                assert_eq!(diff, a.wrapping_sub(b) & 0xF, "Subtractor failed for A={a}, B={b}");
            }
        }
    }

    #[test]
    fn test_full_width_wrap() {
        let sum = eval2(
            |d, r| { let g = Adder::new(d, r, "add", 64); (g.a, g.b, g.out) },
            u64::MAX, 1, 64,
        );
        assert_eq!(sum, 0, "64-bit addition wraps without overflowing");
    }
}
