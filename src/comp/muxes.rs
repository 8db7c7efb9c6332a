//! Multiplexers.

use std::marker::PhantomData;

use crate::bits::ceil_log2;
use crate::design::Design;
use crate::error::SimError;
use crate::graph::{ComponentKey, GraphicsType, PortKey};

/// An N-input multiplexer of width W. The selector is `ceil_log2(N)` bits
/// wide; a selector value with no matching input is an evaluation error, not
/// a silent zero.
#[derive(Debug, Clone)]
pub struct Multiplexer {
    pub comp: ComponentKey,
    pub select: PortKey,
    pub ins: Vec<PortKey>,
    pub out: PortKey,
}

impl Multiplexer {
    pub fn new(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        n_inputs: u32,
        width: u32,
    ) -> Self {
        let n_inputs = n_inputs.max(1);
        let comp = d.add_component_with_type(parent, name, GraphicsType::Multiplexer);
        let select = d.add_input(comp, "select", ceil_log2(u64::from(n_inputs)));
        let ins: Vec<_> = (0..n_inputs)
            .map(|i| d.add_input(comp, &format!("in_{i}"), width))
            .collect();
        let keys = ins.clone();
        let cname = name.to_string();
        let out = d.add_output_with(comp, "out", width, move |s| {
            let sel = s.uvalue(select);
            let &input = keys.get(sel as usize).ok_or_else(|| SimError::IndexOutOfRange {
                component: cname.clone(),
                index: sel,
                len: keys.len() as u64,
            })?;
            Ok(s.uvalue(input))
        });
        d.set_special_port(comp, "select", select);
        Self { comp, select, ins, out }
    }

    /// The data input for selector value `idx`.
    pub fn get(&self, d: &Design, idx: u32) -> Result<PortKey, SimError> {
        self.ins
            .get(idx as usize)
            .copied()
            .ok_or_else(|| SimError::IndexOutOfRange {
                component: d.component(self.comp).name().to_string(),
                index: u64::from(idx),
                len: self.ins.len() as u64,
            })
    }

    /// Data inputs that have not been connected yet.
    pub fn others(&self, d: &Design) -> Vec<PortKey> {
        self.ins
            .iter()
            .copied()
            .filter(|&p| d.port(p).source().is_none())
            .collect()
    }
}

/// Translates a user enum into multiplexer selector values.
///
/// `COUNT` is the number of enum values; `from_select` maps a selector value
/// to the enum (or `None` for a value with no meaning), and `index` maps an
/// enum value to its dense input position.
pub trait SelectEnum: Copy {
    const COUNT: u32;
    /// Bits of the selector port. Wide enough for any discriminant; dense
    /// enums can keep the default.
    const SELECT_WIDTH: u32 = ceil_log2(Self::COUNT as u64);

    fn from_select(value: u64) -> Option<Self>;
    fn index(self) -> usize;
}

/// A multiplexer whose inputs are addressed by an enum. The selector width
/// and input count are inferred from the enum; a selector value that maps to
/// no enum value raises [`SimError::IndexOutOfRange`] at evaluation.
#[derive(Debug, Clone)]
pub struct EnumMultiplexer<E: SelectEnum> {
    pub comp: ComponentKey,
    pub select: PortKey,
    pub ins: Vec<PortKey>,
    pub out: PortKey,
    _marker: PhantomData<E>,
}

impl<E: SelectEnum + Send + 'static> EnumMultiplexer<E> {
    pub fn new(d: &mut Design, parent: ComponentKey, name: &str, width: u32) -> Self {
        let comp = d.add_component_with_type(parent, name, GraphicsType::Multiplexer);
        let select = d.add_input(comp, "select", E::SELECT_WIDTH);
        let ins: Vec<_> = (0..E::COUNT)
            .map(|i| d.add_input(comp, &format!("in_{i}"), width))
            .collect();
        let keys = ins.clone();
        let cname = name.to_string();
        let out = d.add_output_with(comp, "out", width, move |s| {
            let sel = s.uvalue(select);
            let value = E::from_select(sel).ok_or_else(|| SimError::IndexOutOfRange {
                component: cname.clone(),
                index: sel,
                len: u64::from(E::COUNT),
            })?;
            Ok(s.uvalue(keys[value.index()]))
        });
        d.set_special_port(comp, "select", select);
        Self { comp, select, ins, out, _marker: PhantomData }
    }

    /// The data input associated with an enum value.
    pub fn get(&self, value: E) -> PortKey {
        self.ins[value.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::wiring::Constant;

    #[test]
    fn test_mux_selects_each_input() {
        for sel in 0..4 {
            let mut d = Design::new("mux");
            let root = d.root();
            let mux = Multiplexer::new(&mut d, root, "mux", 4, 8);
            for (i, value) in [11, 22, 33, 44].into_iter().enumerate() {
                d.tie_constant(mux.ins[i], value).unwrap();
            }
            d.tie_constant(mux.select, sel).unwrap();
            d.verify().unwrap();
            assert_eq!(
                d.uvalue(mux.out),
                [11, 22, 33, 44][sel as usize],
                "Mux with selector {sel} should forward input {sel}"
            );
        }
    }

    #[test]
    fn test_mux_select_width() {
        let mut d = Design::new("mux");
        let root = d.root();
        let mux3 = Multiplexer::new(&mut d, root, "m3", 3, 8);
        let mux4 = Multiplexer::new(&mut d, root, "m4", 4, 8);
        let mux5 = Multiplexer::new(&mut d, root, "m5", 5, 8);
        assert_eq!(d.port(mux3.select).width(), 2);
        assert_eq!(d.port(mux4.select).width(), 2);
        assert_eq!(d.port(mux5.select).width(), 3);
    }

    #[test]
    fn test_mux_out_of_range_selector_fails() {
        // Three inputs leave selector value 3 unmapped.
        let mut d = Design::new("mux");
        let root = d.root();
        let mux = Multiplexer::new(&mut d, root, "mux", 3, 8);
        for (i, value) in [1, 2, 3].into_iter().enumerate() {
            d.tie_constant(mux.ins[i], value).unwrap();
        }
        d.tie_constant(mux.select, 3).unwrap();
        assert_eq!(
            d.verify(),
            Err(SimError::IndexOutOfRange { component: "mux".into(), index: 3, len: 3 })
        );
    }

    #[test]
    fn test_mux_get_bounds() {
        let mut d = Design::new("mux");
        let root = d.root();
        let mux = Multiplexer::new(&mut d, root, "mux", 4, 8);
        assert_eq!(mux.get(&d, 3).unwrap(), mux.ins[3]);
        assert!(matches!(
            mux.get(&d, 4),
            Err(SimError::IndexOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn test_mux_others_lists_unbound_inputs() {
        let mut d = Design::new("mux");
        let root = d.root();
        let mux = Multiplexer::new(&mut d, root, "mux", 4, 8);
        let c = Constant::new(&mut d, root, "c", 9, 8).unwrap();
        d.connect(c.out, mux.ins[1]).unwrap();
        assert_eq!(mux.others(&d), vec![mux.ins[0], mux.ins[2], mux.ins[3]]);
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum AluOp {
        Add,
        Sub,
        Pass,
    }

    impl SelectEnum for AluOp {
        const COUNT: u32 = 3;

        fn from_select(value: u64) -> Option<Self> {
            match value {
                0 => Some(AluOp::Add),
                1 => Some(AluOp::Sub),
                2 => Some(AluOp::Pass),
                _ => None,
            }
        }

        fn index(self) -> usize {
            self as usize
        }
    }

    #[test]
    fn test_enum_mux_selects_by_enum() {
        let mut d = Design::new("enum_mux");
        let root = d.root();
        let mux = EnumMultiplexer::<AluOp>::new(&mut d, root, "op", 8);
        d.tie_constant(mux.get(AluOp::Add), 10).unwrap();
        d.tie_constant(mux.get(AluOp::Sub), 20).unwrap();
        d.tie_constant(mux.get(AluOp::Pass), 30).unwrap();
        d.tie_constant(mux.select, 1).unwrap();
        d.verify().unwrap();
        assert_eq!(d.uvalue(mux.out), 20);
    }

    #[test]
    fn test_enum_mux_unknown_selector_fails() {
        let mut d = Design::new("enum_mux");
        let root = d.root();
        let mux = EnumMultiplexer::<AluOp>::new(&mut d, root, "op", 8);
        for (value, constant) in [(AluOp::Add, 1), (AluOp::Sub, 2), (AluOp::Pass, 3)] {
            d.tie_constant(mux.get(value), constant).unwrap();
        }
        d.tie_constant(mux.select, 3).unwrap();
        assert!(
            matches!(d.verify(), Err(SimError::IndexOutOfRange { index: 3, .. })),
            "An unmapped enum selector raises IndexOutOfRange, not silent zero"
        );
    }
}
