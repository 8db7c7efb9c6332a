//! The register: the basic clocked element breaking combinational cycles.

use std::collections::VecDeque;

use crate::bits::mask;
use crate::design::Design;
use crate::graph::{ComponentKey, GraphicsType, PortKey};
use crate::state::{RegisterSync, SyncState};

/// An edge-triggered register with a load enable.
///
/// The output holds the saved value for the whole cycle; on a clock tick the
/// previous output is pushed onto the reverse stack and, if `enable` is
/// high, `data_in` is latched.
#[derive(Debug, Clone, Copy)]
pub struct Register {
    pub comp: ComponentKey,
    pub data_in: PortKey,
    pub enable: PortKey,
    pub data_out: PortKey,
}

impl Register {
    /// A register initialized to zero.
    pub fn new(d: &mut Design, parent: ComponentKey, name: &str, width: u32) -> Self {
        Self::with_initial(d, parent, name, width, 0)
    }

    /// A register taking `initial` at initialization and reset.
    pub fn with_initial(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        width: u32,
        initial: u64,
    ) -> Self {
        let comp = d.add_component_with_type(parent, name, GraphicsType::Register);
        let data_in = d.add_input(comp, "data_in", width);
        let enable = d.add_input(comp, "enable", 1);
        let data_out = d.add_output_with(comp, "data_out", width, move |s| Ok(s.saved(comp)));

        let initial = initial & mask(width);
        d.register_synchronous(
            comp,
            RegisterSync { data_in, enable, width }.into(),
            SyncState::Register { saved: initial, initial, stack: VecDeque::new() },
        );
        Self { comp, data_in, enable, data_out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comp::wiring::Constant;

    #[test]
    fn test_register_latches_on_clock() {
        let mut d = Design::new("reg");
        let root = d.root();
        let reg = Register::new(&mut d, root, "r", 8);
        let c = Constant::new(&mut d, root, "c", 0xAB, 8).unwrap();
        d.connect(c.out, reg.data_in).unwrap();
        d.tie_constant(reg.enable, 1).unwrap();
        d.verify().unwrap();

        assert_eq!(d.uvalue(reg.data_out), 0);
        d.clock().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0xAB, "The input appears after the edge");
    }

    #[test]
    fn test_register_initial_value() {
        let mut d = Design::new("reg");
        let root = d.root();
        let reg = Register::with_initial(&mut d, root, "r", 8, 0x7F);
        let c = Constant::new(&mut d, root, "c", 0, 8).unwrap();
        d.connect(c.out, reg.data_in).unwrap();
        d.tie_constant(reg.enable, 0).unwrap();
        d.verify().unwrap();

        assert_eq!(d.uvalue(reg.data_out), 0x7F);
        d.clock().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0x7F, "Enable low holds the initial value");
        d.reset().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0x7F, "Reset restores the initial value");
    }

    #[test]
    fn test_register_is_synchronous() {
        let mut d = Design::new("reg");
        let root = d.root();
        let reg = Register::new(&mut d, root, "r", 8);
        assert!(d.component(reg.comp).is_synchronous());
        assert_eq!(d.synchronous_components(), &[reg.comp]);
        assert_eq!(d.component(reg.comp).graphics_type(), GraphicsType::Register);
    }
}
