//! Input-less components: constants and parameter sources.

use crate::bits::{bits_to_represent_unsigned, value_fits_in_width};
use crate::design::Design;
use crate::error::SimError;
use crate::graph::{ComponentKey, GraphicsType, PortKey};

/// A constant. Propagates its value once at initialization and stays
/// propagated across clock ticks.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    pub comp: ComponentKey,
    pub out: PortKey,
}

impl Constant {
    /// Creates a constant of an explicit width. The value must fit.
    pub fn new(
        d: &mut Design,
        parent: ComponentKey,
        name: &str,
        value: u64,
        width: u32,
    ) -> Result<Self, SimError> {
        if !value_fits_in_width(value, width) {
            return Err(SimError::ValueTooWide { value, width });
        }
        let comp = d.add_component_with_type(parent, name, GraphicsType::Constant);
        let out = d.add_output_with(comp, "out", width, move |_| Ok(value));
        Ok(Self { comp, out })
    }

    /// Creates a constant just wide enough to hold `value`.
    pub fn auto(d: &mut Design, parent: ComponentKey, name: &str, value: u64) -> Self {
        let width = bits_to_represent_unsigned(value);
        Self::new(d, parent, name, value, width).expect("width was derived from the value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_value_and_width() {
        let mut d = Design::new("constants");
        let root = d.root();
        let c = Constant::new(&mut d, root, "c", 0x2A, 8).unwrap();
        d.verify().unwrap();
        assert_eq!(d.uvalue(c.out), 0x2A);
        assert_eq!(d.port(c.out).width(), 8);
        assert!(d.is_constant(c.out));
    }

    #[test]
    fn test_constant_must_fit() {
        let mut d = Design::new("constants");
        let root = d.root();
        assert_eq!(
            Constant::new(&mut d, root, "c", 0x100, 8).err(),
            Some(SimError::ValueTooWide { value: 0x100, width: 8 })
        );
    }

    #[test]
    fn test_auto_width() {
        let mut d = Design::new("constants");
        let root = d.root();
        let c = Constant::auto(&mut d, root, "c", 1000);
        assert_eq!(d.port(c.out).width(), 10);
        let zero = Constant::auto(&mut d, root, "z", 0);
        assert_eq!(d.port(zero.out).width(), 1, "Zero still occupies one bit");
    }

    #[test]
    fn test_constant_survives_clock_ticks() {
        let mut d = Design::new("constants");
        let root = d.root();
        let c = Constant::new(&mut d, root, "c", 7, 4).unwrap();
        d.verify().unwrap();
        d.clock().unwrap();
        d.clock().unwrap();
        assert_eq!(d.uvalue(c.out), 7);
        assert!(d.is_constant(c.out), "Constants stay propagated across ticks");
    }
}
