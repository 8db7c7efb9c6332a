//! The design: root of the component hierarchy and orchestration of
//! verify/initialize/clock/reverse/reset.
//!
//! A [`Design`] owns the structure ([`SimGraph`]) and the simulation state
//! ([`SimState`]) of one circuit, together with the global cycle counter, the
//! reverse-stack capacity, observer lists and the runtime diagnostics
//! channel. Every public call runs to completion on the calling thread;
//! nothing here may be invoked re-entrantly from a value function.

use slotmap::SecondaryMap;
use tracing::{debug, warn};

use crate::bits::{BitVector, mask};
use crate::comp::wiring::Constant;
use crate::error::{OverflowDiagnostic, SimError};
use crate::graph::{
    ComponentKey, ComponentNode, GraphicsType, PortDirection, PortKey, PortNode, SimGraph, ValueFn,
};
use crate::state::{EvalScope, FloodEvents, PropagationState, SimState, SyncFn, SyncState};

/// Default number of clock cycles that can be reversed.
pub const DEFAULT_REVERSE_STACK_CAPACITY: usize = 100;

type ComponentObserver = Box<dyn FnMut() + Send>;
type PortObserver = Box<dyn FnMut(BitVector) + Send>;

/// The root of a simulated circuit.
pub struct Design {
    graph: SimGraph,
    state: SimState,
    root: ComponentKey,
    clock_count: u64,
    reverse_capacity: usize,
    initialized: bool,
    comp_observers: SecondaryMap<ComponentKey, Vec<ComponentObserver>>,
    port_observers: SecondaryMap<PortKey, Vec<PortObserver>>,
    diagnostics: Vec<OverflowDiagnostic>,
}

impl Design {
    pub fn new(name: &str) -> Self {
        let mut graph = SimGraph::new();
        let root = graph.add_component(None, name, GraphicsType::Component);
        Self {
            graph,
            state: SimState::default(),
            root,
            clock_count: 0,
            reverse_capacity: DEFAULT_REVERSE_STACK_CAPACITY,
            initialized: false,
            comp_observers: SecondaryMap::new(),
            port_observers: SecondaryMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// The root component (the design itself).
    pub fn root(&self) -> ComponentKey {
        self.root
    }

    // ---------------------------------------------------------------- build

    /// Adds a sub-component under `parent`.
    pub fn add_component(&mut self, parent: ComponentKey, name: &str) -> ComponentKey {
        self.add_component_with_type(parent, name, GraphicsType::Component)
    }

    /// Adds a sub-component with an explicit glyph class.
    pub fn add_component_with_type(
        &mut self,
        parent: ComponentKey,
        name: &str,
        graphics: GraphicsType,
    ) -> ComponentKey {
        self.graph.add_component(Some(parent), name, graphics)
    }

    /// Appends an input port to `comp`. A width of zero means "set later"
    /// (see [`Design::set_port_width`]); verification rejects it if it is
    /// still unset.
    pub fn add_input(&mut self, comp: ComponentKey, name: &str, width: u32) -> PortKey {
        self.graph
            .add_port(comp, name, PortDirection::Input, width.min(BitVector::MAX_WIDTH), None)
    }

    /// Appends an output port to `comp` whose value arrives over a
    /// connection (typically from a sub-component's output).
    pub fn add_output(&mut self, comp: ComponentKey, name: &str, width: u32) -> PortKey {
        self.graph
            .add_port(comp, name, PortDirection::Output, width.min(BitVector::MAX_WIDTH), None)
    }

    /// Appends an output port to `comp` computed by the given value
    /// function. The function must be pure: it may read, through the
    /// [`EvalScope`], the values of `comp`'s input ports and of the outputs
    /// of `comp`'s direct sub-components, and nothing else.
    pub fn add_output_with<F>(
        &mut self,
        comp: ComponentKey,
        name: &str,
        width: u32,
        func: F,
    ) -> PortKey
    where
        F: Fn(&EvalScope<'_>) -> Result<u64, SimError> + Send + 'static,
    {
        self.graph.add_port(
            comp,
            name,
            PortDirection::Output,
            width.min(BitVector::MAX_WIDTH),
            Some(Box::new(func)),
        )
    }

    /// Installs a value function on an existing output port. Used when the
    /// function must capture the port's own key (e.g. a synchronous read
    /// port holding its previous value).
    pub fn set_value_fn<F>(&mut self, port: PortKey, func: F)
    where
        F: Fn(&EvalScope<'_>) -> Result<u64, SimError> + Send + 'static,
    {
        self.graph[port].func = Some(Box::new(func) as ValueFn);
    }

    /// Sets the width of a dynamically-widthed port.
    pub fn set_port_width(&mut self, port: PortKey, width: u32) {
        self.graph[port].width = width.min(BitVector::MAX_WIDTH);
    }

    /// Connects `from` as the single source of `to`. Widths are checked at
    /// verification time.
    pub fn connect(&mut self, from: PortKey, to: PortKey) -> Result<(), SimError> {
        self.graph.connect(from, to)
    }

    /// Creates a constant sized to `port`'s width and connects it, returning
    /// the constant's component. The constant is created as a sibling of the
    /// port's component.
    pub fn tie_constant(&mut self, port: PortKey, value: u64) -> Result<ComponentKey, SimError> {
        let width = self.graph[port].width();
        let owner = self.graph[port].parent();
        if width == 0 {
            return Err(SimError::ZeroWidth {
                component: self.graph[owner].name().to_string(),
                port: self.graph[port].name().to_string(),
            });
        }
        let parent = self.graph[owner].parent().unwrap_or(owner);
        let constant = Constant::new(self, parent, &format!("const_{value}"), value, width)?;
        self.connect(constant.out, port)?;
        Ok(constant.comp)
    }

    /// Marks a port as having a layout meaning for the visual layer.
    pub fn set_special_port(&mut self, comp: ComponentKey, name: &str, port: PortKey) {
        self.graph[comp].special_ports.push((name.to_string(), port));
    }

    /// Registers the clocked capability and state of a component. The
    /// primitive library is the only intended caller.
    pub(crate) fn register_synchronous(
        &mut self,
        comp: ComponentKey,
        sync: SyncFn,
        state: SyncState,
    ) {
        self.graph.register_synchronous(comp, sync);
        self.state.sync_states.insert(comp, state);
    }

    // ---------------------------------------------------------- introspect

    pub fn graph(&self) -> &SimGraph {
        &self.graph
    }

    pub fn component(&self, key: ComponentKey) -> &ComponentNode {
        &self.graph[key]
    }

    pub fn port(&self, key: PortKey) -> &PortNode {
        &self.graph[key]
    }

    /// Every clocked component, in declaration order.
    pub fn synchronous_components(&self) -> &[ComponentKey] {
        &self.graph.clocked
    }

    /// The currently-cached value of a port.
    pub fn value(&self, port: PortKey) -> BitVector {
        BitVector::new(self.state.value(port), self.graph[port].width())
    }

    /// The currently-cached value of a port as an unsigned integer.
    pub fn uvalue(&self, port: PortKey) -> u64 {
        self.state.value(port)
    }

    /// The currently-cached value of a port, sign-extended from its width.
    pub fn svalue(&self, port: PortKey) -> i64 {
        self.value(port).svalue()
    }

    /// Whether a port carries a constant value (it is only fed by input-less
    /// components and keeps its value across clock ticks).
    pub fn is_constant(&self, port: PortKey) -> bool {
        self.state.port_state(port) == PropagationState::Constant
    }

    // ----------------------------------------------------------- observers

    /// Subscribes to a component's `changed` signal, fired after its outputs
    /// were recomputed — at most once per clock tick.
    pub fn observe_component<F>(&mut self, comp: ComponentKey, observer: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.comp_observers
            .entry(comp)
            .expect("component key is live")
            .or_insert_with(Vec::new)
            .push(Box::new(observer));
    }

    /// Subscribes to a port's value changes.
    pub fn observe_port<F>(&mut self, port: PortKey, observer: F)
    where
        F: FnMut(BitVector) + Send + 'static,
    {
        self.port_observers
            .entry(port)
            .expect("port key is live")
            .or_insert_with(Vec::new)
            .push(Box::new(observer));
    }

    /// Runtime anomalies recorded since the last [`Design::clear_diagnostics`].
    pub fn diagnostics(&self) -> &[OverflowDiagnostic] {
        &self.diagnostics
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    // ------------------------------------------------------- orchestration

    /// Verifies the design and brings it to its initial state.
    ///
    /// Structural checks (connectivity, widths) run first; the initial
    /// propagation then doubles as the combinational-cycle check: a
    /// component the flood cannot reach sits on a cycle that does not pass
    /// through any clocked element.
    pub fn verify(&mut self) -> Result<(), SimError> {
        self.verify_structure()?;
        self.initialize()
    }

    fn verify_structure(&self) -> Result<(), SimError> {
        for &comp in &self.graph.order {
            let node = &self.graph[comp];
            for &key in node.inputs.iter().chain(&node.outputs) {
                let port = &self.graph[key];
                let err = |make: fn(String, String) -> SimError| {
                    make(node.name().to_string(), port.name().to_string())
                };
                if port.width() == 0 {
                    return Err(err(|component, port| SimError::ZeroWidth { component, port }));
                }
                // Inputs need a source; outputs need a value function or an
                // incoming connection, or they can never produce a value.
                if !port.is_connected() {
                    return Err(err(|component, port| SimError::UnconnectedInput {
                        component,
                        port,
                    }));
                }
                if let Some(source) = port.source() {
                    let source_width = self.graph[source].width();
                    if source_width != port.width() {
                        return Err(SimError::WidthMismatch {
                            component: node.name().to_string(),
                            port: port.name().to_string(),
                            sink_width: port.width(),
                            source_width,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Brings the design to its initial state: registers take their initial
    /// values, reverse stacks are emptied, the cycle count is zeroed,
    /// constants propagate once, and a full flood computes every output.
    ///
    /// Fails with [`SimError::CombinationalCycle`] if the flood does not
    /// converge. Memory contents are left alone, so an address space can be
    /// loaded before initialization.
    pub fn initialize(&mut self) -> Result<(), SimError> {
        debug!(design = self.graph[self.root].name(), "initialize");
        self.state
            .reset_clocked(&self.graph, self.reverse_capacity, false);
        self.clock_count = 0;
        self.initial_flood()?;
        self.initialized = true;
        Ok(())
    }

    /// Clears reverse stacks, returns registers to their initial values and
    /// memories to all-zero, zeroes the cycle count and repropagates.
    pub fn reset(&mut self) -> Result<(), SimError> {
        debug!(design = self.graph[self.root].name(), "reset");
        self.state
            .reset_clocked(&self.graph, self.reverse_capacity, true);
        self.clock_count = 0;
        self.initial_flood()?;
        self.initialized = true;
        Ok(())
    }

    fn initial_flood(&mut self) -> Result<(), SimError> {
        self.state.clear_propagation(&self.graph);
        let mut events = FloodEvents::default();
        self.state.propagate_constants(&self.graph, &mut events)?;
        self.state.propagate(&self.graph, &mut events)?;
        if let Some(comp) = self.state.first_unpropagated(&self.graph) {
            return Err(SimError::CombinationalCycle {
                component: self.graph[comp].name().to_string(),
            });
        }
        self.dispatch(events);
        Ok(())
    }

    /// Simulates one clock tick: clocked components save and apply the edge
    /// in declaration order, propagation state is reset, and the flood
    /// recomputes every output for the new cycle.
    pub fn clock(&mut self) -> Result<(), SimError> {
        if !self.initialized {
            warn!("clock() before initialization is ignored");
            return Ok(());
        }
        debug!(cycle = self.clock_count, "clock");
        self.state.save_clocked(&self.graph, self.reverse_capacity);
        self.repropagate()?;
        self.clock_count += 1;
        Ok(())
    }

    /// Undoes the most recent clock tick. A no-op (reported through
    /// [`Design::can_reverse`]) when any reverse stack is empty.
    pub fn reverse(&mut self) -> Result<(), SimError> {
        if !self.can_reverse() {
            warn!("reverse() without saved state is ignored");
            return Ok(());
        }
        debug!(cycle = self.clock_count, "reverse");
        self.state
            .reverse_clocked(&self.graph, self.reverse_capacity);
        self.repropagate()?;
        self.clock_count -= 1;
        Ok(())
    }

    fn repropagate(&mut self) -> Result<(), SimError> {
        self.state.reset_propagation(&self.graph);
        let mut events = FloodEvents::default();
        self.state.propagate(&self.graph, &mut events)?;
        debug_assert!(
            self.state.first_unpropagated(&self.graph).is_none(),
            "A verified design propagates completely"
        );
        self.dispatch(events);
        Ok(())
    }

    /// Whether a reverse would restore state: true when every clocked
    /// component has at least one saved record.
    pub fn can_reverse(&self) -> bool {
        self.initialized
            && self.clock_count > 0
            && !self.graph.clocked.is_empty()
            && self.state.all_stacks_nonempty(&self.graph)
    }

    /// Cycles simulated since initialization, net of reversals.
    pub fn clock_count(&self) -> u64 {
        self.clock_count
    }

    pub fn reverse_stack_capacity(&self) -> usize {
        self.reverse_capacity
    }

    /// Changes the design-wide reverse depth. Shrinking truncates every
    /// stack from its oldest end.
    pub fn set_reverse_stack_capacity(&mut self, capacity: usize) {
        self.reverse_capacity = capacity;
        for &comp in &self.graph.clocked {
            if let Some(state) = self.state.sync_states.get_mut(comp) {
                state.truncate_stack(capacity);
            }
        }
    }

    /// Forces the state of a clocked component outside the clock: a
    /// register takes `value` (the address is ignored), a memory writes
    /// `value` at `addr`. The modification edits the current state and is
    /// deliberately not pushed onto the reverse stack. The design is
    /// repropagated afterwards.
    pub fn set_synchronous_value(
        &mut self,
        comp: ComponentKey,
        addr: u64,
        value: u64,
    ) -> Result<(), SimError> {
        match &self.graph[comp].sync {
            Some(SyncFn::RegisterSync(reg)) => {
                let masked = value & mask(reg.width);
                if let Some(SyncState::Register { saved, .. }) =
                    self.state.sync_states.get_mut(comp)
                {
                    *saved = masked;
                }
            }
            Some(SyncFn::MemorySync(memory)) => {
                let addr = if memory.byte_indexed { addr } else { addr << 2 };
                let nbytes = self.graph[memory.data_in].width().div_ceil(8);
                memory
                    .space
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .write_value(addr, value, nbytes);
            }
            None => {
                warn!(
                    component = self.graph[comp].name(),
                    "set_synchronous_value on a combinational component is ignored"
                );
                return Ok(());
            }
        }
        if self.initialized { self.repropagate() } else { Ok(()) }
    }

    fn dispatch(&mut self, events: FloodEvents) {
        let Design { graph, comp_observers, port_observers, diagnostics, .. } = self;
        for overflow in events.overflows {
            warn!(
                component = %overflow.component,
                port = %overflow.port,
                raw = overflow.raw,
                width = overflow.width,
                "value function overflowed its port width"
            );
            diagnostics.push(overflow);
        }
        for (port, value) in events.changed_ports {
            if let Some(observers) = port_observers.get_mut(port) {
                let value = BitVector::new(value, graph[port].width());
                for observer in observers {
                    observer(value);
                }
            }
        }
        for comp in events.changed_components {
            if let Some(observers) = comp_observers.get_mut(comp) {
                for observer in observers {
                    observer();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::comp::arith::Adder;
    use crate::comp::gates::Not;
    use crate::comp::muxes::Multiplexer;
    use crate::comp::register::Register;
    use crate::comp::wiring::Constant;

    /// Constant(1) -> adder -> register -> adder: an 8-bit counter.
    fn counter(d: &mut Design) -> Register {
        let root = d.root();
        let reg = Register::new(d, root, "reg", 8);
        let adder = Adder::new(d, root, "adder", 8);
        let one = Constant::new(d, root, "one", 1, 8).unwrap();
        d.connect(reg.data_out, adder.a).unwrap();
        d.connect(one.out, adder.b).unwrap();
        d.connect(adder.out, reg.data_in).unwrap();
        d.tie_constant(reg.enable, 1).unwrap();
        reg
    }

    #[test]
    fn test_single_register_loop() {
        let mut d = Design::new("counter");
        let reg = counter(&mut d);
        d.verify().unwrap();

        assert_eq!(d.uvalue(reg.data_out), 0, "Registers initialize to zero");
        for _ in 0..5 {
            d.clock().unwrap();
        }
        assert_eq!(d.uvalue(reg.data_out), 5);
        assert_eq!(d.clock_count(), 5);

        for _ in 0..3 {
            d.reverse().unwrap();
        }
        assert_eq!(d.uvalue(reg.data_out), 2);
        assert_eq!(d.clock_count(), 2);
    }

    #[test]
    fn test_reverse_roundtrip_is_identity() {
        let mut d = Design::new("roundtrip");
        let reg = counter(&mut d);
        d.verify().unwrap();

        for k in 0..8 {
            for _ in 0..k {
                d.clock().unwrap();
            }
            for _ in 0..k {
                d.reverse().unwrap();
            }
            assert_eq!(d.uvalue(reg.data_out), 0, "{k} clocks + {k} reverses is the identity");
            assert_eq!(d.clock_count(), 0);
        }
    }

    #[test]
    fn test_reverse_underflow_is_ignored() {
        let mut d = Design::new("underflow");
        let reg = counter(&mut d);
        d.verify().unwrap();

        assert!(!d.can_reverse());
        d.clock().unwrap();
        assert!(d.can_reverse());
        d.reverse().unwrap();
        assert!(!d.can_reverse());
        // Ignored, not an error.
        d.reverse().unwrap();
        assert_eq!(d.clock_count(), 0);
        assert_eq!(d.uvalue(reg.data_out), 0);
    }

    #[test]
    fn test_reset_idempotence() {
        let mut d = Design::new("reset");
        let reg = counter(&mut d);
        d.verify().unwrap();
        for _ in 0..4 {
            d.clock().unwrap();
        }

        d.reset().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0);
        assert_eq!(d.clock_count(), 0);
        assert!(!d.can_reverse(), "Reset clears the reverse stacks");

        d.reset().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0);
        assert_eq!(d.clock_count(), 0);
    }

    #[test]
    fn test_disabled_register_holds() {
        let mut d = Design::new("hold");
        let root = d.root();
        let reg = Register::new(&mut d, root, "reg", 8);
        let c = Constant::new(&mut d, root, "c", 0x5A, 8).unwrap();
        d.connect(c.out, reg.data_in).unwrap();
        d.tie_constant(reg.enable, 0).unwrap();
        d.verify().unwrap();

        for _ in 0..3 {
            d.clock().unwrap();
        }
        assert_eq!(d.uvalue(reg.data_out), 0, "A register with enable low holds its value");
    }

    #[test]
    fn test_mux_selection_cycles() {
        // 4-input mux of width 4; select driven by a 2-bit counter.
        let mut d = Design::new("mux_cycle");
        let root = d.root();
        let mux = Multiplexer::new(&mut d, root, "mux", 4, 4);
        let sel_reg = Register::new(&mut d, root, "sel", 2);
        let adder = Adder::new(&mut d, root, "inc", 2);
        d.connect(sel_reg.data_out, adder.a).unwrap();
        d.tie_constant(adder.b, 1).unwrap();
        d.connect(adder.out, sel_reg.data_in).unwrap();
        d.tie_constant(sel_reg.enable, 1).unwrap();
        d.connect(sel_reg.data_out, mux.select).unwrap();
        for (i, value) in [3, 5, 7, 9].into_iter().enumerate() {
            d.tie_constant(mux.ins[i], value).unwrap();
        }
        d.verify().unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(d.uvalue(mux.out));
            d.clock().unwrap();
        }
        assert_eq!(seen, vec![3, 5, 7, 9, 3, 5], "Selection cycles modulo 4");
    }

    #[test]
    fn test_combinational_cycle_rejected() {
        let mut d = Design::new("cycle");
        let root = d.root();
        let n1 = Not::new(&mut d, root, "n1", 1);
        let n2 = Not::new(&mut d, root, "n2", 1);
        d.connect(n1.out, n2.input).unwrap();
        d.connect(n2.out, n1.input).unwrap();

        assert!(
            matches!(d.verify(), Err(SimError::CombinationalCycle { .. })),
            "Two cross-coupled inverters form a combinational cycle"
        );
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let mut d = Design::new("widths");
        let root = d.root();
        let wide = Constant::new(&mut d, root, "wide", 0x1234, 16).unwrap();
        let narrow = Not::new(&mut d, root, "narrow", 8);
        d.connect(wide.out, narrow.input).unwrap();

        assert_eq!(
            d.verify(),
            Err(SimError::WidthMismatch {
                component: "narrow".into(),
                port: "in".into(),
                sink_width: 8,
                source_width: 16,
            })
        );
    }

    #[test]
    fn test_unconnected_input_rejected() {
        let mut d = Design::new("unconnected");
        let root = d.root();
        Not::new(&mut d, root, "n", 8);
        assert!(matches!(d.verify(), Err(SimError::UnconnectedInput { .. })));
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut d = Design::new("zero");
        let root = d.root();
        let comp = d.add_component(root, "c");
        let input = d.add_input(comp, "in", 0);
        let c = Constant::new(&mut d, root, "c0", 0, 1).unwrap();
        d.connect(c.out, input).unwrap();
        d.add_output_with(comp, "out", 1, move |s| Ok(s.uvalue(input)));
        assert!(matches!(d.verify(), Err(SimError::ZeroWidth { .. })));
    }

    #[test]
    fn test_all_outputs_propagated_after_initialize() {
        let mut d = Design::new("propagated");
        counter(&mut d);
        d.verify().unwrap();
        for (_, comp) in d.graph().components.iter() {
            for &out in comp.output_ports() {
                assert!(
                    d.state.port_state(out).is_propagated(),
                    "Output '{}' of '{}' should be propagated after initialize",
                    d.port(out).name(),
                    comp.name()
                );
            }
        }
    }

    #[test]
    fn test_overflow_is_masked_and_diagnosed() {
        let mut d = Design::new("overflow");
        let root = d.root();
        let comp = d.add_component(root, "wide_fn");
        let out = d.add_output_with(comp, "out", 4, |_| Ok(0x123));
        d.verify().unwrap();

        assert_eq!(d.uvalue(out), 0x3, "The engine masks to the port width");
        assert_eq!(d.diagnostics().len(), 1);
        let diag = &d.diagnostics()[0];
        assert_eq!((diag.raw, diag.width), (0x123, 4));
    }

    #[test]
    fn test_capacity_shrink_truncates_oldest() {
        let mut d = Design::new("capacity");
        let reg = counter(&mut d);
        d.verify().unwrap();
        for _ in 0..6 {
            d.clock().unwrap();
        }

        d.set_reverse_stack_capacity(2);
        d.reverse().unwrap();
        d.reverse().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 4);
        assert!(!d.can_reverse(), "Only the two newest records survive the shrink");
    }

    #[test]
    fn test_component_observer_fires_once_per_tick() {
        let mut d = Design::new("observers");
        let root = d.root();
        let reg = Register::new(&mut d, root, "reg", 8);
        let inv = Not::new(&mut d, root, "inv", 8);
        d.connect(reg.data_out, inv.input).unwrap();
        d.connect(inv.out, reg.data_in).unwrap();
        d.tie_constant(reg.enable, 1).unwrap();

        let fired = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&fired);
        d.observe_component(inv.comp, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        d.verify().unwrap();
        let after_init = fired.load(Ordering::Relaxed);
        assert_eq!(after_init, 1, "The changed signal fires once per flood");

        d.clock().unwrap();
        assert_eq!(fired.load(Ordering::Relaxed), after_init + 1);
    }

    #[test]
    fn test_port_observer_sees_changes() {
        let mut d = Design::new("port_observer");
        let reg = counter(&mut d);

        let seen = Arc::new(AtomicU64::new(u64::MAX));
        let latest = Arc::clone(&seen);
        d.observe_port(reg.data_out, move |v| {
            latest.store(v.uvalue(), Ordering::Relaxed);
        });

        d.verify().unwrap();
        d.clock().unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 1);
        d.clock().unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_force_register_value() {
        let mut d = Design::new("force");
        let reg = counter(&mut d);
        d.verify().unwrap();

        d.set_synchronous_value(reg.comp, 0, 0x42).unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0x42, "Forced value is visible immediately");
        d.clock().unwrap();
        assert_eq!(d.uvalue(reg.data_out), 0x43);
    }

    #[test]
    fn test_design_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Design>();
    }
}
