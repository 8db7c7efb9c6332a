//! Simulation state and the propagation algorithm.
//!
//! [`SimState`] holds everything that changes while a design runs: cached
//! port values, per-port and per-component propagation flags, and the
//! per-clocked-component history used for reversal. The structure of the
//! design ([`SimGraph`]) is only ever borrowed immutably here, which is what
//! lets value functions read the graph while the state is being updated.

use std::collections::VecDeque;

use enum_dispatch::enum_dispatch;
use slotmap::SecondaryMap;
use tracing::trace;

use crate::bits::{BitVector, mask};
use crate::error::{OverflowDiagnostic, SimError};
use crate::graph::{ComponentKey, PortKey, SimGraph};
use crate::mem::SharedAddressSpace;

/// Propagation status of a port or component within one clock cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PropagationState {
    /// Not yet recomputed this cycle.
    #[default]
    Unpropagated,
    /// Holds a valid value for the current cycle.
    Propagated,
    /// Propagated once at initialization and never reset (input-less
    /// components and everything wired only to them).
    Constant,
}

impl PropagationState {
    pub fn is_propagated(self) -> bool {
        !matches!(self, PropagationState::Unpropagated)
    }
}

/// The read-only view handed to value functions.
///
/// A value function may read the values of its own component's input ports
/// and of the output ports of that component's direct sub-components; the
/// construction helpers only hand out those keys, which is what keeps
/// hierarchical encapsulation intact.
pub struct EvalScope<'a> {
    pub(crate) graph: &'a SimGraph,
    pub(crate) values: &'a SecondaryMap<PortKey, u64>,
    pub(crate) sync_states: &'a SecondaryMap<ComponentKey, SyncState>,
}

impl EvalScope<'_> {
    /// The currently-cached value of `port`.
    pub fn value(&self, port: PortKey) -> BitVector {
        BitVector::new(self.uvalue(port), self.graph[port].width())
    }

    /// The currently-cached value of `port` as an unsigned integer.
    pub fn uvalue(&self, port: PortKey) -> u64 {
        self.values.get(port).copied().unwrap_or(0)
    }

    /// The currently-cached value of `port`, sign-extended from its width.
    pub fn svalue(&self, port: PortKey) -> i64 {
        self.value(port).svalue()
    }

    /// The saved value of a clocked component for the current cycle: a
    /// register's output, or a synchronous read port's latched data. Zero
    /// for components without clocked state.
    pub fn saved(&self, comp: ComponentKey) -> u64 {
        match self.sync_states.get(comp) {
            Some(SyncState::Register { saved, .. }) => *saved,
            Some(SyncState::Memory { saved, .. }) => *saved,
            None => 0,
        }
    }
}

/// One entry of a memory's reverse stack: the cells a write clobbered (or a
/// sentinel recording that the tick performed no write), plus the read
/// latch's pre-edge value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct MemoryEviction {
    pub write_enable: bool,
    pub addr: u64,
    pub data: u64,
    pub width: u32,
    pub data_out: u64,
}

/// Per-clocked-component mutable state, including the bounded reverse stack.
/// Newest entries sit at the front; capacity overflow drops from the back.
#[derive(Debug)]
pub(crate) enum SyncState {
    Register {
        saved: u64,
        initial: u64,
        stack: VecDeque<u64>,
    },
    Memory {
        /// Latched value of the synchronous read port, if the memory has
        /// one. Sampled during save, like a register's output.
        saved: u64,
        stack: VecDeque<MemoryEviction>,
    },
}

impl SyncState {
    pub(crate) fn stack_len(&self) -> usize {
        match self {
            SyncState::Register { stack, .. } => stack.len(),
            SyncState::Memory { stack, .. } => stack.len(),
        }
    }

    pub(crate) fn truncate_stack(&mut self, capacity: usize) {
        // truncate keeps the front of the deque, i.e. the newest entries.
        match self {
            SyncState::Register { stack, .. } => stack.truncate(capacity),
            SyncState::Memory { stack, .. } => stack.truncate(capacity),
        }
    }
}

fn push_capped<T>(stack: &mut VecDeque<T>, entry: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    if stack.len() >= capacity {
        stack.pop_back();
    }
    stack.push_front(entry);
}

/// Context handed to the clocked capability set at save/reverse/reset time.
pub(crate) struct SyncCtx<'a> {
    /// Port values as left by the previous propagation.
    pub values: &'a SecondaryMap<PortKey, u64>,
    /// This component's own clocked state.
    pub state: &'a mut SyncState,
    /// Design-wide reverse stack capacity.
    pub capacity: usize,
}

/// The capability set of a clocked component: record what the edge destroys,
/// undo the most recent edge, return to initial state.
///
/// `initialize` restores the component's own initial state and clears its
/// history; `reset` additionally returns any backing store to all-zero.
#[enum_dispatch]
pub(crate) trait Synchronous {
    fn save(&self, ctx: &mut SyncCtx<'_>);
    fn reverse(&self, ctx: &mut SyncCtx<'_>);
    fn initialize(&self, ctx: &mut SyncCtx<'_>);
    fn reset(&self, ctx: &mut SyncCtx<'_>);
}

/// Register edge behaviour: on save, push the output value being lost, then
/// latch `data_in` if `enable` is high.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegisterSync {
    pub data_in: PortKey,
    pub enable: PortKey,
    pub width: u32,
}

impl Synchronous for RegisterSync {
    fn save(&self, ctx: &mut SyncCtx<'_>) {
        let SyncState::Register { saved, stack, .. } = ctx.state else {
            return;
        };
        push_capped(stack, *saved, ctx.capacity);
        if ctx.values.get(self.enable).copied().unwrap_or(0) & 1 != 0 {
            *saved = ctx.values.get(self.data_in).copied().unwrap_or(0) & mask(self.width);
        }
    }

    fn reverse(&self, ctx: &mut SyncCtx<'_>) {
        let SyncState::Register { saved, stack, .. } = ctx.state else {
            return;
        };
        if let Some(previous) = stack.pop_front() {
            *saved = previous;
        }
    }

    fn initialize(&self, ctx: &mut SyncCtx<'_>) {
        let SyncState::Register { saved, initial, stack } = ctx.state else {
            return;
        };
        *saved = *initial;
        stack.clear();
    }

    fn reset(&self, ctx: &mut SyncCtx<'_>) {
        self.initialize(ctx);
    }
}

/// Memory write-port edge behaviour: on save with `wr_en` high, record the
/// bytes about to be clobbered and perform the write; otherwise push a
/// sentinel so every clocked component contributes exactly one record per
/// tick. A memory with a synchronous read port additionally samples its
/// read latch during save, after the write, from the pre-edge address and
/// `rd_en` — the latch never depends on propagation order.
#[derive(Clone)]
pub(crate) struct MemorySync {
    pub addr: PortKey,
    pub data_in: PortKey,
    pub wr_width: PortKey,
    pub wr_en: PortKey,
    /// Read enable of the synchronous read port, if the memory has one.
    pub rd_en: Option<PortKey>,
    /// Width of the read latch in bits.
    pub read_bits: u32,
    pub byte_indexed: bool,
    pub space: SharedAddressSpace,
}

impl MemorySync {
    fn byte_addr(&self, ctx: &SyncCtx<'_>) -> u64 {
        let addr = ctx.values.get(self.addr).copied().unwrap_or(0);
        if self.byte_indexed { addr } else { addr << 2 }
    }
}

impl std::fmt::Debug for MemorySync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySync")
            .field("byte_indexed", &self.byte_indexed)
            .finish_non_exhaustive()
    }
}

impl Synchronous for MemorySync {
    fn save(&self, ctx: &mut SyncCtx<'_>) {
        let write_enable = ctx.values.get(self.wr_en).copied().unwrap_or(0) & 1 != 0;
        let addr = self.byte_addr(ctx);
        let mut space = self.space.lock().unwrap_or_else(|e| e.into_inner());

        let eviction = if write_enable {
            let width = ctx.values.get(self.wr_width).copied().unwrap_or(0) as u32;
            let data_in = ctx.values.get(self.data_in).copied().unwrap_or(0);
            let clobbered = space.read_value(addr, width);
            space.write_value(addr, data_in, width);
            MemoryEviction { write_enable, addr, data: clobbered, width, data_out: 0 }
        } else {
            MemoryEviction { write_enable, addr: 0, data: 0, width: 0, data_out: 0 }
        };

        let SyncState::Memory { saved, stack } = ctx.state else { return };
        push_capped(stack, MemoryEviction { data_out: *saved, ..eviction }, ctx.capacity);

        // Sample the read latch from the pre-edge address, after the write,
        // so a read of the written address sees the new data.
        if let Some(rd_en) = self.rd_en
            && ctx.values.get(rd_en).copied().unwrap_or(0) & 1 != 0
        {
            *saved = space.read_value(addr, self.read_bits.div_ceil(8)) & mask(self.read_bits);
        }
    }

    fn reverse(&self, ctx: &mut SyncCtx<'_>) {
        let SyncState::Memory { saved, stack } = ctx.state else { return };
        if let Some(eviction) = stack.pop_front() {
            *saved = eviction.data_out;
            if eviction.write_enable {
                self.space
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .write_value(eviction.addr, eviction.data, eviction.width);
            }
        }
    }

    fn initialize(&self, ctx: &mut SyncCtx<'_>) {
        let SyncState::Memory { saved, stack } = ctx.state else { return };
        *saved = 0;
        stack.clear();
    }

    fn reset(&self, ctx: &mut SyncCtx<'_>) {
        self.initialize(ctx);
        self.space.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// The clocked capability set, dispatched over the closed set of clocked
/// primitive kinds.
#[enum_dispatch(Synchronous)]
#[derive(Debug, Clone)]
pub(crate) enum SyncFn {
    RegisterSync,
    MemorySync,
}

/// Everything observers need to hear about after a flood completes:
/// recomputed components (at most one entry each), ports whose value
/// changed, and runtime diagnostics.
#[derive(Default)]
pub(crate) struct FloodEvents {
    pub changed_components: Vec<ComponentKey>,
    pub changed_ports: Vec<(PortKey, u64)>,
    pub overflows: Vec<OverflowDiagnostic>,
}

/// The mutable state of one design.
#[derive(Debug, Default)]
pub struct SimState {
    pub(crate) values: SecondaryMap<PortKey, u64>,
    pub(crate) port_states: SecondaryMap<PortKey, PropagationState>,
    pub(crate) comp_states: SecondaryMap<ComponentKey, PropagationState>,
    pub(crate) sync_states: SecondaryMap<ComponentKey, SyncState>,
}

impl SimState {
    pub(crate) fn port_state(&self, port: PortKey) -> PropagationState {
        self.port_states.get(port).copied().unwrap_or_default()
    }

    pub(crate) fn comp_state(&self, comp: ComponentKey) -> PropagationState {
        self.comp_states.get(comp).copied().unwrap_or_default()
    }

    pub(crate) fn value(&self, port: PortKey) -> u64 {
        self.values.get(port).copied().unwrap_or(0)
    }

    /// Returns every port and component to `Unpropagated`, including the
    /// constant cones. Used once per initialization.
    pub(crate) fn clear_propagation(&mut self, graph: &SimGraph) {
        for key in graph.components.keys() {
            self.comp_states.insert(key, PropagationState::Unpropagated);
        }
        for key in graph.ports.keys() {
            self.port_states.insert(key, PropagationState::Unpropagated);
        }
    }

    /// Returns every non-constant port and component to `Unpropagated`.
    /// Constant cones keep their values and stay propagated across cycles.
    pub(crate) fn reset_propagation(&mut self, graph: &SimGraph) {
        for key in graph.components.keys() {
            if self.comp_state(key) != PropagationState::Constant {
                self.comp_states.insert(key, PropagationState::Unpropagated);
            }
        }
        for key in graph.ports.keys() {
            if self.port_state(key) != PropagationState::Constant {
                self.port_states.insert(key, PropagationState::Unpropagated);
            }
        }
    }

    /// Evaluates one port and floods its value down the wire chains
    /// (input→input and output→output connections across the hierarchy).
    /// Every port reached is recorded in `touched`.
    fn propagate_port(
        &mut self,
        port: PortKey,
        graph: &SimGraph,
        target: PropagationState,
        touched: &mut Vec<PortKey>,
        events: &mut FloodEvents,
    ) -> Result<(), SimError> {
        let mut stack = vec![port];
        while let Some(p) = stack.pop() {
            if self.port_state(p).is_propagated() {
                continue;
            }
            let node = &graph[p];
            let (raw, from_func) = match (&node.func, node.source) {
                (Some(func), _) => {
                    let scope = EvalScope {
                        graph,
                        values: &self.values,
                        sync_states: &self.sync_states,
                    };
                    (func(&scope)?, true)
                }
                (None, Some(source)) => (self.value(source), false),
                // Undriven ports are rejected by verification; an unverified
                // design simply reads zero here.
                (None, None) => (0, false),
            };

            let masked = raw & mask(node.width);
            if from_func && masked != raw {
                events.overflows.push(OverflowDiagnostic {
                    component: graph[node.parent].name().to_string(),
                    port: node.name.clone(),
                    raw,
                    width: node.width,
                });
            }
            if self.values.get(p) != Some(&masked) {
                events.changed_ports.push((p, masked));
            }
            self.values.insert(p, masked);
            self.port_states.insert(p, target);
            touched.push(p);
            stack.extend(node.sinks.iter().copied());
        }
        Ok(())
    }

    /// Propagates every input-less leaf component once, marking it and its
    /// entire fan-out cone `Constant`.
    pub(crate) fn propagate_constants(
        &mut self,
        graph: &SimGraph,
        events: &mut FloodEvents,
    ) -> Result<(), SimError> {
        let mut touched = Vec::new();
        for &comp in graph.order.iter() {
            if !graph[comp].is_constant() {
                continue;
            }
            for i in 0..graph[comp].outputs.len() {
                let out = graph[comp].outputs[i];
                self.propagate_port(out, graph, PropagationState::Constant, &mut touched, events)?;
            }
            self.comp_states.insert(comp, PropagationState::Constant);
        }
        Ok(())
    }

    /// The demand-driven propagation flood.
    ///
    /// The recursive scheme (visit a component, bail while any input is
    /// pending, recurse into fan-out on completion) is flattened onto an
    /// explicit work queue so that long register-to-register chains cannot
    /// overflow the call stack. The queue is seeded with every component in
    /// declaration order — a superset of the clocked-plus-constants starting
    /// set — and completions re-enqueue every consumer their values reached,
    /// plus the enclosing parent, which is what lets a bailed-out visit be
    /// retried once its drivers have propagated.
    ///
    /// On a verified design the flood is convergent: every visit either
    /// completes a component or bails out because an input is pending, and
    /// the pending input is guaranteed to propagate later in the same flood.
    pub(crate) fn propagate(
        &mut self,
        graph: &SimGraph,
        events: &mut FloodEvents,
    ) -> Result<(), SimError> {
        let mut queue: VecDeque<ComponentKey> = graph.order.iter().copied().collect();
        let mut touched = Vec::new();

        while let Some(comp) = queue.pop_front() {
            if self.comp_state(comp).is_propagated() {
                continue;
            }
            let node = &graph[comp];

            if node.sync.is_none() {
                // Combinational: every input must be propagated first; the
                // driver's fan-out will bring us back here.
                if node.inputs.iter().any(|&p| !self.port_state(p).is_propagated()) {
                    continue;
                }
                // Sub-components propagate before the enclosing component's
                // outputs are evaluated.
                let pending: Vec<_> = node
                    .children
                    .iter()
                    .copied()
                    .filter(|&c| !self.comp_state(c).is_propagated())
                    .collect();
                if !pending.is_empty() {
                    queue.extend(pending);
                    continue;
                }
            }
            // Clocked components propagate unconditionally: their outputs for
            // this cycle were fixed by the save phase.

            touched.clear();
            for i in 0..node.outputs.len() {
                let out = node.outputs[i];
                self.propagate_port(out, graph, PropagationState::Propagated, &mut touched, events)?;
            }
            self.comp_states.insert(comp, PropagationState::Propagated);
            if node.sync.is_none() {
                events.changed_components.push(comp);
            }
            trace!(component = node.name(), "propagated");

            // Fan out to every component whose ports the flood reached (this
            // covers the output→output second hop), and to the parent, whose
            // own outputs may have been waiting on this child.
            for &p in &touched {
                queue.push_back(graph[p].parent());
            }
            if let Some(parent) = node.parent {
                queue.push_back(parent);
            }
        }
        Ok(())
    }

    /// A component the flood failed to reach, if any; present after a full
    /// flood exactly when the design has a combinational cycle. Components
    /// merely waiting on unpropagated children are skipped in favour of a
    /// component actually sitting on the cycle.
    pub(crate) fn first_unpropagated(&self, graph: &SimGraph) -> Option<ComponentKey> {
        let mut fallback = None;
        for &comp in &graph.order {
            if self.comp_state(comp).is_propagated() {
                continue;
            }
            fallback.get_or_insert(comp);
            if graph[comp]
                .children
                .iter()
                .all(|&child| self.comp_state(child).is_propagated())
            {
                return Some(comp);
            }
        }
        fallback
    }

    /// Save phase of a clock tick, in declaration order.
    pub(crate) fn save_clocked(&mut self, graph: &SimGraph, capacity: usize) {
        let SimState { values, sync_states, .. } = self;
        for &comp in &graph.clocked {
            let Some(sync) = &graph[comp].sync else { continue };
            let Some(state) = sync_states.get_mut(comp) else { continue };
            sync.save(&mut SyncCtx { values, state, capacity });
        }
    }

    /// Undo phase of a reverse, in reverse declaration order.
    pub(crate) fn reverse_clocked(&mut self, graph: &SimGraph, capacity: usize) {
        let SimState { values, sync_states, .. } = self;
        for &comp in graph.clocked.iter().rev() {
            let Some(sync) = &graph[comp].sync else { continue };
            let Some(state) = sync_states.get_mut(comp) else { continue };
            sync.reverse(&mut SyncCtx { values, state, capacity });
        }
    }

    /// Returns every clocked component to its initial state and clears the
    /// reverse stacks. Backing stores are kept when `clear_memories` is
    /// false (initialization) and zeroed when it is true (reset).
    pub(crate) fn reset_clocked(&mut self, graph: &SimGraph, capacity: usize, clear_memories: bool) {
        let SimState { values, sync_states, .. } = self;
        for &comp in &graph.clocked {
            let Some(sync) = &graph[comp].sync else { continue };
            let Some(state) = sync_states.get_mut(comp) else { continue };
            let mut ctx = SyncCtx { values, state, capacity };
            if clear_memories {
                sync.reset(&mut ctx);
            } else {
                sync.initialize(&mut ctx);
            }
        }
    }

    /// Whether every clocked component has at least one saved record.
    pub(crate) fn all_stacks_nonempty(&self, graph: &SimGraph) -> bool {
        graph
            .clocked
            .iter()
            .all(|&c| self.sync_states.get(c).is_some_and(|s| s.stack_len() > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_capped_drops_oldest() {
        let mut stack = VecDeque::new();
        for v in 0..5u64 {
            push_capped(&mut stack, v, 3);
        }
        // Newest at the front; the two oldest entries were dropped.
        assert_eq!(stack, VecDeque::from([4, 3, 2]));
    }

    #[test]
    fn test_push_capped_zero_capacity() {
        let mut stack = VecDeque::new();
        push_capped(&mut stack, 1u64, 0);
        assert!(stack.is_empty(), "Zero capacity saves nothing");
    }

    #[test]
    fn test_truncate_keeps_newest() {
        let mut state = SyncState::Register {
            saved: 0,
            initial: 0,
            stack: VecDeque::from([9, 8, 7, 6]),
        };
        state.truncate_stack(2);
        let SyncState::Register { stack, .. } = state else { unreachable!() };
        assert_eq!(
            stack,
            VecDeque::from([9, 8]),
            "Shrinking the capacity truncates from the oldest end"
        );
    }
}
