//! Types for describing the structure of a design.
//!
//! This module notably includes:
//! - [`SimGraph`]: the arena holding every component and port of a design
//! - [`ComponentNode`]: nodes of the hierarchical component graph
//! - [`PortNode`]: named, width-typed signal endpoints owned by components
//!
//! Structure is kept strictly separate from simulation state (values,
//! propagation flags, clocked history), which lives in [`crate::state`].
//! Components own their children and ports through the arena; parents are
//! referenced by non-owning keys, so the hierarchy contains no ownership
//! cycles.

use std::ops::{Index, IndexMut};

use slotmap::{SlotMap, new_key_type};

use crate::error::SimError;
use crate::state::{EvalScope, SyncFn};

new_key_type! {
    /// Key type for components.
    pub struct ComponentKey;
    /// Key type for ports.
    pub struct PortKey;
}

/// Direction of a port, seen from its owning component.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum PortDirection {
    /// Accepts exactly one incoming connection.
    Input,
    /// Produces a value, either from a value function or from an incoming
    /// connection (a sub-component's output wired through).
    Output,
}

/// Opaque component class identifier, used by the visual layer to select a
/// glyph. The engine itself only reads it back through introspection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum GraphicsType {
    #[default]
    Component,
    ClockedComponent,
    Constant,
    Multiplexer,
    Register,
}

/// A value function: the pure function evaluated to produce an output port's
/// value for the current cycle. It may read, through the [`EvalScope`], the
/// values of its component's input ports and of the outputs of that
/// component's direct sub-components, and nothing else.
pub type ValueFn = Box<dyn Fn(&EvalScope<'_>) -> Result<u64, SimError> + Send>;

/// A named, width-typed signal endpoint owned by a component.
pub struct PortNode {
    pub(crate) name: String,
    pub(crate) parent: ComponentKey,
    pub(crate) direction: PortDirection,
    pub(crate) width: u32,
    /// Value function, for outputs of leaf components.
    pub(crate) func: Option<ValueFn>,
    /// The single port driving this one, if any.
    pub(crate) source: Option<PortKey>,
    /// Every port driven by this one.
    pub(crate) sinks: Vec<PortKey>,
}

impl PortNode {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> ComponentKey {
        self.parent
    }
    pub fn direction(&self) -> PortDirection {
        self.direction
    }
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn source(&self) -> Option<PortKey> {
        self.source
    }
    pub fn sinks(&self) -> &[PortKey] {
        &self.sinks
    }
    /// Whether this port can produce a value (it is driven or computes one).
    pub fn is_connected(&self) -> bool {
        self.source.is_some() || self.func.is_some()
    }
}

impl std::fmt::Debug for PortNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortNode")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("width", &self.width)
            .field("func", &self.func.as_ref().map(|_| ".."))
            .field("source", &self.source)
            .field("sinks", &self.sinks)
            .finish()
    }
}

/// A node in the hierarchical component graph. Owns (through the arena) its
/// ports and sub-components, in declaration order.
pub struct ComponentNode {
    pub(crate) name: String,
    pub(crate) parent: Option<ComponentKey>,
    pub(crate) children: Vec<ComponentKey>,
    pub(crate) inputs: Vec<PortKey>,
    pub(crate) outputs: Vec<PortKey>,
    pub(crate) graphics: GraphicsType,
    /// Ports with a layout meaning to the visual layer (e.g. "select").
    pub(crate) special_ports: Vec<(String, PortKey)>,
    /// Clocked capability, for components participating in clock edges.
    pub(crate) sync: Option<SyncFn>,
}

impl ComponentNode {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> Option<ComponentKey> {
        self.parent
    }
    pub fn sub_components(&self) -> &[ComponentKey] {
        &self.children
    }
    pub fn input_ports(&self) -> &[PortKey] {
        &self.inputs
    }
    pub fn output_ports(&self) -> &[PortKey] {
        &self.outputs
    }
    pub fn graphics_type(&self) -> GraphicsType {
        self.graphics
    }
    /// Whether this component participates in clock edges.
    pub fn is_synchronous(&self) -> bool {
        self.sync.is_some()
    }
    /// An input-less leaf (constant, parameter source): it propagates once
    /// at initialization and stays propagated. A compound without inputs is
    /// not constant — its children may be clocked.
    pub fn is_constant(&self) -> bool {
        self.inputs.is_empty() && self.children.is_empty() && self.sync.is_none()
    }
    /// Looks up a port with a layout meaning (e.g. "select").
    pub fn special_port(&self, name: &str) -> Option<PortKey> {
        self.special_ports
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, p)| p)
    }
}

impl std::fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentNode")
            .field("name", &self.name)
            .field("graphics", &self.graphics)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("children", &self.children)
            .field("synchronous", &self.sync.is_some())
            .finish()
    }
}

/// The arena of components and ports making up one design's structure.
#[derive(Debug, Default)]
pub struct SimGraph {
    pub(crate) components: SlotMap<ComponentKey, ComponentNode>,
    pub(crate) ports: SlotMap<PortKey, PortNode>,
    /// Every component in declaration order (parents precede children).
    pub(crate) order: Vec<ComponentKey>,
    /// Every clocked component in declaration order.
    pub(crate) clocked: Vec<ComponentKey>,
}

impl SimGraph {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a component under `parent` (or as a root when `None`) and
    /// returns its key.
    pub(crate) fn add_component(
        &mut self,
        parent: Option<ComponentKey>,
        name: &str,
        graphics: GraphicsType,
    ) -> ComponentKey {
        let key = self.components.insert(ComponentNode {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            graphics,
            special_ports: Vec::new(),
            sync: None,
        });
        if let Some(parent) = parent {
            self.components[parent].children.push(key);
        }
        self.order.push(key);
        key
    }

    /// Appends a port to `comp`'s input or output list.
    pub(crate) fn add_port(
        &mut self,
        comp: ComponentKey,
        name: &str,
        direction: PortDirection,
        width: u32,
        func: Option<ValueFn>,
    ) -> PortKey {
        let key = self.ports.insert(PortNode {
            name: name.to_string(),
            parent: comp,
            direction,
            width,
            func,
            source: None,
            sinks: Vec::new(),
        });
        match direction {
            PortDirection::Input => self.components[comp].inputs.push(key),
            PortDirection::Output => self.components[comp].outputs.push(key),
        }
        key
    }

    /// Registers the clocked capability of `comp`.
    pub(crate) fn register_synchronous(&mut self, comp: ComponentKey, sync: SyncFn) {
        debug_assert!(
            self.components[comp].sync.is_none(),
            "A synchronous capability is already registered for this component"
        );
        self.components[comp].sync = Some(sync);
        self.clocked.push(comp);
    }

    /// Connects `from` as the single source of `to`. Connecting a port that
    /// already has a source is an error; width mismatches are deferred to
    /// verification so that dynamically-widthed ports can be wired before
    /// their width is known.
    pub(crate) fn connect(&mut self, from: PortKey, to: PortKey) -> Result<(), SimError> {
        if self.ports[to].source.is_some() {
            return Err(SimError::AlreadyConnected {
                component: self.components[self.ports[to].parent].name.clone(),
                port: self.ports[to].name.clone(),
            });
        }
        self.ports[to].source = Some(from);
        self.ports[from].sinks.push(to);
        Ok(())
    }

    /// Components driving `comp`, one entry per connected input port.
    ///
    /// Deliberately not a set: callers partitioning the graph need to know
    /// when two components share more than one edge.
    pub fn input_components(&self, comp: ComponentKey) -> Vec<ComponentKey> {
        self.components[comp]
            .inputs
            .iter()
            .filter_map(|&p| self.ports[p].source)
            .map(|src| self.ports[src].parent)
            .collect()
    }

    /// Components driven by `comp`, one entry per connected sink port.
    pub fn output_components(&self, comp: ComponentKey) -> Vec<ComponentKey> {
        self.components[comp]
            .outputs
            .iter()
            .flat_map(|&p| self.ports[p].sinks.iter())
            .map(|&sink| self.ports[sink].parent)
            .collect()
    }
}

impl Index<ComponentKey> for SimGraph {
    type Output = ComponentNode;

    fn index(&self, index: ComponentKey) -> &Self::Output {
        &self.components[index]
    }
}
impl IndexMut<ComponentKey> for SimGraph {
    fn index_mut(&mut self, index: ComponentKey) -> &mut Self::Output {
        &mut self.components[index]
    }
}
impl Index<PortKey> for SimGraph {
    type Output = PortNode;

    fn index(&self, index: PortKey) -> &Self::Output {
        &self.ports[index]
    }
}
impl IndexMut<PortKey> for SimGraph {
    fn index_mut(&mut self, index: PortKey) -> &mut Self::Output {
        &mut self.ports[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(g: &mut SimGraph, comp: ComponentKey, name: &str) -> PortKey {
        g.add_port(comp, name, PortDirection::Input, 8, None)
    }
    fn output(g: &mut SimGraph, comp: ComponentKey, name: &str) -> PortKey {
        let func: ValueFn = Box::new(|_| Ok(0));
        g.add_port(comp, name, PortDirection::Output, 8, Some(func))
    }

    #[test]
    fn test_double_connection_rejected() {
        let mut g = SimGraph::new();
        let a = g.add_component(None, "a", GraphicsType::Component);
        let b = g.add_component(None, "b", GraphicsType::Component);
        let out_a = output(&mut g, a, "out");
        let out_b = output(&mut g, b, "out");
        let in_b = input(&mut g, b, "in");

        assert!(g.connect(out_a, in_b).is_ok());
        assert_eq!(
            g.connect(out_b, in_b),
            Err(SimError::AlreadyConnected {
                component: "b".into(),
                port: "in".into()
            }),
            "An input may only have a single source"
        );
    }

    #[test]
    fn test_edge_symmetry() {
        // output_components(x) contains y exactly as often as
        // input_components(y) contains x.
        let mut g = SimGraph::new();
        let a = g.add_component(None, "a", GraphicsType::Component);
        let b = g.add_component(None, "b", GraphicsType::Component);
        let out0 = output(&mut g, a, "out0");
        let out1 = output(&mut g, a, "out1");
        let in0 = input(&mut g, b, "in0");
        let in1 = input(&mut g, b, "in1");
        g.connect(out0, in0).unwrap();
        g.connect(out1, in1).unwrap();

        assert_eq!(g.output_components(a), vec![b, b], "Two edges, two entries");
        assert_eq!(g.input_components(b), vec![a, a]);
        assert!(g.input_components(a).is_empty());
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let mut g = SimGraph::new();
        let root = g.add_component(None, "root", GraphicsType::Component);
        let x = g.add_component(Some(root), "x", GraphicsType::Component);
        let y = g.add_component(Some(root), "y", GraphicsType::Component);
        assert_eq!(g.order, vec![root, x, y]);
        assert_eq!(g[root].sub_components(), &[x, y]);
        assert_eq!(g[x].parent(), Some(root));
    }
}
