//! Error taxonomy of the simulation engine.
//!
//! Construction and verification failures are fatal: the design is unusable
//! until they are fixed. Runtime anomalies (value overflow) are surfaced as
//! [`OverflowDiagnostic`]s and never stop the simulation.

use thiserror::Error;

/// Errors raised while building or verifying a design, plus the one runtime
/// failure mode of value functions (an out-of-range selector).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// An input port was left without a source after construction, or an
    /// output port has neither a value function nor an incoming connection.
    #[error("port '{port}' of component '{component}' is not driven")]
    UnconnectedInput { component: String, port: String },

    /// A port's width was never set.
    #[error("port '{port}' of component '{component}' has no width")]
    ZeroWidth { component: String, port: String },

    /// An input's width differs from its source's width.
    #[error(
        "input '{port}' of component '{component}' is {sink_width} bits wide \
         but its source is {source_width} bits wide"
    )]
    WidthMismatch {
        component: String,
        port: String,
        sink_width: u32,
        source_width: u32,
    },

    /// A dependency cycle among outputs does not pass through any clocked
    /// element; detected as non-convergence of the initial propagation.
    #[error("combinational cycle through component '{component}'")]
    CombinationalCycle { component: String },

    /// A selector addressed a multiplexer input that does not exist, or an
    /// enum selector value with no associated port.
    #[error("index {index} is out of range for component '{component}' ({len} inputs)")]
    IndexOutOfRange {
        component: String,
        index: u64,
        len: u64,
    },

    /// An input port was connected twice.
    #[error("port '{port}' of component '{component}' already has a source")]
    AlreadyConnected { component: String, port: String },

    /// A constant's value does not fit in the requested width.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooWide { value: u64, width: u32 },
}

/// A non-fatal runtime anomaly: a value function produced a value exceeding
/// its port width. The engine masks the value to the width and records one of
/// these per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowDiagnostic {
    /// Component owning the overflowing output.
    pub component: String,
    /// The overflowing output port.
    pub port: String,
    /// The unmasked value the function produced.
    pub raw: u64,
    /// The port width the value was masked to.
    pub width: u32,
}
