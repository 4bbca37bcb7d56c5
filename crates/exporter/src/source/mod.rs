//! Source graph model
//!
//! The traced intermediate representation produced by an external front-end:
//! a value arena plus nested graphs of traced calls. Values are referenced by
//! [`ValueId`] so that one value can feed many nodes and nested subgraphs.

pub mod array;
pub mod graph;
pub mod node;
pub mod value;

pub use array::{Array, ArrayData, ElementType};
pub use graph::{Frontend, Graph, Trace, TraceFile};
pub use node::{Convolution2DLink, LinearLink, Link, Node, Operation, Size2d};
pub use value::{Dim, LineProp, Scalar, Value, ValueId, ValueKind};
