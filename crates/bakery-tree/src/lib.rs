//! Selection tree and propagation engine for Bakery project forests.
//!
//! The [`SelectionTree`] is a display-agnostic 1:1 shadow of a loaded
//! [`bakery_loader::Project`] forest: one shadow node per forest node, in
//! the same relative order, addressed by arena indices. Selection state is
//! not duplicated - it is read from and written to the underlying plugins.
//!
//! [`SelectionTree::set_selected`] applies the full propagation contract in
//! a fixed order:
//!
//! 1. the source node's own transition (rejected for mandatory or
//!    checkbox-less nodes),
//! 2. the disable directive of every node that transitioned into selected
//!    (single-hop: a disabled target never fires its own directives),
//! 3. the top-down cascade over descendants,
//! 4. one bottom-up inference walk from the source's parent to the root,
//!    recomputing each ancestor as the OR of its children.
//!
//! Each call runs to a full fixed point before the next is accepted; the
//! `&mut Project` borrow makes interleaved partial states unrepresentable.
//! Change notification is an observer attached at the boundary
//! ([`SelectionObserver`]), keeping the engine headless and testable.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod engine;
mod observer;
mod tree;

pub use engine::{DisableOutcome, DisableStatus};
pub use observer::{NullObserver, SelectionObserver};
pub use tree::{SelectionTree, TreeNodeId};
