//! Data carriers and ports.
//!
//! Nothing in here performs IO or touches an execution context; adapters in
//! `infrastructure` implement the ports and `application` wires them together.

pub mod flow;
pub mod outcome;
pub mod ports;
pub mod product;
pub mod purchase;
