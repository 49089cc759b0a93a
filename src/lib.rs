// SPDX-License-Identifier: MIT

//! Business-driven configuration (BDC) workflow engine.
//!
//! A backend describes, as data, a sequence of typed steps to execute on the
//! client. `sdk` holds the primitives (dynamic values, resolver capability,
//! errors); `bdc` holds the engine, the built-in resolvers and their
//! collaborators.

pub mod bdc;
pub mod sdk;
