// SPDX-License-Identifier: MIT

pub mod error;
pub mod resolver;
pub mod value;

pub use error::{
    AnalyticsError, BdcError, ConditionError, DecodeError, EngineError, EngineErrorKind,
    RegistryError, ResolverError, TransportError,
};
pub use resolver::{DispatchMode, ErrorPolicy, StepResolver};
pub use value::DynamicValue;
