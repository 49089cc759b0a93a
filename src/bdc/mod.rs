// SPDX-License-Identifier: MIT

pub mod analytics;
pub mod config;
pub mod resolvers;
pub mod transport;
pub mod workflow;
