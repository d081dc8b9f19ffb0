//! Types shared between the gallery client core and its front ends.

pub mod domain;
pub mod error;
pub mod protocol;
