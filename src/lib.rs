//! cfgm library
//!
//! Layered configuration resolution ([`config`]) and shell-style `${VAR}`
//! parameter expansion ([`expand`]), plus the pieces of the `cfgm` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod expand;
pub mod logging;
pub mod server;
pub mod settings;
