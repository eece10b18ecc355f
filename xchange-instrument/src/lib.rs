#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

//! # xchange-instrument
//!
//! Market/symbol/fee data structures and the write-once-publish market index shared by every
//! venue driver in `xchange`.

pub mod fee;
pub mod index;
pub mod market;
pub mod symbol;
