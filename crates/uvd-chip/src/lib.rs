//! Silicon model for the UVD 6.0 video decode block.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the block as the driver sees it: register indices and bit
//! fields, the command packets the engine consumes from its ring, and the
//! layout of the firmware window the embedded VCPU executes from.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register index map (dword indices) and bit definitions |
//! | [`packet`] | `PACKET0` register-write and `PACKET2` filler encoding |
//! | [`memory`] | Firmware window constants and page alignment |
//!
//! Register indices are dword indices as the memory controller decodes them;
//! the byte offset inside the register BAR is `index * 4`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod memory;
pub mod packet;
pub mod regs;
