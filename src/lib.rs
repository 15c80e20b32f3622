#![doc = include_str!("../README.md")]

pub mod emu;
pub mod plat;
