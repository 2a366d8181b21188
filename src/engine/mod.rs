//! Engine modules: turn a resolved selection into an ordered bundle list.
//!
//! The engine sits between selection (which kexts the build wants) and the
//! bootloader config (which bundles to load, in what order, on which Darwin
//! versions). Everything here is pure: records in, entries out.

pub mod bundle;
pub mod load_order;
pub mod manifest;
pub mod variants;
