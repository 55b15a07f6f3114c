//! Pure-Rust parsing of the HDF5 binary structures a MultiChannel Systems
//! recording uses.
//!
//! Everything here works on a borrowed `&[u8]` holding the file, with
//! addresses relative to the superblock's base address. The crate is read
//! only and has no notion of open handles; `mcsh5` builds those on top.
//!
//! Without the default `std` feature the crate builds as `no_std` over
//! `alloc`. The deflate filter needs `std`.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod btree_v1;
pub mod checksum;
pub mod data_layout;
pub mod data_read;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod filter_pipeline;
pub mod filters;
pub mod global_heap;
pub mod group;
pub mod link_message;
pub mod local_heap;
pub mod message_type;
pub mod object_header;
pub mod selection;
pub mod signature;
pub mod superblock;
pub mod symbol_table;

mod bytes;

pub use bytes::is_undefined;
pub use error::FormatError;
