//! Filters
//!
//! `fs` turns store entries into responses, `serve` binds a store to a URL
//! prefix.

pub(crate) mod fs;
pub(crate) mod serve;
