//! Utility functions for coordinate conversions.

pub mod safe_cast;
