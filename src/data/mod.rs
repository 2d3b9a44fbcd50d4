//! Data loading, encoding and partitioning
//!
//! This module turns a delimited tabular file into numeric samples and
//! splits them into the disjoint partitions an experiment works on.

pub mod csv;
pub mod encoding;
pub mod partition;

pub use self::csv::*;
pub use self::encoding::*;
pub use self::partition::*;
