pub mod byte_range;

pub use byte_range::ByteRangeDocument;
