mod buffer;
mod calibration;
mod data_array;
mod dataset;
mod datatype;
mod dimensions;
mod entity;
mod errors;
mod memory;
mod sources;
mod storage;
mod value;

#[cfg(test)]
mod testing;

pub use buffer::check_selection;
pub use buffer::Buffer;
pub use calibration::Calibration;
pub use data_array::DataArray;
pub use dataset::DataSet;
pub use datatype::{DataType, Element};
pub use dimensions::{Dimension, DimensionType, RangeDimension, SampledDimension, SetDimension};
pub use entity::Entity;
pub use errors::{Error, Result};
pub use memory::{MemoryDataset, MemoryGroup};
pub use sources::SourceLinks;
pub use storage::{Dataset, Group};
pub use value::Value;
