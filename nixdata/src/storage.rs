//! The storage interface entities are bound to.
//!
//! Storage is a tree of named groups. Each group holds named sub-groups, named n-dimensional
//! datasets and named scalar attributes. Entities never touch a file directly; everything goes
//! through these two traits, so any backend implementing them can hold a NIX data tree.
//!
use crate::buffer::Buffer;
use crate::datatype::DataType;
use crate::errors::Result;
use crate::value::Value;

/// A trait for a group in an arbitrary hierarchical store.
///
/// Handles are cheap. Two handles for the same group see each other's changes.
///
pub trait Group: Send + Sync {
    /// Open the sub-group called `name`, creating it if it doesn't exist yet.
    ///
    fn open_group(&self, name: &str) -> Result<Box<dyn Group>>;

    /// Whether a sub-group called `name` exists.
    ///
    fn has_group(&self, name: &str) -> bool;

    /// Names of the sub-groups, in sorted order.
    ///
    fn group_names(&self) -> Result<Vec<String>>;

    /// Number of children, sub-groups and datasets both.
    ///
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Create a dataset with the given extent and element type. Cells start out with the element
    /// type's default value.
    ///
    /// Should fail with `DuplicateName` if a child called `name` already exists.
    ///
    fn create_dataset(&self, name: &str, shape: &[usize], data_type: DataType)
        -> Result<Box<dyn Dataset>>;

    /// Should fail with `NotFound` if there is no dataset called `name`.
    ///
    fn get_dataset(&self, name: &str) -> Result<Box<dyn Dataset>>;

    /// Whether a dataset called `name` exists.
    ///
    fn has_data(&self, name: &str) -> bool;

    /// Delete the child, group or dataset, called `name`, along with everything beneath it.
    ///
    /// Should fail with `NotFound` if there is no such child.
    ///
    fn delete(&self, name: &str) -> Result<()>;

    fn get_attr(&self, name: &str) -> Result<Option<Value>>;

    fn set_attr(&self, name: &str, value: Value) -> Result<()>;

    /// Remove an attribute. Removing an attribute that isn't there is not an error.
    ///
    fn remove_attr(&self, name: &str) -> Result<()>;
}

/// A trait for a typed, shaped, resizable dataset in an arbitrary store.
///
pub trait Dataset: Send + Sync {
    fn shape(&self) -> Result<Vec<usize>>;

    /// Change the extent. The rank can't change. Data in the overlapping region is kept.
    ///
    fn set_shape(&self, shape: &[usize]) -> Result<()>;

    fn data_type(&self) -> Result<DataType>;

    /// Read the hyperslab of extent `count` starting at `offset`, in the stored element type.
    ///
    fn read(&self, count: &[usize], offset: &[usize]) -> Result<Buffer>;

    /// Write `data` into the hyperslab starting at `offset`, converting to the stored element
    /// type.
    ///
    fn write(&self, data: &Buffer, offset: &[usize]) -> Result<()>;
}
