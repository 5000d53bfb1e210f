use ndarray::{ArrayBase, ArrayD, Data, DataMut, Dimension as ArrayDimension};

use crate::buffer::check_selection;
use crate::datatype::{DataType, Element};
use crate::errors::{Error, Result};
use crate::storage::Dataset;

/// A typed, shaped, resizable n-dimensional dataset bound to one storage location.
///
/// The rank is fixed when the underlying dataset is created. The extent along each axis can
/// change.
///
pub struct DataSet {
    dataset: Box<dyn Dataset>,
}

impl DataSet {
    pub fn new(dataset: Box<dyn Dataset>) -> Self {
        Self { dataset }
    }

    /// Write `data` into the dataset starting at `offset`.
    ///
    /// The extent of the written region is the shape of `data`.
    ///
    pub fn write_data<T, S, D>(&self, data: &ArrayBase<S, D>, offset: &[usize]) -> Result<()>
    where
        T: Element,
        S: Data<Elem = T>,
        D: ArrayDimension,
    {
        let extent = self.data_extent()?;
        check_selection(&extent, data.shape(), offset)?;
        let buffer = T::into_buffer(data.to_owned().into_dyn());

        self.dataset.write(&buffer, offset)
    }

    /// Read the hyperslab of extent `count` starting at `offset`.
    ///
    pub fn read_data<T: Element>(&self, count: &[usize], offset: &[usize]) -> Result<ArrayD<T>> {
        let extent = self.data_extent()?;
        check_selection(&extent, count, offset)?;

        T::from_buffer(self.dataset.read(count, offset)?)
    }

    /// Fill in a preallocated array with data starting at `offset`.
    ///
    /// The extent of the region read is the shape of `buffer`.
    ///
    pub fn read_data_into<T, S, D>(&self, buffer: &mut ArrayBase<S, D>, offset: &[usize]) -> Result<()>
    where
        T: Element,
        S: DataMut<Elem = T>,
        D: ArrayDimension,
    {
        let data = self.read_data::<T>(&buffer.shape().to_vec(), offset)?;
        buffer.view_mut().into_dyn().assign(&data);

        Ok(())
    }

    /// Read the whole dataset.
    ///
    pub fn read_all<T: Element>(&self) -> Result<ArrayD<T>> {
        let extent = self.data_extent()?;
        let origin = vec![0; extent.len()];

        self.read_data(&extent, &origin)
    }

    pub fn data_extent(&self) -> Result<Vec<usize>> {
        self.dataset.shape()
    }

    /// Change the extent of the dataset. Fails with `RankMismatch` if `extent` doesn't have the
    /// same number of axes as the dataset.
    ///
    pub fn set_data_extent(&self, extent: &[usize]) -> Result<()> {
        let rank = self.data_extent()?.len();
        if extent.len() != rank {
            return Err(Error::RankMismatch {
                expected: rank,
                actual: extent.len(),
            });
        }

        self.dataset.set_shape(extent)
    }

    pub fn data_type(&self) -> Result<DataType> {
        self.dataset.data_type()
    }

    pub fn rank(&self) -> Result<usize> {
        Ok(self.data_extent()?.len())
    }
}
