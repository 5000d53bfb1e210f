use chrono::{DateTime, Utc};
use ndarray::{arr1, ArrayBase, ArrayD, Data, DataMut, Dimension as ArrayDimension};
use tracing::{debug, warn};

use crate::buffer::Buffer;
use crate::calibration::Calibration;
use crate::dataset::DataSet;
use crate::datatype::{DataType, Element};
use crate::dimensions::{Dimension, RangeDimension, SampledDimension, SetDimension};
use crate::entity::Entity;
use crate::errors::{Error, Result};
use crate::sources::SourceLinks;
use crate::storage::{Dataset, Group};
use crate::value::{number_attr, text_attr, Value};

const DATA: &str = "data";
const DIMENSIONS: &str = "dimensions";
const EXPANSION_ORIGIN: &str = "expansion_origin";
const LABEL: &str = "label";
const POLYNOM_COEFFICIENTS: &str = "polynom_coefficients";
const UNIT: &str = "unit";

/// An n-dimensional, typed, calibratable dataset entity with a descriptor for each of its axes.
///
/// Raw samples are stored as written. Calibration, if any, is applied each time data is read
/// and never touches the stored samples.
///
pub struct DataArray {
    entity: Entity,
    data: DataSet,
    dimensions: Box<dyn Group>,
    sources: SourceLinks,
}

impl DataArray {
    /// Create a new data array as the sub-group `name` of `parent`.
    ///
    /// The array's data is created with the given element type and initial extent. Every cell
    /// starts out as the element type's default.
    ///
    pub fn create_new(
        parent: &dyn Group,
        name: &str,
        type_: &str,
        data_type: DataType,
        shape: &[usize],
    ) -> Result<Self> {
        let entity = Entity::create_new(parent, name, type_)?;
        let group = entity.group();
        let data = DataSet::new(group.create_dataset(DATA, shape, data_type)?);
        let dimensions = group.open_group(DIMENSIONS)?;
        let sources = SourceLinks::new(group)?;
        debug!(name, %data_type, ?shape, "created data array");

        Ok(Self {
            entity,
            data,
            dimensions,
            sources,
        })
    }

    /// Bind to an existing data array group.
    ///
    pub fn open(group: Box<dyn Group>) -> Result<Self> {
        let entity = Entity::open(group)?;
        let group = entity.group();
        if !group.has_data(DATA) {
            return Err(Error::CorruptData(format!(
                "data array {} has no data",
                entity.name()?
            )));
        }
        let data = DataSet::new(group.get_dataset(DATA)?);
        let dimensions = group.open_group(DIMENSIONS)?;
        let sources = SourceLinks::new(group)?;

        Ok(Self {
            entity,
            data,
            dimensions,
            sources,
        })
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// The raw, uncalibrated data.
    pub fn dataset(&self) -> &DataSet {
        &self.data
    }

    pub fn source_links(&self) -> &SourceLinks {
        &self.sources
    }

    // Data

    /// Read the hyperslab of extent `count` starting at `offset`, calibrated.
    ///
    /// With no polynomial coefficients stored this is a plain read of the raw samples. Otherwise
    /// samples are read as `f64`, calibrated, then converted to `T`. An unset expansion origin
    /// counts as 0.0.
    ///
    pub fn read_data<T: Element>(&self, count: &[usize], offset: &[usize]) -> Result<ArrayD<T>> {
        let calibration = self.calibration()?;
        if calibration.is_identity() {
            return self.data.read_data(count, offset);
        }

        let mut samples = self.data.read_data::<f64>(count, offset)?;
        calibration.apply_in_place(&mut samples);

        T::from_buffer(Buffer::Double(samples))
    }

    /// Fill in a preallocated array with calibrated data starting at `offset`.
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

    /// Read all of the data, calibrated.
    ///
    pub fn read_all<T: Element>(&self) -> Result<ArrayD<T>> {
        let extent = self.data_extent()?;
        let origin = vec![0; extent.len()];

        self.read_data(&extent, &origin)
    }

    /// Write raw samples. Calibration is not inverted.
    ///
    pub fn write_data<T, S, D>(&self, data: &ArrayBase<S, D>, offset: &[usize]) -> Result<()>
    where
        T: Element,
        S: Data<Elem = T>,
        D: ArrayDimension,
    {
        self.data.write_data(data, offset)
    }

    pub fn data_extent(&self) -> Result<Vec<usize>> {
        self.data.data_extent()
    }

    pub fn set_data_extent(&self, extent: &[usize]) -> Result<()> {
        self.data.set_data_extent(extent)
    }

    pub fn data_type(&self) -> Result<DataType> {
        self.data.data_type()
    }

    /// The stored calibration
    pub fn calibration(&self) -> Result<Calibration> {
        Ok(Calibration::new(
            self.polynom_coefficients()?,
            self.expansion_origin()?,
        ))
    }

    // Dimensions

    pub fn append_set_dimension(&self) -> Result<SetDimension> {
        let index = self.dimension_count()? + 1;

        SetDimension::create_new(self.dimensions.as_ref(), index)
    }

    pub fn append_sampled_dimension(&self, sampling_interval: f64) -> Result<SampledDimension> {
        let index = self.dimension_count()? + 1;

        SampledDimension::create_new(self.dimensions.as_ref(), index, sampling_interval)
    }

    pub fn append_range_dimension(&self, ticks: &[f64]) -> Result<RangeDimension> {
        let index = self.dimension_count()? + 1;

        RangeDimension::create_new(self.dimensions.as_ref(), index, ticks)
    }

    /// Describe the only axis of a 1-d numeric array with its own data as ticks.
    ///
    /// Fails with `InvalidShape` if the array isn't 1-d or isn't numeric, and with
    /// `DimensionLimit` if the array already has a dimension.
    ///
    pub fn append_alias_range_dimension(&self) -> Result<RangeDimension> {
        let rank = self.data.rank()?;
        let data_type = self.data_type()?;
        if rank != 1 || !data_type.is_numeric() {
            return Err(Error::InvalidShape(format!(
                "alias range dimensions need 1-d numeric data, not {rank}-d {data_type} data"
            )));
        }
        if self.dimension_count()? > 0 {
            return Err(Error::DimensionLimit(String::from(
                "an alias range dimension must be the only dimension of its array",
            )));
        }

        RangeDimension::create_alias(self.dimensions.as_ref(), 1, self.data_storage()?)
    }

    #[deprecated(note = "the index is ignored, use `append_set_dimension`")]
    pub fn create_set_dimension(&self, index: usize) -> Result<SetDimension> {
        warn!(index, "create_set_dimension is deprecated, use append_set_dimension");
        self.append_set_dimension()
    }

    #[deprecated(note = "the index is ignored, use `append_sampled_dimension`")]
    pub fn create_sampled_dimension(
        &self,
        index: usize,
        sampling_interval: f64,
    ) -> Result<SampledDimension> {
        warn!(
            index,
            "create_sampled_dimension is deprecated, use append_sampled_dimension"
        );
        self.append_sampled_dimension(sampling_interval)
    }

    #[deprecated(note = "the index is ignored, use `append_range_dimension`")]
    pub fn create_range_dimension(&self, index: usize, ticks: &[f64]) -> Result<RangeDimension> {
        warn!(index, "create_range_dimension is deprecated, use append_range_dimension");
        self.append_range_dimension(ticks)
    }

    #[deprecated(note = "use `append_alias_range_dimension`")]
    pub fn create_alias_range_dimension(&self) -> Result<RangeDimension> {
        warn!("create_alias_range_dimension is deprecated, use append_alias_range_dimension");
        self.append_alias_range_dimension()
    }

    /// Remove every dimension descriptor. Succeeds even if there are none.
    ///
    pub fn delete_dimensions(&self) -> Result<bool> {
        let names = self.dimensions.group_names()?;
        for name in &names {
            self.dimensions.delete(name)?;
        }
        debug!(count = names.len(), "deleted dimensions");

        Ok(true)
    }

    pub fn dimension_count(&self) -> Result<usize> {
        Ok(self.dimensions.group_names()?.len())
    }

    /// The dimension descriptor at 1-based `index`.
    ///
    pub fn get_dimension(&self, index: usize) -> Result<Dimension> {
        let count = self.dimension_count()?;
        let key = index.to_string();
        if index == 0 || index > count || !self.dimensions.has_group(&key) {
            return Err(Error::OutOfBounds(format!(
                "no dimension {index} in array with {count} dimensions"
            )));
        }

        Dimension::load(self.dimensions.open_group(&key)?, index, || {
            self.data_storage()
        })
    }

    /// All dimension descriptors in index order.
    ///
    pub fn dimensions(&self) -> Result<Vec<Dimension>> {
        (1..=self.dimension_count()?)
            .map(|index| self.get_dimension(index))
            .collect()
    }

    // Properties

    pub fn label(&self) -> Result<Option<String>> {
        text_attr(self.group().get_attr(LABEL)?, LABEL)
    }

    pub fn set_label(&self, label: impl Into<Value>) -> Result<()> {
        let label = label.into().into_text(LABEL)?;
        self.entity.set_attr(LABEL, Value::from(label))
    }

    pub fn clear_label(&self) -> Result<()> {
        self.entity.remove_attr(LABEL)
    }

    pub fn unit(&self) -> Result<Option<String>> {
        text_attr(self.group().get_attr(UNIT)?, UNIT)
    }

    pub fn set_unit(&self, unit: impl Into<Value>) -> Result<()> {
        let unit = unit.into().into_text(UNIT)?;
        self.entity.set_attr(UNIT, Value::from(unit))
    }

    pub fn clear_unit(&self) -> Result<()> {
        self.entity.remove_attr(UNIT)
    }

    /// Calibration coefficients, lowest degree first. Empty if the array isn't calibrated.
    ///
    pub fn polynom_coefficients(&self) -> Result<Vec<f64>> {
        let group = self.group();
        if !group.has_data(POLYNOM_COEFFICIENTS) {
            return Ok(vec![]);
        }
        let coefficients = DataSet::new(group.get_dataset(POLYNOM_COEFFICIENTS)?);

        Ok(coefficients.read_all::<f64>()?.iter().copied().collect())
    }

    /// Replace the calibration coefficients. An empty slice removes calibration.
    ///
    pub fn set_polynom_coefficients(&self, coefficients: &[f64]) -> Result<()> {
        let group = self.group();
        if group.has_data(POLYNOM_COEFFICIENTS) {
            group.delete(POLYNOM_COEFFICIENTS)?;
        }
        if !coefficients.is_empty() {
            let dataset = group.create_dataset(
                POLYNOM_COEFFICIENTS,
                &[coefficients.len()],
                DataType::Double,
            )?;
            DataSet::new(dataset).write_data(&arr1(coefficients), &[0])?;
        }

        self.entity.force_updated_at(&Utc::now())
    }

    pub fn expansion_origin(&self) -> Result<Option<f64>> {
        number_attr(self.group().get_attr(EXPANSION_ORIGIN)?, EXPANSION_ORIGIN)
    }

    pub fn set_expansion_origin(&self, origin: impl Into<Value>) -> Result<()> {
        let origin = origin.into().into_number(EXPANSION_ORIGIN)?;
        self.entity.set_attr(EXPANSION_ORIGIN, Value::from(origin))
    }

    pub fn clear_expansion_origin(&self) -> Result<()> {
        self.entity.remove_attr(EXPANSION_ORIGIN)
    }

    // Entity

    pub fn id(&self) -> Result<String> {
        self.entity.id()
    }

    pub fn name(&self) -> Result<String> {
        self.entity.name()
    }

    pub fn type_(&self) -> Result<String> {
        self.entity.type_()
    }

    pub fn set_type(&self, type_: impl Into<Value>) -> Result<()> {
        self.entity.set_type(type_)
    }

    pub fn definition(&self) -> Result<Option<String>> {
        self.entity.definition()
    }

    pub fn set_definition(&self, definition: impl Into<Value>) -> Result<()> {
        self.entity.set_definition(definition)
    }

    pub fn clear_definition(&self) -> Result<()> {
        self.entity.clear_definition()
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        self.entity.created_at()
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>> {
        self.entity.updated_at()
    }

    pub fn force_created_at(&self, time: &DateTime<Utc>) -> Result<()> {
        self.entity.force_created_at(time)
    }

    pub fn force_updated_at(&self, time: &DateTime<Utc>) -> Result<()> {
        self.entity.force_updated_at(time)
    }

    // Sources

    pub fn add_source(&self, id: &str) -> Result<()> {
        self.sources.add_source(id)
    }

    pub fn remove_source(&self, id: &str) -> Result<bool> {
        self.sources.remove_source(id)
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.has_source(id)
    }

    pub fn source_count(&self) -> Result<usize> {
        self.sources.source_count()
    }

    pub fn sources(&self) -> Result<Vec<String>> {
        self.sources.sources()
    }

    fn group(&self) -> &dyn Group {
        self.entity.group()
    }

    /// A fresh handle on the stored data, for alias range dimensions
    fn data_storage(&self) -> Result<Box<dyn Dataset>> {
        self.group().get_dataset(DATA)
    }
}
