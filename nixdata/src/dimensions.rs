//! Dimension descriptors: what each axis of a data array means.
//!
//! A descriptor is stored as a sub-group of its array's `dimensions` group, keyed by its 1-based
//! index. The `dimension_type` attribute on that group says which kind of descriptor it is.
//!
use std::fmt;
use std::str::FromStr;

use ndarray::{arr1, Array1};
use tracing::debug;

use crate::dataset::DataSet;
use crate::datatype::{DataType, Element};
use crate::errors::{Error, Result};
use crate::storage::{Dataset, Group};
use crate::value::{number_attr, text_attr, Value};

pub(crate) const DIMENSION_TYPE: &str = "dimension_type";
const ALIAS: &str = "alias";
const LABEL: &str = "label";
const LABELS: &str = "labels";
const OFFSET: &str = "offset";
const SAMPLING_INTERVAL: &str = "sampling_interval";
const TICKS: &str = "ticks";
const UNIT: &str = "unit";

/// The kinds of dimension descriptor.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DimensionType {
    /// Categorical axis
    Set,

    /// Regularly sampled axis
    Sample,

    /// Irregularly sampled axis with explicit ticks
    Range,
}

impl DimensionType {
    /// The tag stored in the `dimension_type` attribute
    pub fn as_str(self) -> &'static str {
        match self {
            DimensionType::Set => "set",
            DimensionType::Sample => "sample",
            DimensionType::Range => "range",
        }
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "set" => Ok(DimensionType::Set),
            "sample" => Ok(DimensionType::Sample),
            "range" => Ok(DimensionType::Range),
            _ => Err(Error::CorruptData(format!("invalid dimension type {s:?}"))),
        }
    }
}

/// A dimension descriptor attached to a data array.
///
pub enum Dimension {
    Set(SetDimension),
    Sampled(SampledDimension),
    Range(RangeDimension),
}

impl Dimension {
    /// Reconstruct the descriptor stored in `group` according to its type tag.
    ///
    /// `array_data` is the owning array's data, which alias range dimensions read their ticks
    /// from.
    ///
    pub(crate) fn load(
        group: Box<dyn Group>,
        index: usize,
        array_data: impl FnOnce() -> Result<Box<dyn Dataset>>,
    ) -> Result<Self> {
        let dimension_type = match group.get_attr(DIMENSION_TYPE)? {
            Some(Value::String(tag)) => tag.parse::<DimensionType>()?,
            Some(other) => {
                return Err(Error::CorruptData(format!(
                    "invalid dimension type {other} for dimension {index}"
                )))
            }
            None => {
                return Err(Error::CorruptData(format!(
                    "dimension {index} has no dimension type"
                )))
            }
        };

        let dimension = match dimension_type {
            DimensionType::Set => Self::Set(SetDimension { group, index }),
            DimensionType::Sample => Self::Sampled(SampledDimension { group, index }),
            DimensionType::Range => {
                let alias = matches!(group.get_attr(ALIAS)?, Some(Value::Bool(true)));
                let ticks = if alias {
                    Ticks::Alias(DataSet::new(array_data()?))
                } else {
                    Ticks::Stored
                };
                Self::Range(RangeDimension {
                    group,
                    index,
                    ticks,
                })
            }
        };

        Ok(dimension)
    }

    /// 1-based position of this dimension among its array's dimensions
    pub fn index(&self) -> usize {
        match self {
            Self::Set(dimension) => dimension.index,
            Self::Sampled(dimension) => dimension.index,
            Self::Range(dimension) => dimension.index,
        }
    }

    pub fn dimension_type(&self) -> DimensionType {
        match self {
            Self::Set(_) => DimensionType::Set,
            Self::Sampled(_) => DimensionType::Sample,
            Self::Range(_) => DimensionType::Range,
        }
    }

    pub fn as_set(&self) -> Option<&SetDimension> {
        match self {
            Self::Set(dimension) => Some(dimension),
            _ => None,
        }
    }

    pub fn as_sampled(&self) -> Option<&SampledDimension> {
        match self {
            Self::Sampled(dimension) => Some(dimension),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeDimension> {
        match self {
            Self::Range(dimension) => Some(dimension),
            _ => None,
        }
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimension")
            .field("index", &self.index())
            .field("dimension_type", &self.dimension_type())
            .finish()
    }
}

/// A categorical axis.
///
pub struct SetDimension {
    group: Box<dyn Group>,
    index: usize,
}

impl SetDimension {
    pub(crate) fn create_new(dimensions: &dyn Group, index: usize) -> Result<Self> {
        let group = open_dimension_group(dimensions, index, DimensionType::Set)?;

        Ok(Self { group, index })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Names of the categories, empty if none were given
    pub fn labels(&self) -> Result<Vec<String>> {
        if !self.group.has_data(LABELS) {
            return Ok(vec![]);
        }
        let labels = DataSet::new(self.group.get_dataset(LABELS)?);

        Ok(labels.read_all::<String>()?.iter().cloned().collect())
    }

    /// Replace the category names. An empty slice removes them.
    pub fn set_labels<S: AsRef<str>>(&self, labels: &[S]) -> Result<()> {
        let labels: Array1<String> = labels.iter().map(|s| s.as_ref().to_string()).collect();
        replace_vector(self.group.as_ref(), LABELS, DataType::String, &labels)
    }
}

/// A regularly sampled axis.
///
pub struct SampledDimension {
    group: Box<dyn Group>,
    index: usize,
}

impl SampledDimension {
    pub(crate) fn create_new(
        dimensions: &dyn Group,
        index: usize,
        sampling_interval: f64,
    ) -> Result<Self> {
        check_sampling_interval(sampling_interval)?;
        let group = open_dimension_group(dimensions, index, DimensionType::Sample)?;
        group.set_attr(SAMPLING_INTERVAL, Value::from(sampling_interval))?;

        Ok(Self { group, index })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sampling_interval(&self) -> Result<f64> {
        match number_attr(self.group.get_attr(SAMPLING_INTERVAL)?, SAMPLING_INTERVAL)? {
            Some(interval) => Ok(interval),
            None => Err(Error::CorruptData(format!(
                "sampled dimension {} has no sampling interval",
                self.index
            ))),
        }
    }

    pub fn set_sampling_interval(&self, sampling_interval: f64) -> Result<()> {
        check_sampling_interval(sampling_interval)?;
        self.group
            .set_attr(SAMPLING_INTERVAL, Value::from(sampling_interval))
    }

    pub fn offset(&self) -> Result<Option<f64>> {
        number_attr(self.group.get_attr(OFFSET)?, OFFSET)
    }

    pub fn set_offset(&self, offset: impl Into<Value>) -> Result<()> {
        let offset = offset.into().into_number(OFFSET)?;
        self.group.set_attr(OFFSET, Value::from(offset))
    }

    pub fn clear_offset(&self) -> Result<()> {
        self.group.remove_attr(OFFSET)
    }

    pub fn label(&self) -> Result<Option<String>> {
        text_attr(self.group.get_attr(LABEL)?, LABEL)
    }

    pub fn set_label(&self, label: impl Into<Value>) -> Result<()> {
        set_text(self.group.as_ref(), LABEL, label.into())
    }

    pub fn unit(&self) -> Result<Option<String>> {
        text_attr(self.group.get_attr(UNIT)?, UNIT)
    }

    pub fn set_unit(&self, unit: impl Into<Value>) -> Result<()> {
        set_text(self.group.as_ref(), UNIT, unit.into())
    }

    /// Position along the axis of the sample at `index` (0-based)
    pub fn position_at(&self, index: usize) -> Result<f64> {
        let offset = self.offset()?.unwrap_or(0.0);

        Ok(offset + index as f64 * self.sampling_interval()?)
    }

    /// Index of the sample nearest to `position`.
    ///
    /// Positions before the first sample are out of bounds.
    ///
    pub fn index_of(&self, position: f64) -> Result<usize> {
        let offset = self.offset()?.unwrap_or(0.0);
        let index = ((position - offset) / self.sampling_interval()?).round();
        if index.is_nan() || index < 0.0 {
            return Err(Error::OutOfBounds(format!(
                "position {position} is before the first sample at {offset}"
            )));
        }

        Ok(index as usize)
    }

    /// Positions of `count` samples starting at sample `start`
    pub fn axis(&self, count: usize, start: usize) -> Result<Vec<f64>> {
        let offset = self.offset()?.unwrap_or(0.0);
        let interval = self.sampling_interval()?;

        Ok((start..start + count)
            .map(|index| offset + index as f64 * interval)
            .collect())
    }
}

/// Where a range dimension gets its ticks from.
///
enum Ticks {
    /// A `ticks` dataset in the dimension's own group
    Stored,

    /// The owning array's data
    Alias(DataSet),
}

/// An irregularly sampled axis with an explicit tick for each sample.
///
pub struct RangeDimension {
    group: Box<dyn Group>,
    index: usize,
    ticks: Ticks,
}

impl RangeDimension {
    pub(crate) fn create_new(dimensions: &dyn Group, index: usize, ticks: &[f64]) -> Result<Self> {
        check_ticks(ticks)?;
        let group = open_dimension_group(dimensions, index, DimensionType::Range)?;
        replace_vector(group.as_ref(), TICKS, DataType::Double, &arr1(ticks))?;

        Ok(Self {
            group,
            index,
            ticks: Ticks::Stored,
        })
    }

    /// A range dimension whose ticks are the data of its own array.
    ///
    pub(crate) fn create_alias(
        dimensions: &dyn Group,
        index: usize,
        array_data: Box<dyn Dataset>,
    ) -> Result<Self> {
        let group = open_dimension_group(dimensions, index, DimensionType::Range)?;
        group.set_attr(ALIAS, Value::from(true))?;

        Ok(Self {
            group,
            index,
            ticks: Ticks::Alias(DataSet::new(array_data)),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.ticks, Ticks::Alias(_))
    }

    pub fn ticks(&self) -> Result<Vec<f64>> {
        let ticks = match &self.ticks {
            Ticks::Stored => {
                if !self.group.has_data(TICKS) {
                    return Err(Error::CorruptData(format!(
                        "range dimension {} has no ticks",
                        self.index
                    )));
                }
                DataSet::new(self.group.get_dataset(TICKS)?).read_all::<f64>()?
            }
            Ticks::Alias(data) => data.read_all::<f64>()?,
        };

        Ok(ticks.iter().copied().collect())
    }

    /// Replace the ticks. They must be non-empty and sorted in ascending order.
    ///
    /// The ticks of an alias range dimension are its array's data and can't be set here.
    ///
    pub fn set_ticks(&self, ticks: &[f64]) -> Result<()> {
        if self.is_alias() {
            return Err(Error::InvalidArgument(String::from(
                "ticks of an alias range dimension are the data of its array",
            )));
        }
        check_ticks(ticks)?;

        replace_vector(self.group.as_ref(), TICKS, DataType::Double, &arr1(ticks))
    }

    pub fn label(&self) -> Result<Option<String>> {
        text_attr(self.group.get_attr(LABEL)?, LABEL)
    }

    pub fn set_label(&self, label: impl Into<Value>) -> Result<()> {
        set_text(self.group.as_ref(), LABEL, label.into())
    }

    pub fn unit(&self) -> Result<Option<String>> {
        text_attr(self.group.get_attr(UNIT)?, UNIT)
    }

    pub fn set_unit(&self, unit: impl Into<Value>) -> Result<()> {
        set_text(self.group.as_ref(), UNIT, unit.into())
    }

    /// The tick at `index` (0-based)
    pub fn tick_at(&self, index: usize) -> Result<f64> {
        let ticks = self.ticks()?;
        match ticks.get(index) {
            Some(tick) => Ok(*tick),
            None => Err(Error::OutOfBounds(format!(
                "index {index} is out of bounds for {} ticks",
                ticks.len()
            ))),
        }
    }

    /// Index of the first tick at or after `position`, clamped to the first and last ticks.
    ///
    pub fn index_of(&self, position: f64) -> Result<usize> {
        let ticks = self.ticks()?;
        if ticks.is_empty() {
            return Err(Error::OutOfBounds(String::from("range dimension has no ticks")));
        }

        let index = ticks.partition_point(|tick| *tick < position);

        Ok(index.min(ticks.len() - 1))
    }

    /// `count` ticks starting at tick `start`
    pub fn axis(&self, count: usize, start: usize) -> Result<Vec<f64>> {
        let ticks = self.ticks()?;
        match start.checked_add(count) {
            Some(end) if end <= ticks.len() => Ok(ticks[start..end].to_vec()),
            _ => Err(Error::OutOfBounds(format!(
                "{count} ticks from {start} is out of bounds for {} ticks",
                ticks.len()
            ))),
        }
    }
}

fn open_dimension_group(
    dimensions: &dyn Group,
    index: usize,
    dimension_type: DimensionType,
) -> Result<Box<dyn Group>> {
    let group = dimensions.open_group(&index.to_string())?;
    group.set_attr(DIMENSION_TYPE, Value::from(dimension_type.as_str()))?;
    debug!(index, %dimension_type, "created dimension");

    Ok(group)
}

fn check_sampling_interval(sampling_interval: f64) -> Result<()> {
    if sampling_interval.is_finite() && sampling_interval > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "sampling interval must be positive, got {sampling_interval}"
        )))
    }
}

fn check_ticks(ticks: &[f64]) -> Result<()> {
    if ticks.is_empty() {
        return Err(Error::InvalidArgument(String::from(
            "a range dimension needs at least one tick",
        )));
    }
    if ticks.windows(2).all(|pair| pair[0] <= pair[1]) && ticks.iter().all(|t| !t.is_nan()) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(String::from(
            "ticks must be sorted in ascending order",
        )))
    }
}

fn set_text(group: &dyn Group, name: &str, value: Value) -> Result<()> {
    let value = value.into_text(name)?;
    group.set_attr(name, Value::from(value))
}

/// Replace a 1-d dataset with `data`, or remove it if `data` is empty.
///
fn replace_vector<T: Element>(
    group: &dyn Group,
    name: &str,
    data_type: DataType,
    data: &Array1<T>,
) -> Result<()> {
    if group.has_data(name) {
        group.delete(name)?;
    }
    if data.is_empty() {
        return Ok(());
    }

    let dataset = DataSet::new(group.create_dataset(name, &[data.len()], data_type)?);
    dataset.write_data(data, &[0])
}
