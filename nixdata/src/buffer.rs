//! Typed n-dimensional buffers passed across the storage interface.
//!
use std::cmp;
use std::fmt::Debug;

use ndarray::{ArrayD, IxDyn, Slice};
use num_traits::{NumCast, ToPrimitive};

use crate::datatype::{DataType, Element};
use crate::errors::{Error, Result};

/// An n-dimensional array of one of the supported element types.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
    String(ArrayD<String>),
}

/// Evaluate `$body` with `$array` bound to the inner array, whatever its element type.
macro_rules! with_array {
    ($buffer:expr, $array:ident => $body:expr) => {
        match $buffer {
            Buffer::Bool($array) => $body,
            Buffer::Int8($array) => $body,
            Buffer::Int16($array) => $body,
            Buffer::Int32($array) => $body,
            Buffer::Int64($array) => $body,
            Buffer::UInt8($array) => $body,
            Buffer::UInt16($array) => $body,
            Buffer::UInt32($array) => $body,
            Buffer::UInt64($array) => $body,
            Buffer::Float($array) => $body,
            Buffer::Double($array) => $body,
            Buffer::String($array) => $body,
        }
    };
}

/// Like `with_array` but wraps the result back up in the same variant.
macro_rules! map_array {
    ($buffer:expr, $array:ident => $body:expr) => {
        match $buffer {
            Buffer::Bool($array) => Buffer::Bool($body),
            Buffer::Int8($array) => Buffer::Int8($body),
            Buffer::Int16($array) => Buffer::Int16($body),
            Buffer::Int32($array) => Buffer::Int32($body),
            Buffer::Int64($array) => Buffer::Int64($body),
            Buffer::UInt8($array) => Buffer::UInt8($body),
            Buffer::UInt16($array) => Buffer::UInt16($body),
            Buffer::UInt32($array) => Buffer::UInt32($body),
            Buffer::UInt64($array) => Buffer::UInt64($body),
            Buffer::Float($array) => Buffer::Float($body),
            Buffer::Double($array) => Buffer::Double($body),
            Buffer::String($array) => Buffer::String($body),
        }
    };
}

impl Buffer {
    /// A buffer of the given type and shape filled with the element type's default value.
    ///
    pub fn default_of(data_type: DataType, shape: &[usize]) -> Self {
        let shape = IxDyn(shape);
        match data_type {
            DataType::Bool => Buffer::Bool(ArrayD::default(shape)),
            DataType::Int8 => Buffer::Int8(ArrayD::default(shape)),
            DataType::Int16 => Buffer::Int16(ArrayD::default(shape)),
            DataType::Int32 => Buffer::Int32(ArrayD::default(shape)),
            DataType::Int64 => Buffer::Int64(ArrayD::default(shape)),
            DataType::UInt8 => Buffer::UInt8(ArrayD::default(shape)),
            DataType::UInt16 => Buffer::UInt16(ArrayD::default(shape)),
            DataType::UInt32 => Buffer::UInt32(ArrayD::default(shape)),
            DataType::UInt64 => Buffer::UInt64(ArrayD::default(shape)),
            DataType::Float => Buffer::Float(ArrayD::default(shape)),
            DataType::Double => Buffer::Double(ArrayD::default(shape)),
            DataType::String => Buffer::String(ArrayD::default(shape)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Buffer::Bool(_) => DataType::Bool,
            Buffer::Int8(_) => DataType::Int8,
            Buffer::Int16(_) => DataType::Int16,
            Buffer::Int32(_) => DataType::Int32,
            Buffer::Int64(_) => DataType::Int64,
            Buffer::UInt8(_) => DataType::UInt8,
            Buffer::UInt16(_) => DataType::UInt16,
            Buffer::UInt32(_) => DataType::UInt32,
            Buffer::UInt64(_) => DataType::UInt64,
            Buffer::Float(_) => DataType::Float,
            Buffer::Double(_) => DataType::Double,
            Buffer::String(_) => DataType::String,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, array => array.shape())
    }

    pub fn len(&self) -> usize {
        with_array!(self, array => array.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the hyperslab of extent `count` starting at `offset`.
    ///
    pub fn select(&self, count: &[usize], offset: &[usize]) -> Result<Self> {
        check_selection(self.shape(), count, offset)?;
        let selected = map_array!(self, array => array
            .slice_each_axis(|axis| hyperslab(count, offset, axis.axis.index()))
            .to_owned());

        Ok(selected)
    }

    /// Overwrite the hyperslab starting at `offset` with the contents of `source`.
    ///
    /// `source` is converted to this buffer's element type first.
    ///
    pub fn assign_at(&mut self, source: &Buffer, offset: &[usize]) -> Result<()> {
        let count = source.shape().to_vec();
        check_selection(self.shape(), &count, offset)?;
        let source = source.clone().convert(self.data_type())?;
        match (self, source) {
            (Buffer::Bool(a), Buffer::Bool(b)) => assign(a, &b, &count, offset),
            (Buffer::Int8(a), Buffer::Int8(b)) => assign(a, &b, &count, offset),
            (Buffer::Int16(a), Buffer::Int16(b)) => assign(a, &b, &count, offset),
            (Buffer::Int32(a), Buffer::Int32(b)) => assign(a, &b, &count, offset),
            (Buffer::Int64(a), Buffer::Int64(b)) => assign(a, &b, &count, offset),
            (Buffer::UInt8(a), Buffer::UInt8(b)) => assign(a, &b, &count, offset),
            (Buffer::UInt16(a), Buffer::UInt16(b)) => assign(a, &b, &count, offset),
            (Buffer::UInt32(a), Buffer::UInt32(b)) => assign(a, &b, &count, offset),
            (Buffer::UInt64(a), Buffer::UInt64(b)) => assign(a, &b, &count, offset),
            (Buffer::Float(a), Buffer::Float(b)) => assign(a, &b, &count, offset),
            (Buffer::Double(a), Buffer::Double(b)) => assign(a, &b, &count, offset),
            (Buffer::String(a), Buffer::String(b)) => assign(a, &b, &count, offset),
            // convert() guarantees matching variants
            (a, b) => {
                return Err(Error::TypeMismatch(format!(
                    "cannot assign {} data to {} buffer",
                    b.data_type(),
                    a.data_type()
                )))
            }
        }

        Ok(())
    }

    /// A copy of this buffer with a new extent. The overlapping region is preserved, new cells
    /// get the element type's default value.
    ///
    pub fn resized(&self, shape: &[usize]) -> Result<Self> {
        if shape.len() != self.shape().len() {
            return Err(Error::RankMismatch {
                expected: self.shape().len(),
                actual: shape.len(),
            });
        }

        let overlap: Vec<usize> = self
            .shape()
            .iter()
            .zip(shape)
            .map(|(old, new)| cmp::min(*old, *new))
            .collect();
        let origin = vec![0; shape.len()];

        let mut resized = Self::default_of(self.data_type(), shape);
        resized.assign_at(&self.select(&overlap, &origin)?, &origin)?;

        Ok(resized)
    }

    /// Convert to another element type.
    ///
    pub fn convert(self, data_type: DataType) -> Result<Self> {
        if self.data_type() == data_type {
            return Ok(self);
        }

        match data_type {
            DataType::Bool => convert_to::<bool>(self),
            DataType::Int8 => convert_to::<i8>(self),
            DataType::Int16 => convert_to::<i16>(self),
            DataType::Int32 => convert_to::<i32>(self),
            DataType::Int64 => convert_to::<i64>(self),
            DataType::UInt8 => convert_to::<u8>(self),
            DataType::UInt16 => convert_to::<u16>(self),
            DataType::UInt32 => convert_to::<u32>(self),
            DataType::UInt64 => convert_to::<u64>(self),
            DataType::Float => convert_to::<f32>(self),
            DataType::Double => convert_to::<f64>(self),
            DataType::String => convert_to::<String>(self),
        }
    }

    /// Numeric cast of every element, used by `Element::from_buffer`.
    ///
    pub(crate) fn cast_numeric<T>(self) -> Result<ArrayD<T>>
    where
        T: NumCast + Debug,
    {
        match self {
            Buffer::Int8(array) => cast_array(array),
            Buffer::Int16(array) => cast_array(array),
            Buffer::Int32(array) => cast_array(array),
            Buffer::Int64(array) => cast_array(array),
            Buffer::UInt8(array) => cast_array(array),
            Buffer::UInt16(array) => cast_array(array),
            Buffer::UInt32(array) => cast_array(array),
            Buffer::UInt64(array) => cast_array(array),
            Buffer::Float(array) => cast_array(array),
            Buffer::Double(array) => cast_array(array),
            other => Err(Error::TypeMismatch(format!(
                "cannot convert {} data to a numeric type",
                other.data_type()
            ))),
        }
    }
}

/// Check that a hyperslab of extent `count` at `offset` fits inside `extent`.
///
pub fn check_selection(extent: &[usize], count: &[usize], offset: &[usize]) -> Result<()> {
    for selection in [count, offset] {
        if selection.len() != extent.len() {
            return Err(Error::RankMismatch {
                expected: extent.len(),
                actual: selection.len(),
            });
        }
    }

    for axis in 0..extent.len() {
        let end = offset[axis].checked_add(count[axis]);
        if end.map_or(true, |end| end > extent[axis]) {
            return Err(Error::OutOfBounds(format!(
                "selection of {count:?} at {offset:?} does not fit in extent {extent:?}"
            )));
        }
    }

    Ok(())
}

fn hyperslab(count: &[usize], offset: &[usize], axis: usize) -> Slice {
    Slice::from(offset[axis]..offset[axis] + count[axis])
}

fn assign<T: Clone>(target: &mut ArrayD<T>, source: &ArrayD<T>, count: &[usize], offset: &[usize]) {
    target
        .slice_each_axis_mut(|axis| hyperslab(count, offset, axis.axis.index()))
        .assign(source);
}

fn convert_to<T: Element>(buffer: Buffer) -> Result<Buffer> {
    Ok(T::into_buffer(T::from_buffer(buffer)?))
}

fn cast_array<S, T>(array: ArrayD<S>) -> Result<ArrayD<T>>
where
    S: ToPrimitive + Copy + Debug,
    T: NumCast,
{
    let mut values = Vec::with_capacity(array.len());
    for value in array.iter() {
        match <T as NumCast>::from(*value) {
            Some(value) => values.push(value),
            None => {
                return Err(Error::TypeMismatch(format!(
                    "value {value:?} is out of range for the target type"
                )))
            }
        }
    }

    Ok(ArrayD::from_shape_vec(array.raw_dim(), values)?)
}
