//! Element type tags and the mapping from Rust primitive types onto them.
//!
use std::fmt::{self, Debug};

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::errors::{Error, Result};

/// The type of the elements stored in a dataset.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    String,
}

impl DataType {
    /// Integer and floating point types are numeric. `Bool` and `String` are not.
    ///
    pub fn is_numeric(self) -> bool {
        !matches!(self, DataType::Bool | DataType::String)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type that can be stored in, and read back from, a dataset.
///
/// Numeric elements convert between each other on the way in and out of storage, the same way
/// HDF5 converts between memory and file types. A value that can't be represented in the target
/// type is a `TypeMismatch`.
///
pub trait Element: Clone + Debug + Default + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Wrap an array of this type as a `Buffer`
    fn into_buffer(array: ArrayD<Self>) -> Buffer;

    /// Unwrap a `Buffer`, converting its elements to this type if needed
    fn from_buffer(buffer: Buffer) -> Result<ArrayD<Self>>;
}

macro_rules! numeric_element {
    ($type:ty, $variant:ident) => {
        impl Element for $type {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_buffer(array: ArrayD<Self>) -> Buffer {
                Buffer::$variant(array)
            }

            fn from_buffer(buffer: Buffer) -> Result<ArrayD<Self>> {
                match buffer {
                    Buffer::$variant(array) => Ok(array),
                    other => other.cast_numeric::<Self>(),
                }
            }
        }
    };
}

numeric_element!(i8, Int8);
numeric_element!(i16, Int16);
numeric_element!(i32, Int32);
numeric_element!(i64, Int64);
numeric_element!(u8, UInt8);
numeric_element!(u16, UInt16);
numeric_element!(u32, UInt32);
numeric_element!(u64, UInt64);
numeric_element!(f32, Float);
numeric_element!(f64, Double);

impl Element for bool {
    const DATA_TYPE: DataType = DataType::Bool;

    fn into_buffer(array: ArrayD<Self>) -> Buffer {
        Buffer::Bool(array)
    }

    fn from_buffer(buffer: Buffer) -> Result<ArrayD<Self>> {
        match buffer {
            Buffer::Bool(array) => Ok(array),
            other => Err(Error::TypeMismatch(format!(
                "cannot read {} data as bool",
                other.data_type()
            ))),
        }
    }
}

impl Element for String {
    const DATA_TYPE: DataType = DataType::String;

    fn into_buffer(array: ArrayD<Self>) -> Buffer {
        Buffer::String(array)
    }

    fn from_buffer(buffer: Buffer) -> Result<ArrayD<Self>> {
        match buffer {
            Buffer::String(array) => Ok(array),
            other => Err(Error::TypeMismatch(format!(
                "cannot read {} data as string",
                other.data_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{arr1, IxDyn};
    use paste::paste;

    macro_rules! numeric_element_tests {
        ($type:ident, $variant:ident) => {
            paste! {
                #[test]
                fn [<$type _data_type>]() {
                    assert_eq!(<$type as Element>::DATA_TYPE, DataType::$variant);
                    assert!(DataType::$variant.is_numeric());
                }

                #[test]
                fn [<$type _from_double_buffer>]() -> Result<()> {
                    let buffer = Buffer::Double(arr1(&[1.0, 2.0, 42.0]).into_dyn());
                    let array = <$type as Element>::from_buffer(buffer)?;
                    assert_eq!(array.shape(), &[3]);
                    assert_eq!(array[IxDyn(&[2])], 42 as $type);

                    Ok(())
                }

                #[test]
                fn [<$type _from_string_buffer>]() {
                    let buffer = Buffer::String(arr1(&[String::from("a")]).into_dyn());
                    assert!(matches!(
                        <$type as Element>::from_buffer(buffer),
                        Err(Error::TypeMismatch(_))
                    ));
                }
            }
        };
    }

    numeric_element_tests!(i8, Int8);
    numeric_element_tests!(i16, Int16);
    numeric_element_tests!(i32, Int32);
    numeric_element_tests!(i64, Int64);
    numeric_element_tests!(u8, UInt8);
    numeric_element_tests!(u16, UInt16);
    numeric_element_tests!(u32, UInt32);
    numeric_element_tests!(u64, UInt64);
    numeric_element_tests!(f32, Float);
    numeric_element_tests!(f64, Double);

    #[test]
    fn non_numeric_types() {
        assert!(!DataType::Bool.is_numeric());
        assert!(!DataType::String.is_numeric());
    }

    #[test]
    fn unrepresentable_cast() {
        let buffer = Buffer::Double(arr1(&[-1.0]).into_dyn());
        assert!(matches!(
            u8::from_buffer(buffer),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn display() {
        assert_eq!(DataType::UInt16.to_string(), "uint16");
    }
}
