//! Binary layout of a dataset file.
//!
//! A dataset file is a header followed by every element in row-major order. All numbers are Big
//! Endian.
//!
//! ```text
//! magic number   u16
//! format version u32
//! type code      i32
//! rank           u32
//! extents        u64 * rank
//! elements
//! ```
//!
//! Booleans are one byte each. Strings are a u32 byte length followed by that many bytes of
//! UTF-8.
//!
use std::io::{Read, Write};
use std::mem::size_of;

use ndarray::{ArrayD, IxDyn};

use nixdata::{Buffer, DataType, Error, Result};

const MAGIC_NUMBER: u16 = 0x4E58;
const FORMAT_VERSION: u32 = 0;

const TYPE_BOOL: i32 = 1000;
const TYPE_I8: i32 = -1;
const TYPE_U8: i32 = 1;
const TYPE_I16: i32 = -2;
const TYPE_U16: i32 = 2;
const TYPE_I32: i32 = -4;
const TYPE_U32: i32 = 4;
const TYPE_I64: i32 = -8;
const TYPE_U64: i32 = 8;
const TYPE_F32: i32 = 32;
const TYPE_F64: i32 = 64;
const TYPE_STRING: i32 = 2000;

/// Dataset metadata read from the start of a dataset file
#[derive(Debug, PartialEq)]
pub(crate) struct Header {
    pub data_type: DataType,
    pub shape: Vec<usize>,
}

impl Header {
    fn len(&self) -> Result<usize> {
        self.shape
            .iter()
            .try_fold(1_usize, |len, extent| len.checked_mul(*extent))
            .ok_or_else(|| {
                Error::CorruptData(format!("dataset shape {:?} is too large", self.shape))
            })
    }
}

macro_rules! write_numbers {
    ($stream:expr, $array:expr) => {
        for value in $array.iter() {
            $stream.write_all(&value.to_be_bytes())?;
        }
    };
}

macro_rules! read_numbers {
    ($stream:expr, $header:expr, $type:ty) => {{
        let len = $header.len()?;
        let mut values: Vec<$type> = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            let mut buffer = [0; size_of::<$type>()];
            $stream.read_exact(&mut buffer)?;
            values.push(<$type>::from_be_bytes(buffer));
        }

        ArrayD::from_shape_vec(IxDyn(&$header.shape), values)?
    }};
}

/// Write a whole dataset to a stream
pub(crate) fn save(stream: &mut impl Write, data: &Buffer) -> Result<()> {
    write_u16(stream, MAGIC_NUMBER)?;
    write_u32(stream, FORMAT_VERSION)?;
    write_i32(stream, type_code(data.data_type()))?;
    write_u32(stream, data.shape().len() as u32)?;
    for extent in data.shape() {
        write_u64(stream, *extent as u64)?;
    }

    match data {
        Buffer::Bool(array) => {
            for value in array.iter() {
                stream.write_all(&[*value as u8])?;
            }
        }
        Buffer::Int8(array) => write_numbers!(stream, array),
        Buffer::Int16(array) => write_numbers!(stream, array),
        Buffer::Int32(array) => write_numbers!(stream, array),
        Buffer::Int64(array) => write_numbers!(stream, array),
        Buffer::UInt8(array) => write_numbers!(stream, array),
        Buffer::UInt16(array) => write_numbers!(stream, array),
        Buffer::UInt32(array) => write_numbers!(stream, array),
        Buffer::UInt64(array) => write_numbers!(stream, array),
        Buffer::Float(array) => write_numbers!(stream, array),
        Buffer::Double(array) => write_numbers!(stream, array),
        Buffer::String(array) => {
            for value in array.iter() {
                write_u32(stream, value.len() as u32)?;
                stream.write_all(value.as_bytes())?;
            }
        }
    }

    Ok(())
}

/// Read just the header of a dataset from a stream
pub(crate) fn load_header(stream: &mut impl Read) -> Result<Header> {
    let magic_number = read_u16(stream)?;
    if magic_number != MAGIC_NUMBER {
        return Err(Error::CorruptData(String::from("not a dataset file")));
    }
    let version = read_u32(stream)?;
    if version != FORMAT_VERSION {
        return Err(Error::CorruptData(format!(
            "unrecognized dataset format version {version}"
        )));
    }
    let data_type = data_type(read_i32(stream)?)?;
    let rank = read_u32(stream)? as usize;
    let mut shape = Vec::with_capacity(rank.min(32));
    for _ in 0..rank {
        let extent = read_u64(stream)?;
        let extent = usize::try_from(extent)
            .map_err(|_| Error::CorruptData(format!("extent {extent} is too large")))?;
        shape.push(extent);
    }

    let header = Header { data_type, shape };
    header.len()?;

    Ok(header)
}

/// Read a whole dataset from a stream
pub(crate) fn load(stream: &mut impl Read) -> Result<Buffer> {
    let header = load_header(stream)?;
    let buffer = match header.data_type {
        DataType::Bool => {
            let len = header.len()?;
            let mut values = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                values.push(read_byte(stream)? != 0);
            }
            Buffer::Bool(ArrayD::from_shape_vec(IxDyn(&header.shape), values)?)
        }
        DataType::Int8 => Buffer::Int8(read_numbers!(stream, header, i8)),
        DataType::Int16 => Buffer::Int16(read_numbers!(stream, header, i16)),
        DataType::Int32 => Buffer::Int32(read_numbers!(stream, header, i32)),
        DataType::Int64 => Buffer::Int64(read_numbers!(stream, header, i64)),
        DataType::UInt8 => Buffer::UInt8(read_numbers!(stream, header, u8)),
        DataType::UInt16 => Buffer::UInt16(read_numbers!(stream, header, u16)),
        DataType::UInt32 => Buffer::UInt32(read_numbers!(stream, header, u32)),
        DataType::UInt64 => Buffer::UInt64(read_numbers!(stream, header, u64)),
        DataType::Float => Buffer::Float(read_numbers!(stream, header, f32)),
        DataType::Double => Buffer::Double(read_numbers!(stream, header, f64)),
        DataType::String => {
            let len = header.len()?;
            let mut values = Vec::with_capacity(len.min(1 << 16));
            for _ in 0..len {
                values.push(read_string(stream)?);
            }
            Buffer::String(ArrayD::from_shape_vec(IxDyn(&header.shape), values)?)
        }
    };

    Ok(buffer)
}

fn type_code(data_type: DataType) -> i32 {
    match data_type {
        DataType::Bool => TYPE_BOOL,
        DataType::Int8 => TYPE_I8,
        DataType::Int16 => TYPE_I16,
        DataType::Int32 => TYPE_I32,
        DataType::Int64 => TYPE_I64,
        DataType::UInt8 => TYPE_U8,
        DataType::UInt16 => TYPE_U16,
        DataType::UInt32 => TYPE_U32,
        DataType::UInt64 => TYPE_U64,
        DataType::Float => TYPE_F32,
        DataType::Double => TYPE_F64,
        DataType::String => TYPE_STRING,
    }
}

fn data_type(type_code: i32) -> Result<DataType> {
    let data_type = match type_code {
        TYPE_BOOL => DataType::Bool,
        TYPE_I8 => DataType::Int8,
        TYPE_I16 => DataType::Int16,
        TYPE_I32 => DataType::Int32,
        TYPE_I64 => DataType::Int64,
        TYPE_U8 => DataType::UInt8,
        TYPE_U16 => DataType::UInt16,
        TYPE_U32 => DataType::UInt32,
        TYPE_U64 => DataType::UInt64,
        TYPE_F32 => DataType::Float,
        TYPE_F64 => DataType::Double,
        TYPE_STRING => DataType::String,
        _ => {
            return Err(Error::CorruptData(format!(
                "unknown type code {type_code}"
            )))
        }
    };

    Ok(data_type)
}

fn write_u16(stream: &mut impl Write, word: u16) -> Result<()> {
    stream.write_all(&word.to_be_bytes())?;

    Ok(())
}

fn write_i32(stream: &mut impl Write, word: i32) -> Result<()> {
    stream.write_all(&word.to_be_bytes())?;

    Ok(())
}

fn write_u32(stream: &mut impl Write, word: u32) -> Result<()> {
    stream.write_all(&word.to_be_bytes())?;

    Ok(())
}

fn write_u64(stream: &mut impl Write, word: u64) -> Result<()> {
    stream.write_all(&word.to_be_bytes())?;

    Ok(())
}

fn read_byte(stream: &mut impl Read) -> Result<u8> {
    let mut buffer = [0; 1];
    stream.read_exact(&mut buffer)?;

    Ok(buffer[0])
}

fn read_u16(stream: &mut impl Read) -> Result<u16> {
    let mut buffer = [0; 2];
    stream.read_exact(&mut buffer)?;

    Ok(u16::from_be_bytes(buffer))
}

fn read_i32(stream: &mut impl Read) -> Result<i32> {
    let mut buffer = [0; 4];
    stream.read_exact(&mut buffer)?;

    Ok(i32::from_be_bytes(buffer))
}

fn read_u32(stream: &mut impl Read) -> Result<u32> {
    let mut buffer = [0; 4];
    stream.read_exact(&mut buffer)?;

    Ok(u32::from_be_bytes(buffer))
}

fn read_u64(stream: &mut impl Read) -> Result<u64> {
    let mut buffer = [0; 8];
    stream.read_exact(&mut buffer)?;

    Ok(u64::from_be_bytes(buffer))
}

fn read_string(stream: &mut impl Read) -> Result<String> {
    let len = read_u32(stream)? as usize;
    let mut bytes = vec![];
    stream.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(Error::CorruptData(String::from("truncated string")));
    }

    String::from_utf8(bytes).map_err(|err| Error::CorruptData(format!("bad string: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Cursor, Seek};

    use ndarray::{arr1, arr2, Array3};
    use paste::paste;
    use tempfile::tempfile;

    macro_rules! save_load_tests {
        ($type:ident, $variant:ident) => {
            paste! {
                #[test]
                fn [<test_save_load_ $type>]() -> Result<()> {
                    let data = Array3::from_shape_fn((3, 2, 4), |(i, j, k)| {
                        (i * 8 + j * 4 + k) as $type
                    });
                    let buffer = Buffer::$variant(data.into_dyn());

                    let mut file = tempfile()?;
                    save(&mut file, &buffer)?;
                    file.sync_all()?;
                    file.rewind()?;

                    let loaded = load(&mut file)?;
                    assert_eq!(loaded.data_type(), DataType::$variant);
                    match (loaded, buffer) {
                        (Buffer::$variant(loaded), Buffer::$variant(expected)) => {
                            assert_eq!(loaded, expected);
                        }
                        _ => panic!("wrong buffer type"),
                    }

                    Ok(())
                }
            }
        };
    }

    save_load_tests!(i8, Int8);
    save_load_tests!(i16, Int16);
    save_load_tests!(i32, Int32);
    save_load_tests!(i64, Int64);
    save_load_tests!(u8, UInt8);
    save_load_tests!(u16, UInt16);
    save_load_tests!(u32, UInt32);
    save_load_tests!(u64, UInt64);
    save_load_tests!(f32, Float);
    save_load_tests!(f64, Double);

    #[test]
    fn test_save_load_bool() -> Result<()> {
        let buffer = Buffer::Bool(arr2(&[[true, false], [false, true]]).into_dyn());
        let mut bytes = vec![];
        save(&mut bytes, &buffer)?;

        match load(&mut Cursor::new(bytes))? {
            Buffer::Bool(loaded) => {
                assert_eq!(loaded, arr2(&[[true, false], [false, true]]).into_dyn())
            }
            _ => panic!("wrong buffer type"),
        }

        Ok(())
    }

    #[test]
    fn test_save_load_string() -> Result<()> {
        let strings = arr1(&[String::from("µV"), String::new(), String::from("spikes")]);
        let buffer = Buffer::String(strings.clone().into_dyn());
        let mut bytes = vec![];
        save(&mut bytes, &buffer)?;

        match load(&mut Cursor::new(bytes))? {
            Buffer::String(loaded) => assert_eq!(loaded, strings.into_dyn()),
            _ => panic!("wrong buffer type"),
        }

        Ok(())
    }

    #[test]
    fn test_header() -> Result<()> {
        let buffer = Buffer::default_of(DataType::UInt16, &[5, 0, 2]);
        let mut bytes = vec![];
        save(&mut bytes, &buffer)?;
        assert_eq!(bytes.len(), 2 + 4 + 4 + 4 + 3 * 8);
        assert_eq!(&bytes[0..2], &[0x4E, 0x58]);

        let header = load_header(&mut Cursor::new(bytes))?;
        assert_eq!(
            header,
            Header {
                data_type: DataType::UInt16,
                shape: vec![5, 0, 2]
            }
        );

        Ok(())
    }

    #[test]
    fn test_big_endian() -> Result<()> {
        let buffer = Buffer::Int32(arr1(&[1, -2]).into_dyn());
        let mut bytes = vec![];
        save(&mut bytes, &buffer)?;
        let elements = &bytes[bytes.len() - 8..];
        assert_eq!(elements, &[0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFE]);

        Ok(())
    }

    #[test]
    fn test_corrupt() -> Result<()> {
        let mut bytes = vec![];
        save(&mut bytes, &Buffer::default_of(DataType::Double, &[2]))?;

        let mut bad_magic = bytes.clone();
        bad_magic[0] = 0xDC;
        assert!(matches!(
            load(&mut Cursor::new(bad_magic)),
            Err(Error::CorruptData(_))
        ));

        let mut bad_type = bytes.clone();
        bad_type[6..10].copy_from_slice(&7_i32.to_be_bytes());
        assert!(matches!(
            load(&mut Cursor::new(bad_type)),
            Err(Error::CorruptData(_))
        ));

        let truncated = bytes[..bytes.len() - 1].to_vec();
        assert!(matches!(load(&mut Cursor::new(truncated)), Err(Error::IO(_))));

        Ok(())
    }

    #[test]
    fn test_shape_overflow() -> Result<()> {
        let mut bytes = vec![];
        save(&mut bytes, &Buffer::default_of(DataType::Int32, &[2, 4]))?;
        bytes[14..22].copy_from_slice(&u64::MAX.to_be_bytes());

        assert!(matches!(
            load_header(&mut Cursor::new(bytes.clone())),
            Err(Error::CorruptData(_))
        ));
        assert!(matches!(
            load(&mut Cursor::new(bytes)),
            Err(Error::CorruptData(_))
        ));

        Ok(())
    }
}
