//! A concrete implementation of the `nixdata::Group` interface on a directory tree.
//!
//! This allows a NIX data tree to be stored on a local filesystem. Each group is a directory.
//! A group's attributes are kept as JSON in a `.attrs.json` file in its directory and each of its
//! datasets is a `<name>.ds` file next to it.
//!
mod codec;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use nixdata::{Buffer, DataType, Dataset, Error, Group, Result, Value};

const ATTRS_FILE: &str = ".attrs.json";
const DATASET_EXTENSION: &str = "ds";

/// How to open a directory store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// The store must exist. Nothing can be changed.
    ReadOnly,

    /// Open the store, creating it if it doesn't exist.
    ReadWrite,

    /// Start over with an empty store, discarding anything already there.
    Overwrite,
}

impl FileMode {
    fn check_writable(self, path: &Path) -> Result<()> {
        match self {
            FileMode::ReadOnly => Err(Error::Storage(format!(
                "{} is opened read only",
                path.display()
            ))),
            _ => Ok(()),
        }
    }
}

/// A group stored as a directory.
///
pub struct FsGroup {
    path: PathBuf,
    mode: FileMode,
}

impl FsGroup {
    /// Open the store rooted at the directory `path`.
    ///
    pub fn open(path: impl AsRef<Path>, mode: FileMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match mode {
            FileMode::ReadOnly => {
                if !path.is_dir() {
                    return Err(Error::NotFound(path.display().to_string()));
                }
            }
            FileMode::ReadWrite => fs::create_dir_all(&path)?,
            FileMode::Overwrite => {
                if path.exists() {
                    fs::remove_dir_all(&path)?;
                }
                fs::create_dir_all(&path)?;
            }
        }
        debug!(path = %path.display(), ?mode, "opened store");

        Ok(Self { path, mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    fn group_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;

        Ok(self.path.join(name))
    }

    fn dataset_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;

        Ok(self.path.join(format!("{name}.{DATASET_EXTENSION}")))
    }

    fn read_attrs(&self) -> Result<BTreeMap<String, Value>> {
        let path = self.path.join(ATTRS_FILE);
        if !path.is_file() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&path)?;

        serde_json::from_slice(&bytes).map_err(|err| {
            Error::CorruptData(format!("bad attributes in {}: {err}", path.display()))
        })
    }

    fn write_attrs(&self, attrs: &BTreeMap<String, Value>) -> Result<()> {
        let path = self.path.join(ATTRS_FILE);
        let bytes = serde_json::to_vec_pretty(attrs).map_err(|err| {
            Error::Storage(format!("can't write attributes to {}: {err}", path.display()))
        })?;

        replace_file(&path, |stream| Ok(stream.write_all(&bytes)?))
    }

    fn children(&self) -> Result<(Vec<String>, Vec<String>)> {
        let mut groups = vec![];
        let mut datasets = vec![];
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                groups.push(name.to_string());
            } else if path.extension().and_then(|ext| ext.to_str()) == Some(DATASET_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    datasets.push(stem.to_string());
                }
            }
        }
        groups.sort();
        datasets.sort();

        Ok((groups, datasets))
    }
}

impl Group for FsGroup {
    fn open_group(&self, name: &str) -> Result<Box<dyn Group>> {
        let path = self.group_path(name)?;
        if self.has_data(name) {
            return Err(Error::Storage(format!(
                "{} is a dataset, not a group",
                path.display()
            )));
        }
        if !path.is_dir() {
            self.mode.check_writable(&self.path)?;
            fs::create_dir(&path)?;
        }

        Ok(Box::new(FsGroup {
            path,
            mode: self.mode,
        }))
    }

    fn has_group(&self, name: &str) -> bool {
        match self.group_path(name) {
            Ok(path) => path.is_dir(),
            Err(_) => false,
        }
    }

    fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.children()?.0)
    }

    fn len(&self) -> Result<usize> {
        let (groups, datasets) = self.children()?;

        Ok(groups.len() + datasets.len())
    }

    fn create_dataset(
        &self,
        name: &str,
        shape: &[usize],
        data_type: DataType,
    ) -> Result<Box<dyn Dataset>> {
        self.mode.check_writable(&self.path)?;
        let path = self.dataset_path(name)?;
        if self.has_group(name) || path.exists() {
            return Err(Error::DuplicateName(path.display().to_string()));
        }

        let dataset = FsDataset {
            path,
            mode: self.mode,
        };
        dataset.save(&Buffer::default_of(data_type, shape))?;
        debug!(path = %dataset.path.display(), %data_type, ?shape, "created dataset");

        Ok(Box::new(dataset))
    }

    fn get_dataset(&self, name: &str) -> Result<Box<dyn Dataset>> {
        let path = self.dataset_path(name)?;
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        Ok(Box::new(FsDataset {
            path,
            mode: self.mode,
        }))
    }

    fn has_data(&self, name: &str) -> bool {
        match self.dataset_path(name) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.mode.check_writable(&self.path)?;
        let group = self.group_path(name)?;
        let dataset = self.dataset_path(name)?;
        if group.is_dir() {
            fs::remove_dir_all(&group)?;
            debug!(path = %group.display(), "deleted group");
        } else if dataset.is_file() {
            fs::remove_file(&dataset)?;
            debug!(path = %dataset.display(), "deleted dataset");
        } else {
            return Err(Error::NotFound(group.display().to_string()));
        }

        Ok(())
    }

    fn get_attr(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.read_attrs()?.remove(name))
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.mode.check_writable(&self.path)?;
        let mut attrs = self.read_attrs()?;
        attrs.insert(name.to_string(), value);

        self.write_attrs(&attrs)
    }

    fn remove_attr(&self, name: &str) -> Result<()> {
        self.mode.check_writable(&self.path)?;
        let mut attrs = self.read_attrs()?;
        if attrs.remove(name).is_some() {
            self.write_attrs(&attrs)?;
        }

        Ok(())
    }
}

/// A dataset stored as a single file.
///
/// Every operation goes to the file, so two handles on the same dataset always agree.
///
pub struct FsDataset {
    path: PathBuf,
    mode: FileMode,
}

impl FsDataset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Buffer> {
        let mut stream = BufReader::new(File::open(&self.path)?);

        codec::load(&mut stream)
    }

    fn save(&self, data: &Buffer) -> Result<()> {
        replace_file(&self.path, |stream| codec::save(stream, data))
    }
}

impl Dataset for FsDataset {
    fn shape(&self) -> Result<Vec<usize>> {
        let mut stream = BufReader::new(File::open(&self.path)?);

        Ok(codec::load_header(&mut stream)?.shape)
    }

    fn set_shape(&self, shape: &[usize]) -> Result<()> {
        self.mode.check_writable(&self.path)?;
        let data = self.load()?.resized(shape)?;

        self.save(&data)
    }

    fn data_type(&self) -> Result<DataType> {
        let mut stream = BufReader::new(File::open(&self.path)?);

        Ok(codec::load_header(&mut stream)?.data_type)
    }

    fn read(&self, count: &[usize], offset: &[usize]) -> Result<Buffer> {
        self.load()?.select(count, offset)
    }

    fn write(&self, data: &Buffer, offset: &[usize]) -> Result<()> {
        self.mode.check_writable(&self.path)?;
        let mut stored = self.load()?;
        stored.assign_at(data, offset)?;

        self.save(&stored)
    }
}

/// Write a whole file next to `path` and move it into place, so a failed write leaves the old
/// contents alone.
///
fn replace_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("{} is not a file", path.display())))?;
    let scratch = path.with_file_name(format!(".{file_name}.tmp"));

    let written = File::create(&scratch).map_err(Error::from).and_then(|file| {
        let mut stream = BufWriter::new(file);
        write(&mut stream)?;
        stream.flush()?;

        Ok(())
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&scratch);
        return Err(err);
    }

    fs::rename(&scratch, path)?;

    Ok(())
}

/// Names map directly onto directory entries, so they must be plain, non-hidden file names.
///
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(|c| c == '/' || c == '\\') {
        return Err(Error::InvalidArgument(format!(
            "{name:?} can't be stored in a directory store"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{arr1, arr2};
    use tempfile::tempdir;

    use nixdata::{DataArray, DimensionType};

    #[test]
    fn test_groups() -> Result<()> {
        let dir = tempdir()?;
        let root = FsGroup::open(dir.path().join("store"), FileMode::ReadWrite)?;
        assert!(root.is_empty()?);

        let block = root.open_group("block")?;
        block.open_group("b")?;
        block.open_group("a")?;
        assert!(root.has_group("block"));
        assert!(!root.has_group("nope"));
        assert!(!root.has_group(".."));
        assert_eq!(block.group_names()?, vec!["a", "b"]);

        block.create_dataset("data", &[2], DataType::Double)?;
        assert_eq!(block.len()?, 3);
        assert_eq!(block.group_names()?, vec!["a", "b"]);
        assert!(matches!(
            block.create_dataset("a", &[1], DataType::Double),
            Err(Error::DuplicateName(_))
        ));
        assert!(matches!(
            block.open_group("data"),
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            block.open_group(".attrs.json"),
            Err(Error::InvalidArgument(_))
        ));

        block.delete("a")?;
        block.delete("data")?;
        assert_eq!(block.group_names()?, vec!["b"]);
        assert!(!block.has_data("data"));
        assert!(matches!(block.delete("data"), Err(Error::NotFound(_))));

        Ok(())
    }

    #[test]
    fn test_attrs() -> Result<()> {
        let dir = tempdir()?;
        let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
        assert_eq!(root.get_attr("label")?, None);

        root.set_attr("label", Value::from("voltage"))?;
        root.set_attr("count", Value::from(3_u64))?;
        root.set_attr("origin", Value::from(-0.5))?;
        root.set_attr("alias", Value::from(true))?;

        let again = FsGroup::open(dir.path(), FileMode::ReadOnly)?;
        assert_eq!(again.get_attr("label")?, Some(Value::from("voltage")));
        assert_eq!(again.get_attr("count")?, Some(Value::UInt(3)));
        assert_eq!(again.get_attr("origin")?, Some(Value::Double(-0.5)));
        assert_eq!(again.get_attr("alias")?, Some(Value::Bool(true)));

        root.remove_attr("label")?;
        root.remove_attr("label")?;
        assert_eq!(again.get_attr("label")?, None);

        // Attributes don't show up as children
        assert_eq!(root.len()?, 0);

        Ok(())
    }

    #[test]
    fn test_datasets() -> Result<()> {
        let dir = tempdir()?;
        let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
        let dataset = root.create_dataset("grid", &[2, 3], DataType::Int16)?;
        assert_eq!(dataset.shape()?, vec![2, 3]);
        assert_eq!(dataset.data_type()?, DataType::Int16);

        dataset.write(&Buffer::Int32(arr2(&[[7, 8]]).into_dyn()), &[1, 1])?;
        let other = root.get_dataset("grid")?;
        assert_eq!(
            other.read(&[2, 3], &[0, 0])?,
            Buffer::Int16(arr2(&[[0, 0, 0], [0, 7, 8]]).into_dyn())
        );

        other.set_shape(&[3, 2])?;
        assert_eq!(dataset.shape()?, vec![3, 2]);
        assert_eq!(
            dataset.read(&[3, 2], &[0, 0])?,
            Buffer::Int16(arr2(&[[0, 0], [0, 7], [0, 0]]).into_dyn())
        );

        assert!(matches!(
            root.get_dataset("nope"),
            Err(Error::NotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_failed_write_keeps_file() -> Result<()> {
        let dir = tempdir()?;
        let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
        let dataset = root.create_dataset("trace", &[3], DataType::Double)?;
        dataset.write(&Buffer::Double(arr1(&[1.0, 2.0, 3.0]).into_dyn()), &[0])?;
        let path = dir.path().join("trace.ds");
        let before = fs::read(&path)?;

        let result = replace_file(&path, |stream| {
            stream.write_all(&before[..4])?;
            Err(Error::Storage(String::from("disk full")))
        });
        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(fs::read(&path)?, before);
        assert_eq!(
            dataset.read(&[3], &[0])?,
            Buffer::Double(arr1(&[1.0, 2.0, 3.0]).into_dyn())
        );

        // No scratch files left behind, in the directory or in the listing
        dataset.set_shape(&[4])?;
        root.set_attr("label", Value::from("voltage"))?;
        let mut entries: Vec<String> = fs::read_dir(dir.path())?
            .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
            .collect::<Result<_>>()?;
        entries.sort();
        assert_eq!(entries, vec![".attrs.json", "trace.ds"]);
        assert_eq!(root.len()?, 1);
        assert!(root.has_data("trace"));

        Ok(())
    }

    #[test]
    fn test_read_only() -> Result<()> {
        let dir = tempdir()?;
        {
            let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
            root.open_group("block")?;
            root.create_dataset("data", &[1], DataType::Double)?;
        }

        let root = FsGroup::open(dir.path(), FileMode::ReadOnly)?;
        assert_eq!(root.mode(), FileMode::ReadOnly);
        assert!(root.open_group("block").is_ok());
        assert!(matches!(root.open_group("new"), Err(Error::Storage(_))));
        assert!(matches!(
            root.set_attr("label", Value::from("x")),
            Err(Error::Storage(_))
        ));
        assert!(matches!(root.delete("block"), Err(Error::Storage(_))));
        assert!(matches!(
            root.create_dataset("more", &[1], DataType::Double),
            Err(Error::Storage(_))
        ));

        let data = root.get_dataset("data")?;
        assert!(matches!(
            data.write(&Buffer::Double(arr1(&[1.0]).into_dyn()), &[0]),
            Err(Error::Storage(_))
        ));
        assert!(matches!(data.set_shape(&[2]), Err(Error::Storage(_))));

        assert!(matches!(
            FsGroup::open(dir.path().join("missing"), FileMode::ReadOnly),
            Err(Error::NotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_overwrite() -> Result<()> {
        let dir = tempdir()?;
        {
            let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
            root.open_group("block")?;
            root.set_attr("label", Value::from("x"))?;
        }

        let root = FsGroup::open(dir.path(), FileMode::Overwrite)?;
        assert!(root.is_empty()?);
        assert_eq!(root.get_attr("label")?, None);

        Ok(())
    }

    #[test]
    fn test_data_array_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let id = {
            let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
            let block = root.open_group("session")?;
            let array = DataArray::create_new(
                block.as_ref(),
                "membrane",
                "nix.sampled",
                DataType::Int16,
                &[2, 5],
            )?;
            array.write_data(&arr2(&[[1, 2, 3, 4, 5], [6, 7, 8, 9, 10]]), &[0, 0])?;
            array.set_polynom_coefficients(&[0.0, 0.5])?;
            array.set_expansion_origin(1.0)?;
            array.set_label("membrane potential")?;
            array.set_unit("mV")?;
            array.append_set_dimension()?.set_labels(&["cell 1", "cell 2"])?;
            let time = array.append_sampled_dimension(0.125)?;
            time.set_unit("s")?;
            array.add_source("c0ffee")?;

            array.id()?
        };

        let root = FsGroup::open(dir.path(), FileMode::ReadOnly)?;
        let array = DataArray::open(root.open_group("session")?.open_group("membrane")?)?;
        assert_eq!(array.id()?, id);
        assert_eq!(array.data_type()?, DataType::Int16);
        assert_eq!(array.label()?, Some(String::from("membrane potential")));
        assert_eq!(array.unit()?, Some(String::from("mV")));
        assert_eq!(array.expansion_origin()?, Some(1.0));
        assert_eq!(
            array.read_data::<f64>(&[1, 3], &[1, 2])?,
            arr2(&[[3.5, 4.0, 4.5]]).into_dyn()
        );
        assert_eq!(
            array.dataset().read_all::<i16>()?,
            arr2(&[[1, 2, 3, 4, 5], [6, 7, 8, 9, 10]]).into_dyn()
        );

        let dimensions = array.dimensions()?;
        assert_eq!(dimensions.len(), 2);
        assert_eq!(dimensions[0].dimension_type(), DimensionType::Set);
        assert_eq!(
            dimensions[0].as_set().unwrap().labels()?,
            vec!["cell 1", "cell 2"]
        );
        let time = dimensions[1].as_sampled().unwrap();
        assert_eq!(time.sampling_interval()?, 0.125);
        assert_eq!(time.unit()?, Some(String::from("s")));
        assert_eq!(array.sources()?, vec!["c0ffee"]);

        assert!(matches!(array.set_label("x"), Err(Error::Storage(_))));

        Ok(())
    }

    #[test]
    fn test_alias_range_dimension() -> Result<()> {
        let dir = tempdir()?;
        let root = FsGroup::open(dir.path(), FileMode::ReadWrite)?;
        let array = DataArray::create_new(&root, "times", "nix.events", DataType::Double, &[3])?;
        array.write_data(&arr1(&[0.1, 0.4, 0.9]), &[0])?;
        let alias = array.append_alias_range_dimension()?;
        assert_eq!(alias.ticks()?, vec![0.1, 0.4, 0.9]);

        array.write_data(&arr1(&[0.2]), &[0])?;
        assert_eq!(alias.ticks()?, vec![0.2, 0.4, 0.9]);

        let reopened = DataArray::open(root.open_group("times")?)?;
        let dimension = reopened.get_dimension(1)?;
        assert!(dimension.as_range().unwrap().is_alias());
        assert_eq!(dimension.as_range().unwrap().tick_at(2)?, 0.9);

        Ok(())
    }
}
