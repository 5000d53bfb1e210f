//! An implementation of the storage interface that keeps everything in RAM.
//!
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::Buffer;
use crate::datatype::DataType;
use crate::errors::{Error, Result};
use crate::storage::{Dataset, Group};
use crate::value::Value;

#[derive(Default)]
struct Node {
    groups: BTreeMap<String, Arc<RwLock<Node>>>,
    datasets: BTreeMap<String, Arc<RwLock<Buffer>>>,
    attrs: BTreeMap<String, Value>,
}

impl Node {
    fn has_child(&self, name: &str) -> bool {
        self.groups.contains_key(name) || self.datasets.contains_key(name)
    }
}

/// A group held in memory.
///
/// Cloning gives another handle on the same group.
///
#[derive(Clone)]
pub struct MemoryGroup {
    node: Arc<RwLock<Node>>,
    path: String,
}

impl MemoryGroup {
    /// A new, empty root group
    pub fn new() -> Self {
        Self {
            node: Arc::new(RwLock::new(Node::default())),
            path: String::from("/"),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.ends_with('/') {
            format!("{}{name}", self.path)
        } else {
            format!("{}/{name}", self.path)
        }
    }
}

impl Default for MemoryGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl Group for MemoryGroup {
    fn open_group(&self, name: &str) -> Result<Box<dyn Group>> {
        let mut node = self.node.write();
        if node.datasets.contains_key(name) {
            return Err(Error::Storage(format!(
                "{} is a dataset, not a group",
                self.child_path(name)
            )));
        }
        let child = node.groups.entry(name.to_string()).or_default();

        Ok(Box::new(Self {
            node: Arc::clone(child),
            path: self.child_path(name),
        }))
    }

    fn has_group(&self, name: &str) -> bool {
        self.node.read().groups.contains_key(name)
    }

    fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.node.read().groups.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        let node = self.node.read();
        Ok(node.groups.len() + node.datasets.len())
    }

    fn create_dataset(
        &self,
        name: &str,
        shape: &[usize],
        data_type: DataType,
    ) -> Result<Box<dyn Dataset>> {
        let mut node = self.node.write();
        if node.has_child(name) {
            return Err(Error::DuplicateName(self.child_path(name)));
        }
        let data = Arc::new(RwLock::new(Buffer::default_of(data_type, shape)));
        node.datasets.insert(name.to_string(), Arc::clone(&data));

        Ok(Box::new(MemoryDataset {
            data,
            path: self.child_path(name),
        }))
    }

    fn get_dataset(&self, name: &str) -> Result<Box<dyn Dataset>> {
        match self.node.read().datasets.get(name) {
            Some(data) => Ok(Box::new(MemoryDataset {
                data: Arc::clone(data),
                path: self.child_path(name),
            })),
            None => Err(Error::NotFound(self.child_path(name))),
        }
    }

    fn has_data(&self, name: &str) -> bool {
        self.node.read().datasets.contains_key(name)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut node = self.node.write();
        let removed = node.groups.remove(name).is_some() || node.datasets.remove(name).is_some();
        if removed {
            Ok(())
        } else {
            Err(Error::NotFound(self.child_path(name)))
        }
    }

    fn get_attr(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.node.read().attrs.get(name).cloned())
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.node.write().attrs.insert(name.to_string(), value);

        Ok(())
    }

    fn remove_attr(&self, name: &str) -> Result<()> {
        self.node.write().attrs.remove(name);

        Ok(())
    }
}

/// A dataset held in memory.
///
pub struct MemoryDataset {
    data: Arc<RwLock<Buffer>>,
    path: String,
}

impl MemoryDataset {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Dataset for MemoryDataset {
    fn shape(&self) -> Result<Vec<usize>> {
        Ok(self.data.read().shape().to_vec())
    }

    fn set_shape(&self, shape: &[usize]) -> Result<()> {
        let mut data = self.data.write();
        *data = data.resized(shape)?;

        Ok(())
    }

    fn data_type(&self) -> Result<DataType> {
        Ok(self.data.read().data_type())
    }

    fn read(&self, count: &[usize], offset: &[usize]) -> Result<Buffer> {
        self.data.read().select(count, offset)
    }

    fn write(&self, data: &Buffer, offset: &[usize]) -> Result<()> {
        self.data.write().assign_at(data, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::arr1;

    #[test]
    fn test_groups() -> Result<()> {
        let root = MemoryGroup::new();
        assert!(!root.has_group("block"));
        assert_eq!(root.len()?, 0);
        assert!(root.is_empty()?);

        let block = root.open_group("block")?;
        assert!(root.has_group("block"));
        block.set_attr("name", Value::from("trial 1"))?;

        // A second handle sees the same group
        let again = root.open_group("block")?;
        assert_eq!(again.get_attr("name")?, Some(Value::from("trial 1")));

        root.open_group("another")?;
        assert_eq!(root.group_names()?, vec!["another", "block"]);
        assert_eq!(root.len()?, 2);

        root.delete("block")?;
        assert!(!root.has_group("block"));
        assert!(matches!(root.delete("block"), Err(Error::NotFound(_))));

        Ok(())
    }

    #[test]
    fn test_attrs() -> Result<()> {
        let root = MemoryGroup::new();
        assert_eq!(root.get_attr("unit")?, None);
        root.set_attr("unit", Value::from("mV"))?;
        root.set_attr("unit", Value::from("V"))?;
        assert_eq!(root.get_attr("unit")?, Some(Value::from("V")));
        root.remove_attr("unit")?;
        root.remove_attr("unit")?;
        assert_eq!(root.get_attr("unit")?, None);

        Ok(())
    }

    #[test]
    fn test_datasets() -> Result<()> {
        let root = MemoryGroup::new();
        let dataset = root.create_dataset("data", &[4], DataType::Double)?;
        assert!(root.has_data("data"));
        assert!(!root.has_group("data"));
        assert_eq!(dataset.shape()?, vec![4]);
        assert_eq!(dataset.data_type()?, DataType::Double);

        dataset.write(&Buffer::Int32(arr1(&[7, 8]).into_dyn()), &[1])?;
        let again = root.get_dataset("data")?;
        assert_eq!(
            again.read(&[4], &[0])?,
            Buffer::Double(arr1(&[0.0, 7.0, 8.0, 0.0]).into_dyn())
        );

        again.set_shape(&[2])?;
        assert_eq!(dataset.shape()?, vec![2]);
        assert_eq!(
            dataset.read(&[2], &[0])?,
            Buffer::Double(arr1(&[0.0, 7.0]).into_dyn())
        );

        Ok(())
    }

    #[test]
    fn test_dataset_name_clashes() -> Result<()> {
        let root = MemoryGroup::new();
        root.create_dataset("data", &[1], DataType::Int8)?;
        assert!(matches!(
            root.create_dataset("data", &[1], DataType::Int8),
            Err(Error::DuplicateName(_))
        ));
        assert!(matches!(root.open_group("data"), Err(Error::Storage(_))));
        assert!(matches!(root.get_dataset("nope"), Err(Error::NotFound(_))));

        Ok(())
    }

    #[test]
    fn test_paths() -> Result<()> {
        let root = MemoryGroup::new();
        let block = root.open_group("block")?;
        block.create_dataset("data", &[1], DataType::Int8)?;
        assert!(matches!(
            block.get_dataset("missing"),
            Err(Error::NotFound(path)) if path == "/block/missing"
        ));

        Ok(())
    }
}
