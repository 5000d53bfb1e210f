//! Fields every named entity in a NIX tree carries: identifier, name, type, definition and
//! timestamps.
//!
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::storage::Group;
use crate::value::{text_attr, Value};

const ENTITY_ID: &str = "entity_id";
const NAME: &str = "name";
const TYPE: &str = "type";
const DEFINITION: &str = "definition";
const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

/// Timestamps are stored as strings with second resolution, in UTC
const TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A named entity bound to one storage group.
///
pub struct Entity {
    group: Box<dyn Group>,
}

impl Entity {
    /// Create a new entity as the sub-group `name` of `parent`.
    ///
    pub fn create_new(parent: &dyn Group, name: &str, type_: &str) -> Result<Self> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidArgument(format!(
                "{name:?} is not a valid entity name"
            )));
        }
        if parent.has_group(name) || parent.has_data(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let group = parent.open_group(name)?;
        let id = Uuid::new_v4().to_string();
        let now = time_to_str(&Utc::now());
        group.set_attr(ENTITY_ID, Value::from(id.as_str()))?;
        group.set_attr(NAME, Value::from(name))?;
        group.set_attr(TYPE, Value::from(type_))?;
        group.set_attr(CREATED_AT, Value::from(now.as_str()))?;
        group.set_attr(UPDATED_AT, Value::from(now))?;
        debug!(id = %id, name, type_, "created entity");

        Ok(Self { group })
    }

    /// Bind to an existing entity group.
    ///
    pub fn open(group: Box<dyn Group>) -> Result<Self> {
        let entity = Self { group };
        entity.id()?;

        Ok(entity)
    }

    pub fn group(&self) -> &dyn Group {
        self.group.as_ref()
    }

    pub fn id(&self) -> Result<String> {
        self.required_text(ENTITY_ID)
    }

    pub fn name(&self) -> Result<String> {
        self.required_text(NAME)
    }

    pub fn type_(&self) -> Result<String> {
        self.required_text(TYPE)
    }

    pub fn set_type(&self, type_: impl Into<Value>) -> Result<()> {
        let type_ = type_.into().into_text(TYPE)?;
        self.set_attr(TYPE, Value::from(type_))
    }

    pub fn definition(&self) -> Result<Option<String>> {
        text_attr(self.group.get_attr(DEFINITION)?, DEFINITION)
    }

    pub fn set_definition(&self, definition: impl Into<Value>) -> Result<()> {
        let definition = definition.into().into_text(DEFINITION)?;
        self.set_attr(DEFINITION, Value::from(definition))
    }

    pub fn clear_definition(&self) -> Result<()> {
        self.remove_attr(DEFINITION)
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        str_to_time(&self.required_text(CREATED_AT)?)
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>> {
        str_to_time(&self.required_text(UPDATED_AT)?)
    }

    /// Overwrite the creation time, for importing entities created elsewhere.
    ///
    pub fn force_created_at(&self, time: &DateTime<Utc>) -> Result<()> {
        self.group
            .set_attr(CREATED_AT, Value::from(time_to_str(time)))
    }

    pub fn force_updated_at(&self, time: &DateTime<Utc>) -> Result<()> {
        self.group
            .set_attr(UPDATED_AT, Value::from(time_to_str(time)))
    }

    /// Set an attribute on the entity group and refresh `updated_at`.
    ///
    pub(crate) fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.group.set_attr(name, value)?;
        self.force_updated_at(&Utc::now())
    }

    /// Remove an attribute from the entity group and refresh `updated_at`.
    ///
    pub(crate) fn remove_attr(&self, name: &str) -> Result<()> {
        self.group.remove_attr(name)?;
        self.force_updated_at(&Utc::now())
    }

    fn required_text(&self, name: &str) -> Result<String> {
        match text_attr(self.group.get_attr(name)?, name)? {
            Some(value) => Ok(value),
            None => Err(Error::CorruptData(format!(
                "entity is missing its {name} attribute"
            ))),
        }
    }
}

fn time_to_str(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn str_to_time(s: &str) -> Result<DateTime<Utc>> {
    match NaiveDateTime::parse_from_str(s, TIME_FORMAT) {
        Ok(time) => Ok(Utc.from_utc_datetime(&time)),
        Err(err) => Err(Error::CorruptData(format!(
            "bad timestamp {s:?}: {err}"
        ))),
    }
}
