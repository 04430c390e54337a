//! TagCategory Aggregate
//!
//! A named group of tags. The category is created together with its first
//! tag; later tags are appended one at a time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{
    NewTagAddedToExistingCategoryData, NewTagAddedToNewCategoryData,
    NEW_TAG_ADDED_TO_EXISTING_CATEGORY, NEW_TAG_ADDED_TO_NEW_CATEGORY,
};
use crate::domain::{DomainError, Event, TagCategoryEvent};
use crate::event_store::TypeRegistryBuilder;

use super::{Aggregate, AggregateCommand};

pub const AGGREGATE_TYPE: &str = "tagCategory";

pub const ADD_NEW_TAG_TO_NEW_CATEGORY: &str = "add_new_tag_to_new_category";
pub const ADD_NEW_TAG_TO_EXISTING_CATEGORY: &str = "add_new_tag_to_existing_category";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    pub tag_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddNewTagToNewCategory {
    pub tag_category_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub tag: NewTag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddNewTagToExistingCategory {
    pub tag_id: Uuid,
    pub tag_category_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagCategoryCommand {
    AddNewTagToNewCategory(AddNewTagToNewCategory),
    AddNewTagToExistingCategory(AddNewTagToExistingCategory),
}

impl AggregateCommand for TagCategoryCommand {
    fn command_type(&self) -> &'static str {
        match self {
            TagCategoryCommand::AddNewTagToNewCategory(_) => ADD_NEW_TAG_TO_NEW_CATEGORY,
            TagCategoryCommand::AddNewTagToExistingCategory(_) => ADD_NEW_TAG_TO_EXISTING_CATEGORY,
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            TagCategoryCommand::AddNewTagToNewCategory(command) => command.tag_category_id,
            TagCategoryCommand::AddNewTagToExistingCategory(command) => command.tag_category_id,
        }
    }

    fn is_registration(&self) -> bool {
        matches!(self, TagCategoryCommand::AddNewTagToNewCategory(_))
    }
}

/// A tag as held by its category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub tag_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TagCategory {
    id: Uuid,
    name: String,
    notes: Option<String>,
    /// In the order the tags were added
    tags: Vec<Tag>,
    version: i64,
}

impl TagCategory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, tag_id: Uuid) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.tag_id == tag_id)
    }
}

impl Aggregate for TagCategory {
    type Command = TagCategoryCommand;
    type Event = TagCategoryEvent;

    fn aggregate_type() -> &'static str {
        AGGREGATE_TYPE
    }

    fn label() -> &'static str {
        "tag category"
    }

    fn new(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            notes: None,
            tags: Vec::new(),
            version: 0,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(&self, command: &TagCategoryCommand) -> Result<Vec<TagCategoryEvent>, DomainError> {
        match command {
            TagCategoryCommand::AddNewTagToNewCategory(command) => Ok(vec![
                TagCategoryEvent::NewTagAddedToNewCategory(NewTagAddedToNewCategoryData {
                    tag_category_id: command.tag_category_id,
                    tag_category_name: command.name.clone(),
                    tag_category_notes: command.notes.clone(),
                    tag_id: command.tag.tag_id,
                    tag_name: command.tag.name.clone(),
                    tag_notes: command.tag.notes.clone(),
                }),
            ]),

            TagCategoryCommand::AddNewTagToExistingCategory(command) => {
                if self.tag(command.tag_id).is_some() {
                    return Err(DomainError::DuplicateTag {
                        id: self.id,
                        tag_id: command.tag_id,
                    });
                }

                if self.tags.iter().any(|tag| tag.name == command.name) {
                    return Err(DomainError::DuplicateTagName {
                        id: self.id,
                        name: command.name.clone(),
                    });
                }

                Ok(vec![TagCategoryEvent::NewTagAddedToExistingCategory(
                    NewTagAddedToExistingCategoryData {
                        tag_category_id: command.tag_category_id,
                        tag_id: command.tag_id,
                        name: command.name.clone(),
                        notes: command.notes.clone(),
                    },
                )])
            }
        }
    }

    fn apply(mut self, event: &Event<TagCategoryEvent>) -> Self {
        match &event.data {
            TagCategoryEvent::NewTagAddedToNewCategory(data) => {
                self.name = data.tag_category_name.clone();
                self.notes = data.tag_category_notes.clone();
                self.tags.push(Tag {
                    tag_id: data.tag_id,
                    name: data.tag_name.clone(),
                    notes: data.tag_notes.clone(),
                });
            }
            TagCategoryEvent::NewTagAddedToExistingCategory(data) => {
                self.tags.push(Tag {
                    tag_id: data.tag_id,
                    name: data.name.clone(),
                    notes: data.notes.clone(),
                });
            }
        }

        self.version += 1;
        self
    }
}

pub fn register_events(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .event(NEW_TAG_ADDED_TO_NEW_CATEGORY, |bytes| {
            Ok(TagCategoryEvent::NewTagAddedToNewCategory(serde_json::from_slice(bytes)?).into())
        })
        .event(NEW_TAG_ADDED_TO_EXISTING_CATEGORY, |bytes| {
            Ok(TagCategoryEvent::NewTagAddedToExistingCategory(serde_json::from_slice(bytes)?).into())
        })
}

pub fn register_commands(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .command(ADD_NEW_TAG_TO_NEW_CATEGORY, |bytes| {
            Ok(TagCategoryCommand::AddNewTagToNewCategory(serde_json::from_slice(bytes)?).into())
        })
        .command(ADD_NEW_TAG_TO_EXISTING_CATEGORY, |bytes| {
            Ok(TagCategoryCommand::AddNewTagToExistingCategory(serde_json::from_slice(bytes)?).into())
        })
}
