use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of entity held by a collection.
///
/// Modules live in a workspace, questions in a module and answer options
/// in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Module,
    Question,
    AnswerOption,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [
        EntityType::Module,
        EntityType::Question,
        EntityType::AnswerOption,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Module => "module",
            EntityType::Question => "question",
            EntityType::AnswerOption => "answer-option",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("Unknown entity type '{0}'. Allowed: module, question, answer-option")]
    UnknownEntity(String),

    #[error("Malformed parent key '{0}'. Expected <entity>:<id>")]
    Malformed(String),
}

impl FromStr for EntityType {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module" => Ok(EntityType::Module),
            "question" => Ok(EntityType::Question),
            "answer-option" | "answer_option" | "option" => Ok(EntityType::AnswerOption),
            other => Err(ParseKeyError::UnknownEntity(other.to_string())),
        }
    }
}

/// Identifies one ordered collection: the owner id plus the entity type of
/// its children. Order uniqueness, feed filtering and subscription sharing
/// are all scoped by this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentKey {
    pub entity: EntityType,
    pub id: String,
}

impl ParentKey {
    #[must_use]
    pub fn new(entity: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity,
            id: id.into(),
        }
    }
}

impl fmt::Display for ParentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.id)
    }
}

impl FromStr for ParentKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity, id) = s
            .split_once(':')
            .ok_or_else(|| ParseKeyError::Malformed(s.to_string()))?;
        if id.is_empty() {
            return Err(ParseKeyError::Malformed(s.to_string()));
        }
        Ok(Self::new(entity.parse()?, id))
    }
}
