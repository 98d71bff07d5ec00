//! Shared types used across Roster crates.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Returned when a string is not a 24-character hex object id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid object id: {0:?}")]
pub struct InvalidObjectId(pub String);

/// 12-byte record identifier, written as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Length of the hex form.
    pub const HEX_LEN: usize = 24;

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(InvalidObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidObjectId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A stored person record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: ObjectId,
    pub name: String,
    pub age: i64,
    pub profession: String,
}

/// A person as it arrives from a caller: the id has not been validated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub profession: String,
}

impl PersonDraft {
    /// Validate the id, yielding a storable record.
    pub fn validate(self) -> Result<Person, InvalidObjectId> {
        let id = self.id.parse()?;
        Ok(Person {
            id,
            name: self.name,
            age: self.age,
            profession: self.profession,
        })
    }
}

impl From<Person> for PersonDraft {
    fn from(p: Person) -> Self {
        Self {
            id: p.id.to_hex(),
            name: p.name,
            age: p.age,
            profession: p.profession,
        }
    }
}
