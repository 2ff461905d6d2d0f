//! Privacy groups: named, addressable sets of participant keys.
use serde::{Deserialize, Serialize};

use crate::{
    codec::{encode_array, encode_field, ByteReader, DecodeError},
    crypto::PublicKey,
    identifiers::PrivacyGroupId,
};

mod manager;
mod resident;
pub mod util;

pub use manager::PrivacyGroupManager;
pub use resident::{ResidentGroupConfig, ResidentGroupHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupType {
    /// Derived from a plain sender and recipient list.
    Legacy,
    /// Created explicitly, with a seed.
    Negotiated,
    /// Declared in the node configuration.
    Resident,
}

impl GroupType {
    fn as_byte(self) -> u8 {
        match self {
            GroupType::Legacy => 0,
            GroupType::Negotiated => 1,
            GroupType::Resident => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(GroupType::Legacy),
            1 => Ok(GroupType::Negotiated),
            2 => Ok(GroupType::Resident),
            _ => Err(DecodeError::InvalidValue { field: "group type" }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupState {
    Active,
    Deleted,
}

impl GroupState {
    fn as_byte(self) -> u8 {
        match self {
            GroupState::Active => 0,
            GroupState::Deleted => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(GroupState::Active),
            1 => Ok(GroupState::Deleted),
            _ => Err(DecodeError::InvalidValue {
                field: "group state",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyGroup {
    #[serde(rename = "privacyGroupId")]
    pub id: PrivacyGroupId,
    pub name: String,
    pub description: String,
    pub members: Vec<PublicKey>,
    #[serde(skip)]
    pub seed: Option<Vec<u8>>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub state: GroupState,
}

impl PrivacyGroup {
    pub fn is_active(&self) -> bool {
        self.state == GroupState::Active
    }

    pub fn lookup_id(&self) -> Vec<u8> {
        util::generate_lookup_id(&self.members)
    }
}

/// Layout: id, name, description, members, seed (empty when absent), then
/// one byte each for type and state.
pub fn encode_privacy_group(group: &PrivacyGroup) -> Vec<u8> {
    let mut buffer = Vec::new();

    encode_field(&mut buffer, group.id.as_ref());
    encode_field(&mut buffer, group.name.as_bytes());
    encode_field(&mut buffer, group.description.as_bytes());
    encode_array(&mut buffer, group.members.iter());
    encode_field(&mut buffer, group.seed.as_deref().unwrap_or_default());
    buffer.push(group.group_type.as_byte());
    buffer.push(group.state.as_byte());

    buffer
}

pub fn decode_privacy_group(input: &[u8]) -> Result<PrivacyGroup, DecodeError> {
    let mut reader = ByteReader::new(input);

    let id = PrivacyGroupId::from(reader.read_field("group id")?.to_vec());
    let name = reader.read_string("group name")?;
    let description = reader.read_string("group description")?;
    let members = reader
        .read_array("group members")?
        .into_iter()
        .map(|key| {
            PublicKey::from_slice(key).map_err(|_| DecodeError::InvalidValue {
                field: "group members",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let seed = Some(reader.read_field("group seed")?.to_vec()).filter(|seed| !seed.is_empty());
    let group_type = GroupType::from_byte(reader.read_u8("group type")?)?;
    let state = GroupState::from_byte(reader.read_u8("group state")?)?;

    Ok(PrivacyGroup {
        id,
        name,
        description,
        members,
        seed,
        group_type,
        state,
    })
}
