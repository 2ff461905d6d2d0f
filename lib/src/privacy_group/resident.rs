use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    constants::{DEFAULT_RESIDENT_GROUP, DEFAULT_RESIDENT_GROUP_DESCRIPTION},
    crypto::PublicKey,
    error::Error,
};

use super::{GroupType, PrivacyGroupManager};

/// A resident group as declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentGroupConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub members: Vec<PublicKey>,
}

/// Startup reconciliation of configured resident groups with the stored ones.
pub struct ResidentGroupHandler<'a> {
    manager: &'a PrivacyGroupManager,
}

struct Merged {
    description: String,
    members: Vec<PublicKey>,
}

impl<'a> ResidentGroupHandler<'a> {
    pub fn new(manager: &'a PrivacyGroupManager) -> Self {
        Self { manager }
    }

    /// Fails if a configured member is not a managed key, or if a managed key
    /// ends up in more than one resident group. Managed keys no configured
    /// group names go into the default group.
    pub fn on_create(&self, configured: &[ResidentGroupConfig]) -> Result<(), Error> {
        let managed = self.manager.managed_keys();

        if let Some(foreign) = configured
            .iter()
            .flat_map(|group| group.members.iter())
            .find(|member| !managed.contains(member))
        {
            return Err(Error::PrivacyViolation(format!(
                "resident group member {foreign} is not managed by this node"
            )));
        }

        let homeless: Vec<PublicKey> = managed
            .iter()
            .filter(|key| !configured.iter().any(|g| g.members.contains(key)))
            .copied()
            .collect();
        let default_group = ResidentGroupConfig {
            name: DEFAULT_RESIDENT_GROUP.to_owned(),
            description: DEFAULT_RESIDENT_GROUP_DESCRIPTION.to_owned(),
            members: homeless,
        };

        let existing = self
            .manager
            .find_privacy_group_by_type(GroupType::Resident)?
            .into_iter()
            .map(|group| ResidentGroupConfig {
                name: group.name,
                description: group.description,
                members: group.members,
            });

        // Groups with the same name share an id; their members are unioned.
        let mut merged: BTreeMap<String, Merged> = BTreeMap::new();
        for group in configured
            .iter()
            .cloned()
            .chain(existing)
            .chain(std::iter::once(default_group))
        {
            let entry = merged.entry(group.name).or_insert_with(|| Merged {
                description: group.description,
                members: Vec::new(),
            });
            for member in group.members {
                if !entry.members.contains(&member) {
                    entry.members.push(member);
                }
            }
        }

        let mut owner: BTreeMap<PublicKey, &str> = BTreeMap::new();
        for (name, group) in &merged {
            for member in &group.members {
                if let Some(other) = owner.insert(*member, name) {
                    return Err(Error::PrivacyViolation(format!(
                        "key {member} belongs to resident groups {other} and {name}"
                    )));
                }
            }
        }

        for (name, group) in merged.iter().filter(|(name, _)| {
            name.as_str() == DEFAULT_RESIDENT_GROUP || configured.iter().any(|g| &g.name == *name)
        }) {
            self.manager
                .save_resident_group(name, &group.description, &group.members)?;
            info!(
                "Resident group {name} has {} members",
                group.members.len()
            );
        }

        Ok(())
    }
}
