use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    crypto::{rng::random_bytes, PublicKey},
    enclave::Enclave,
    error::Error,
    identifiers::PrivacyGroupId,
    party::PayloadPublisher,
    storage::{PrivacyGroupEntity, PrivacyGroupStore},
};

use super::{
    decode_privacy_group, encode_privacy_group, util, GroupState, GroupType, PrivacyGroup,
};

pub struct PrivacyGroupManager {
    enclave: Arc<Enclave>,
    store: Arc<dyn PrivacyGroupStore>,
    publisher: Arc<PayloadPublisher>,
}

fn to_entity(group: &PrivacyGroup) -> PrivacyGroupEntity {
    PrivacyGroupEntity {
        id: group.id.as_ref().to_vec(),
        lookup_id: group.lookup_id(),
        data: encode_privacy_group(group),
    }
}

fn from_entity(entity: &PrivacyGroupEntity) -> Result<PrivacyGroup, Error> {
    Ok(decode_privacy_group(&entity.data)?)
}

fn dedup_preserving_order(keys: impl IntoIterator<Item = PublicKey>) -> Vec<PublicKey> {
    let mut unique = Vec::new();
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

impl PrivacyGroupManager {
    pub fn new(
        enclave: Arc<Enclave>,
        store: Arc<dyn PrivacyGroupStore>,
        publisher: Arc<PayloadPublisher>,
    ) -> Self {
        Self {
            enclave,
            store,
            publisher,
        }
    }

    pub fn managed_keys(&self) -> Vec<PublicKey> {
        self.enclave.public_keys()
    }

    /// Creates a negotiated group and sends it to every remote member.
    /// Without a seed a random one is used, so each call makes a new group.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn create_privacy_group(
        &self,
        name: &str,
        description: &str,
        from: &PublicKey,
        members: &[PublicKey],
        seed: Option<Vec<u8>>,
    ) -> Result<PrivacyGroup, Error> {
        if !members.contains(from) {
            return Err(Error::PrivacyViolation(format!(
                "creator {from} must be a member of the group"
            )));
        }

        let seed = seed.unwrap_or_else(|| random_bytes::<32>().to_vec());
        let members = dedup_preserving_order(members.iter().copied());

        let group = PrivacyGroup {
            id: util::generate_id(&members, Some(&seed)),
            name: name.to_owned(),
            description: description.to_owned(),
            members,
            seed: Some(seed),
            group_type: GroupType::Negotiated,
            state: GroupState::Active,
        };

        self.save_and_publish(&group, None).await?;

        info!("Created privacy group {}", group.id);
        Ok(group)
    }

    /// Get-or-create the group implied by a plain sender and recipient list.
    /// Nothing is published; every member learns of it by receiving payloads.
    pub fn create_legacy_privacy_group(
        &self,
        from: &PublicKey,
        recipients: &[PublicKey],
    ) -> Result<PrivacyGroup, Error> {
        let members =
            dedup_preserving_order(std::iter::once(*from).chain(recipients.iter().copied()));

        let candidate = PrivacyGroup {
            id: util::generate_id(&members, None),
            name: "legacy".to_owned(),
            description: "Privacy group from a legacy transaction".to_owned(),
            members,
            seed: None,
            group_type: GroupType::Legacy,
            state: GroupState::Active,
        };

        let stored = self.store.retrieve_or_save(&to_entity(&candidate))?;
        from_entity(&stored)
    }

    /// Active groups whose members are exactly `members`, in any order.
    pub fn find_privacy_group(&self, members: &[PublicKey]) -> Result<Vec<PrivacyGroup>, Error> {
        let lookup_id = util::generate_lookup_id(members);

        self.store
            .find_by_lookup_id(&lookup_id)?
            .iter()
            .map(from_entity)
            .filter(|group| group.as_ref().map_or(true, PrivacyGroup::is_active))
            .collect()
    }

    pub fn find_privacy_group_by_type(
        &self,
        group_type: GroupType,
    ) -> Result<Vec<PrivacyGroup>, Error> {
        self.store
            .find_all()?
            .iter()
            .map(from_entity)
            .filter(|group| {
                group
                    .as_ref()
                    .map_or(true, |g| g.group_type == group_type && g.is_active())
            })
            .collect()
    }

    pub fn retrieve_privacy_group(&self, id: &PrivacyGroupId) -> Result<PrivacyGroup, Error> {
        self.store
            .retrieve(id)?
            .as_ref()
            .map(from_entity)
            .transpose()?
            .filter(PrivacyGroup::is_active)
            .ok_or_else(|| Error::PrivacyGroupNotFound(id.to_base64()))
    }

    /// Stores a group record published by another node. A deletion is only
    /// applied to a group we already have.
    pub fn store_privacy_group(&self, encoded: &[u8]) -> Result<(), Error> {
        let group = decode_privacy_group(encoded)?;

        if group.state == GroupState::Deleted && self.store.retrieve(&group.id)?.is_none() {
            warn!("Ignoring deletion of unknown privacy group {}", group.id);
            return Ok(());
        }

        self.store.save(&to_entity(&group))?;
        debug!("Stored published privacy group {}", group.id);

        Ok(())
    }

    /// Soft delete: the record stays, marked deleted, and remote members are
    /// told.
    pub async fn delete_privacy_group(
        &self,
        from: &PublicKey,
        id: &PrivacyGroupId,
    ) -> Result<PrivacyGroup, Error> {
        let mut group = self.retrieve_privacy_group(id)?;

        if !group.members.contains(from) {
            return Err(Error::PrivacyViolation(format!(
                "{from} is not a member of privacy group {id}"
            )));
        }

        let previous = group.clone();
        group.state = GroupState::Deleted;
        self.save_and_publish(&group, Some(&previous)).await?;

        info!("Deleted privacy group {id}");
        Ok(group)
    }

    /// Resident groups are keyed by name.
    pub fn save_resident_group(
        &self,
        name: &str,
        description: &str,
        members: &[PublicKey],
    ) -> Result<PrivacyGroup, Error> {
        let group = PrivacyGroup {
            id: PrivacyGroupId::from(name.as_bytes().to_vec()),
            name: name.to_owned(),
            description: description.to_owned(),
            members: dedup_preserving_order(members.iter().copied()),
            seed: None,
            group_type: GroupType::Resident,
            state: GroupState::Active,
        };

        self.store.save(&to_entity(&group))?;
        Ok(group)
    }

    /// Persists `group` and sends it to the remote members. If publishing
    /// fails, `previous` is restored, or the record removed when there was
    /// none.
    async fn save_and_publish(
        &self,
        group: &PrivacyGroup,
        previous: Option<&PrivacyGroup>,
    ) -> Result<(), Error> {
        self.store.save(&to_entity(group))?;

        if let Err(e) = self.publish(group).await {
            warn!("Publishing privacy group {} failed, rolling back: {e}", group.id);
            match previous {
                Some(previous) => self.store.save(&to_entity(previous))?,
                None => {
                    self.store.delete(&group.id)?;
                }
            }
            return Err(e);
        }

        Ok(())
    }

    async fn publish(&self, group: &PrivacyGroup) -> Result<(), Error> {
        let encoded = encode_privacy_group(group);

        for member in group.members.iter().filter(|m| !self.enclave.is_local(m)) {
            self.publisher.publish_privacy_group(&encoded, member).await?;
        }

        Ok(())
    }
}
