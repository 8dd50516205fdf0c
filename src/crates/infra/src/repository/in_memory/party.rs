use async_trait::async_trait;
use dashmap::DashMap;
use domain::party::{Party, PartyError, PartyRepository};
use domain::value::{GoerId, PartyCode};
use std::collections::HashSet;
use std::sync::Arc;

/// In-memory party store.
///
/// Two secondary indexes (`hosts`, `attendees`) map a goer to the party they
/// are in, which is what makes `find_by_attendee` return at most one party:
/// a goer simply cannot be indexed twice. Indexing a goer who already sits in
/// a different party is refused here as a last line of defense; orchestration
/// checks the same precondition up front.
///
/// Writers to the same party are serialized by the application layer's keyed
/// lock; this store only has to keep individual map operations atomic, which
/// `DashMap` gives it. `delete` removes the party entry before its index
/// entries, so a concurrent fetch sees the party whole or not at all.
#[derive(Clone, Default)]
pub struct InMemoryPartyRepository {
    parties: Arc<DashMap<PartyCode, Party>>,
    hosts: Arc<DashMap<GoerId, PartyCode>>,
    attendees: Arc<DashMap<GoerId, PartyCode>>,
}

impl InMemoryPartyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unindexed(&self, goer: &GoerId, code: &PartyCode) -> Result<(), PartyError> {
        let hosting = self.hosts.get(goer).map(|entry| entry.value().clone());
        if matches!(hosting, Some(existing) if &existing != code) {
            return Err(PartyError::OtherErr(format!(
                "{} is already hosting another party",
                goer
            )));
        }
        let attending = self.attendees.get(goer).map(|entry| entry.value().clone());
        if matches!(attending, Some(existing) if &existing != code) {
            return Err(PartyError::OtherErr(format!(
                "{} is already attending another party",
                goer
            )));
        }
        Ok(())
    }

    fn index(&self, party: &Party) -> Result<(), PartyError> {
        self.ensure_unindexed(party.host.id(), &party.code)?;
        for listener in &party.listeners {
            self.ensure_unindexed(listener.id(), &party.code)?;
        }
        self.hosts.insert(party.host.id().clone(), party.code.clone());
        for listener in &party.listeners {
            self.attendees
                .insert(listener.id().clone(), party.code.clone());
        }
        Ok(())
    }

    fn unindex_departed(&self, old: &Party, new: &Party) {
        let current: HashSet<&GoerId> = new.listeners.iter().map(|l| l.id()).collect();
        for listener in &old.listeners {
            if !current.contains(listener.id()) {
                self.attendees.remove(listener.id());
            }
        }
    }
}

#[async_trait]
impl PartyRepository for InMemoryPartyRepository {
    async fn create(&self, party: Party) -> Result<(), PartyError> {
        if self.parties.contains_key(&party.code) {
            return Err(PartyError::OtherErr(format!(
                "party code {} is already taken",
                party.code
            )));
        }
        self.index(&party)?;
        self.parties.insert(party.code.clone(), party);
        Ok(())
    }

    async fn find_by_code(&self, code: &PartyCode) -> Result<Option<Party>, PartyError> {
        Ok(self.parties.get(code).map(|entry| entry.value().clone()))
    }

    async fn find_by_host(&self, host: &GoerId) -> Result<Option<Party>, PartyError> {
        let Some(code) = self.hosts.get(host).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.find_by_code(&code).await
    }

    async fn find_by_attendee(&self, attendee: &GoerId) -> Result<Option<Party>, PartyError> {
        let Some(code) = self.attendees.get(attendee).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.find_by_code(&code).await
    }

    async fn save(&self, party: &mut Party) -> Result<(), PartyError> {
        let previous = self
            .parties
            .get(&party.code)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                PartyError::DbErr(format!("party {} does not exist", party.code))
            })?;
        self.index(party)?;
        self.unindex_departed(&previous, party);
        self.parties.insert(party.code.clone(), party.clone());
        Ok(())
    }

    async fn delete(&self, code: &PartyCode) -> Result<bool, PartyError> {
        let Some((_, party)) = self.parties.remove(code) else {
            return Ok(false);
        };
        self.hosts.remove(party.host.id());
        for listener in &party.listeners {
            self.attendees.remove(listener.id());
        }
        Ok(true)
    }

    async fn most_listeners(&self, count: usize) -> Result<Vec<Party>, PartyError> {
        let mut parties: Vec<Party> = self
            .parties
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        parties.sort_by(|a, b| b.listener_count().cmp(&a.listener_count()));
        parties.truncate(count);
        Ok(parties)
    }

    async fn is_hosting(&self, goer: &GoerId) -> Result<bool, PartyError> {
        Ok(self.hosts.contains_key(goer))
    }

    async fn is_attending(&self, goer: &GoerId) -> Result<bool, PartyError> {
        Ok(self.attendees.contains_key(goer))
    }
}
