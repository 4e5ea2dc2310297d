//! Active-actor table and room occupancy.
//!
//! [`ActorTable`] is the set of actors currently in the world, each with
//! a room and a [`BalanceLedger`]. [`RoomOccupancy`] maps rooms to the
//! actors standing in them. The two have separate locks and no method
//! holds both at once; [`Presence`] sequences updates across them.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::{IndexMap, IndexSet};

use hearth_core::{ActorId, RoomKey};

use crate::balance::BalanceLedger;
use crate::config::BalanceConfig;

// ── ActorTable ───────────────────────────────────────────────────

#[derive(Debug)]
struct ActorEntry {
    room: RoomKey,
    ledger: Arc<BalanceLedger>,
}

/// Actors currently present, with their room and cooldown ledger.
#[derive(Debug, Default)]
pub struct ActorTable {
    entries: RwLock<IndexMap<ActorId, ActorEntry>>,
    balance: BalanceConfig,
}

impl ActorTable {
    /// An empty table. New ledgers take their defaults from `balance`.
    pub fn new(balance: BalanceConfig) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            balance,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<ActorId, ActorEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<ActorId, ActorEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `actor` in `room` with a fresh ledger. Returns `false` if the
    /// actor was already present.
    pub fn insert(&self, actor: ActorId, room: RoomKey) -> bool {
        let mut entries = self.write();
        if entries.contains_key(&actor) {
            return false;
        }
        let ledger = Arc::new(BalanceLedger::new(&self.balance));
        entries.insert(actor, ActorEntry { room, ledger });
        true
    }

    /// Remove `actor`, returning the room it was in.
    pub fn remove(&self, actor: ActorId) -> Option<RoomKey> {
        self.write().shift_remove(&actor).map(|e| e.room)
    }

    /// Move `actor` to `room`, returning its previous room.
    pub fn set_room(&self, actor: ActorId, room: RoomKey) -> Option<RoomKey> {
        self.write()
            .get_mut(&actor)
            .map(|e| std::mem::replace(&mut e.room, room))
    }

    /// Whether `actor` is present.
    pub fn contains(&self, actor: ActorId) -> bool {
        self.read().contains_key(&actor)
    }

    /// The room `actor` is in.
    pub fn room_of(&self, actor: ActorId) -> Option<RoomKey> {
        self.read().get(&actor).map(|e| e.room.clone())
    }

    /// The cooldown ledger of `actor`.
    pub fn ledger(&self, actor: ActorId) -> Option<Arc<BalanceLedger>> {
        self.read().get(&actor).map(|e| Arc::clone(&e.ledger))
    }

    /// Every present actor with its ledger, in join order.
    pub fn ledgers(&self) -> Vec<(ActorId, Arc<BalanceLedger>)> {
        self.read()
            .iter()
            .map(|(id, e)| (*id, Arc::clone(&e.ledger)))
            .collect()
    }

    /// Every present actor, in join order.
    pub fn actors(&self) -> Vec<ActorId> {
        self.read().keys().copied().collect()
    }

    /// Number of present actors.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no actor is present.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

// ── RoomOccupancy ────────────────────────────────────────────────

/// Room to occupant-set mapping. Occupants keep arrival order.
#[derive(Debug, Default)]
pub struct RoomOccupancy {
    rooms: RwLock<IndexMap<RoomKey, IndexSet<ActorId>>>,
}

impl RoomOccupancy {
    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<RoomKey, IndexSet<ActorId>>> {
        self.rooms.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put `actor` in `room`.
    pub fn add(&self, room: RoomKey, actor: ActorId) {
        self.write().entry(room).or_default().insert(actor);
    }

    /// Take `actor` out of `room`. Empty rooms are forgotten.
    pub fn remove(&self, room: &RoomKey, actor: ActorId) -> bool {
        let mut rooms = self.write();
        let Some(occupants) = rooms.get_mut(room) else {
            return false;
        };
        let removed = occupants.shift_remove(&actor);
        if occupants.is_empty() {
            rooms.shift_remove(room);
        }
        removed
    }

    /// Actors in `room`, in arrival order.
    pub fn occupants(&self, room: &RoomKey) -> Vec<ActorId> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one occupant.
    pub fn occupied_rooms(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ── Presence ─────────────────────────────────────────────────────

/// The actor table and room occupancy, updated together.
#[derive(Debug, Default)]
pub struct Presence {
    actors: ActorTable,
    rooms: RoomOccupancy,
}

impl Presence {
    /// Empty presence tables.
    pub fn new(balance: BalanceConfig) -> Self {
        Self {
            actors: ActorTable::new(balance),
            rooms: RoomOccupancy::default(),
        }
    }

    /// The actor table.
    pub fn actors(&self) -> &ActorTable {
        &self.actors
    }

    /// The occupancy table.
    pub fn rooms(&self) -> &RoomOccupancy {
        &self.rooms
    }

    /// Bring `actor` into the world in `room`. Returns `false` if the
    /// actor was already present.
    pub fn join(&self, actor: ActorId, room: RoomKey) -> bool {
        if !self.actors.insert(actor, room.clone()) {
            return false;
        }
        self.rooms.add(room, actor);
        tracing::debug!(%actor, "actor joined");
        true
    }

    /// Remove `actor` from the world, returning the room it left.
    pub fn leave(&self, actor: ActorId) -> Option<RoomKey> {
        let room = self.actors.remove(actor)?;
        self.rooms.remove(&room, actor);
        tracing::debug!(%actor, %room, "actor left");
        Some(room)
    }

    /// Move a present actor to `room`, returning the room it left.
    pub fn relocate(&self, actor: ActorId, room: RoomKey) -> Option<RoomKey> {
        let old = self.actors.set_room(actor, room.clone())?;
        self.rooms.remove(&old, actor);
        self.rooms.add(room, actor);
        Some(old)
    }

    /// Whether `actor` is present.
    pub fn contains(&self, actor: ActorId) -> bool {
        self.actors.contains(actor)
    }

    /// The room `actor` is in.
    pub fn room_of(&self, actor: ActorId) -> Option<RoomKey> {
        self.actors.room_of(actor)
    }

    /// Actors in `room`.
    pub fn occupants(&self, room: &RoomKey) -> Vec<ActorId> {
        self.rooms.occupants(room)
    }
}
