//! The entity store: players and the shapes they own.
//!
//! Every live shape has exactly one owner, and that owner's shape list
//! contains it. All mutation goes through methods here so the two sides
//! of that relation can't drift apart.

use std::collections::HashMap;

use polyarena_protocol::{Color, PlayerId, ShapeId, ShapeState, Vec2};
use polyarena_session::{ConnectionState, generate_token};
use tokio::time::Instant;

use crate::{ArenaConfig, Rejection};

/// Random bytes in a generated shape id.
const SHAPE_ID_BYTES: usize = 6;

/// Attempts at generating a free shape id before giving up.
const SHAPE_ID_ATTEMPTS: usize = 8;

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// A player and everything the room remembers about them.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub id: PlayerId,
    /// Owned shapes in creation order.
    shapes: Vec<ShapeId>,
    pub state: ConnectionState,
    pub last_activity: Instant,
    /// Color given to shapes this player creates.
    pub color: Color,
}

impl PlayerSession {
    fn new(id: PlayerId, now: Instant) -> Self {
        Self {
            id,
            shapes: Vec::new(),
            state: ConnectionState::Active,
            last_activity: now,
            color: Color::default(),
        }
    }

    pub fn shapes(&self) -> &[ShapeId] {
        &self.shapes
    }

    pub fn owns(&self, shape_id: &ShapeId) -> bool {
        self.shapes.contains(shape_id)
    }
}

/// A shape in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub owner: PlayerId,
    pub position: Vec2,
    pub angle: f64,
    pub velocity: Vec2,
    /// When the last accepted update was applied.
    pub last_update: Instant,
    pub color: Color,
}

impl Shape {
    /// The replicated view of this shape.
    pub fn to_state(&self) -> ShapeState {
        ShapeState {
            id: self.id.clone(),
            owner: self.owner.clone(),
            x: self.position.x,
            y: self.position.y,
            angle: self.angle,
            velocity: self.velocity,
            color: self.color.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Owns every player and shape in one room.
#[derive(Debug)]
pub struct EntityStore {
    arena: ArenaConfig,
    players: HashMap<PlayerId, PlayerSession>,
    shapes: HashMap<ShapeId, Shape>,
}

impl EntityStore {
    pub fn new(arena: ArenaConfig) -> Self {
        Self {
            arena,
            players: HashMap::new(),
            shapes: HashMap::new(),
        }
    }

    pub fn arena(&self) -> &ArenaConfig {
        &self.arena
    }

    // -- players ------------------------------------------------------------

    /// Returns the player with this id, creating it if needed. The flag is
    /// `true` when the player was created by this call.
    pub fn create_player(
        &mut self,
        id: PlayerId,
        now: Instant,
    ) -> (&mut PlayerSession, bool) {
        let created = !self.players.contains_key(&id);
        if !created {
            tracing::debug!(player_id = %id, "player already exists, reusing");
        }
        let player = self
            .players
            .entry(id.clone())
            .or_insert_with(|| PlayerSession::new(id, now));
        (player, created)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&PlayerSession> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerSession> {
        self.players.get_mut(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerSession> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Records activity from a player.
    pub fn touch(&mut self, id: &PlayerId, now: Instant) {
        if let Some(player) = self.players.get_mut(id) {
            player.last_activity = now;
        }
    }

    /// Removes a player along with every shape they own.
    pub fn remove_player(
        &mut self,
        id: &PlayerId,
    ) -> Option<(PlayerSession, Vec<Shape>)> {
        let player = self.players.remove(id)?;
        let shapes = player
            .shapes
            .iter()
            .filter_map(|shape_id| self.shapes.remove(shape_id))
            .collect();
        Some((player, shapes))
    }

    // -- shapes -------------------------------------------------------------

    /// Spawns a new shape for `owner` in the spawn band.
    ///
    /// With `explicit_id` the shape gets that id, or nothing happens if it
    /// is taken. Otherwise a random id is generated, retrying on collision.
    pub fn create_shape(
        &mut self,
        owner: &PlayerId,
        explicit_id: Option<ShapeId>,
        now: Instant,
    ) -> Result<&Shape, Rejection> {
        let limit = self.arena.max_shapes_per_player;
        let player = self
            .players
            .get(owner)
            .ok_or(Rejection::UnknownSession)?;
        if player.shapes.len() >= limit {
            return Err(Rejection::CapacityExceeded { limit });
        }

        let id = match explicit_id {
            Some(id) if self.shapes.contains_key(&id) => {
                return Err(Rejection::DuplicateShape(id));
            }
            Some(id) => id,
            None => self.fresh_shape_id()?,
        };

        let shape = Shape {
            id: id.clone(),
            owner: owner.clone(),
            position: self.arena.spawn_point(&mut rand::rng()),
            angle: 0.0,
            velocity: Vec2::ZERO,
            last_update: now,
            color: player.color.clone(),
        };

        if let Some(player) = self.players.get_mut(owner) {
            player.shapes.push(id.clone());
        }
        tracing::debug!(player_id = %owner, shape_id = %id, "shape created");
        Ok(&*self.shapes.entry(id).or_insert(shape))
    }

    fn fresh_shape_id(&self) -> Result<ShapeId, Rejection> {
        for _ in 0..SHAPE_ID_ATTEMPTS {
            let id = ShapeId(format!("s-{}", generate_token(SHAPE_ID_BYTES)));
            if !self.shapes.contains_key(&id) {
                return Ok(id);
            }
            tracing::debug!(shape_id = %id, "generated shape id collided, retrying");
        }
        Err(Rejection::DuplicateShape(ShapeId("s-?".into())))
    }

    /// Removes one of `owner`'s shapes.
    pub fn remove_shape(
        &mut self,
        owner: &PlayerId,
        shape_id: &ShapeId,
    ) -> Result<Shape, Rejection> {
        let allow_last = self.arena.allow_remove_last_shape;
        let player = self
            .players
            .get_mut(owner)
            .ok_or(Rejection::UnknownSession)?;
        let Some(index) = player.shapes.iter().position(|id| id == shape_id)
        else {
            return Err(Rejection::OwnershipViolation(shape_id.clone()));
        };
        if player.shapes.len() == 1 && !allow_last {
            return Err(Rejection::LastShape(shape_id.clone()));
        }

        player.shapes.remove(index);
        let shape = self
            .shapes
            .remove(shape_id)
            .ok_or_else(|| Rejection::OwnershipViolation(shape_id.clone()))?;
        tracing::debug!(player_id = %owner, %shape_id, "shape removed");
        Ok(shape)
    }

    /// Drops all but the first `keep` of a player's shapes, returning the
    /// removed ones.
    pub fn truncate_shapes(&mut self, owner: &PlayerId, keep: usize) -> Vec<Shape> {
        let Some(player) = self.players.get_mut(owner) else {
            return Vec::new();
        };
        if player.shapes.len() <= keep {
            return Vec::new();
        }
        player
            .shapes
            .split_off(keep)
            .iter()
            .filter_map(|id| self.shapes.remove(id))
            .collect()
    }

    /// Recolors every shape `owner` has, and any they create later.
    /// Returns the recolored shape ids.
    pub fn set_shape_color(&mut self, owner: &PlayerId, color: Color) -> Vec<ShapeId> {
        let Some(player) = self.players.get_mut(owner) else {
            return Vec::new();
        };
        player.color = color.clone();
        for shape_id in &player.shapes {
            if let Some(shape) = self.shapes.get_mut(shape_id) {
                shape.color = color.clone();
            }
        }
        player.shapes.clone()
    }

    /// Looks up a shape only if `owner` owns it.
    pub fn owned_shape(
        &self,
        owner: &PlayerId,
        shape_id: &ShapeId,
    ) -> Result<&Shape, Rejection> {
        self.shapes
            .get(shape_id)
            .filter(|shape| shape.owner == *owner)
            .ok_or_else(|| Rejection::OwnershipViolation(shape_id.clone()))
    }

    pub fn owned_shape_mut(
        &mut self,
        owner: &PlayerId,
        shape_id: &ShapeId,
    ) -> Result<&mut Shape, Rejection> {
        self.shapes
            .get_mut(shape_id)
            .filter(|shape| shape.owner == *owner)
            .ok_or_else(|| Rejection::OwnershipViolation(shape_id.clone()))
    }

    pub fn shape(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Mutable access for server-side corrections, which bypass ownership.
    pub(crate) fn shape_mut(&mut self, id: &ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(id)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Every shape's replicated view, ordered by id.
    pub fn snapshot(&self) -> Vec<ShapeState> {
        let mut states: Vec<_> = self.shapes.values().map(Shape::to_state).collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntityStore {
        EntityStore::new(ArenaConfig::default())
    }

    fn pid(id: &str) -> PlayerId {
        PlayerId::from(id)
    }

    /// Checks that every shape's owner lists it and nobody else does.
    fn assert_ownership_consistent(store: &EntityStore) {
        for shape in store.shapes() {
            let owners: Vec<_> = store
                .players()
                .filter(|p| p.owns(&shape.id))
                .map(|p| p.id.clone())
                .collect();
            assert_eq!(owners, vec![shape.owner.clone()], "shape {}", shape.id);
        }
        for player in store.players() {
            for shape_id in player.shapes() {
                assert!(store.shape(shape_id).is_some());
            }
        }
    }

    #[test]
    fn test_create_player_is_idempotent() {
        let mut store = store();
        let now = Instant::now();

        let (_, created) = store.create_player(pid("alice"), now);
        assert!(created);
        store.create_shape(&pid("alice"), None, now).unwrap();

        let (player, created) = store.create_player(pid("alice"), now);
        assert!(!created);
        assert_eq!(player.shapes().len(), 1);
        assert_eq!(store.player_count(), 1);
    }

    #[test]
    fn test_create_shape_spawns_in_band_with_zero_velocity() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);

        let shape = store.create_shape(&pid("alice"), None, now).unwrap();

        assert!((100.0..=2200.0).contains(&shape.position.x));
        assert_eq!(shape.position.y, 1750.0);
        assert_eq!(shape.velocity, Vec2::ZERO);
        assert_eq!(shape.owner, pid("alice"));
        assert_ownership_consistent(&store);
    }

    #[test]
    fn test_create_shape_unknown_player_is_rejected() {
        let mut store = store();
        let result = store.create_shape(&pid("ghost"), None, Instant::now());
        assert_eq!(result.unwrap_err(), Rejection::UnknownSession);
        assert_eq!(store.shape_count(), 0);
    }

    #[test]
    fn test_create_shape_at_capacity_is_rejected() {
        let mut store = EntityStore::new(ArenaConfig {
            max_shapes_per_player: 2,
            ..ArenaConfig::default()
        });
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        store.create_shape(&pid("alice"), None, now).unwrap();
        store.create_shape(&pid("alice"), None, now).unwrap();

        let result = store.create_shape(&pid("alice"), None, now);

        assert_eq!(result.unwrap_err(), Rejection::CapacityExceeded { limit: 2 });
        assert_eq!(store.shape_count(), 2);
    }

    #[test]
    fn test_create_shape_explicit_id_taken_is_rejected() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        store.create_player(pid("bob"), now);
        store
            .create_shape(&pid("alice"), Some(ShapeId::from("s-1")), now)
            .unwrap();

        let result = store.create_shape(&pid("bob"), Some(ShapeId::from("s-1")), now);

        assert_eq!(
            result.unwrap_err(),
            Rejection::DuplicateShape(ShapeId::from("s-1"))
        );
        assert_eq!(store.shape(&ShapeId::from("s-1")).unwrap().owner, pid("alice"));
        assert_ownership_consistent(&store);
    }

    #[test]
    fn test_remove_shape_not_owned_is_noop() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        store.create_player(pid("bob"), now);
        let id = store.create_shape(&pid("alice"), None, now).unwrap().id.clone();
        store.create_shape(&pid("alice"), None, now).unwrap();

        let result = store.remove_shape(&pid("bob"), &id);

        assert_eq!(result.unwrap_err(), Rejection::OwnershipViolation(id.clone()));
        assert!(store.shape(&id).is_some());
        assert_ownership_consistent(&store);
    }

    #[test]
    fn test_remove_shape_refuses_last_shape_by_default() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        let id = store.create_shape(&pid("alice"), None, now).unwrap().id.clone();

        assert_eq!(
            store.remove_shape(&pid("alice"), &id).unwrap_err(),
            Rejection::LastShape(id.clone())
        );
        assert_eq!(store.shape_count(), 1);
    }

    #[test]
    fn test_remove_shape_last_shape_when_allowed() {
        let mut store = EntityStore::new(ArenaConfig {
            allow_remove_last_shape: true,
            ..ArenaConfig::default()
        });
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        let id = store.create_shape(&pid("alice"), None, now).unwrap().id.clone();

        let removed = store.remove_shape(&pid("alice"), &id).unwrap();

        assert_eq!(removed.id, id);
        assert!(store.player(&pid("alice")).unwrap().shapes().is_empty());
        assert_eq!(store.shape_count(), 0);
    }

    #[test]
    fn test_set_shape_color_applies_to_all_and_future_shapes() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        store.create_shape(&pid("alice"), None, now).unwrap();
        store.create_shape(&pid("alice"), None, now).unwrap();
        let red = Color::parse("#ff0000").unwrap();

        let changed = store.set_shape_color(&pid("alice"), red.clone());

        assert_eq!(changed.len(), 2);
        assert!(store.shapes().all(|s| s.color == red));
        let later = store.create_shape(&pid("alice"), None, now).unwrap();
        assert_eq!(later.color, red);
    }

    #[test]
    fn test_owned_shape_checks_owner() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        let id = store.create_shape(&pid("alice"), None, now).unwrap().id.clone();

        assert!(store.owned_shape(&pid("alice"), &id).is_ok());
        assert!(store.owned_shape(&pid("bob"), &id).is_err());
        assert!(store.owned_shape_mut(&pid("bob"), &id).is_err());
    }

    #[test]
    fn test_remove_player_takes_their_shapes() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        store.create_player(pid("bob"), now);
        store.create_shape(&pid("alice"), None, now).unwrap();
        store.create_shape(&pid("alice"), None, now).unwrap();
        store.create_shape(&pid("bob"), None, now).unwrap();

        let (player, shapes) = store.remove_player(&pid("alice")).unwrap();

        assert_eq!(player.id, pid("alice"));
        assert_eq!(shapes.len(), 2);
        assert_eq!(store.shape_count(), 1);
        assert!(store.remove_player(&pid("alice")).is_none());
        assert_ownership_consistent(&store);
    }

    #[test]
    fn test_truncate_shapes_keeps_oldest() {
        let mut store = store();
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        let first = store.create_shape(&pid("alice"), None, now).unwrap().id.clone();
        store.create_shape(&pid("alice"), None, now).unwrap();
        store.create_shape(&pid("alice"), None, now).unwrap();

        let removed = store.truncate_shapes(&pid("alice"), 1);

        assert_eq!(removed.len(), 2);
        assert_eq!(store.player(&pid("alice")).unwrap().shapes(), &[first]);
        assert_ownership_consistent(&store);
    }

    #[test]
    fn test_generated_shape_ids_are_unique() {
        let mut store = EntityStore::new(ArenaConfig {
            max_shapes_per_player: 1_000,
            ..ArenaConfig::default()
        });
        let now = Instant::now();
        store.create_player(pid("alice"), now);
        for _ in 0..500 {
            store.create_shape(&pid("alice"), None, now).unwrap();
        }
        assert_eq!(store.shape_count(), 500);
        assert_ownership_consistent(&store);
    }
}
