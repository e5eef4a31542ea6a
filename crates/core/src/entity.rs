//! Entity trait: identity that survives attribute changes.

use std::collections::HashMap;

/// Entity marker + minimal interface.
///
/// Actors and roles are entities: two actors with the same id are the same
/// actor even if their role assignments differ between requests.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Position of each entity in `entities`, keyed by id.
///
/// Fails with the first id that appears twice.
pub fn index_by_id<E: Entity>(entities: &[E]) -> Result<HashMap<E::Id, usize>, E::Id> {
    let mut index = HashMap::with_capacity(entities.len());
    for (pos, entity) in entities.iter().enumerate() {
        if index.insert(entity.id().clone(), pos).is_some() {
            return Err(entity.id().clone());
        }
    }
    Ok(index)
}
