//! State persistence port trait.

use crate::domain::error::TicktraderError;
use crate::domain::snapshot::{LoadedState, StateSnapshot};

pub trait StateStorePort {
    /// Starting positions/orders for `key`. Empty when nothing was saved.
    fn load(&self, key: &str) -> Result<LoadedState, TicktraderError>;

    fn save(&mut self, key: &str, snapshot: &StateSnapshot) -> Result<(), TicktraderError>;
}
