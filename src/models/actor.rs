use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity on whose behalf an operation runs. Authentication happens outside
/// the core; this only carries the already-verified caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(Uuid),
    Store(Uuid),
    Courier(Uuid),
    System,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer:{id}"),
            Actor::Store(id) => write!(f, "store:{id}"),
            Actor::Courier(id) => write!(f, "courier:{id}"),
            Actor::System => f.write_str("system"),
        }
    }
}
