// Base entities (no relations to other entities)
pub mod tag;

// Entities with relations
pub mod user;

// Re-export all entity types
pub use tag::*;
pub use user::*;
