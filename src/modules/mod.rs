//! Application modules. Registration order fixes migration order, so tables
//! with foreign-key parents register after them.

pub mod auth;
pub mod categories;
pub mod genres;
pub mod titles;
pub mod users;

use medley_kernel::ModuleRegistry;

pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(users::create_module());
    registry.register(categories::create_module());
    registry.register(genres::create_module());
    registry.register(titles::create_module());
    registry.register(auth::create_module());
}
