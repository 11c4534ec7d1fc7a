pub mod entities;
pub mod repositories;
pub mod services;
pub mod validation;
pub mod value_objects;

#[cfg(test)]
pub(crate) mod testing;

pub use entities::*;
pub use repositories::*;
pub use services::*;
pub use validation::*;
pub use value_objects::*;
