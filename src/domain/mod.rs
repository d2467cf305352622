pub mod commands;
pub mod copy;
pub mod errors;
pub mod film;
pub mod lending;
pub mod loan;
pub mod member;
pub mod value_objects;

pub use copy::*;
pub use errors::*;
pub use film::*;
pub use loan::*;
pub use member::*;
pub use value_objects::*;
