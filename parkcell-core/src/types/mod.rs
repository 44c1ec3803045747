pub mod party;
pub mod primitives;
pub mod reservation;
pub mod site;

pub use party::*;
pub use primitives::*;
pub use reservation::*;
pub use site::*;
