pub mod decision;
pub mod schedule;
pub mod sensor;
pub mod silo;
pub mod weather;

pub use decision::*;
pub use schedule::*;
pub use sensor::*;
pub use silo::*;
pub use weather::*;
