pub mod adherence;
pub mod enums;
pub mod family;
pub mod medication;
pub mod notification;
pub mod patient;

pub use adherence::*;
pub use family::*;
pub use medication::*;
pub use notification::*;
pub use patient::*;
