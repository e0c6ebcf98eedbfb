pub mod ceremonial;
pub mod projector;
pub mod statutory;
