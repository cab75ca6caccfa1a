//! Repository modules

pub mod counter;

pub use counter::CounterRepository;
