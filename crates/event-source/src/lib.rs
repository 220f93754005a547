pub mod bus;
pub mod normalize;

pub use bus::{BusConfig, EventBus, MemoryEventBus, NatsCredentials, NatsEventBus};
