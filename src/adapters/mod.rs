// Adapters layer: concrete implementations of the client port.

pub mod http;
