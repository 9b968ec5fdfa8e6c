// Domain layer: wire shapes, call options and the client port. No transport code here.

pub mod model;
pub mod options;
pub mod ports;
pub mod status;
