pub mod grpc;
pub mod memory;
pub mod postgres;
