/*
[INPUT]:  Chain lookup backends
[OUTPUT]: Name resolution with caching and address formatting
[POS]:    Registry layer - module wiring
[UPDATE]: When registry components change
*/

mod lookup;
mod resolver;
mod rpc;

pub use lookup::{NameRegistry, StaticNameRegistry};
pub use resolver::{NameResolver, canonical_address, format_address};
pub use rpc::RpcNameRegistry;
