/*
[INPUT]:  Wallet provider backends
[OUTPUT]: Connection lifecycle management and the provider seam
[POS]:    Wallet layer - module wiring
[UPDATE]: When wallet components change
*/

mod connector;
mod provider;

pub use connector::{ConnectionState, WalletConnector};
pub use provider::{MockWalletProvider, WalletProvider};
