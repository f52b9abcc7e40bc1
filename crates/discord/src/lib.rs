//! Discord REST implementation of [`tickets_channels::ChannelGateway`].

pub mod client;
mod wire;

pub use client::DiscordRest;
