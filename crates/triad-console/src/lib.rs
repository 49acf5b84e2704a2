//! # Triad Console
//!
//! The console's outer surface: [`ConsoleApi`] exposes the endpoint
//! operations as typed calls over the components, and [`WorldFixture`] seeds
//! the in-memory reference handlers the `triad-console` binary runs against.

#![forbid(unsafe_code)]

pub mod api;
pub mod fixture;

pub use api::{
    ConsoleApi, FlowEvalRequest, FlowEvalResponse, Handlers, PreviewResponse, SaveRequest,
    SaveResponse, SeatMutateRequest, SeatMutateResponse, SeatView, TriadResponse,
    ValidateRequest, ValidateResponse,
};
pub use fixture::{World, WorldFixture};
