//! Control session: exchanges a credential for access tokens, opens the
//! persistent hub connection with the first token, registers, and relays hub
//! traffic to subscribers.

pub mod event;
mod hub;
pub mod register;
pub mod session;
pub mod source;
pub mod state;

pub use {
    event::{AcquisitionError, InboundFrame, SessionEvent},
    register::RegistrationFrame,
    session::{ControlSession, StartError},
    source::TokenSource,
    state::{ConnectionPhase, SessionState},
};
