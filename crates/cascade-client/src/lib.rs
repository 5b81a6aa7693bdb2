//! Client session for Cascade.
//!
//! A [`Session`] addresses a set of replica groups: writes fan out to every
//! configured group and are judged against a [`SuccessPolicy`], reads walk
//! the groups in order and take the first success. Reply frames come back
//! through a [`CompletionRegistry`] keyed by transaction id, with the MORE
//! flag marking intermediate frames.

pub mod completion;
pub mod error;
pub mod session;
pub mod transport;

pub use completion::{Completion, CompletionOutcome, CompletionRegistry, ReplyFrame};
pub use error::{ClientError, ClientResult};
pub use session::{RouteTable, Session, SessionConfig};
pub use transport::{LoopbackTransport, Transport};

pub use cascade_types::SuccessPolicy;
