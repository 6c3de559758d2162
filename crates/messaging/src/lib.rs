//! Inter-station messaging.
//!
//! Messages are always about a parcel. One logical message becomes several
//! stored rows through [`fanout::plan_fanout`], so every station sees every
//! parcel event while the direct parties remain distinguishable.

pub mod fanout;
pub mod message;

pub use fanout::{COPY_PREFIX, Delivery, DeliveryKind, FanoutEvent, FanoutScope, plan_fanout};
pub use message::{Message, NewMessage};
