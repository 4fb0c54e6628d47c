#![doc = include_str!("../README.md")]

pub use crate::error::Error;
pub use crate::notification::{
    ClockSnapshot, EventNotification, NewPacketNotification, Notification,
};
pub use crate::value::FieldValue;

pub mod btr;
pub mod error;
pub mod medium;
pub mod metadata;
pub mod muxer;
pub mod notif_iter;
pub mod notification;
pub mod value;
