//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `channel_sink` | TelemetrySink      | Web-socket frame queue   |
//! | `log_sink`     | TelemetrySink      | Serial log output        |
//! | `nvs`          | ConfigPort         | NVS / in-memory store    |
//! |                | StoragePort        |                          |
//! | `time`         | TimePort           | ESP32 system timer       |
//!
//! The motor axes and rangefinders implement their ports directly in
//! [`drivers`](crate::drivers) and [`sensors`](crate::sensors).

pub mod channel_sink;
pub mod log_sink;
pub mod nvs;
pub mod time;
