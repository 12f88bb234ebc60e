//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                   | Connects to               |
//! |------------|------------------------------|---------------------------|
//! | `hardware` | SensorPort, IndicatorPort    | channel sources, lamps    |
//! | `log_sink` | EventSink                    | `log` facade              |
//! | `net`      | InboundListener, OutboundLink| std TCP sockets           |
//! | `time`     | Clock                        | `std::time::Instant`      |

pub mod hardware;
pub mod log_sink;
pub mod net;
pub mod time;
