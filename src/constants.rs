// Protocol constants for PowerShades controllers

use std::net::Ipv4Addr;
use std::time::Duration;

/// UDP port the shade controllers listen on.
pub const DEVICE_PORT: u16 = 42;

/// Limited broadcast address used for discovery probes.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Size of the fixed wire header (8 bytes).
pub const HEADER_SIZE: usize = 8;

/// Interpreted portion of a status reply payload; devices commonly send
/// 40 bytes, the excess is ignored.
pub const STATUS_PAYLOAD_SIZE: usize = 30;

/// Size of the serial reply payload (model, serial halves, reported IP).
pub const SERIAL_PAYLOAD_SIZE: usize = 20;

/// Size of the NUL-terminated name field in name replies.
pub const NAME_FIELD_SIZE: usize = 50;

/// Receive buffer size; device datagrams never come close to this.
pub const MAX_DATAGRAM_SIZE: usize = 256;

/// Scan window for a broadcast discovery pass.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-attempt reply timeout for name lookups and device verification.
pub const NAME_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause before retrying a failed name lookup.
pub const NAME_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Minimum spacing between status request cycles.
pub const STATUS_RATE_LIMIT: Duration = Duration::from_millis(500);

/// How long each status attempt waits before checking for a reply.
pub const RESPONSE_WAIT: Duration = Duration::from_millis(500);

/// Pause between status request attempts.
pub const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// A reply recorded within this window satisfies the in-flight request.
pub const RESPONSE_FRESHNESS: Duration = Duration::from_secs(2);

/// Anything heard from within this window counts as available, no matter
/// how many request cycles have failed.
pub const AVAILABILITY_GRACE: Duration = Duration::from_secs(120);

/// Silence longer than this marks the device unavailable.
pub const SILENCE_LIMIT: Duration = Duration::from_secs(180);

/// Failed request cycles tolerated before going unavailable.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Poll interval while the position is still unknown.
pub const POLL_FAST: Duration = Duration::from_secs(5);

/// Poll interval once the position is known.
pub const POLL_NORMAL: Duration = Duration::from_secs(10);

/// Default retry budget for a status request cycle.
pub const DEFAULT_STATUS_RETRIES: u32 = 2;

/// Retry budget used while the position is unknown.
pub const UNKNOWN_POSITION_RETRIES: u32 = 3;

/// Delay between a position command and its follow-up status request.
pub const SET_POSITION_FOLLOW_UP: Duration = Duration::from_secs(1);
