//! Commands accepted by announcer tasks.

use seedcast_core::StopReason;

/// Messages the supervisor sends to a running announcer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncerCommand {
    /// Leave the running states, sending a final `stopped` announce if the
    /// tracker ever registered the torrent.
    Stop {
        /// Why the announcer is stopping.
        reason: StopReason,
    },
    /// Draw a new simulated speed from the live bounds.
    RefreshSpeed,
    /// Announce now instead of waiting for the scheduled deadline.
    Reannounce,
}
