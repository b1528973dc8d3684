//! voxputd session bus contract
//!
//! `GetStatus` returns three independent string arguments (body signature
//! `sss`), not a single `(sss)` struct.

/// Well-known bus name owned by voxputd
pub const BUS_NAME: &str = "com.github.jonochang.Voxput";

/// Object path the service is exported at
pub const OBJECT_PATH: &str = "/com/github/jonochang/Voxput";

/// Interface implemented at `OBJECT_PATH`
pub const INTERFACE: &str = "com.github.jonochang.Voxput1";

#[zbus::proxy(
    interface = "com.github.jonochang.Voxput1",
    default_service = "com.github.jonochang.Voxput",
    default_path = "/com/github/jonochang/Voxput",
    gen_blocking = false
)]
pub trait VoxputDaemon {
    /// Begin recording. No-op on the daemon side while busy.
    async fn start_recording(&self) -> zbus::Result<()>;

    /// Stop an in-progress recording; transcription follows.
    async fn stop_recording(&self) -> zbus::Result<()>;

    /// Start when idle, stop when recording.
    async fn toggle(&self) -> zbus::Result<()>;

    /// `(state, last_transcript, last_error)`, activating the daemon if needed
    async fn get_status(&self) -> zbus::Result<(String, String, String)>;

    /// Same as `get_status` but never starts the daemon
    #[zbus(name = "GetStatus", no_autostart)]
    async fn poll_status(&self) -> zbus::Result<(String, String, String)>;

    /// Emitted on every lifecycle transition
    #[zbus(signal)]
    fn state_changed(&self, state: String, transcript: String) -> zbus::Result<()>;
}
