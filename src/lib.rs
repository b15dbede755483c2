// src/lib.rs
pub mod daemon {
    /// Startup configuration; immutable once the supervisor is running.
    pub struct Options {
        /// Hostname or IP of the networked tuner
        pub host: String,
        /// Channel number, requested as `http://{host}/auto/v{channel}`
        pub channel: u32,
        /// Teletext elementary-stream PID (1..=8190)
        pub pid: u16,
        /// Destination UDP port on 127.0.0.1
        pub port: u16,
    }

    /// Blocking entry-point; returns when a termination signal is observed.
    pub fn run(opts: Options) -> anyhow::Result<()> {
        crate::core::run(opts)
    }
}

mod constants;
mod core;
mod framer;
mod pes;
mod report;
mod sink;
mod source;
mod ts;
mod vbi;
