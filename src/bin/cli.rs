use clap::Parser;
use teletext_relay::daemon::{run, Options};

/// DVB Teletext acquisition daemon: pulls one channel's TS over HTTP,
/// decodes the Teletext PID and emits one JSON datagram per page.
#[derive(Parser)]
struct Opt {
    /// Hostname or IP of the networked tuner
    host: String,

    /// Channel number (stream is http://{host}/auto/v{channel})
    channel: u32,

    /// Teletext PID in decimal. Find with:
    /// ffprobe http://{host}/auto/v{channel} 2>&1 | grep teletext
    #[clap(value_parser = clap::value_parser!(u16).range(1..=8190))]
    pid: u16,

    /// UDP port to send JSON to on 127.0.0.1
    #[clap(value_parser = clap::value_parser!(u16).range(1..=65535))]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opt = Opt::parse();

    run(Options {
        host: opt.host,
        channel: opt.channel,
        pid: opt.pid,
        port: opt.port,
    })
}
