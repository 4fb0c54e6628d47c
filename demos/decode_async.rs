//! Async variant of `decode`: the decoding core itself is synchronous and
//! single-threaded (spec §5 rules out an async core), so this only moves
//! the file read onto tokio's async I/O and then drives the same
//! `NotifIter` loop as a blocking task.

mod common;

use clap::Parser as ClapParser;
use ctf_stream_reader::medium::SliceMedium;
use ctf_stream_reader::notif_iter::{NotifIter, NotifIterStep};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::error;

/// CTF stream reader async example
#[derive(Debug, clap::Parser)]
struct Opts {
    /// The binary CTF stream file
    pub stream: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let opts = Opts::parse();

    let mut file = tokio::fs::File::open(&opts.stream).await.unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await.unwrap();

    let notifications = tokio::task::spawn_blocking(move || {
        let trace_class = common::sample_trace_class();
        let medium = SliceMedium::new(&bytes);
        let mut notif_iter = NotifIter::new(medium, trace_class);
        let mut out = Vec::new();
        loop {
            match notif_iter.next() {
                Ok(NotifIterStep::Ready(notif)) => out.push(format!("{notif:#?}")),
                Ok(NotifIterStep::Again) => continue,
                Ok(NotifIterStep::Ended) => break,
                Err(e) => {
                    out.push(format!("error: {e}"));
                    break;
                }
            }
        }
        out
    })
    .await
    .unwrap();

    for line in notifications {
        if line.starts_with("error: ") {
            error!("{line}");
        } else {
            println!("{line}");
        }
    }
}
