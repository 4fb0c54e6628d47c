//! Decodes a raw CTF stream file against the built-in sample trace class
//! and prints every notification as it's produced.

mod common;

use clap::Parser as ClapParser;
use ctf_stream_reader::medium::SliceMedium;
use ctf_stream_reader::notif_iter::{NotifIter, NotifIterStep};
use std::{fs, path::PathBuf};
use tracing::error;

/// CTF stream reader example
#[derive(Debug, clap::Parser)]
struct Opts {
    /// The binary CTF stream file
    pub stream: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();

    let opts = Opts::parse();

    let bytes = fs::read(&opts.stream).unwrap();
    let trace_class = common::sample_trace_class();
    let medium = SliceMedium::new(&bytes);
    let mut notif_iter = NotifIter::new(medium, trace_class);

    loop {
        match notif_iter.next() {
            Ok(NotifIterStep::Ready(notif)) => println!("{notif:#?}"),
            Ok(NotifIterStep::Again) => continue,
            Ok(NotifIterStep::Ended) => break,
            Err(e) => {
                error!("{e}");
                break;
            }
        }
    }
}
