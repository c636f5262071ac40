use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{Scope, ScopedJoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use argh::FromArgs;
use bounded_buffer::{BoundedBuffer, Buffer, Slot, SplitBuffer};

const EOS_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, FromArgs)]
/// Producers and consumers exchanging values through a bounded buffer
#[argh(help_triggers("--help"))]
struct Args {
    /// maximum number of values resident in the buffer
    #[argh(option, arg_name = "int", default = "10")]
    capacity: usize,
    /// number of producer threads
    #[argh(option, arg_name = "int", default = "1")]
    producers: usize,
    /// number of consumer threads
    #[argh(option, arg_name = "int", default = "32")]
    consumers: usize,
    /// number of values pushed by each producer
    #[argh(option, arg_name = "int", default = "32")]
    items: u64,
    /// milliseconds to wait before stopping the consumers
    #[argh(option, long = "grace-ms", arg_name = "int", default = "2000")]
    grace_ms: u64,
    /// buffer implementation, may be "monitor" or "split"
    #[argh(option, default = "Kind::Monitor")]
    kind: Kind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Monitor,
    Split,
}

impl FromStr for Kind {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monitor" => Ok(Kind::Monitor),
            "split" => Ok(Kind::Split),
            _ => Err("invalid buffer kind"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Report {
    consumed: usize,
    stopped: usize,
    residual: usize,
}

pub fn main() -> Result<()> {
    let args = argh::from_env::<Args>();
    tracing_subscriber::fmt()
        .with_thread_names(true)
        .without_time()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let report = match args.kind {
        Kind::Monitor => run(&BoundedBuffer::try_new(args.capacity)?, &args)?,
        Kind::Split => run(&SplitBuffer::try_new(args.capacity)?, &args)?,
    };
    tracing::info!(
        "finished, consumed={}, stopped={}, residual={}",
        report.consumed,
        report.stopped,
        report.residual
    );

    let expected = args.producers as u64 * args.items;
    if report.consumed as u64 != expected {
        return Err(anyhow!(
            "consumed {} values, expected {expected}",
            report.consumed
        ));
    }
    Ok(())
}

fn run<B: Buffer<u64> + Sync>(buf: &B, args: &Args) -> Result<Report> {
    tracing::info!(
        "started, kind={:?}, capacity={}, producers={}, consumers={}",
        args.kind,
        buf.capacity(),
        args.producers,
        args.consumers
    );

    let consumed = AtomicUsize::new(0);
    std::thread::scope(|cx| -> Result<Report> {
        let consumers = (0..args.consumers)
            .map(|id| {
                let consumed = &consumed;
                spawn_named(cx, format!("consumer-{id}"), move || {
                    while let Slot::Item(val) = buf.pop() {
                        tracing::info!("consumed {val}");
                        consumed.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect::<Vec<_>>();

        let producers = (0..args.producers)
            .map(|id| {
                spawn_named(cx, format!("producer-{id}"), move || {
                    for val in 0..args.items {
                        buf.push(val);
                    }
                })
            })
            .collect::<Vec<_>>();
        let produced = join_all("producer", producers);
        tracing::info!("producers finished, size={}", buf.size());

        std::thread::sleep(Duration::from_millis(args.grace_ms));
        // Consumers that panicked never claim their marker.
        for _ in 0..args.consumers {
            if let Err(e) = buf.push_end_of_stream_timeout(EOS_TIMEOUT) {
                tracing::warn!("failed to stop a consumer: {e}");
            }
        }
        let stopped = join_all("consumer", consumers)?;
        produced?;

        Ok(Report {
            consumed: consumed.load(Ordering::Relaxed),
            stopped,
            residual: buf.size(),
        })
    })
}

fn spawn_named<'scope, F>(
    cx: &'scope Scope<'scope, '_>,
    name: String,
    f: F,
) -> ScopedJoinHandle<'scope, ()>
where
    F: 'scope + Send + FnOnce(),
{
    std::thread::Builder::new()
        .name(name)
        .spawn_scoped(cx, f)
        .expect("failed to spawn thread")
}

/// Joins every handle, then reports the first one that panicked.
fn join_all(role: &str, handles: Vec<ScopedJoinHandle<'_, ()>>) -> Result<usize> {
    let count = handles.len();
    let mut panicked = None;
    for (id, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            tracing::error!("{role}-{id} panicked");
            panicked.get_or_insert(id);
        }
    }
    match panicked {
        Some(id) => Err(anyhow!("{role}-{id} panicked")),
        None => Ok(count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: Kind) -> Args {
        Args {
            capacity: 3,
            producers: 3,
            consumers: 4,
            items: 50,
            grace_ms: 0,
            kind,
        }
    }

    #[test]
    fn every_value_consumed() {
        for kind in [Kind::Monitor, Kind::Split] {
            let args = args(kind);
            let report = match kind {
                Kind::Monitor => run(&BoundedBuffer::new(args.capacity), &args),
                Kind::Split => run(&SplitBuffer::new(args.capacity), &args),
            }
            .unwrap();
            assert_eq!(
                report,
                Report {
                    consumed: 150,
                    stopped: 4,
                    residual: 0,
                }
            );
        }
    }

    #[test]
    fn join_all_joins_past_failures() {
        let err = std::thread::scope(|cx| {
            let handles = (0..4)
                .map(|id| {
                    spawn_named(cx, format!("worker-{id}"), move || {
                        if id % 2 == 0 {
                            panic!("worker-{id} failed");
                        }
                    })
                })
                .collect();
            join_all("worker", handles)
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "worker-0 panicked");
    }

    #[test]
    fn parse_kind() {
        assert_eq!("monitor".parse::<Kind>(), Ok(Kind::Monitor));
        assert_eq!("split".parse::<Kind>(), Ok(Kind::Split));
        assert!("other".parse::<Kind>().is_err());
    }

    #[test]
    fn zero_capacity_is_an_error() {
        assert!(BoundedBuffer::<u64>::try_new(0).is_err());
    }
}
