//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Route diagnostic events to stderr (text or JSON)
//! - Route access-log events to stdout as bare lines
//!
//! # Design Decisions
//! - Diagnostic verbosity comes from `RUST_LOG`, defaulting to info for this crate
//! - Access lines bypass `RUST_LOG` so they are never filtered away

use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::{filter_fn, EnvFilter, FilterExt},
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

use crate::config::LogFormat;

/// Target of access-log events.
pub const ACCESS_LOG_TARGET: &str = "access_log";

const DEFAULT_FILTER: &str = "sigv4_proxy=info,tower_http=info";

/// Install the global subscriber.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init_logging(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let diagnostics = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    }
    .with_filter(env_filter.and(filter_fn(|meta| meta.target() != ACCESS_LOG_TARGET)));

    let access = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .event_format(AccessLine)
        .with_filter(filter_fn(|meta| meta.target() == ACCESS_LOG_TARGET));

    let _ = tracing_subscriber::registry()
        .with(diagnostics)
        .with(access)
        .try_init();
}

/// Writes only the event's fields: no timestamp, level, target or span context.
struct AccessLine;

impl<S, N> FormatEvent<S, N> for AccessLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
