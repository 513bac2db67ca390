use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::actions::escape_data;

const DEFAULT_FILTER: &str = "gdrive_upload=debug,gdrive_core=debug";

/// Installs the global subscriber. Events are printed to stdout as workflow
/// commands so the runner annotates warnings and errors and hides debug
/// lines unless step debugging is enabled.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stdout)
        .event_format(WorkflowCommandFormat)
        .init();
}

/// Renders one event as a workflow command line.
pub fn workflow_command(level: Level, message: &str) -> String {
    let prefix = match level {
        Level::ERROR => "::error::",
        Level::WARN => "::warning::",
        Level::DEBUG | Level::TRACE => "::debug::",
        Level::INFO => return message.to_string(),
    };
    format!("{prefix}{}", escape_data(message))
}

pub struct WorkflowCommandFormat;

impl<S, N> FormatEvent<S, N> for WorkflowCommandFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.field_format()
            .format_fields(format::Writer::new(&mut message), event)?;
        writeln!(
            writer,
            "{}",
            workflow_command(*event.metadata().level(), &message)
        )
    }
}
