use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// ANSI color codes for console output
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths for alignment
const COMPONENT_WIDTH: usize = 16;
const LOG_LEVEL_WIDTH: usize = 7;

/// Event formatter: `[timestamp] [component] [level] message`.
///
/// The component is taken from an explicit `component` field when present,
/// otherwise from the crate that emitted the event (`dv_node::actor` is
/// shown as `dvsim-node`).
pub struct SimLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl SimLogFormatter {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            color_enabled: std::io::stderr().is_terminal(),
        }
    }

    /// Component name for an event, padded or truncated to a fixed width
    fn format_component(&self, component: Option<&str>, target: &str) -> String {
        let name = match component {
            Some(comp) => format!("{}-{}", self.service_name, comp),
            None => {
                let krate = target.split("::").next().unwrap_or(target);
                match krate.strip_prefix("dv_") {
                    Some(suffix) => format!("{}-{}", self.service_name, suffix),
                    None => self.service_name.clone(),
                }
            }
        };

        if name.chars().count() > COMPONENT_WIDTH {
            let truncated: String = name.chars().take(COMPONENT_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = COMPONENT_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };

        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH)
    }

    fn get_color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for SimLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        let metadata = event.metadata();
        let level = metadata.level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let formatted_component =
            self.format_component(visitor.component.as_deref(), metadata.target());
        let formatted_level = self.format_log_level(level);

        let color = self.get_color_for_level(level);
        let reset_color = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan_color = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}]{} [{}] [{}{}{}] ",
            cyan_color,
            timestamp,
            reset_color,
            formatted_component,
            color,
            formatted_level,
            reset_color
        )?;
        writeln!(writer, "{}", visitor.message)
    }
}

/// Extracts the message and optional component from an event
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => {
                let comp = format!("{:?}", value);
                self.component = Some(comp.trim_matches('"').to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn plain_formatter() -> SimLogFormatter {
        SimLogFormatter {
            service_name: "dvsim".to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_component_from_target() {
        let formatter = plain_formatter();
        assert_eq!(formatter.format_component(None, "dv_node::actor").trim_end(), "dvsim-node");
        assert_eq!(formatter.format_component(None, "dvsim::console").trim_end(), "dvsim");
        assert_eq!(
            formatter.format_component(Some("console"), "dv_node::actor").trim_end(),
            "dvsim-console"
        );
        assert_eq!(formatter.format_component(None, "dv_node").len(), COMPONENT_WIDTH);
    }

    #[test]
    fn test_long_component_truncated() {
        let formatter = plain_formatter();
        let name = formatter.format_component(Some("a-very-long-component"), "x");
        assert_eq!(name.chars().count(), COMPONENT_WIDTH);
        assert!(name.ends_with('…'));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_component_field_names_the_column() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .event_format(plain_formatter())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(component = "console", "link updated");
            tracing::warn!("plain event");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("] [dvsim-console   ] [ℹ INFO ] link updated\n"));
        assert!(output.contains("] [dvsim           ] [⚠ WARN ] plain event\n"));
    }

    #[test]
    fn test_no_color_when_disabled() {
        let formatter = plain_formatter();
        assert_eq!(formatter.get_color_for_level(&tracing::Level::ERROR), "");
        assert!(formatter.format_log_level(&tracing::Level::WARN).starts_with("⚠ WARN"));
    }
}
