//! Report rendering for `--output text|json`.
//!
//! Command handlers build a report value and hand it to [`OutputWriter`];
//! they never branch on the output format themselves.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command reports in the format selected on the command line.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Write `report` to stdout.
    pub fn render<T: Render + Serialize>(&self, report: &T) -> Result<(), CliError> {
        let mut out = std::io::stdout().lock();
        self.render_to(report, &mut out)
    }

    /// Write `report` to `out`. JSON is pretty-printed and newline-terminated.
    pub fn render_to<T: Render + Serialize>(
        &self,
        report: &T,
        out: &mut dyn Write,
    ) -> Result<(), CliError> {
        if let OutputFormat::Json = self.format {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        } else {
            report.render_text(out)?;
        }
        Ok(())
    }
}

/// Text form of a report. JSON comes from its `Serialize` impl.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct HopCount {
        vector: String,
        hops: usize,
    }

    impl Render for HopCount {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "{}: {} hops", self.vector, self.hops)
        }
    }

    fn sample() -> HopCount {
        HopCount {
            vector: "eni-a -> eni-b".to_owned(),
            hops: 3,
        }
    }

    fn write(format: OutputFormat) -> String {
        let mut out = Vec::new();
        OutputWriter::new(format)
            .render_to(&sample(), &mut out)
            .expect("rendering should succeed");
        String::from_utf8(out).expect("valid UTF-8")
    }

    #[test]
    fn test_text_uses_render_impl() {
        assert_eq!(write(OutputFormat::Text), "eni-a -> eni-b: 3 hops\n");
    }

    #[test]
    fn test_json_is_pretty_and_newline_terminated() {
        let out = write(OutputFormat::Json);
        assert!(out.ends_with("}\n"));
        assert!(out.contains("\n  \"hops\": 3"), "should be pretty-printed: {out}");

        let value: serde_json::Value = serde_json::from_str(&out).expect("should parse JSON");
        assert_eq!(value["vector"], "eni-a -> eni-b");
    }
}
