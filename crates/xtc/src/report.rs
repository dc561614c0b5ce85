//! Human-readable alert reports.

use crate::alert::{Alert, AlertSet, Severity};
use crate::source::SourceCode;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::io;

fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
        Severity::Info => ReportKind::Advice,
    }
}

/// Renders one alert against the source it points into.
pub fn write_alert(alert: &Alert, source: &SourceCode, out: &mut impl io::Write) -> io::Result<()> {
    let filename = source.name().as_str();
    let range = alert.position.range();
    Report::build(report_kind(alert.severity), (filename, range.clone()))
        .with_config(Config::default().with_color(false))
        .with_code(alert.kind.name())
        .with_message(alert.kind.to_string())
        .with_label(Label::new((filename, range)).with_message(alert.severity.to_string()))
        .finish()
        .write((filename, Source::from(source.as_str())), out)
}

/// Renders every alert. Alerts positioned in other sources fall back to a
/// single `file:line:column` line.
pub fn render_alerts(alerts: &AlertSet, source: &SourceCode) -> io::Result<String> {
    let mut bytes = Vec::new();
    for alert in alerts {
        if alert.position.source == *source.name() {
            write_alert(alert, source, &mut bytes)?;
        } else {
            use io::Write;
            writeln!(bytes, "{alert}")?;
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertKind, AlertSink};
    use crate::source::{SourceName, SourcePosition, Span};

    #[test]
    fn test_render_alert_with_source() {
        let source = SourceCode::new("card.xtc", "<call:Missing/>\n".to_string());
        let mut alerts = AlertSet::new();
        alerts.alert(
            &source.position(0, 15),
            AlertKind::CallableNotFound {
                callee: "Missing".to_string(),
            },
        );
        let report = render_alerts(&alerts, &source).unwrap();
        assert!(report.contains("callable-not-found"), "{report}");
        assert!(report.contains("callable not found: Missing"), "{report}");
        assert!(report.contains("card.xtc"), "{report}");
    }

    #[test]
    fn test_render_alert_from_other_source() {
        let source = SourceCode::new("card.xtc", String::new());
        let mut alerts = AlertSet::new();
        alerts.alert(
            &SourcePosition::new(SourceName::new("other.xtc"), 3, 7, Span::from(0..0)),
            AlertKind::PlaceholderEndWithoutStart,
        );
        let report = render_alerts(&alerts, &source).unwrap();
        assert_eq!(
            report,
            "other.xtc:3:7: error: placeholder end without a start\n"
        );
    }
}
