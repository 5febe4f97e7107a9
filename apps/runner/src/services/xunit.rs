//! Parser for the xunit `result.xml` written by xfstests.
//!
//! xfstests emits one `<testsuite>` per test configuration with one
//! `<testcase classname="xfstests.<cfg>" name="<group>/<number>">` per test.
//! A `<skipped>` child marks the test as not run, `<failure>` or `<error>`
//! marks it as failed.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{TestOutcome, TestRecord};

/// A `<testcase>` whose children have not been fully read yet.
struct PendingCase {
    identifier: String,
    skipped: bool,
    failed: bool,
}

impl PendingCase {
    fn from_tag(tag: &BytesStart<'_>) -> AppResult<Self> {
        let name = attribute_value(tag, b"name")
            .ok_or_else(|| AppError::Artifact("<testcase> without a name".to_string()))?;
        let identifier = match attribute_value(tag, b"classname")
            .as_deref()
            .and_then(|c| c.rsplit_once('.'))
        {
            Some((_, config)) if !config.is_empty() => format!("{}/{}", config, name),
            _ => name,
        };
        Ok(Self {
            identifier,
            skipped: false,
            failed: false,
        })
    }

    fn mark(&mut self, child: &[u8]) {
        match child {
            b"skipped" => self.skipped = true,
            b"failure" | b"error" => self.failed = true,
            _ => {}
        }
    }

    fn finish(self) -> AppResult<TestRecord> {
        TestRecord::parse(
            &self.identifier,
            TestOutcome::from_signal(self.skipped, self.failed),
        )
    }
}

/// Parse xunit XML into flat test records, in document order.
pub fn parse_xunit(bytes: &[u8]) -> AppResult<Vec<TestRecord>> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut saw_suite = false;
    let mut current: Option<PendingCase> = None;
    let mut records = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => match tag.name().as_ref() {
                b"testsuite" => saw_suite = true,
                b"testcase" => current = Some(PendingCase::from_tag(&tag)?),
                child => {
                    if let Some(case) = current.as_mut() {
                        case.mark(child);
                    }
                }
            },
            Ok(Event::Empty(tag)) => match tag.name().as_ref() {
                b"testsuite" => saw_suite = true,
                b"testcase" => records.push(PendingCase::from_tag(&tag)?.finish()?),
                child => {
                    if let Some(case) = current.as_mut() {
                        case.mark(child);
                    }
                }
            },
            Ok(Event::End(tag)) => {
                if tag.name().as_ref() == b"testcase"
                    && let Some(case) = current.take()
                {
                    records.push(case.finish()?);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(AppError::Artifact(format!(
                    "Failed to parse xunit results: {}",
                    err
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(AppError::Artifact(
            "xunit results end inside a <testcase>".to_string(),
        ));
    }
    if !saw_suite {
        return Err(AppError::Artifact(
            "xunit results contain no <testsuite>".to_string(),
        ));
    }

    debug!("Parsed {} xunit test cases", records.len());
    Ok(records)
}

/// Read and parse an xunit file.
pub async fn parse_xunit_file(path: &Path) -> AppResult<Vec<TestRecord>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::Artifact(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_xunit(&bytes)
}

fn attribute_value(tag: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}
