//! CalDAV calendar-query REPORT bodies and their multistatus responses.

use calarm_core::DateRange;
use calarm_core::error::{CalarmError, CalarmResult};

/// A fetched calendar resource with its ICS data.
#[derive(Debug)]
pub struct CalendarResource {
    pub href: String,
    pub etag: Option<String>,
    pub data: String,
}

/// calendar-query REPORT body, with a VEVENT time-range filter when `range` is given.
pub fn calendar_query(range: Option<&DateRange>) -> String {
    let filter = match range {
        Some(range) => format!(
            r#"
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>"#,
            range.from_caldav(),
            range.to_caldav()
        ),
        None => r#"
            <C:comp-filter name="VEVENT"/>"#
            .to_string(),
    };

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">{filter}
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#
    )
}

/// Parse calendar resources from a CalDAV multistatus response.
///
/// Responses without calendar-data are skipped.
pub fn parse_multistatus(body: &str) -> CalarmResult<Vec<CalendarResource>> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| CalarmError::Store(format!("Invalid multistatus XML: {e}")))?;

    let mut resources = Vec::new();

    for response in doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
    {
        let text_of = |name: &str| {
            response
                .descendants()
                .find(|n| n.tag_name().name() == name)
                .and_then(|n| n.text())
                .map(|s| s.trim().to_string())
        };

        let Some(href) = text_of("href") else { continue };
        let Some(data) = text_of("calendar-data") else { continue };

        resources.push(CalendarResource {
            href,
            etag: text_of("getetag"),
            data,
        });
    }

    Ok(resources)
}
