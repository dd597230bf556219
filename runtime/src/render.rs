//! Plain-text rendering of postings and notices.

use shiftmatch_core::ports::ClaimAffordance;
use shiftmatch_core::types::{Request, RequestKind, RequestStatus};
use std::fmt::Write as _;

const ANY_SHOP: &str = "Any shop";

/// Claimants as seen on a posting: `filled/capacity`.
fn slots(request: &Request) -> (usize, usize) {
    let capacity = request.capacity.value();
    (request.filled_slots.min(capacity), capacity)
}

fn or_dash(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("-")
}

/// Shift times as `HH:MM-HH:MM`.
#[must_use]
pub fn shift_hours(request: &Request) -> String {
    format!(
        "{}-{}",
        request.shift.start().format("%H:%M"),
        request.shift.end().format("%H:%M")
    )
}

/// One-line summary used in private notices.
#[must_use]
pub fn summary_line(request: &Request) -> String {
    let mut line = format!(
        "{} | {} {}",
        request.shop_name.as_deref().unwrap_or(ANY_SHOP),
        request.shift.date().format("%d.%m"),
        shift_hours(request)
    );
    if let Some(station) = &request.station {
        let _ = write!(line, " | {}", station.station);
    }
    line
}

/// Full text of the public posting.
#[must_use]
pub fn post_text(request: &Request) -> String {
    let shop = request.shop_name.as_deref().unwrap_or(ANY_SHOP);
    let date = request.shift.date().format("%Y-%m-%d");
    let hours = shift_hours(request);
    let position = or_dash(Some(request.position.as_str()));
    let note = or_dash(request.note.as_deref());

    let mut lines = match request.kind {
        RequestKind::Director => vec![
            "🔔 Shift offered by a shop director".to_string(),
            format!("Shop: {shop}"),
            format!("Date: {date}"),
            format!("Shift: {hours}"),
            format!("Position: {position}"),
            format!("Note: {note}"),
            "Press \"Respond\" to contact the director.".to_string(),
        ],
        RequestKind::Worker => {
            let mut lines = vec!["💼 Worker looking for a shift".to_string(), format!("Shop: {shop}")];
            if let Some(station) = &request.station {
                match station.distance_m {
                    Some(distance) => lines.push(format!("Station: {} · {distance} m", station.station)),
                    None => lines.push(format!("Station: {}", station.station)),
                }
            }
            lines.extend([
                format!("Date: {date}"),
                format!("Shift: {hours}"),
                format!("Desired position: {position}"),
                format!("Wishes: {note}"),
                "Press \"Invite\" to contact the worker.".to_string(),
            ]);
            lines
        }
    };

    let (filled, capacity) = slots(request);
    lines.push(String::new());
    lines.push(format!("Status: taken {filled}/{capacity}"));
    lines.join("\n")
}

/// Claim button for the posting; disabled once no slot is left.
#[must_use]
pub fn affordance(request: &Request) -> ClaimAffordance {
    let (filled, capacity) = slots(request);
    if filled >= capacity || request.status != RequestStatus::Open {
        return ClaimAffordance {
            request_id: request.id,
            label: format!("No slots ({filled}/{capacity})"),
            enabled: false,
        };
    }
    let label = match request.kind {
        RequestKind::Director => "Respond",
        RequestKind::Worker => "Invite",
    };
    ClaimAffordance {
        request_id: request.id,
        label: label.to_string(),
        enabled: true,
    }
}

/// Notices sent after an accepted claim: `(to_author, to_claimant)`.
#[must_use]
pub fn claim_notices(request: &Request, claimant_contact: &str, author_contact: &str) -> (String, String) {
    let summary = summary_line(request);
    let id = request.id;
    match request.kind {
        RequestKind::Director => (
            format!("✅ A worker responded to your request #{id}\n{summary}\nWorker contact: {claimant_contact}"),
            format!("🎉 You responded to the shift in request #{id}\n{summary}\nContact the director: {author_contact}"),
        ),
        RequestKind::Worker => (
            format!("🎉 A director invited you to a shift in request #{id}\n{summary}\nDirector contact: {claimant_contact}"),
            format!("✅ You sent an invitation for request #{id}\n{summary}\nWorker contact: {author_contact}"),
        ),
    }
}

/// Confirmation for the author once a request is accepted for publication.
#[must_use]
pub fn published_notice(request: &Request) -> String {
    format!("Done! Request #{} is being published.\n{}", request.id, summary_line(request))
}

/// Notice to the author when a request expires.
#[must_use]
pub fn expired_notice(request: &Request) -> String {
    format!(
        "⏰ Request #{} has expired and was removed from the channel.\n{}",
        request.id,
        summary_line(request)
    )
}

/// Notice to claimants when the author withdraws a request.
#[must_use]
pub fn cancelled_notice(request: &Request) -> String {
    format!("Request #{} was cancelled by its author.\n{}", request.id, summary_line(request))
}
