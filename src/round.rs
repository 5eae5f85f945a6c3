//! Round arithmetic for the weekly Saturday drawing.
//!
//! Drawings happen in KST (UTC+9, no DST). The draw hour is deliberately a
//! single named constant: whether a Saturday-evening timestamp belongs to the
//! finished round or the next one is a product decision, and keeping the
//! cutover in one place makes it visible and changeable.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// Hour (KST) after which a Saturday counts as drawn. The official draw airs
/// around 20:45; result data is reliably published by 21:00.
pub const DRAW_HOUR_KST: u32 = 21;

const KST_OFFSET_SECS: i32 = 9 * 3600;

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap()
}

/// Instant of the round 1 drawing: Saturday 2002-12-07, draw hour, KST.
fn anchor_draw() -> DateTime<FixedOffset> {
    kst()
        .with_ymd_and_hms(2002, 12, 7, DRAW_HOUR_KST, 0, 0)
        .unwrap()
}

/// Number of the most recent round whose drawing has already happened,
/// or 0 before the very first drawing.
pub fn latest_drawn_round(now: DateTime<Utc>) -> u32 {
    let now = now.with_timezone(&kst());
    let anchor = anchor_draw();
    if now < anchor {
        return 0;
    }
    ((now - anchor).num_weeks() + 1) as u32
}

/// The round currently on sale, used to tag new participations. Always one
/// ahead of the latest drawn round: on Saturday before the draw hour this is
/// the imminent round, and it advances the moment the drawing happens.
pub fn current_round(now: DateTime<Utc>) -> u32 {
    latest_drawn_round(now) + 1
}
