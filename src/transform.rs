//! Daily to weekly bar aggregation

use chrono::Datelike;

use crate::Bar;

/// Roll consecutive bars sharing an ISO week into one bar per week.
///
/// The weekly bar takes the first bar's date and open, the extreme high/low,
/// the last close and the summed volume.
pub fn daily_to_weekly(bars: &[Bar]) -> Vec<Bar> {
    bars.chunk_by(|a, b| a.date.iso_week() == b.date.iso_week())
        .filter_map(roll_up)
        .collect()
}

fn roll_up(week: &[Bar]) -> Option<Bar> {
    let first = week.first()?;
    let last = week.last()?;
    Some(Bar {
        date: first.date,
        open: first.open,
        high: week.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: week.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: last.close,
        volume: week.iter().map(|b| b.volume).sum(),
    })
}
