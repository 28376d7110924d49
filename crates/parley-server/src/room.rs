//! Private room naming.

use parley_proto::RoomId;

/// Name of the private room shared by two sessions.
///
/// The ids are ordered numerically and joined with `-`, so both sides of a
/// pair compute the same name no matter who asks first.
#[must_use]
pub fn pair_key(a: u64, b: u64) -> RoomId {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    RoomId::from(format!("{lo}-{hi}"))
}
