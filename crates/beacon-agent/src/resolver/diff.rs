//! Add/remove events between two instance snapshots.

use beacon_core::{Instance, Update};

/// Computes the events turning `previous` into `latest`.
///
/// Adds come first, in `latest` order, followed by removes in `previous`
/// order. Instances are matched by `id` only; a changed address under the
/// same id produces no event. IDs must be unique within each slice.
pub fn diff(previous: &[Instance], latest: &[Instance]) -> Vec<Update> {
    let contains = |set: &[Instance], id: &str| set.iter().any(|i| i.id == id);

    let adds = latest
        .iter()
        .filter(|i| !contains(previous, &i.id))
        .map(Update::add);
    let removes = previous
        .iter()
        .filter(|i| !contains(latest, &i.id))
        .map(Update::remove);

    adds.chain(removes).collect()
}
