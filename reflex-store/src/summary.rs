use reflex_core::StoredResult;

/// Personal statistics over the stored history
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub best_ms: u32,
    pub mean_ms: f64,
    pub latest_ms: u32,
}

/// `records` in insertion order. `None` for an empty history.
pub fn summarize(records: &[StoredResult]) -> Option<Summary> {
    let latest = records.last()?;
    let best_ms = records.iter().map(|r| r.reaction_time_ms).min()?;
    let total: u64 = records.iter().map(|r| u64::from(r.reaction_time_ms)).sum();

    Some(Summary {
        count: records.len(),
        best_ms,
        mean_ms: total as f64 / records.len() as f64,
        latest_ms: latest.reaction_time_ms,
    })
}
