use std::collections::BTreeMap;

use crate::error::BillingError;
use crate::model::{ClientPeriodRecord, ExcludedClient, FieldPresence, LoadedPeriod};

/// All periods' records concatenated, with the union of their column presence.
#[derive(Debug, Clone)]
pub struct MergedPeriods {
    pub records: Vec<ClientPeriodRecord>,
    pub presence: FieldPresence,
}

/// Result of the completeness check.
#[derive(Debug, Clone, Default)]
pub struct Admission {
    /// Admitted clients in ascending order, records sorted by period index.
    pub admitted: BTreeMap<String, Vec<ClientPeriodRecord>>,
    pub excluded: Vec<ExcludedClient>,
}

impl Admission {
    pub fn clients_seen(&self) -> usize {
        self.admitted.len() + self.excluded.len()
    }
}

/// Concatenate loaded periods.
///
/// Periods that failed to load never get here. When some did load but none of them
/// has a single filled identity cell, there is nothing to group by.
pub fn concat_periods(periods: Vec<LoadedPeriod>) -> Result<MergedPeriods, BillingError> {
    if !periods.is_empty() && periods.iter().all(|p| p.identity_cells == 0) {
        return Err(BillingError::MissingIdentityColumn);
    }

    let presence = periods
        .iter()
        .fold(FieldPresence::default(), |acc, p| acc.union(p.presence));
    let records = periods.into_iter().flat_map(|p| p.records).collect();

    Ok(MergedPeriods { records, presence })
}

/// Group by client and admit those with exactly one record per configured period.
///
/// A client seen three times is still excluded if two of the records come from the
/// same source; the report then names both the missing and the duplicated periods.
pub fn admit_complete(records: Vec<ClientPeriodRecord>, period_labels: &[String]) -> Admission {
    let mut groups: BTreeMap<String, Vec<ClientPeriodRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.client.clone()).or_default().push(record);
    }

    let mut admission = Admission::default();

    for (client, mut group) in groups {
        let mut per_period = vec![0usize; period_labels.len()];
        for record in &group {
            if let Some(n) = per_period.get_mut(record.period_index) {
                *n += 1;
            }
        }

        if group.len() == period_labels.len() && per_period.iter().all(|&n| n == 1) {
            group.sort_by_key(|r| r.period_index);
            admission.admitted.insert(client, group);
            continue;
        }

        let missing_periods: Vec<String> = per_period
            .iter()
            .zip(period_labels)
            .filter(|(n, _)| **n == 0)
            .map(|(_, label)| label.clone())
            .collect();
        let duplicated_periods: Vec<String> = per_period
            .iter()
            .zip(period_labels)
            .filter(|(n, _)| **n > 1)
            .map(|(_, label)| label.clone())
            .collect();

        log::warn!(
            "excluding '{client}': {} record(s), missing [{}]",
            group.len(),
            missing_periods.join(", ")
        );

        admission.excluded.push(ExcludedClient {
            client,
            record_count: group.len(),
            missing_periods,
            duplicated_periods,
        });
    }

    admission
}
