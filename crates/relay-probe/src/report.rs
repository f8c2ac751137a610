//! Sorting and persistence of the three run artifacts.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::Context;

use crate::aggregate::AggregateState;
use crate::config::FilesConfig;
use crate::validator::ActiveRelay;

/// Group field (third column) of an `address,port,group,org` record; empty
/// when absent.
fn record_group(record: &str) -> &str {
    record.split(',').nth(2).unwrap_or("")
}

/// Order records by group name. Stable, so equal groups keep their order.
pub fn compare_by_group(a: &str, b: &str) -> Ordering {
    record_group(a).cmp(record_group(b))
}

pub fn sort_records_by_group(records: &mut [String]) {
    records.sort_by(|a, b| compare_by_group(a, b));
}

/// Same ordering for validated relays, keyed on the resolved group.
pub fn sort_active_by_group(active: &mut [ActiveRelay]) {
    active.sort_by(|a, b| a.group.cmp(&b.group));
}

/// Final, sorted artifacts of a run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Deduplicated, sanitized input records.
    pub raw_records: Vec<String>,
    /// Validated relays with their resolved group and org.
    pub active: Vec<ActiveRelay>,
    pub buckets: BTreeMap<String, Vec<String>>,
}

impl Report {
    pub fn build(mut raw_records: Vec<String>, state: AggregateState) -> Self {
        sort_records_by_group(&mut raw_records);
        let mut active = state.active;
        sort_active_by_group(&mut active);

        Self {
            raw_records,
            active,
            buckets: state.buckets.as_map().clone(),
        }
    }

    pub fn raw_list(&self) -> String {
        self.raw_records.join("\n")
    }

    pub fn active_list(&self) -> String {
        self.active
            .iter()
            .map(ActiveRelay::record)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn bucket_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.buckets)
    }

    /// Write group buckets, the deduplicated raw list and the active list.
    pub async fn persist(&self, files: &FilesConfig) -> anyhow::Result<()> {
        let bucket_json = self.bucket_json()?;
        tokio::fs::write(&files.kv_pair, bucket_json)
            .await
            .with_context(|| format!("writing {}", files.kv_pair.display()))?;
        tokio::fs::write(&files.raw_list, self.raw_list())
            .await
            .with_context(|| format!("writing {}", files.raw_list.display()))?;
        tokio::fs::write(&files.active_list, self.active_list())
            .await
            .with_context(|| format!("writing {}", files.active_list.display()))?;

        tracing::info!(
            kv_pair = %files.kv_pair.display(),
            raw_list = %files.raw_list.display(),
            active_list = %files.active_list.display(),
            "Artifacts written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::aggregate::GroupBuckets;

    fn relay(address: &str, group: &str, org: &str) -> ActiveRelay {
        ActiveRelay {
            address: address.to_string(),
            port: 443,
            delay: Duration::from_millis(80),
            resolved_address: address.to_string(),
            group: group.to_string(),
            org: org.to_string(),
        }
    }

    fn state(active: Vec<ActiveRelay>) -> AggregateState {
        let mut buckets = GroupBuckets::new(10);
        for a in &active {
            buckets.push(&a.group, a.endpoint());
        }
        AggregateState {
            success_count: active.len() as u64,
            active,
            buckets,
        }
    }

    #[test]
    fn test_missing_group_sorts_first() {
        let mut records = vec![
            "1.1.1.1,80,US,A".to_string(),
            "2.2.2.2,80".to_string(),
            "3.3.3.3,80,DE,B".to_string(),
            "4.4.4.4,80,,C".to_string(),
        ];
        sort_records_by_group(&mut records);
        assert_eq!(
            records,
            vec!["2.2.2.2,80", "4.4.4.4,80,,C", "3.3.3.3,80,DE,B", "1.1.1.1,80,US,A"]
        );
    }

    #[test]
    fn test_sorting_twice_is_stable() {
        let mut once = vec![
            "5.5.5.5,1,US,X".to_string(),
            "6.6.6.6,1,JP,Y".to_string(),
            "7.7.7.7,1,US,Z".to_string(),
            "8.8.8.8,1,JP,W".to_string(),
        ];
        sort_records_by_group(&mut once);
        let mut twice = once.clone();
        sort_records_by_group(&mut twice);

        assert_eq!(once, twice);
        assert_eq!(once[0], "6.6.6.6,1,JP,Y");
        assert_eq!(once[1], "8.8.8.8,1,JP,W");
    }

    #[test]
    fn test_report_renders_sorted_artifacts() {
        let report = Report::build(
            vec!["9.9.9.9,80,US,Raw".to_string(), "8.8.8.8,80,AU,Raw".to_string()],
            state(vec![
                relay("2.2.2.2", "US", "Org US"),
                relay("3.3.3.3", "AU", "Org AU"),
            ]),
        );

        assert_eq!(report.raw_list(), "8.8.8.8,80,AU,Raw\n9.9.9.9,80,US,Raw");
        assert_eq!(
            report.active_list(),
            "3.3.3.3,443,AU,Org AU\n2.2.2.2,443,US,Org US"
        );
        let json: serde_json::Value = serde_json::from_str(&report.bucket_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"AU": ["3.3.3.3:443"], "US": ["2.2.2.2:443"]})
        );
        assert!(report.bucket_json().unwrap().contains("\n  \"AU\": ["));
    }

    #[test]
    fn test_active_sort_keeps_completion_order_on_ties() {
        // Completion order: JP#1, US#1, JP#2, (no group), US#2.
        let completed = vec![
            relay("10.0.0.1", "JP", "First JP"),
            relay("10.0.0.2", "US", "First US"),
            relay("10.0.0.3", "JP", "Second JP"),
            relay("10.0.0.4", "", "Ungrouped"),
            relay("10.0.0.5", "US", "Second US"),
        ];
        let report = Report::build(Vec::new(), state(completed));
        let order: Vec<&str> = report.active.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(
            order,
            vec!["10.0.0.4", "10.0.0.1", "10.0.0.3", "10.0.0.2", "10.0.0.5"]
        );

        let mut again = report.active.clone();
        sort_active_by_group(&mut again);
        assert_eq!(again, report.active);
        assert_eq!(
            report.active_list(),
            "10.0.0.4,443,,Ungrouped\n\
             10.0.0.1,443,JP,First JP\n\
             10.0.0.3,443,JP,Second JP\n\
             10.0.0.2,443,US,First US\n\
             10.0.0.5,443,US,Second US"
        );
    }

    #[tokio::test]
    async fn test_persist_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = FilesConfig {
            raw_list: dir.path().join("raw.txt"),
            active_list: dir.path().join("active.txt"),
            kv_pair: dir.path().join("kv.json"),
        };
        let report = Report::build(
            vec!["2.2.2.2,443,SG,Raw".to_string()],
            state(vec![relay("2.2.2.2", "SG", "Org SG")]),
        );

        report.persist(&files).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&files.raw_list).unwrap(),
            "2.2.2.2,443,SG,Raw"
        );
        assert_eq!(
            std::fs::read_to_string(&files.active_list).unwrap(),
            "2.2.2.2,443,SG,Org SG"
        );
        let kv: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files.kv_pair).unwrap()).unwrap();
        assert_eq!(kv["SG"][0], "2.2.2.2:443");
    }
}
