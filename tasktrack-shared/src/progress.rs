/// Progress board grouping
///
/// Buckets tasks by status for the `/task/progress` view. Every status has a
/// bucket, even an empty one, and buckets iterate in [`TaskStatus`] order.

use std::collections::BTreeMap;

use crate::models::task::TaskStatus;

/// Groups `items` by status in one pass, keeping input order per bucket
pub fn group_by_status<T, I, F>(items: I, status_of: F) -> BTreeMap<TaskStatus, Vec<T>>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> TaskStatus,
{
    let mut groups: BTreeMap<TaskStatus, Vec<T>> =
        TaskStatus::ALL.into_iter().map(|s| (s, Vec::new())).collect();

    for item in items {
        groups.entry(status_of(&item)).or_default().push(item);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_has_every_bucket() {
        let groups = group_by_status(Vec::<(u32, TaskStatus)>::new(), |t| t.1);

        assert_eq!(groups.len(), 3);
        assert!(groups.values().all(Vec::is_empty));
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), TaskStatus::ALL.to_vec());
    }

    #[test]
    fn test_buckets_preserve_input_order() {
        let tasks = vec![
            (1, TaskStatus::Completed),
            (2, TaskStatus::NotStarted),
            (3, TaskStatus::Completed),
            (4, TaskStatus::InProgress),
            (5, TaskStatus::NotStarted),
        ];

        let groups = group_by_status(tasks, |t| t.1);
        let ids = |s: TaskStatus| groups[&s].iter().map(|t| t.0).collect::<Vec<_>>();

        assert_eq!(ids(TaskStatus::NotStarted), vec![2, 5]);
        assert_eq!(ids(TaskStatus::InProgress), vec![4]);
        assert_eq!(ids(TaskStatus::Completed), vec![1, 3]);
    }
}
