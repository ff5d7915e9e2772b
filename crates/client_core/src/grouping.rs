//! Grouped view of a task list.

use shared::domain::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup {
    pub group: String,
    pub tasks: Vec<Task>,
}

/// Partitions `tasks` by their `group` label.
///
/// Groups appear in the order their label is first met once the tasks are
/// stably sorted by `order`. Inside a group, tasks keep their relative order
/// from `tasks`, which already reflects the list's sort context.
pub fn build_groups(tasks: &[Task]) -> Vec<TaskGroup> {
    let mut by_order: Vec<&Task> = tasks.iter().collect();
    by_order.sort_by_key(|task| task.order);

    let mut labels: Vec<&str> = Vec::new();
    for task in by_order {
        if !labels.contains(&task.group.as_str()) {
            labels.push(task.group.as_str());
        }
    }

    labels
        .into_iter()
        .map(|label| TaskGroup {
            group: label.to_string(),
            tasks: tasks
                .iter()
                .filter(|task| task.group == label)
                .cloned()
                .collect(),
        })
        .collect()
}

pub fn group_names(groups: &[TaskGroup]) -> Vec<String> {
    groups.iter().map(|group| group.group.clone()).collect()
}

#[cfg(test)]
#[path = "tests/grouping_tests.rs"]
mod tests;
