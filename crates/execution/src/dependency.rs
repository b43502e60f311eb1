//! Dependency resolution for tasks.

use autocrew_core::{Priority, Task, TaskId, TaskStatus};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::ResolveError;

/// What to do with a task whose dependency failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Fail the dependent without calling its executor
    #[default]
    Propagate,
    /// Run the dependent anyway once the dependency is terminal
    AttemptAnyway,
}

/// Whether a task may start, given the statuses seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// All dependencies satisfied, ready to execute
    Ready,
    /// This dependency failed and the policy propagates failures
    DependencyFailed(TaskId),
    /// This dependency is part of the run but has not settled yet
    Waiting(TaskId),
    /// This dependency is neither in the run nor known to have completed
    Unsettled(TaskId),
}

/// Orders tasks so that dependencies run first.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Order `tasks` so every task follows all of its dependencies.
    ///
    /// Among tasks that are ready at the same time, higher priority goes
    /// first, then declaration order.
    pub fn resolve(&self, tasks: Vec<Task>) -> Result<Vec<Task>, ResolveError> {
        self.resolve_with_settled(tasks, &HashSet::new())
    }

    /// Like [`resolve`](Self::resolve), but dependencies listed in `settled`
    /// may be absent from `tasks`; they impose no ordering.
    pub fn resolve_with_settled(
        &self,
        tasks: Vec<Task>,
        settled: &HashSet<TaskId>,
    ) -> Result<Vec<Task>, ResolveError> {
        let mut index: HashMap<TaskId, usize> = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ResolveError::DuplicateTask(task.id.clone()));
            }
        }

        // dependents[i] = tasks waiting on i; deps[i] = in-batch dependencies of i
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dep in &task.dependencies {
                match index.get(dep) {
                    Some(&d) => {
                        dependents[d].push(i);
                        deps[i].push(d);
                    }
                    None if settled.contains(dep) => {}
                    None => {
                        return Err(ResolveError::UnknownDependency {
                            task: task.id.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        let mut in_degree: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<(Priority, Reverse<usize>)> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| (tasks[i].priority, Reverse(i)))
            .collect();

        let mut order = Vec::with_capacity(tasks.len());
        while let Some((_, Reverse(i))) = ready.pop() {
            order.push(i);
            for &next in &dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push((tasks[next].priority, Reverse(next)));
                }
            }
        }

        if order.len() < tasks.len() {
            let cycle = find_cycle(&deps, &in_degree);
            return Err(ResolveError::CyclicDependency {
                cycle: cycle.into_iter().map(|i| tasks[i].id.clone()).collect(),
            });
        }

        let mut slots: Vec<Option<Task>> = tasks.into_iter().map(Some).collect();
        Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
    }

    /// Check a task's dependencies against the statuses of the current run.
    ///
    /// `statuses` holds every task of the run; ids outside it are looked up
    /// in `settled`.
    pub fn check(
        &self,
        task: &Task,
        statuses: &HashMap<TaskId, TaskStatus>,
        settled: &HashSet<TaskId>,
        policy: FailurePolicy,
    ) -> Readiness {
        let mut waiting = None;

        for dep in &task.dependencies {
            match statuses.get(dep) {
                Some(TaskStatus::Completed) => {}
                Some(TaskStatus::Failed) => {
                    if policy == FailurePolicy::Propagate {
                        return Readiness::DependencyFailed(dep.clone());
                    }
                }
                Some(TaskStatus::Pending | TaskStatus::Running) => {
                    waiting.get_or_insert_with(|| Readiness::Waiting(dep.clone()));
                }
                None if settled.contains(dep) => {}
                None => {
                    waiting = Some(Readiness::Unsettled(dep.clone()));
                }
            }
        }

        waiting.unwrap_or(Readiness::Ready)
    }
}

/// Walk unresolved nodes along unresolved dependency edges until one repeats.
///
/// Every node left with a positive in-degree has at least one dependency that
/// is also unresolved, so the walk always closes a loop.
fn find_cycle(deps: &[Vec<usize>], in_degree: &[usize]) -> Vec<usize> {
    let Some(start) = in_degree.iter().position(|&d| d > 0) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let Some(&next) = deps[current].iter().find(|&&d| in_degree[d] > 0) else {
            return path;
        };
        if let Some(&pos) = seen.get(&next) {
            return path.split_off(pos);
        }
        seen.insert(next, path.len());
        path.push(next);
        current = next;
    }
}
