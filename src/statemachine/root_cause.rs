//! 根因分析：沿着 `Reason` 链回溯，解释某个类型为什么会被注册

use super::{Context, Reason};

/// 渲染 `index` 处请求的全部根因路径
///
/// 每条路径形如 `because of B -> because of A -> manually added`，
/// 先按跳数再按文本排序。
pub fn root_cause_paths(contexts: &[Context], index: usize) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current = Vec::new();
    let mut visiting = vec![index];
    collect_paths(contexts, index, &mut current, &mut visiting, &mut paths);
    paths.sort();
    paths.dedup();
    paths.into_iter().map(|(_, path)| path).collect()
}

fn collect_paths(
    contexts: &[Context],
    index: usize,
    current: &mut Vec<String>,
    visiting: &mut Vec<usize>,
    paths: &mut Vec<(usize, String)>,
) {
    for reason in &contexts[index].reasons {
        match *reason {
            Reason::ManuallyAdded => {
                current.push("manually added".to_string());
                paths.push((current.len(), current.join(" -> ")));
                current.pop();
            }
            Reason::BecauseOf(parent) => {
                // 依赖环上的原因不会引出新的路径
                if visiting.contains(&parent) {
                    continue;
                }
                current.push(format!("because of {}", contexts[parent].key.description()));
                visiting.push(parent);
                collect_paths(contexts, parent, current, visiting, paths);
                visiting.pop();
                current.pop();
            }
        }
    }
}
