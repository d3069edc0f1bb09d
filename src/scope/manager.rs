use crate::types::{Instance, TypeKey};
use std::collections::HashMap;

/// 进入作用域时绑定的作用域对象
///
/// 每个容器持有自己的一份，子作用域在父作用域的基础上追加。
#[derive(Clone, Default)]
pub struct ScopeManager {
    scope_objects: HashMap<TypeKey, Instance>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回追加了新作用域对象的副本
    pub fn add(&self, marker: TypeKey, scope_object: Instance) -> Self {
        let mut scope_objects = self.scope_objects.clone();
        scope_objects.insert(marker, scope_object);
        Self { scope_objects }
    }

    pub fn scope_object(&self, marker: &TypeKey) -> Option<Instance> {
        self.scope_objects.get(marker).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Request(&'static str);

    #[test]
    fn test_add_does_not_mutate_original() {
        let root = ScopeManager::new();
        let child = root.add(TypeKey::of::<Request>(), Arc::new(Request("r1")));

        assert!(root.scope_object(&TypeKey::of::<Request>()).is_none());
        let bound = child
            .scope_object(&TypeKey::of::<Request>())
            .and_then(|instance| instance.downcast::<Request>().ok())
            .unwrap();
        assert_eq!(bound.0, "r1");
    }
}
