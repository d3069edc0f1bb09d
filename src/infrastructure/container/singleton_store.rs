use crate::errors::InjectError;
use crate::scope::Scope;
use crate::types::{Instance, TypeKey};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

type Cell = Arc<OnceCell<Instance>>;

/// 单例缓存
///
/// 每个容器持有一份，只保存定义在自己作用域上的单例；
/// 定义在外层作用域的单例委托给父容器的存储，保证同一实例在子作用域间共享。
/// 每个 (类型, 作用域) 对应一个 `OnceCell`，并发获取时也只构造一次。
pub struct SingletonStore {
    scope: Scope,
    cells: DashMap<TypeKey, Cell>,
    parent: Option<Arc<SingletonStore>>,
}

impl SingletonStore {
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            scope: Scope::root(),
            cells: DashMap::new(),
            parent: None,
        })
    }

    /// 进入子作用域时创建的存储
    pub fn child(self: &Arc<Self>, marker: TypeKey) -> Arc<Self> {
        Arc::new(Self {
            scope: self.scope.child(marker),
            cells: DashMap::new(),
            parent: Some(Arc::clone(self)),
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn owner_of(&self, definition_scope: &Scope) -> Result<&SingletonStore, InjectError> {
        let mut store = self;
        loop {
            if store.scope == *definition_scope {
                return Ok(store);
            }
            store = store.parent.as_deref().ok_or_else(|| {
                InjectError::Configuration(format!(
                    "No singleton store for scope '{}' reachable from scope '{}'",
                    definition_scope.render(),
                    self.scope.render()
                ))
            })?;
        }
    }

    /// 已缓存的实例
    pub fn get(&self, key: &TypeKey, definition_scope: &Scope) -> Option<Instance> {
        let store = self.owner_of(definition_scope).ok()?;
        let cell = store.cells.get(key)?;
        cell.value().get().cloned()
    }

    pub fn contains(&self, key: &TypeKey, definition_scope: &Scope) -> bool {
        self.get(key, definition_scope).is_some()
    }

    /// 取出缓存实例，缺失时调用 `create` 构造
    ///
    /// 返回值第二项表示本次调用是否真的执行了构造。
    pub fn get_or_create<F>(&self, key: TypeKey, definition_scope: &Scope, create: F) -> Result<(Instance, bool), InjectError>
    where
        F: FnOnce() -> Result<Instance, InjectError>,
    {
        let store = self.owner_of(definition_scope)?;
        // 先克隆出 cell 再初始化，避免构造依赖时持有分片锁
        let cell: Cell = store
            .cells
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let mut created = false;
        let instance = cell.get_or_try_init(|| {
            created = true;
            create()
        })?;
        Ok((instance.clone(), created))
    }
}
