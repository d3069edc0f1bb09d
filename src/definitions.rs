//! 解析结果：每个 (类型, 作用域) 的最终定义

use crate::errors::InjectError;
use crate::instantiator::Instantiator;
use crate::scope::{Scope, Scopes};
use crate::statemachine::Context;
use crate::types::{ReusePolicy, SingletonType, TypeKey};
use std::collections::HashMap;
use std::sync::Arc;

/// 一个已解析的定义
#[derive(Clone)]
pub struct Definition {
    pub key: TypeKey,
    pub scope: Scope,
    pub instantiator: Arc<dyn Instantiator>,
    pub reuse_policy: ReusePolicy,
}

impl Definition {
    /// `<scope> <type> (<policy>)`
    pub fn describe(&self) -> String {
        format!("{} {} ({})", self.scope.render(), self.key.description(), self.reuse_policy)
    }
}

/// 按类型索引的全部定义，构建后不可变
pub struct Definitions {
    by_type: HashMap<TypeKey, Vec<Definition>>,
    scopes: Scopes,
}

impl Definitions {
    /// 由解析完成的请求构造，`DefaultSingleton` 在这里落到具体单例类型
    pub fn new(contexts: Vec<Context>, scopes: Scopes, default_singleton: SingletonType) -> Result<Self, InjectError> {
        let mut by_type: HashMap<TypeKey, Vec<Definition>> = HashMap::new();
        for context in contexts {
            let instantiator = context.instantiator.ok_or_else(|| {
                InjectError::Configuration(format!(
                    "Type '{}' has not been resolved in scope '{}'",
                    context.key.description(),
                    context.scope.render()
                ))
            })?;
            by_type.entry(context.key).or_default().push(Definition {
                key: context.key,
                scope: context.scope,
                instantiator,
                reuse_policy: context.reuse_policy.with_default(default_singleton),
            });
        }
        Ok(Self { by_type, scopes })
    }

    /// 当前作用域可见、作用域最深的定义
    pub fn definition_for(&self, key: &TypeKey, scope: &Scope) -> Result<&Definition, InjectError> {
        let candidates = self.by_type.get(key).ok_or_else(|| InjectError::UnregisteredType {
            type_name: key.description(),
        })?;
        candidates
            .iter()
            .filter(|definition| definition.scope.contains(scope))
            .max_by_key(|definition| definition.scope.depth())
            .ok_or_else(|| InjectError::NotVisibleInScope {
                type_name: key.description(),
            })
    }

    pub fn has_definition_for(&self, key: &TypeKey, scope: &Scope) -> bool {
        self.definition_for(key, scope).is_ok()
    }

    /// 恰好声明在 `scope` 上的定义，按类型名排序
    pub fn definitions_on_scope(&self, scope: &Scope) -> Vec<&Definition> {
        let mut definitions: Vec<&Definition> = self
            .by_type
            .values()
            .flatten()
            .filter(|definition| definition.scope == *scope)
            .collect();
        definitions.sort_by(|a, b| a.key.cmp(&b.key));
        definitions
    }

    /// `scope` 下可见的所有定义（每个类型取最具体的一个），按类型名排序
    pub fn visible_from(&self, scope: &Scope) -> Vec<&Definition> {
        let mut definitions: Vec<&Definition> = self
            .by_type
            .keys()
            .filter_map(|key| self.definition_for(key, scope).ok())
            .collect();
        definitions.sort_by(|a, b| a.key.cmp(&b.key));
        definitions
    }

    /// 全部定义，按 (作用域, 类型) 排序
    pub fn all(&self) -> Vec<&Definition> {
        let mut definitions: Vec<&Definition> = self.by_type.values().flatten().collect();
        definitions.sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.key.cmp(&b.key)));
        definitions
    }

    pub fn all_scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// 调试输出：每个定义一行，按文本排序
    pub fn dump(&self) -> String {
        let mut lines: Vec<String> = self.by_type.values().flatten().map(Definition::describe).collect();
        lines.sort();
        lines.join("\n")
    }
}
