//! 作用域模型
//!
//! 作用域是作用域标记类型组成的有序序列，空序列即根作用域。

mod manager;

pub use manager::ScopeManager;

use crate::errors::InjectError;
use crate::types::TypeKey;
use std::fmt;

/// 嵌套作用域路径
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Scope {
    markers: Vec<TypeKey>,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    /// 在当前作用域下追加一个标记
    pub fn child(&self, marker: TypeKey) -> Self {
        let mut markers = Vec::with_capacity(self.markers.len() + 1);
        markers.extend_from_slice(&self.markers);
        markers.push(marker);
        Self { markers }
    }

    /// 非严格前缀判断：作用域总是包含自身
    pub fn contains(&self, other: &Scope) -> bool {
        other.markers.starts_with(&self.markers)
    }

    pub fn contains_marker(&self, marker: &TypeKey) -> bool {
        self.markers.contains(marker)
    }

    pub fn markers(&self) -> &[TypeKey] {
        &self.markers
    }

    pub fn depth(&self) -> usize {
        self.markers.len()
    }

    pub fn is_root(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn parent(&self) -> Option<Scope> {
        let (_, rest) = self.markers.split_last()?;
        Some(Self { markers: rest.to_vec() })
    }

    /// `/`、`/Request`、`/Request/Session`
    pub fn render(&self) -> String {
        let mut rendered = String::from("/");
        let parts: Vec<String> = self.markers.iter().map(TypeKey::description).collect();
        rendered.push_str(&parts.join("/"));
        rendered
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({})", self.render())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// 已声明的作用域集合，按声明顺序保存，始终包含根作用域
#[derive(Debug, Clone)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self { scopes: vec![Scope::root()] }
    }
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 校验标记类型未在其他嵌套位置被用作作用域
    ///
    /// 同一位置重复声明（以及该位置之下的子作用域）不算冲突。
    pub fn validate_marker_not_used_elsewhere(
        &self,
        marker: TypeKey,
        current: &Scope,
    ) -> Result<(), InjectError> {
        let declared_at = current.child(marker);
        let conflict = self
            .scopes
            .iter()
            .filter(|scope| !declared_at.contains(scope))
            .find(|scope| scope.contains_marker(&marker));
        match conflict {
            Some(scope) => Err(InjectError::Configuration(format!(
                "Scope type '{}' is already used in scope '{}'",
                marker.description(),
                scope.render()
            ))),
            None => Ok(()),
        }
    }

    pub fn add(&mut self, scope: Scope) {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
    }

    pub fn contains(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    pub fn as_slice(&self) -> &[Scope] {
        &self.scopes
    }

    /// 排序后的渲染结果，用于错误信息
    pub fn render_sorted(&self) -> String {
        let mut rendered: Vec<String> = self.scopes.iter().map(Scope::render).collect();
        rendered.sort();
        format!("[{}]", rendered.join(", "))
    }
}
