//! 循环依赖检测
//!
//! 对每个作用域，从声明在该作用域上的定义出发，按该作用域的可见性解析依赖做深度优先搜索。

use crate::definitions::{Definition, Definitions};
use crate::errors::InjectError;
use crate::scope::Scope;
use crate::types::TypeKey;
use std::collections::HashSet;

pub fn validate_no_circular_dependencies(definitions: &Definitions) -> Result<(), InjectError> {
    let mut scopes: Vec<&Scope> = definitions.all_scopes().as_slice().iter().collect();
    scopes.sort();
    for scope in scopes {
        validate_scope(definitions, scope)?;
    }
    Ok(())
}

fn validate_scope(definitions: &Definitions, scope: &Scope) -> Result<(), InjectError> {
    let mut done = HashSet::new();
    for definition in definitions.definitions_on_scope(scope) {
        let mut path = Vec::new();
        visit(definition, definitions, scope, &mut path, &mut done)?;
    }
    Ok(())
}

fn visit(
    definition: &Definition,
    definitions: &Definitions,
    scope: &Scope,
    path: &mut Vec<TypeKey>,
    done: &mut HashSet<TypeKey>,
) -> Result<(), InjectError> {
    if let Some(start) = path.iter().position(|key| *key == definition.key) {
        let cycle: Vec<String> = path[start..]
            .iter()
            .chain(std::iter::once(&definition.key))
            .map(TypeKey::description)
            .collect();
        return Err(InjectError::CircularDependency {
            scope: scope.render(),
            path: cycle.join(" -> "),
        });
    }
    if done.contains(&definition.key) {
        return Ok(());
    }
    path.push(definition.key);
    for dependency in definition.instantiator.dependencies() {
        let next = definitions.definition_for(&dependency, scope)?;
        visit(next, definitions, scope, path, done)?;
    }
    path.pop();
    done.insert(definition.key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instantiator::{CustomInstantiator, FactoryFn, Instantiator};
    use crate::scope::Scopes;
    use crate::statemachine::{Context, Reason, State};
    use crate::types::{Instance, ReusePolicy, SingletonType};
    use std::sync::Arc;

    struct Alpha;
    struct Beta;
    struct Gamma;

    fn context(key: TypeKey, dependencies: Vec<TypeKey>) -> Context {
        let factory: FactoryFn = Arc::new(|_| Ok(Arc::new(Alpha) as Instance));
        let instantiator: Arc<dyn Instantiator> = Arc::new(CustomInstantiator::new(key, dependencies, factory));
        Context {
            key,
            scope: Scope::root(),
            reuse_policy: ReusePolicy::Prototype,
            instantiator: Some(instantiator),
            state: State::Resolved,
            reasons: vec![Reason::ManuallyAdded],
        }
    }

    fn definitions(contexts: Vec<Context>) -> Definitions {
        Definitions::new(contexts, Scopes::new(), SingletonType::Lazy).unwrap()
    }

    #[test]
    fn test_acyclic_graph_passes() {
        let definitions = definitions(vec![
            context(TypeKey::of::<Alpha>(), vec![TypeKey::of::<Beta>(), TypeKey::of::<Gamma>()]),
            context(TypeKey::of::<Beta>(), vec![TypeKey::of::<Gamma>()]),
            context(TypeKey::of::<Gamma>(), vec![]),
        ]);
        assert!(validate_no_circular_dependencies(&definitions).is_ok());
    }

    #[test]
    fn test_self_reference() {
        let definitions = definitions(vec![context(TypeKey::of::<Alpha>(), vec![TypeKey::of::<Alpha>()])]);
        let error = validate_no_circular_dependencies(&definitions).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Illegal circular dependency in scope '/' detected: Alpha -> Alpha"
        );
    }

    #[test]
    fn test_cycle_portion_is_reported() {
        let definitions = definitions(vec![
            context(TypeKey::of::<Alpha>(), vec![TypeKey::of::<Beta>()]),
            context(TypeKey::of::<Beta>(), vec![TypeKey::of::<Gamma>()]),
            context(TypeKey::of::<Gamma>(), vec![TypeKey::of::<Beta>()]),
        ]);
        let error = validate_no_circular_dependencies(&definitions).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Illegal circular dependency in scope '/' detected: Beta -> Gamma -> Beta"
        );
    }
}
