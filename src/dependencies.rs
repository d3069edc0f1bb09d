//! 依赖元组
//!
//! 自定义类型与候选构造器都以 `(Arc<A>, Arc<B>, ..)` 元组接收依赖，
//! 元组的元素顺序即依赖声明顺序。

use crate::errors::InjectError;
use crate::types::{Instance, TypeKey};
use std::any::Any;
use std::sync::Arc;

/// 可由一组已解析实例还原出来的依赖元组
pub trait Dependencies: Sized + 'static {
    /// 依赖的类型标识，顺序与元组一致
    fn keys() -> Vec<TypeKey>;

    /// 从按 `keys()` 顺序排列的实例中还原元组
    fn extract(instances: Vec<Instance>) -> Result<Self, InjectError>;
}

/// 把类型擦除的实例还原为具体类型
pub fn downcast_instance<T: Any + Send + Sync>(instance: Instance) -> Result<Arc<T>, InjectError> {
    instance.downcast::<T>().map_err(|_| InjectError::TypeCastFailed {
        expected: TypeKey::of::<T>().description(),
        actual: "an instance of another type".to_string(),
    })
}

fn downcast_next<T: Any + Send + Sync>(
    instances: &mut impl Iterator<Item = Instance>,
) -> Result<Arc<T>, InjectError> {
    let instance = instances.next().ok_or_else(|| InjectError::TypeCastFailed {
        expected: TypeKey::of::<T>().description(),
        actual: "no instance".to_string(),
    })?;
    downcast_instance::<T>(instance)
}

macro_rules! impl_dependencies {
    ($($name:ident),*) => {
        impl<$($name),*> Dependencies for ($(Arc<$name>,)*)
        where
            $($name: Any + Send + Sync,)*
        {
            fn keys() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$name>()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn extract(instances: Vec<Instance>) -> Result<Self, InjectError> {
                let mut instances = instances.into_iter();
                Ok(($(downcast_next::<$name>(&mut instances)?,)*))
            }
        }
    };
}

impl_dependencies!();
impl_dependencies!(A);
impl_dependencies!(A, B);
impl_dependencies!(A, B, C);
impl_dependencies!(A, B, C, D);
impl_dependencies!(A, B, C, D, E);
impl_dependencies!(A, B, C, D, E, F);
impl_dependencies!(A, B, C, D, E, F, G);
impl_dependencies!(A, B, C, D, E, F, G, H);
