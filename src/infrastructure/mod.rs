//! 基础设施层
//!
//! 运行期容器及其缓存、拦截、生命周期与计时支持。

pub mod container;

pub use container::interception::{FnInterceptor, InstantiationEvent, Interceptor, OverwritingInterceptor, TimingInterceptor};
pub use container::lifecycle::{Closeable, Closers, LifecycleManager};
pub use container::singleton_store::SingletonStore;
pub use container::timing::{InstantiationTime, InstantiationTimes, TimedInstantiation};
pub use container::Injector;
